use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::curriculum::RealtimeConfig;
use crate::error::AppError;
use crate::services::session::DEFAULT_DEBOUNCE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory selection source.
    pub realtime: Option<RealtimeConfig>,
    pub course_catalog_path: Option<String>,
    pub sync_debounce: Duration,
    pub starter_grace: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://portfolio.db".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string());
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| AppError::Config(format!("BIND_ADDR is not a socket address: {}", bind_addr)))?;

        let course_catalog_path = env::var("COURSE_CATALOG_PATH").ok();

        Ok(Self {
            database_url,
            bind_addr,
            realtime: RealtimeConfig::new_from_env()?,
            course_catalog_path,
            sync_debounce: Duration::from_millis(number_var("SYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE.as_millis() as u64)?),
            starter_grace: Duration::from_secs(number_var("STARTER_GRACE_SECS", 3)?),
        })
    }
}

fn number_var(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("{} is not a number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
