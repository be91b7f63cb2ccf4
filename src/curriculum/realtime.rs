use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::curriculum::{CurriculumSelectionSource, SelectionSubscription};
use crate::error::AppError;
use crate::models::{CourseSelection, PortfolioKey};

#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub poll_interval: Duration,
}

impl RealtimeConfig {
    /// `None` when `SELECTION_BASE_URL` is unset.
    pub fn new_from_env() -> Result<Option<Self>, AppError> {
        let base_url = match env::var("SELECTION_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => return Ok(None),
        };
        let auth_token = env::var("SELECTION_AUTH_TOKEN").ok();
        let poll_secs = match env::var("SELECTION_POLL_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| AppError::Config(format!("SELECTION_POLL_SECS is not a number: {}", raw)))?,
            Err(_) => 5,
        };

        Ok(Some(Self {
            base_url,
            auth_token,
            poll_interval: Duration::from_secs(poll_secs),
        }))
    }

    fn selection_url(&self, key: &PortfolioKey) -> String {
        format!(
            "{}/albertaCourses/{}/{}/{}.json",
            self.base_url, key.family_id, key.student_id, key.school_year
        )
    }
}

/// Reads course selections from a realtime key-value store over its REST interface.
/// Subscriptions poll and report whenever the decoded selection differs.
pub struct RealtimeSelectionClient {
    client: Client,
    config: RealtimeConfig,
}

impl RealtimeSelectionClient {
    pub fn new(config: RealtimeConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

fn request_url(url: &str, auth_token: Option<&str>) -> Result<Url, AppError> {
    let mut url = Url::parse(url)
        .map_err(|e| AppError::Config(format!("invalid selection url {}: {}", url, e)))?;
    if let Some(token) = auth_token {
        url.query_pairs_mut().append_pair("auth", token);
    }
    Ok(url)
}

async fn fetch_selection(
    client: &Client,
    url: &str,
    auth_token: Option<&str>,
) -> Result<CourseSelection, AppError> {
    let url = request_url(url, auth_token)?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("selection request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream(format!("selection source error {}: {}", status, body)));
    }

    let body_text = response
        .text()
        .await
        .map_err(|e| AppError::Upstream(format!("failed to read selection body: {}", e)))?;

    serde_json::from_str::<CourseSelection>(&body_text).map_err(|e| {
        tracing::error!("Failed to parse selection: {}", e);
        AppError::Upstream(format!("Failed to parse selection: {}", e))
    })
}

#[async_trait]
impl CurriculumSelectionSource for RealtimeSelectionClient {
    async fn read(&self, key: &PortfolioKey) -> Result<CourseSelection, AppError> {
        let url = self.config.selection_url(key);
        fetch_selection(&self.client, &url, self.config.auth_token.as_deref()).await
    }

    async fn subscribe(&self, key: &PortfolioKey) -> Result<SelectionSubscription, AppError> {
        let (tx, rx) = mpsc::channel(1);
        let client = self.client.clone();
        let url = self.config.selection_url(key);
        let auth_token = self.config.auth_token.clone();
        let interval = self.config.poll_interval;
        let mut last = self.read(key).await.ok();
        let key = key.clone();

        let poller = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                match fetch_selection(&client, &url, auth_token.as_deref()).await {
                    Ok(selection) => {
                        if last.as_ref() != Some(&selection) {
                            debug!("selection changed for {}", key);
                            last = Some(selection);
                            // Full channel means a change is already pending.
                            let _ = tx.try_send(());
                        }
                    }
                    Err(e) => {
                        warn!("selection poll failed for {}: {}", key, e);
                    }
                }

                if tx.is_closed() {
                    break;
                }
            }
        });

        Ok(SelectionSubscription::new(rx, Some(poller)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_is_query_encoded() {
        let url = request_url(
            "https://example.test/albertaCourses/f/s/2024-2025.json",
            Some("a&b=c d"),
        )
        .unwrap();

        assert_eq!(url.query(), Some("auth=a%26b%3Dc+d"));
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "a&b=c d");
    }

    #[test]
    fn no_token_leaves_url_bare() {
        let url = request_url("https://example.test/albertaCourses/f/s/y.json", None).unwrap();
        assert_eq!(url.query(), None);
    }
}
