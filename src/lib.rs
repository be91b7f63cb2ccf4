pub mod api;
pub mod config;
pub mod curriculum;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
