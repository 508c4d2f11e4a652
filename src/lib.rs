//! githooker library
//!
//! Receives signed push webhooks and launches the command configured for the
//! pushed repository and ref.

use std::sync::Arc;

use anyhow::Result;

pub mod api;
pub mod config;
pub mod services;
pub mod utils;

pub use config::AppConfig;
use services::HookService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Signature verification and command dispatch
    pub hooks: Arc<HookService>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let hooks = HookService::from_config(&config.hook)?;

        Ok(Self {
            config: Arc::new(config),
            hooks: Arc::new(hooks),
        })
    }
}
