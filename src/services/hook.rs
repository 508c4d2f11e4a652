//! Webhook authentication and dispatch
//!
//! [`HookService`] is built once from [`HookConfig`] at startup and shared by
//! every request. It holds no mutable state, so no locking is involved.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use tracing::{info, warn};

use crate::config::HookConfig;
use crate::services::launcher::{LaunchError, ProcessLauncher};
use crate::services::payload::PushEvent;
use crate::services::resolver::CommandResolver;
use crate::services::signature::{parse_signature_header, HookVerifier};
use crate::utils::{AppError, AppResult};

/// Header carrying the HMAC-SHA256 signature of the body
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// What happened to a verified push event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command at this path was started
    Launched(PathBuf),
    /// No candidate exists on disk
    NotFound,
    /// Candidates exist but none of them could be started
    Failed,
}

#[derive(Debug, Clone)]
pub struct HookService {
    verifier: HookVerifier,
    resolver: CommandResolver,
    launcher: ProcessLauncher,
}

impl HookService {
    pub fn new(verifier: HookVerifier, resolver: CommandResolver, launcher: ProcessLauncher) -> Self {
        Self {
            verifier,
            resolver,
            launcher,
        }
    }

    pub fn from_config(config: &HookConfig) -> Result<Self> {
        let verifier =
            HookVerifier::new(config.hmac_key.as_bytes()).context("Invalid webhook secret")?;
        let resolver = CommandResolver::new(&config.cmd_root, config.cmd_extensions.clone());
        let launcher = ProcessLauncher::new(Duration::from_secs(config.max_run_secs));

        Ok(Self::new(verifier, resolver, launcher))
    }

    /// Check the signature header against the raw body.
    pub fn authenticate(&self, body: &[u8], signature: Option<&str>) -> AppResult<()> {
        let header = signature
            .ok_or_else(|| AppError::unauthorized(format!("missing {} header", SIGNATURE_HEADER)))?;

        let mac = parse_signature_header(header).ok_or_else(|| {
            AppError::unauthorized(format!("malformed {} header: {:?}", SIGNATURE_HEADER, header))
        })?;

        if !self.verifier.verify(body, &mac) {
            return Err(AppError::unauthorized(format!(
                "{} does not match the body",
                SIGNATURE_HEADER
            )));
        }

        Ok(())
    }

    /// Launch the first candidate command that starts.
    ///
    /// Resolution picks the first candidate present on disk. If that one
    /// fails to start, the remaining candidates after it are tried in order.
    pub async fn dispatch(&self, event: &PushEvent, payload: Bytes) -> DispatchOutcome {
        let Some(first) = self
            .resolver
            .resolve(&event.repository, &event.git_ref)
            .await
        else {
            self.log_miss(event, "Unable to locate hook command");
            return DispatchOutcome::NotFound;
        };

        let candidates = self.resolver.candidates(&event.repository, &event.git_ref);
        let mut attempted = false;

        for candidate in candidates.into_iter().skip_while(|c| *c != first) {
            match self.launcher.launch(&candidate, payload.clone()).await {
                Ok(_reaper) => {
                    info!(
                        repository = %event.repository,
                        git_ref = %event.git_ref,
                        command = %candidate.display(),
                        "Dispatched hook command"
                    );
                    return DispatchOutcome::Launched(candidate);
                }
                Err(LaunchError::NotFound(_)) => continue,
                Err(e) => {
                    attempted = true;
                    warn!(error = %e, "Hook command did not start, trying next candidate");
                }
            }
        }

        if attempted {
            self.log_miss(event, "No hook command could be started");
            DispatchOutcome::Failed
        } else {
            self.log_miss(event, "Unable to locate hook command");
            DispatchOutcome::NotFound
        }
    }

    fn log_miss(&self, event: &PushEvent, message: &str) {
        let base = self
            .resolver
            .base_path(&event.repository, &event.git_ref)
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        warn!(
            command = %base,
            extensions = ?self.resolver.extensions(),
            "{}",
            message
        );
    }
}
