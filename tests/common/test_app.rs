//! Test application setup utilities
//!
//! Builds the hook router in-process on top of a scratch command root, so
//! requests can be driven with `oneshot` and launched commands observed on
//! disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{body::Body, http::Request, Router};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tempfile::TempDir;
use tower::ServiceExt;

use githooker::{
    api,
    config::{AppConfig, HookConfig, LoggingConfig, ServerConfig},
    AppState,
};

/// Secret shared by the test server and the signing helpers
pub const TEST_SECRET: &str = "test_webhook_secret";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub root: TempDir,
}

impl std::fmt::Debug for TestApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestApp")
            .field("root", &self.root.path())
            .finish_non_exhaustive()
    }
}

impl TestApp {
    /// Create a test application with no extension fallbacks
    pub fn new() -> Self {
        Self::with_extensions(&[])
    }

    /// Create a test application with the given extension fallbacks
    pub fn with_extensions(extensions: &[&str]) -> Self {
        let root = tempfile::tempdir().expect("Failed to create command root");
        let config = test_config(root.path(), extensions);
        Self::with_config(config, root)
    }

    /// Create a test application with custom configuration
    pub fn with_config(config: AppConfig, root: TempDir) -> Self {
        let state = AppState::new(config).expect("Failed to build app state");
        let router = api::routes().with_state(state.clone());

        Self {
            router,
            state,
            root,
        }
    }

    /// Absolute path of `relative` below the command root
    pub fn command_path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    /// Install an executable script that copies its stdin to `<path>.out`
    #[cfg(unix)]
    pub fn install_capture(&self, relative: &str) -> PathBuf {
        self.install_script(relative, r#"cat > "$0.out""#, 0o755)
    }

    /// Install a shell script below the command root
    #[cfg(unix)]
    pub fn install_script(&self, relative: &str, body: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.command_path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    /// POST a body signed with the test secret
    pub async fn post_signed(&self, body: impl Into<Vec<u8>>) -> TestResponse {
        let body = body.into();
        let signature = sign(TEST_SECRET, &body);
        self.post_with_signature(body, Some(&signature)).await
    }

    /// POST a body with an arbitrary (or no) signature header
    pub async fn post_with_signature(
        &self,
        body: impl Into<Vec<u8>>,
        signature: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header("Content-Type", "application/json")
            .header("X-GitHub-Event", "push");

        if let Some(signature) = signature {
            builder = builder.header("X-Hub-Signature-256", signature);
        }

        self.request(builder.body(Body::from(body.into())).unwrap())
            .await
    }

    /// Make an arbitrary request
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug, Clone)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub body: bytes::Bytes,
}

impl TestResponse {
    /// Get the response body as a string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Assert the response status
    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    /// Assert the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    /// Assert the response status is Bad Request (400)
    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    /// Assert the response status is Unauthorized (401)
    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }
}

/// Create a test configuration rooted at `root`
pub fn test_config(root: &Path, extensions: &[&str]) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            listen: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        },
        hook: HookConfig {
            cmd_root: root.to_path_buf(),
            hmac_key: TEST_SECRET.to_string(),
            max_run_secs: 10,
            cmd_extensions: extensions.iter().map(|e| e.to_string()).collect(),
        },
        logging: LoggingConfig::default(),
    }
}

/// `sha256=<hex>` signature header value for `body`
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// A push delivery for `repository` on `git_ref`
pub fn push_body(repository: &str, git_ref: &str) -> Vec<u8> {
    serde_json::json!({
        "ref": git_ref,
        "before": "6113728f27ae82c7b1a177c8d03f9e96e0adf246",
        "after": "76ae82c7b1a177c8d03f9e96e0adf2466113728f",
        "repository": {
            "id": 1296269,
            "name": repository.rsplit('/').next().unwrap_or(repository),
            "full_name": repository
        },
        "pusher": {"name": "octocat"}
    })
    .to_string()
    .into_bytes()
}

/// Poll for a file written by a launched command
pub async fn wait_for_file(path: &Path, limit: Duration) -> Option<Vec<u8>> {
    let deadline = tokio::time::Instant::now() + limit;

    loop {
        if let Ok(contents) = std::fs::read(path) {
            // The writer may still be flushing; wait for the size to settle
            tokio::time::sleep(Duration::from_millis(50)).await;
            if let Ok(settled) = std::fs::read(path) {
                if settled.len() == contents.len() || tokio::time::Instant::now() >= deadline {
                    return Some(settled);
                }
            }
            continue;
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
