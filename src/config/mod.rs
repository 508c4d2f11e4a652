//! Configuration management
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. An optional YAML file
//! 3. Environment variables (`GH_*`, plus `RUST_LOG`)
//!
//! The resulting [`AppConfig`] is immutable for the lifetime of the process.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hook: HookConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address: `host:port`, `:port` or a bare port
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Upper bound on the request body, checked before any parsing
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// TLS/HTTPS configuration (if not set, server runs HTTP)
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// TLS/HTTPS configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to TLS certificate chain (PEM format)
    pub cert_file: PathBuf,
    /// Path to TLS private key (PEM format)
    pub key_file: PathBuf,
}

fn default_listen() -> String {
    ":4040".to_string()
}

fn default_max_body_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_bytes: default_max_body_bytes(),
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Resolve the listen address; an empty host means all interfaces.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let listen = self.listen.trim();

        let addr = if let Some(port) = listen.strip_prefix(':') {
            format!("0.0.0.0:{}", port)
        } else if listen.parse::<u16>().is_ok() {
            format!("0.0.0.0:{}", listen)
        } else {
            listen.to_string()
        };

        addr.parse()
            .with_context(|| format!("Invalid listen address: {:?}", self.listen))
    }
}

/// Hook dispatch configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct HookConfig {
    /// Directory holding `<owner>/<repo>/<ref>` commands
    #[serde(default = "default_cmd_root")]
    pub cmd_root: PathBuf,
    /// Shared webhook secret used for HMAC-SHA256 verification
    #[serde(default, skip_serializing)]
    pub hmac_key: String,
    /// Wall-clock limit for a hook command, in seconds
    #[serde(default = "default_max_run_secs")]
    pub max_run_secs: u64,
    /// Suffixes tried in order when the bare command path does not exist
    #[serde(default)]
    pub cmd_extensions: Vec<String>,
}

fn default_cmd_root() -> PathBuf {
    PathBuf::from("/etc/githooker")
}

fn default_max_run_secs() -> u64 {
    crate::services::launcher::DEFAULT_TIMEOUT_SECS
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            cmd_root: default_cmd_root(),
            hmac_key: String::new(),
            max_run_secs: default_max_run_secs(),
            cmd_extensions: Vec::new(),
        }
    }
}

impl std::fmt::Debug for HookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookConfig")
            .field("cmd_root", &self.cmd_root)
            .field("hmac_key", &"<redacted>")
            .field("max_run_secs", &self.max_run_secs)
            .field("cmd_extensions", &self.cmd_extensions)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Log output target (console or file)
    #[serde(default)]
    pub target: LogTarget,
    /// Directory for log files (used when target is "file" or "both")
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log file name prefix
    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,
    /// Rotate log files daily
    #[serde(default = "default_log_rotation")]
    pub daily_rotation: bool,
}

/// Log output target
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/githooker")
}

fn default_log_prefix() -> String {
    "githooker".to_string()
}

fn default_log_rotation() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            daily_rotation: default_log_rotation(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let config_path = std::env::var("GITHOOKER_CONFIG")
            .map(PathBuf::from)
            .ok()
            .or_else(Self::find_config_file);

        let mut config = match config_path {
            Some(ref path) if path.exists() => {
                eprintln!("[CONFIG] Loading configuration from: {:?}", path);
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                Self::from_yaml(&contents)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
            Some(ref path) => {
                eprintln!("[CONFIG] Config file not found: {:?}, using defaults", path);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_norway::from_str(contents)?)
    }

    /// Find the configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            PathBuf::from("githooker.yaml"),
            PathBuf::from("config/githooker.yaml"),
            PathBuf::from("/etc/githooker/githooker.yaml"),
            dirs::config_dir()
                .map(|p| p.join("githooker/githooker.yaml"))
                .unwrap_or_default(),
        ];

        paths
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Apply environment variable overrides, reading values through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        // Server overrides
        if let Some(listen) = var("GH_LISTEN_PORT") {
            self.server.listen = listen;
        }
        if let Some(max) = var("GH_MAX_BODY_BYTES") {
            match max.parse() {
                Ok(n) => self.server.max_body_bytes = n,
                Err(_) => eprintln!(
                    "[CONFIG] warning: GH_MAX_BODY_BYTES is not a valid integer, ignoring ({})",
                    max
                ),
            }
        }
        if let (Some(cert_file), Some(key_file)) = (var("GH_TLS_CERT"), var("GH_TLS_KEY")) {
            self.server.tls = Some(TlsConfig {
                cert_file: PathBuf::from(cert_file),
                key_file: PathBuf::from(key_file),
            });
        }

        // Hook overrides
        if let Some(root) = var("GH_CMD_ROOT") {
            self.hook.cmd_root = PathBuf::from(root);
        }
        if let Some(key) = var("GH_HMAC_KEY") {
            self.hook.hmac_key = key;
        }
        if let Some(secs) = var("GH_MAX_RUN_SECS") {
            match secs.parse::<u64>() {
                Ok(n) if n > 0 => self.hook.max_run_secs = n,
                _ => eprintln!(
                    "[CONFIG] warning: GH_MAX_RUN_SECS is not a valid positive integer, ignoring ({})",
                    secs
                ),
            }
        }
        if let Some(extensions) = var("GH_CMD_EXTENSIONS") {
            self.hook.cmd_extensions = extensions.split_whitespace().map(str::to_string).collect();
        }

        // Logging overrides
        if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = var("GH_LOG_FORMAT") {
            self.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "compact" => LogFormat::Compact,
                _ => LogFormat::Pretty,
            };
        }
        if let Some(target) = var("GH_LOG_TARGET") {
            self.logging.target = match target.to_lowercase().as_str() {
                "file" => LogTarget::File,
                "both" => LogTarget::Both,
                _ => LogTarget::Console,
            };
        }
        if let Some(dir) = var("GH_LOG_DIR") {
            self.logging.log_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.hook.hmac_key.is_empty() {
            anyhow::bail!("no GH_HMAC_KEY environment variable set (webhook secret)");
        }

        if self.hook.cmd_root.as_os_str().is_empty() {
            anyhow::bail!("Command root cannot be empty");
        }

        if self.hook.max_run_secs == 0 {
            anyhow::bail!("Command timeout must be at least one second");
        }

        if self.server.max_body_bytes == 0 {
            anyhow::bail!("Maximum body size cannot be 0");
        }

        self.server.socket_addr()?;

        if let Some(ref tls) = self.server.tls {
            if !tls.cert_file.exists() {
                anyhow::bail!("TLS certificate file not found: {:?}", tls.cert_file);
            }
            if !tls.key_file.exists() {
                anyhow::bail!("TLS key file not found: {:?}", tls.key_file);
            }
        }

        Ok(())
    }
}
