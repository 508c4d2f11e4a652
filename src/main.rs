//! githooker - run per-repository commands on signed push webhooks
//!
//! Listens for GitHub push deliveries, verifies `X-Hub-Signature-256` and
//! launches `<cmd_root>/<owner>/<repo>/<ref>[ext]` with the delivery on its
//! standard input.

use std::env;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use githooker::{
    api,
    config::{LogFormat, LogTarget, LoggingConfig, TlsConfig},
    AppConfig, AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("githooker {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    // The guard must outlive the server so buffered file logs get flushed
    let _log_guard = init_logging(&config.logging);

    info!(
        cmd_root = %config.hook.cmd_root.display(),
        extensions = ?config.hook.cmd_extensions,
        max_run_secs = config.hook.max_run_secs,
        "githooker: initialized"
    );

    let addr = config.server.socket_addr()?;
    let tls = config.server.tls.clone();

    let state = AppState::new(config).context("Failed to initialize hook service")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    if let Some(ref tls_config) = tls {
        info!("Starting HTTPS server on https://{}", addr);

        let rustls_config = create_rustls_config(tls_config)?;
        let handle = axum_server::Handle::new();

        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)?
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .context("HTTPS server error")?;
    } else {
        info!("Starting HTTP server on http://{}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    }

    info!("githooker: stopped");
    Ok(())
}

/// Create the application router with request tracing
fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    api::routes().with_state(state).layer(trace_layer)
}

/// Build a rustls server configuration from PEM files
fn create_rustls_config(tls_config: &TlsConfig) -> Result<axum_server::tls_rustls::RustlsConfig> {
    use axum_server::tls_rustls::RustlsConfig;
    use rustls::crypto::aws_lc_rs::default_provider;
    use rustls::ServerConfig;

    let cert_file = std::fs::File::open(&tls_config.cert_file)
        .with_context(|| format!("Failed to open certificate file: {:?}", tls_config.cert_file))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read certificates: {:?}", tls_config.cert_file))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in {:?}", tls_config.cert_file);
    }

    let key_file = std::fs::File::open(&tls_config.key_file)
        .with_context(|| format!("Failed to open key file: {:?}", tls_config.key_file))?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .with_context(|| format!("Failed to read private key: {:?}", tls_config.key_file))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in {:?}", tls_config.key_file))?;

    let mut server_config = ServerConfig::builder_with_provider(default_provider().into())
        .with_safe_default_protocol_versions()
        .context("Failed to set TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Failed to build TLS server config")?;

    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

/// Initialize the logging/tracing infrastructure
fn init_logging(
    log_config: &LoggingConfig,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_config.level));

    let console = matches!(log_config.target, LogTarget::Console | LogTarget::Both);
    let (file_writer, guard) = match log_config.target {
        LogTarget::Console => (None, None),
        LogTarget::File | LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            (Some(writer), Some(guard))
        }
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_config.format {
        LogFormat::Json => registry
            .with(console.then(|| fmt::layer().json().with_target(true)))
            .with(file_writer.map(|w| fmt::layer().json().with_target(true).with_writer(w)))
            .init(),
        LogFormat::Compact => registry
            .with(console.then(|| fmt::layer().compact().with_target(false)))
            .with(file_writer.map(|w| {
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(w)
            }))
            .init(),
        LogFormat::Pretty => registry
            .with(console.then(|| fmt::layer().with_target(true)))
            .with(file_writer.map(|w| fmt::layer().with_target(true).with_ansi(false).with_writer(w)))
            .init(),
    }

    guard
}

/// Create a file writer with optional daily rotation
fn create_file_writer(
    log_config: &LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let file_appender = if log_config.daily_rotation {
        tracing_appender::rolling::daily(&log_config.log_dir, &log_config.log_prefix)
    } else {
        tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
    };

    tracing_appender::non_blocking(file_appender)
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Print help message
fn print_help() {
    println!(
        r#"githooker {}

USAGE:
    githooker [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information

ENVIRONMENT:
    GH_HMAC_KEY         Webhook secret (required)
    GH_LISTEN_PORT      Listen address, e.g. ":4040" or "127.0.0.1:4040"
                        (default: ":4040")
    GH_CMD_ROOT         Command root directory (default: /etc/githooker)
    GH_MAX_RUN_SECS     Per-command timeout in seconds (default: 90)
    GH_CMD_EXTENSIONS   Space-separated suffixes tried after the bare path,
                        e.g. ".sh .exe"
    GH_MAX_BODY_BYTES   Request body limit (default: 26214400)
    GH_TLS_CERT         PEM certificate chain; enables HTTPS with GH_TLS_KEY
    GH_TLS_KEY          PEM private key
    GH_LOG_FORMAT       pretty, compact or json
    GH_LOG_TARGET       console, file or both
    GH_LOG_DIR          Directory for log files
    GITHOOKER_CONFIG    Path to a YAML configuration file

A push to owner/repo on refs/heads/main runs
    <GH_CMD_ROOT>/owner/repo/refs/heads/main
or the first existing <path><ext> for each configured extension, with the
webhook body on standard input."#,
        env!("CARGO_PKG_VERSION")
    );
}
