//! Structured logging setup and graceful-shutdown signal handling.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::TelemetryConfig;

/// Installs a JSON-on-stdout layer plus a daily-rolling plain-text file layer (§6: "human log
/// file"), filtered by `RUST_LOG` if set, else by the configured log level.
pub fn init_tracing(telemetry: &TelemetryConfig) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},reqwest=warn,hyper=warn", telemetry.log_level)));

    std::fs::create_dir_all(&telemetry.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&telemetry.log_dir, "gridpilot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

/// Resolves once SIGTERM or SIGINT (ctrl-c) is received, used to interrupt the tick sleep.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
