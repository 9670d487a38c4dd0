use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Initialize tracing
///
/// Logs go to:
/// - stdout (with colors)
/// - logs/backend.log next to the executable (no colors)
pub fn initialize() -> anyhow::Result<()> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| anyhow::anyhow!("Cannot create log directory {}: {}", log_dir.display(), e))?;

    let log_file_path = log_dir.join("backend.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .map_err(|e| anyhow::anyhow!("Cannot open log file {}: {}", log_file_path.display(), e))?;

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&log_level))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Arc::new(log_file))
                .with_ansi(false),
        )
        .init();

    tracing::info!(
        "Logging initialized (level: {}, file: {})",
        log_level,
        log_file_path.display()
    );

    Ok(())
}

/// `logs/` next to the executable, or `target/logs` when that is unknown
fn log_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .unwrap_or_else(|| PathBuf::from("target").join("logs"))
}
