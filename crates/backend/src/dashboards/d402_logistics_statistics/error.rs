use contracts::dashboards::d402_logistics_statistics::KpiSide;
use thiserror::Error;

/// Errors of the logistics statistics dashboard
#[derive(Debug, Error)]
pub enum StatisticsError {
    #[error("Invalid date: {0:?}")]
    InvalidDate(String),

    #[error("Histogram point {date} has no numeric `{metric}` value")]
    MissingMetric { date: String, metric: String },

    #[error("{field} total overflows in bucket {bucket}")]
    CountOverflow { field: &'static str, bucket: String },

    #[error("No {side} KPI labelled {label:?}")]
    KpiNotFound { side: KpiSide, label: String },

    #[error("Statistics source returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Statistics source is not initialized")]
    SourceNotInitialized,

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed statistics payload: {0}")]
    Decode(#[from] serde_json::Error),
}
