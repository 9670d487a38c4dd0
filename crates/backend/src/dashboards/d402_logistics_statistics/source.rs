use async_trait::async_trait;
use contracts::dashboards::d402_logistics_statistics::{StatisticsQuery, StatisticsResponse};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::time::Duration;

use super::aggregation::InvalidDatePolicy;
use super::error::StatisticsError;
use crate::shared::config::{resolve_data_path, SourceConfig, StatisticsConfig};

/// Provider of pre-computed statistics
#[async_trait]
pub trait StatisticsSource: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    async fn fetch(&self, query: &StatisticsQuery) -> Result<StatisticsResponse, StatisticsError>;
}

/// HTTP client for the statistics service
pub struct HttpStatisticsSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStatisticsSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StatisticsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Query parameters in the form the statistics service expects
    fn query_params(query: &StatisticsQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("aggregateBy", query.aggregate_by.as_str().to_string()),
            ("timeTarget", query.time_target.as_str().to_string()),
        ];
        if let Some(ref start) = query.start_date {
            params.push(("startDate", start.clone()));
        }
        if let Some(ref end) = query.end_date {
            params.push(("endDate", end.clone()));
        }
        params
    }
}

#[async_trait]
impl StatisticsSource for HttpStatisticsSource {
    fn describe(&self) -> String {
        format!("http {}", self.base_url)
    }

    async fn fetch(&self, query: &StatisticsQuery) -> Result<StatisticsResponse, StatisticsError> {
        let url = format!("{}/statistics", self.base_url);
        tracing::debug!("Requesting statistics from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&Self::query_params(query))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StatisticsError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Reads a statistics payload from a JSON file on every fetch
pub struct FileStatisticsSource {
    path: PathBuf,
}

impl FileStatisticsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatisticsSource for FileStatisticsSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn fetch(&self, _query: &StatisticsQuery) -> Result<StatisticsResponse, StatisticsError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Source selected at startup together with the invalid-date policy
pub struct ConfiguredSource {
    pub source: Box<dyn StatisticsSource>,
    pub invalid_dates: InvalidDatePolicy,
}

static SOURCE: OnceCell<ConfiguredSource> = OnceCell::new();

pub fn build_source(config: &SourceConfig) -> Result<Box<dyn StatisticsSource>, StatisticsError> {
    let source: Box<dyn StatisticsSource> = match config {
        SourceConfig::File { path } => Box::new(FileStatisticsSource::new(resolve_data_path(path))),
        SourceConfig::Http {
            base_url,
            timeout_secs,
        } => Box::new(HttpStatisticsSource::new(
            base_url,
            Duration::from_secs(*timeout_secs),
        )?),
    };
    Ok(source)
}

pub fn initialize(config: &StatisticsConfig) -> anyhow::Result<()> {
    let source = build_source(&config.source)?;
    tracing::info!(
        "Statistics source: {} (invalid dates: {:?})",
        source.describe(),
        config.invalid_dates
    );

    SOURCE
        .set(ConfiguredSource {
            source,
            invalid_dates: config.invalid_dates,
        })
        .map_err(|_| anyhow::anyhow!("statistics source already initialized"))
}

pub fn get_source() -> Result<&'static ConfiguredSource, StatisticsError> {
    SOURCE.get().ok_or(StatisticsError::SourceNotInitialized)
}
