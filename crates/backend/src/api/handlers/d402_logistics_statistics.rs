use axum::{
    extract::{Path, Query},
    http::StatusCode,
    Json,
};
use contracts::dashboards::d402_logistics_statistics::{
    AggregateRecordsRequest, AggregatedRecord, Kpi, KpiSide, MonthlyHistogramsResponse,
    StatisticsQuery, StatisticsTableResponse,
};

use crate::dashboards::d402_logistics_statistics::{
    service, source::get_source, StatisticsError,
};

/// HTTP status for a dashboard error
fn status_for(error: &StatisticsError) -> StatusCode {
    match error {
        StatisticsError::InvalidDate(_)
        | StatisticsError::MissingMetric { .. }
        | StatisticsError::CountOverflow { .. } => StatusCode::BAD_REQUEST,
        StatisticsError::KpiNotFound { .. } => StatusCode::NOT_FOUND,
        StatisticsError::Upstream { .. }
        | StatisticsError::Http(_)
        | StatisticsError::Decode(_) => StatusCode::BAD_GATEWAY,
        StatisticsError::SourceNotInitialized | StatisticsError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn reject(context: &str, error: StatisticsError) -> StatusCode {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!("D402 Dashboard: {} failed: {}", context, error);
    } else {
        tracing::warn!("D402 Dashboard: {} rejected: {}", context, error);
    }
    status
}

/// GET /api/d402/statistics?aggregate_by=week&start_date=2024-03-01&end_date=2024-03-31
pub async fn get_statistics(
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<StatisticsTableResponse>, StatusCode> {
    tracing::info!(
        "D402 Dashboard: Getting statistics by {} for {}..{}",
        query.aggregate_by,
        query.start_date.as_deref().unwrap_or("*"),
        query.end_date.as_deref().unwrap_or("*"),
    );

    let configured = get_source().map_err(|e| reject("statistics", e))?;

    match service::get_statistics(configured.source.as_ref(), query, configured.invalid_dates).await
    {
        Ok(response) => {
            tracing::info!(
                "D402 Dashboard: Returning {} {} rows",
                response.data_table.len(),
                response.aggregate_by
            );
            Ok(Json(response))
        }
        Err(e) => Err(reject("statistics", e)),
    }
}

/// POST /api/d402/aggregate
///
/// Aggregates the rows sent in the request body; the source is not used.
pub async fn aggregate_records(
    Json(request): Json<AggregateRecordsRequest>,
) -> Result<Json<Vec<AggregatedRecord>>, StatusCode> {
    tracing::info!(
        "D402 Dashboard: Aggregating {} posted rows by {}",
        request.records.len(),
        request.aggregate_by
    );

    let policy = get_source()
        .map(|configured| configured.invalid_dates)
        .unwrap_or_default();

    service::aggregate_records(request, policy)
        .map(Json)
        .map_err(|e| reject("aggregate", e))
}

/// GET /api/d402/histograms
pub async fn get_monthly_histograms(
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<MonthlyHistogramsResponse>, StatusCode> {
    let configured = get_source().map_err(|e| reject("histograms", e))?;

    service::get_monthly_histograms(configured.source.as_ref(), query)
        .await
        .map(Json)
        .map_err(|e| reject("histograms", e))
}

/// GET /api/d402/kpi/:side/:label
pub async fn get_kpi(
    Path((side, label)): Path<(KpiSide, String)>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<Kpi>, StatusCode> {
    tracing::info!("D402 Dashboard: Getting {} KPI {:?}", side, label);

    let configured = get_source().map_err(|e| reject("kpi", e))?;

    service::get_kpi(configured.source.as_ref(), query, side, &label)
        .await
        .map(Json)
        .map_err(|e| reject("kpi", e))
}
