use contracts::dashboards::d402_logistics_statistics::{
    AggregateRecordsRequest, AggregatedRecord, Kpi, KpiSide, MonthlyHistogramsResponse,
    StatisticsQuery, StatisticsTableResponse,
};

use super::aggregation::{aggregate_with_policy, DateRange, InvalidDatePolicy};
use super::error::StatisticsError;
use super::histograms::monthly_histograms;
use super::source::StatisticsSource;

/// Fetch statistics and aggregate the daily table for the requested period
pub async fn get_statistics(
    source: &dyn StatisticsSource,
    query: StatisticsQuery,
    policy: InvalidDatePolicy,
) -> Result<StatisticsTableResponse, StatisticsError> {
    // Reject a bad range before going to the source
    let range = DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;

    let response = source.fetch(&query).await?;
    let data_table = aggregate_with_policy(&response.data_table, &range, query.aggregate_by, policy)?;

    Ok(StatisticsTableResponse {
        aggregate_by: query.aggregate_by,
        time_target: query.time_target,
        data_table,
        histograms: response.histograms,
        scalars: response.scalars,
        kpis: response.kpis,
    })
}

/// Aggregate rows supplied by the caller
pub fn aggregate_records(
    request: AggregateRecordsRequest,
    policy: InvalidDatePolicy,
) -> Result<Vec<AggregatedRecord>, StatisticsError> {
    let range = DateRange::parse(request.start_date.as_deref(), request.end_date.as_deref())?;
    aggregate_with_policy(&request.records, &range, request.aggregate_by, policy)
}

pub async fn get_monthly_histograms(
    source: &dyn StatisticsSource,
    query: StatisticsQuery,
) -> Result<MonthlyHistogramsResponse, StatisticsError> {
    let response = source.fetch(&query).await?;
    match response.histograms {
        Some(ref histograms) => monthly_histograms(histograms),
        None => Ok(MonthlyHistogramsResponse::default()),
    }
}

pub async fn get_kpi(
    source: &dyn StatisticsSource,
    query: StatisticsQuery,
    side: KpiSide,
    label: &str,
) -> Result<Kpi, StatisticsError> {
    let response = source.fetch(&query).await?;
    response
        .kpis
        .as_ref()
        .and_then(|kpis| kpis.find_by_label(side, label))
        .cloned()
        .ok_or_else(|| StatisticsError::KpiNotFound {
            side,
            label: label.to_string(),
        })
}
