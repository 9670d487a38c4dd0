use contracts::dashboards::d402_logistics_statistics::{
    HistogramPoint, Histograms, MonthlyHistogramPoint, MonthlyHistogramsResponse,
};

use super::dates::{month_key, parse_histogram_date};
use super::error::StatisticsError;

/// Tag each histogram point with the month it falls in. Input order is kept.
pub fn group_by_month(
    points: &[HistogramPoint],
    metric: &str,
) -> Result<Vec<MonthlyHistogramPoint>, StatisticsError> {
    points
        .iter()
        .map(|point| {
            let date = parse_histogram_date(&point.date)?;
            let value = point
                .metric(metric)
                .ok_or_else(|| StatisticsError::MissingMetric {
                    date: point.date.clone(),
                    metric: metric.to_string(),
                })?;

            Ok(MonthlyHistogramPoint {
                date: point.date.clone(),
                value,
                month: month_key(date),
            })
        })
        .collect()
}

/// Month-tagged series for the three charted histograms
pub fn monthly_histograms(
    histograms: &Histograms,
) -> Result<MonthlyHistogramsResponse, StatisticsError> {
    Ok(MonthlyHistogramsResponse {
        margin_perc: group_by_month(&histograms.time_margin_perc.data, "margin_perc")?,
        order_count: group_by_month(&histograms.time_order_count.data, "order_count")?,
        revenue: group_by_month(&histograms.time_revenue.data, "revenue")?,
    })
}
