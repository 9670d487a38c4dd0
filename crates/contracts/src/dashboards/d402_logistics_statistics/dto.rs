use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Bucket size used when folding daily rows together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which order date drives `aggregate_date` on the statistics source side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeTarget {
    #[default]
    PickupDate,
    CreatedAt,
}

impl TimeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeTarget::PickupDate => "pickup_date",
            TimeTarget::CreatedAt => "created_at",
        }
    }
}

/// Request for the logistics statistics dashboard
///
/// `start_date` / `end_date` accept `YYYY-MM-DD` or an ISO date-time and are
/// inclusive. Missing or blank means unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default)]
    pub aggregate_by: Granularity,
    #[serde(default)]
    pub time_target: TimeTarget,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// One row of `data_table`: the metrics of a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub aggregate_date: String,
    /// Distinct carriers active on that day. Folding several days sums these
    /// counts, so a carrier active on two days is counted twice.
    pub active_carrier: i64,
    /// Distinct clients active on that day. Same double counting as
    /// `active_carrier` when folded.
    pub active_client: i64,
    pub order_count: i64,
    pub assigned_count: i64,
    pub margin_abs: f64,
    pub margin_abs_per_order: f64,
    pub margin_perc: f64,
    pub revenue: f64,
    pub revenue_assigned: f64,
    pub revenue_per_order: f64,
    /// Fields the source sends that the dashboard does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One bucket of the aggregated table.
///
/// `aggregate_date` holds the bucket key (`YYYY-MM-DD`); rate fields are the
/// arithmetic mean over the `count` rows folded into the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub aggregate_date: String,
    pub active_carrier: i64,
    pub active_client: i64,
    pub order_count: i64,
    pub assigned_count: i64,
    pub margin_abs: f64,
    pub margin_abs_per_order: f64,
    pub margin_perc: f64,
    pub revenue: f64,
    pub revenue_assigned: f64,
    pub revenue_per_order: f64,
    /// Number of daily rows folded into this bucket
    pub count: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Pass-through blocks
// ---------------------------------------------------------------------------

/// A single bar of a histogram series. The date uses `DD-MM-YYYY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPoint {
    pub date: String,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

impl HistogramPoint {
    /// Numeric value of `metric` on this point, if present.
    pub fn metric(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSeries {
    #[serde(default)]
    pub data: Vec<HistogramPoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histograms {
    #[serde(default)]
    pub time_margin_perc: HistogramSeries,
    #[serde(default)]
    pub time_order_count: HistogramSeries,
    #[serde(default)]
    pub time_revenue: HistogramSeries,
    /// Series not charted by the dashboard, forwarded as-is
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Overview figures for the whole period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalars {
    pub active_carriers: i64,
    pub active_clients: i64,
    pub average_margin_perc: f64,
    pub avg_order_margin_abs: f64,
    pub avg_order_revenue: f64,
    pub new_carriers: i64,
    pub new_clients: i64,
    pub total_assigned_count: i64,
    pub total_margin_abs: f64,
    pub total_order_count: i64,
    pub total_revenue: f64,
}

impl Scalars {
    pub fn unassigned_order_count(&self) -> i64 {
        self.total_order_count - self.total_assigned_count
    }
}

/// KPI block of one carrier or client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub label: String,
    pub margin_abs: f64,
    pub margin_abs_per_order: f64,
    pub margin_abs_perc_on_tot: f64,
    pub margin_perc: f64,
    pub order_count: i64,
    pub order_count_perc_on_tot: f64,
    pub revenue: f64,
    pub revenue_per_order: f64,
    pub revenue_perc_on_tot: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KpiSide {
    Carrier,
    Client,
}

impl fmt::Display for KpiSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiSide::Carrier => f.write_str("carrier"),
            KpiSide::Client => f.write_str("client"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    #[serde(default)]
    pub carrier: HashMap<String, Kpi>,
    #[serde(default)]
    pub client: HashMap<String, Kpi>,
}

impl Kpis {
    pub fn side(&self, side: KpiSide) -> &HashMap<String, Kpi> {
        match side {
            KpiSide::Carrier => &self.carrier,
            KpiSide::Client => &self.client,
        }
    }

    /// Find a KPI by its display label (map keys are source ids, not labels)
    pub fn find_by_label(&self, side: KpiSide, label: &str) -> Option<&Kpi> {
        self.side(side).values().find(|kpi| kpi.label == label)
    }
}

// ---------------------------------------------------------------------------
// Source payload and API responses
// ---------------------------------------------------------------------------

/// Payload returned by the statistics source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    #[serde(default)]
    pub data_table: Vec<DailyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histograms: Option<Histograms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalars: Option<Scalars>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpis: Option<Kpis>,
}

/// Response of the dashboard: aggregated table plus untouched blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsTableResponse {
    pub aggregate_by: Granularity,
    pub time_target: TimeTarget,
    pub data_table: Vec<AggregatedRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histograms: Option<Histograms>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalars: Option<Scalars>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpis: Option<Kpis>,
}

/// Aggregate caller-supplied rows without going to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecordsRequest {
    pub records: Vec<DailyRecord>,
    #[serde(default)]
    pub aggregate_by: Granularity,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Histogram bar annotated with its calendar month (`YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyHistogramPoint {
    pub date: String,
    pub value: f64,
    pub month: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyHistogramsResponse {
    pub margin_perc: Vec<MonthlyHistogramPoint>,
    pub order_count: Vec<MonthlyHistogramPoint>,
    pub revenue: Vec<MonthlyHistogramPoint>,
}
