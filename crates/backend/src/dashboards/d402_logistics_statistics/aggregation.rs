//! Folding of daily statistics rows into day/week/month buckets.
//!
//! Rows are filtered by the requested range first, then folded in input
//! order. Counts and money totals are summed, per-order and percentage
//! rates are averaged over the number of rows in the bucket. Output buckets
//! keep the order in which their key was first seen.

use chrono::NaiveDateTime;
use contracts::dashboards::d402_logistics_statistics::{AggregatedRecord, DailyRecord, Granularity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::dates::{bucket_key, parse_datetime};
use super::error::StatisticsError;

/// What to do with a row whose `aggregate_date` does not parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidDatePolicy {
    /// Fail the whole aggregation
    #[default]
    Abort,
    /// Drop the row and log a warning
    Skip,
}

/// Inclusive time window; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    /// Parse optional bounds as sent by the dashboard. Blank strings are unbounded.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, StatisticsError> {
        fn bound(value: Option<&str>) -> Result<Option<NaiveDateTime>, StatisticsError> {
            match value.map(str::trim) {
                Some(s) if !s.is_empty() => parse_datetime(s).map(Some),
                _ => Ok(None),
            }
        }

        Ok(Self {
            start: bound(start)?,
            end: bound(end)?,
        })
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at <= end)
    }
}

/// Aggregate `records` into buckets, failing on the first unparseable date.
pub fn aggregate(
    records: &[DailyRecord],
    range: &DateRange,
    granularity: Granularity,
) -> Result<Vec<AggregatedRecord>, StatisticsError> {
    aggregate_with_policy(records, range, granularity, InvalidDatePolicy::Abort)
}

pub fn aggregate_with_policy(
    records: &[DailyRecord],
    range: &DateRange,
    granularity: Granularity,
    policy: InvalidDatePolicy,
) -> Result<Vec<AggregatedRecord>, StatisticsError> {
    let dated = parse_dates(records, policy)?;

    let mut buckets: Vec<Bucket> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (at, record) in dated.into_iter().filter(|(at, _)| range.contains(*at)) {
        let key = bucket_key(at.date(), granularity);
        match positions.get(&key) {
            Some(&pos) => buckets[pos].fold(record)?,
            None => {
                positions.insert(key.clone(), buckets.len());
                buckets.push(Bucket::open(key, record));
            }
        }
    }

    tracing::debug!(
        "Aggregated {} rows into {} {} buckets",
        records.len(),
        buckets.len(),
        granularity
    );

    Ok(buckets.into_iter().map(Bucket::finish).collect())
}

/// Parse every row date up front so that an invalid row fails the call
/// regardless of the requested range.
fn parse_dates(
    records: &[DailyRecord],
    policy: InvalidDatePolicy,
) -> Result<Vec<(NaiveDateTime, &DailyRecord)>, StatisticsError> {
    let mut dated = Vec::with_capacity(records.len());

    for record in records {
        match parse_datetime(&record.aggregate_date) {
            Ok(at) => dated.push((at, record)),
            Err(e) => match policy {
                InvalidDatePolicy::Abort => return Err(e),
                InvalidDatePolicy::Skip => {
                    tracing::warn!("Skipping statistics row: {}", e);
                }
            },
        }
    }

    Ok(dated)
}

/// Keys of `AggregatedRecord` itself; a source field with one of these
/// names must not be carried into `extra`.
const RESERVED_KEYS: [&str; 2] = ["aggregate_date", "count"];

/// Running totals of one bucket. Rate fields hold sums until `finish`.
struct Bucket {
    row: AggregatedRecord,
}

impl Bucket {
    fn open(key: String, record: &DailyRecord) -> Self {
        let mut extra = record.extra.clone();
        for reserved in RESERVED_KEYS {
            extra.remove(reserved);
        }

        Self {
            row: AggregatedRecord {
                aggregate_date: key,
                active_carrier: record.active_carrier,
                active_client: record.active_client,
                order_count: record.order_count,
                assigned_count: record.assigned_count,
                margin_abs: record.margin_abs,
                margin_abs_per_order: record.margin_abs_per_order,
                margin_perc: record.margin_perc,
                revenue: record.revenue,
                revenue_assigned: record.revenue_assigned,
                revenue_per_order: record.revenue_per_order,
                count: 1,
                extra,
            },
        }
    }

    fn fold(&mut self, record: &DailyRecord) -> Result<(), StatisticsError> {
        let row = &mut self.row;
        let bucket = row.aggregate_date.as_str();

        add_count(&mut row.active_carrier, record.active_carrier, "active_carrier", bucket)?;
        add_count(&mut row.active_client, record.active_client, "active_client", bucket)?;
        add_count(&mut row.order_count, record.order_count, "order_count", bucket)?;
        add_count(&mut row.assigned_count, record.assigned_count, "assigned_count", bucket)?;
        row.margin_abs += record.margin_abs;
        row.revenue += record.revenue;
        row.revenue_assigned += record.revenue_assigned;

        row.margin_abs_per_order += record.margin_abs_per_order;
        row.margin_perc += record.margin_perc;
        row.revenue_per_order += record.revenue_per_order;

        row.count += 1;
        Ok(())
    }

    fn finish(self) -> AggregatedRecord {
        let mut row = self.row;
        let n = f64::from(row.count);

        row.margin_abs_per_order /= n;
        row.margin_perc /= n;
        row.revenue_per_order /= n;

        row
    }
}

fn add_count(
    total: &mut i64,
    value: i64,
    field: &'static str,
    bucket: &str,
) -> Result<(), StatisticsError> {
    *total = total
        .checked_add(value)
        .ok_or_else(|| StatisticsError::CountOverflow {
            field,
            bucket: bucket.to_string(),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};

    const EPS: f64 = 1e-9;

    fn record(date: &str, orders: i64, revenue: f64, margin_perc: f64) -> DailyRecord {
        DailyRecord {
            aggregate_date: date.to_string(),
            active_carrier: 2,
            active_client: 3,
            order_count: orders,
            assigned_count: orders - 1,
            margin_abs: revenue * margin_perc,
            margin_abs_per_order: revenue * margin_perc / orders as f64,
            margin_perc,
            revenue,
            revenue_assigned: revenue * 0.8,
            revenue_per_order: revenue / orders as f64,
            extra: Map::new(),
        }
    }

    fn keys(rows: &[AggregatedRecord]) -> Vec<&str> {
        rows.iter().map(|r| r.aggregate_date.as_str()).collect()
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(Some(start), Some(end)).unwrap()
    }

    #[test]
    fn test_empty_input_gives_empty_output() {
        for granularity in [Granularity::Day, Granularity::Week, Granularity::Month] {
            let rows = aggregate(&[], &DateRange::default(), granularity).unwrap();
            assert!(rows.is_empty());
        }
    }

    #[test]
    fn test_fully_filtered_input_gives_empty_output() {
        let records = vec![record("2024-03-01", 5, 100.0, 0.1)];
        let rows = aggregate(&records, &range("2024-04-01", "2024-04-30"), Granularity::Day).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_filter_is_inclusive_and_applied_before_bucketing() {
        let records = vec![
            record("2024-03-09", 1, 10.0, 0.1),
            record("2024-03-10", 2, 20.0, 0.2),
            record("2024-03-11", 3, 30.0, 0.3),
            record("2024-03-13", 4, 40.0, 0.4),
        ];

        let rows = aggregate(&records, &range("2024-03-10", "2024-03-12"), Granularity::Day).unwrap();
        assert_eq!(keys(&rows), vec!["2024-03-10", "2024-03-11"]);

        // the 10th is a Sunday and belongs to the previous week; the 9th
        // would have joined it but was filtered out first
        let rows = aggregate(&records, &range("2024-03-10", "2024-03-12"), Granularity::Week).unwrap();
        assert_eq!(keys(&rows), vec!["2024-03-04", "2024-03-11"]);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[1].count, 1);
        assert_eq!(rows[1].order_count, 3);
    }

    #[test]
    fn test_filter_compares_full_datetime() {
        let records = vec![
            record("2024-03-12T00:00:00", 1, 10.0, 0.1),
            record("2024-03-12T18:00:00", 2, 20.0, 0.2),
        ];
        let end = DateRange::parse(None, Some("2024-03-12")).unwrap();

        let rows = aggregate(&records, &end, Granularity::Day).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].order_count, 1);
    }

    #[test]
    fn test_open_range_sides() {
        let records = vec![
            record("2024-03-09", 1, 10.0, 0.1),
            record("2024-03-20", 2, 20.0, 0.2),
        ];

        let from = DateRange::parse(Some("2024-03-10"), None).unwrap();
        assert_eq!(keys(&aggregate(&records, &from, Granularity::Day).unwrap()), vec!["2024-03-20"]);

        let until = DateRange::parse(None, Some("2024-03-10")).unwrap();
        assert_eq!(keys(&aggregate(&records, &until, Granularity::Day).unwrap()), vec!["2024-03-09"]);

        let blank = DateRange::parse(Some(""), Some("  ")).unwrap();
        assert_eq!(blank, DateRange::default());
    }

    #[test]
    fn test_week_sums_additive_and_averages_rates() {
        let monday = record("2024-03-11", 10, 1000.0, 0.10);
        let wednesday = record("2024-03-13", 30, 2000.0, 0.30);

        let rows = aggregate(
            &[monday.clone(), wednesday.clone()],
            &DateRange::default(),
            Granularity::Week,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        let week = &rows[0];
        assert_eq!(week.aggregate_date, "2024-03-11");
        assert_eq!(week.count, 2);

        assert_eq!(week.active_carrier, 4);
        assert_eq!(week.active_client, 6);
        assert_eq!(week.order_count, 40);
        assert_eq!(week.assigned_count, 38);
        assert!((week.margin_abs - (monday.margin_abs + wednesday.margin_abs)).abs() < EPS);
        assert!((week.revenue - 3000.0).abs() < EPS);
        assert!((week.revenue_assigned - 2400.0).abs() < EPS);

        assert!((week.margin_perc - 0.20).abs() < EPS);
        assert!((week.revenue_per_order - (100.0 + 2000.0 / 30.0) / 2.0).abs() < EPS);
        assert!(
            (week.margin_abs_per_order
                - (monday.margin_abs_per_order + wednesday.margin_abs_per_order) / 2.0)
                .abs()
                < EPS
        );
    }

    #[test]
    fn test_month_bucket_key() {
        let records = vec![
            record("2024-02-05", 1, 10.0, 0.1),
            record("2024-02-28", 1, 10.0, 0.1),
        ];
        let rows = aggregate(&records, &DateRange::default(), Granularity::Month).unwrap();
        assert_eq!(keys(&rows), vec!["2024-02-01"]);
        assert_eq!(rows[0].count, 2);
    }

    #[test]
    fn test_single_row_bucket_keeps_rates() {
        let only = record("2024-05-17", 7, 700.0, 0.15);
        let rows = aggregate(&[only.clone()], &DateRange::default(), Granularity::Month).unwrap();

        assert_eq!(rows[0].count, 1);
        assert_eq!(rows[0].margin_perc, only.margin_perc);
        assert_eq!(rows[0].revenue_per_order, only.revenue_per_order);
        assert_eq!(rows[0].margin_abs_per_order, only.margin_abs_per_order);
    }

    #[test]
    fn test_day_granularity_on_daily_rows_is_identity() {
        let records = vec![
            record("2024-01-03", 4, 400.0, 0.2),
            record("2024-01-01", 2, 150.0, 0.1),
            record("2024-01-02", 9, 990.0, 0.3),
        ];

        let rows = aggregate(&records, &DateRange::default(), Granularity::Day).unwrap();

        assert_eq!(rows.len(), records.len());
        for (row, source) in rows.iter().zip(&records) {
            assert_eq!(row.aggregate_date, source.aggregate_date);
            assert_eq!(row.count, 1);
            assert_eq!(row.order_count, source.order_count);
            assert_eq!(row.assigned_count, source.assigned_count);
            assert_eq!(row.revenue, source.revenue);
            assert_eq!(row.margin_abs, source.margin_abs);
            assert_eq!(row.margin_perc, source.margin_perc);
            assert_eq!(row.revenue_per_order, source.revenue_per_order);
        }
    }

    #[test]
    fn test_buckets_keep_first_seen_order() {
        let records = vec![
            record("2024-03-20", 1, 10.0, 0.1),
            record("2024-01-15", 1, 10.0, 0.1),
            record("2024-03-02", 1, 10.0, 0.1),
            record("2024-02-10", 1, 10.0, 0.1),
            record("2024-01-31", 1, 10.0, 0.1),
        ];

        let rows = aggregate(&records, &DateRange::default(), Granularity::Month).unwrap();

        assert_eq!(keys(&rows), vec!["2024-03-01", "2024-01-01", "2024-02-01"]);
        assert_eq!(rows.iter().map(|r| r.count).collect::<Vec<_>>(), vec![2, 2, 1]);
    }

    #[test]
    fn test_duplicate_dates_are_folded_not_deduplicated() {
        let day = record("2024-03-11", 5, 50.0, 0.2);
        let rows = aggregate(&[day.clone(), day.clone()], &DateRange::default(), Granularity::Day)
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].order_count, 10);
        assert!((rows[0].margin_perc - 0.2).abs() < EPS);
    }

    #[test]
    fn test_totals_and_means_match_folded_rows() {
        let records: Vec<DailyRecord> = (1..=31)
            .map(|d| {
                record(
                    &format!("2024-01-{d:02}"),
                    d,
                    100.0 * d as f64,
                    d as f64 / 100.0,
                )
            })
            .collect();

        for granularity in [Granularity::Day, Granularity::Week, Granularity::Month] {
            let rows = aggregate(&records, &DateRange::default(), granularity).unwrap();
            assert_eq!(rows.iter().map(|r| r.count).sum::<u32>(), 31);

            for row in &rows {
                let members: Vec<&DailyRecord> = records
                    .iter()
                    .filter(|r| {
                        let at = parse_datetime(&r.aggregate_date).unwrap();
                        bucket_key(at.date(), granularity) == row.aggregate_date
                    })
                    .collect();
                let n = members.len() as f64;

                assert_eq!(row.count as usize, members.len());
                assert_eq!(row.order_count, members.iter().map(|r| r.order_count).sum::<i64>());
                assert_eq!(row.active_carrier, members.iter().map(|r| r.active_carrier).sum::<i64>());
                assert!((row.revenue - members.iter().map(|r| r.revenue).sum::<f64>()).abs() < 1e-6);

                let mean_perc = members.iter().map(|r| r.margin_perc).sum::<f64>() / n;
                let mean_rpo = members.iter().map(|r| r.revenue_per_order).sum::<f64>() / n;
                assert!((row.margin_perc - mean_perc).abs() < EPS);
                assert!((row.revenue_per_order - mean_rpo).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_extra_fields_come_from_first_row() {
        let mut first = record("2024-03-11", 1, 10.0, 0.1);
        first.extra.insert("region".into(), Value::from("north"));
        let mut second = record("2024-03-12", 1, 10.0, 0.1);
        second.extra.insert("region".into(), Value::from("south"));

        let rows = aggregate(&[first, second], &DateRange::default(), Granularity::Week).unwrap();
        assert_eq!(rows[0].extra.get("region"), Some(&Value::from("north")));
    }

    #[test]
    fn test_source_count_field_does_not_shadow_fold_count() {
        let rows: Vec<DailyRecord> = serde_json::from_str(
            r#"[{"aggregate_date":"2024-03-11","active_carrier":1,"active_client":1,
                "order_count":1,"assigned_count":1,"margin_abs":1.0,"margin_abs_per_order":1.0,
                "margin_perc":1.0,"revenue":1.0,"revenue_assigned":1.0,"revenue_per_order":1.0,
                "count":7,"region":"north"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].extra.get("count"), Some(&Value::from(7)));

        let aggregated = aggregate(&rows, &DateRange::default(), Granularity::Day).unwrap();
        assert!(!aggregated[0].extra.contains_key("count"));
        assert_eq!(aggregated[0].extra.get("region"), Some(&Value::from("north")));

        let json = serde_json::to_string(&aggregated).unwrap();
        assert_eq!(json.matches("\"count\"").count(), 1);

        let reread: Vec<AggregatedRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(reread, aggregated);
        assert_eq!(reread[0].count, 1);
    }

    #[test]
    fn test_count_overflow_is_an_error() {
        let mut first = record("2024-03-11", 1, 10.0, 0.1);
        first.order_count = i64::MAX;
        let second = record("2024-03-12", 1, 10.0, 0.1);

        let err = aggregate(&[first, second], &DateRange::default(), Granularity::Week).unwrap_err();
        match err {
            StatisticsError::CountOverflow { field, bucket } => {
                assert_eq!(field, "order_count");
                assert_eq!(bucket, "2024-03-11");
            }
            other => panic!("expected CountOverflow, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_date_aborts_even_outside_range() {
        let records = vec![
            record("2024-03-11", 1, 10.0, 0.1),
            record("not-a-date", 1, 10.0, 0.1),
        ];

        let err = aggregate(&records, &range("2024-03-01", "2024-03-31"), Granularity::Day)
            .unwrap_err();
        assert!(matches!(err, StatisticsError::InvalidDate(ref v) if v == "not-a-date"));
    }

    #[test]
    fn test_invalid_date_skipped_with_skip_policy() {
        let records = vec![
            record("2024-03-11", 1, 10.0, 0.1),
            record("31/03/2024", 5, 10.0, 0.1),
            record("2024-03-12", 2, 10.0, 0.3),
        ];

        let rows = aggregate_with_policy(
            &records,
            &DateRange::default(),
            Granularity::Week,
            InvalidDatePolicy::Skip,
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 2);
        assert_eq!(rows[0].order_count, 3);
        assert!((rows[0].margin_perc - 0.2).abs() < EPS);
    }

    #[test]
    fn test_invalid_range_bound() {
        assert!(matches!(
            DateRange::parse(Some("soon"), None),
            Err(StatisticsError::InvalidDate(_))
        ));
    }
}
