pub mod aggregation;
pub mod dates;
pub mod error;
pub mod histograms;
pub mod service;
pub mod source;

pub use aggregation::{aggregate, aggregate_with_policy, DateRange, InvalidDatePolicy};
pub use error::StatisticsError;
