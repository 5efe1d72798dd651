pub mod aggregation;
pub mod coercion;
pub mod derived_metrics;
pub mod grade;
pub mod header_resolver;
pub mod record_filter;
pub mod record_normalizer;

pub use aggregation::*;
pub use coercion::*;
pub use derived_metrics::*;
pub use grade::*;
pub use header_resolver::*;
pub use record_filter::*;
pub use record_normalizer::*;
