//! Read-only analytics over the sales star schema.
//!
//! Every metric is a free function taking a `&rusqlite::Connection` that
//! holds the `customers`, `products` and `sales` tables (see
//! [`crate::storage`]). Results are plain serialisable data.
//!
//! # Module structure
//!
//! - [`types`]: result structs, join policy, error type
//! - [`bucketing`]: age bands, month spans, period labels, cost ranges
//! - [`derive`]: safe ratio and percentage computation
//! - [`query`]: SQL metric queries
//! - [`validate`]: data-quality checks over a loaded snapshot

pub mod bucketing;
pub mod derive;
pub mod query;
pub mod types;
pub mod validate;

// Re-export the most commonly used items at the crate::analytics level.
pub use bucketing::AgeBand;
pub use types::{
    AgeGroupResult, AnalyticsError, AnalyticsResult, BusinessReport, CategoryRevenueResult,
    CustomerSegment, Demographics, JoinPolicy, MetricValue, ProductRankings, SalesTotals,
    SeasonalGrain, ShippingDuration, ToJson,
};
pub use validate::{ValidateConfig, ValidationReport};
