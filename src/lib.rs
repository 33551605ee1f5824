//! Read-only sales analytics over a customers / products / sales star schema.
//!
//! Load a snapshot into a [`SalesStore`] (from typed records or an existing
//! SQLite file), then call the metric functions in [`analytics::query`]
//! against its connection:
//!
//! ```no_run
//! use sales_analytics::analytics::query;
//! use sales_analytics::{JoinPolicy, SalesStore};
//!
//! # fn main() -> Result<(), sales_analytics::AnalyticsError> {
//! let store = SalesStore::open("sales.db")?;
//! let report = query::query_business_report(store.conn())?;
//! let top = query::query_top_products(store.conn(), JoinPolicy::MatchedOnly, Some(10))?;
//! # let _ = (report, top);
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod logging;
pub mod model;
pub mod storage;

pub use analytics::{AnalyticsError, AnalyticsResult, JoinPolicy, SeasonalGrain, ToJson};
pub use config::{AnalyticsConfig, ConfigError};
pub use model::{Customer, Product, Sale};
pub use storage::SalesStore;
