//! Snapshot storage: schema catalogue, load-time validation, and the
//! SQLite-backed [`SalesStore`](sqlite::SalesStore).

pub mod schema;
pub mod sqlite;

pub use sqlite::SalesStore;
