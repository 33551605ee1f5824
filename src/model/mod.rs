//! Typed rows for the customers / products / sales star schema.

pub mod types;

pub use types::{Customer, Product, Sale};
