//! Shared types for the analytics library.
//!
//! Every result type is plain data: no connection handles, no timings. The
//! same query against the same snapshot therefore yields values that compare
//! equal, and results can be shipped across threads freely.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use super::derive;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Analytics-specific error.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A table the query depends on does not exist.
    #[error("table '{0}' does not exist; load a snapshot before querying")]
    MissingTable(String),

    /// Input data does not conform to the star schema. Raised at load time.
    #[error("schema violation in '{table}': {detail}")]
    Schema { table: String, detail: String },

    /// A stored date could not be interpreted as `YYYY-MM-DD`.
    #[error("invalid date '{value}' in {table}.{column}")]
    InvalidDate {
        table: String,
        column: String,
        value: String,
    },

    /// A database query failed.
    #[error("analytics db error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl AnalyticsError {
    pub(crate) fn schema(table: &str, detail: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            detail: detail.into(),
        }
    }
}

/// Convenience alias.
pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

/// JSON rendering for result values and row lists.
///
/// Blanket-implemented for anything `Serialize`; result types with a
/// dedicated shape ([`CategoryRevenueResult`], [`BusinessReport`]) define
/// an inherent `to_json` that takes precedence.
pub trait ToJson {
    fn to_json(&self) -> serde_json::Value;
}

impl<T: Serialize + ?Sized> ToJson for T {
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({"error": "serialization failed"}))
    }
}

// ---------------------------------------------------------------------------
// Query knobs
// ---------------------------------------------------------------------------

/// How fact rows are joined to a dimension.
///
/// The two variants are intentional and both are kept: category revenue
/// defaults to [`JoinPolicy::Inclusive`] while the product rankings default
/// to [`JoinPolicy::MatchedOnly`]. A sale with an orphaned product key is
/// therefore visible in the former and absent from the latter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Outer join: every dimension row is listed (zero when unsold) and
    /// orphaned fact rows surface as an explicit unmatched entry where the
    /// result shape allows it.
    Inclusive,
    /// Inner join: only fact rows with a matching dimension row count.
    MatchedOnly,
}

impl std::fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inclusive => write!(f, "inclusive"),
            Self::MatchedOnly => write!(f, "matched_only"),
        }
    }
}

/// Period granularity for the seasonal pattern.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonalGrain {
    /// Calendar month across all years (12 buckets at most).
    #[default]
    Month,
    /// Year + month.
    YearMonth,
}

impl std::fmt::Display for SeasonalGrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Month => write!(f, "month"),
            Self::YearMonth => write!(f, "year_month"),
        }
    }
}

// ---------------------------------------------------------------------------
// Exploration results
// ---------------------------------------------------------------------------

/// Row count of a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub row_count: i64,
}

/// A customer key that occurs on more than one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateCustomer {
    pub customer_key: i64,
    /// Total rows carrying this key.
    pub occurrences: i64,
    /// Number of distinct attribute combinations among those rows.
    /// `1` means the rows are exact duplicates.
    pub distinct_variants: i64,
}

/// A product whose `start_date` is NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingStartDate {
    pub product_key: i64,
    pub product_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Customer demographics
// ---------------------------------------------------------------------------

/// One gender's share of the customers with a known gender.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderShare {
    pub gender: String,
    pub customer_count: i64,
    /// Percentage of known-gender customers, rounded to 2 decimals.
    pub pct: f64,
}

/// Customer count for a single age band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeGroupRow {
    pub label: String,
    pub customer_count: i64,
}

/// Age-group distribution evaluated at an explicit reference date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeGroupResult {
    pub as_of: NaiveDate,
    /// One row per configured band, in band order, zero counts included.
    pub groups: Vec<AgeGroupRow>,
    /// Customers with a known age that fall outside every band.
    pub unbanded: i64,
    /// Customers with no birthdate, or born after `as_of`.
    pub unknown: i64,
}

/// Customers per country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryRow {
    pub country: String,
    pub customer_count: i64,
}

/// Customer demographics computed with configured labels and bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demographics {
    pub gender: Vec<GenderShare>,
    pub age_groups: AgeGroupResult,
    pub countries: Vec<CountryRow>,
}

/// Oldest and youngest customers relative to `as_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerAgeRange {
    pub as_of: NaiveDate,
    pub earliest_birthdate: Option<NaiveDate>,
    pub latest_birthdate: Option<NaiveDate>,
    /// Age in whole years of the customer with the earliest birthdate.
    pub oldest_age: Option<u32>,
    /// Age in whole years of the customer with the latest birthdate.
    pub youngest_age: Option<u32>,
}

/// Value-based customer segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerSegment {
    Vip,
    Regular,
    New,
}

impl CustomerSegment {
    pub const ALL: [Self; 3] = [Self::Vip, Self::Regular, Self::New];
}

impl std::fmt::Display for CustomerSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vip => write!(f, "vip"),
            Self::Regular => write!(f, "regular"),
            Self::New => write!(f, "new"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRow {
    pub segment: CustomerSegment,
    pub customer_count: i64,
}

// ---------------------------------------------------------------------------
// Product / category results
// ---------------------------------------------------------------------------

/// Number of products in a category + subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCountRow {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub product_count: i64,
}

/// Revenue attributed to a category + subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRevenueRow {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub revenue: i64,
    /// True for the synthetic row carrying sales whose product key matches
    /// no product. Only produced under [`JoinPolicy::Inclusive`].
    pub orphaned: bool,
}

/// Result of the category revenue query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRevenueResult {
    pub policy: JoinPolicy,
    pub rows: Vec<CategoryRevenueRow>,
}

impl CategoryRevenueResult {
    /// Revenue of rows backed by at least one product.
    ///
    /// The totals below are `None` when the sum overflows an `i64`.
    pub fn matched_revenue(&self) -> Option<i64> {
        derive::checked_total(self.rows.iter().filter(|r| !r.orphaned).map(|r| r.revenue))
    }

    /// Revenue of sales whose product key is orphaned.
    pub fn orphaned_revenue(&self) -> Option<i64> {
        derive::checked_total(self.rows.iter().filter(|r| r.orphaned).map(|r| r.revenue))
    }

    pub fn total_revenue(&self) -> Option<i64> {
        derive::checked_total(self.rows.iter().map(|r| r.revenue))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "policy": self.policy.to_string(),
            "rows": self.rows,
            "row_count": self.rows.len(),
            "totals": {
                "matched_revenue": self.matched_revenue(),
                "orphaned_revenue": self.orphaned_revenue(),
                "total_revenue": self.total_revenue(),
            },
        })
    }
}

/// A category's share of total revenue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShareRow {
    pub category: Option<String>,
    pub revenue: i64,
    /// `None` when total revenue is zero.
    pub share_pct: Option<f64>,
}

/// Products per cost band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostRangeRow {
    pub range: String,
    pub product_count: i64,
}

/// A product ranked by revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRevenueRow {
    pub product_key: i64,
    pub product_name: Option<String>,
    pub revenue: i64,
    pub quantity: i64,
}

/// A product ranked by profit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductProfitRow {
    pub product_key: i64,
    pub product_name: Option<String>,
    pub revenue: i64,
    pub quantity: i64,
    pub unit_cost: Option<i64>,
    /// `revenue - quantity * unit_cost`; `None` when the cost is unknown or
    /// the result overflows.
    pub profit: Option<i64>,
}

/// Both product rankings cut to the configured limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRankings {
    pub policy: JoinPolicy,
    pub limit: usize,
    pub top_products: Vec<ProductRevenueRow>,
    pub profitability: Vec<ProductProfitRow>,
}

// ---------------------------------------------------------------------------
// Time results
// ---------------------------------------------------------------------------

/// First and last order dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDateRange {
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
    /// Whole months between first and last order, computed as
    /// `year_diff * 12 + month_diff`.
    pub span_months: Option<i64>,
}

/// Sales activity for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalRow {
    /// `MM` for [`SeasonalGrain::Month`], `YYYY-MM` for
    /// [`SeasonalGrain::YearMonth`].
    pub period: String,
    pub year: Option<i32>,
    pub month: u32,
    pub order_count: i64,
    pub revenue: i64,
    pub quantity: i64,
    pub customer_count: i64,
}

// ---------------------------------------------------------------------------
// Aggregate results
// ---------------------------------------------------------------------------

/// Single-value aggregates over the fact and dimension tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesTotals {
    pub total_sales: i64,
    pub total_quantity: i64,
    /// `None` when there are no priced sales.
    pub avg_price: Option<f64>,
    pub total_orders: i64,
    pub total_products: i64,
    pub total_customers: i64,
    /// Distinct customer keys that appear on at least one sale.
    pub customers_with_orders: i64,
}

/// Average order-to-ship time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShippingDuration {
    /// Mean of non-negative durations in days; `None` when nothing could be
    /// measured.
    pub avg_days: Option<f64>,
    /// Rows that contributed to the average.
    pub measured_rows: i64,
    /// Rows shipped before they were ordered. Excluded from the average.
    pub negative_rows: i64,
    /// Rows lacking an order or shipping date.
    pub missing_date_rows: i64,
}

impl ShippingDuration {
    pub fn has_negative(&self) -> bool {
        self.negative_rows > 0
    }
}

/// Sales whose keys do not resolve to a dimension row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferentialGaps {
    pub orphan_product_sales: i64,
    pub orphan_product_revenue: i64,
    pub orphan_customer_sales: i64,
    pub orphan_customer_revenue: i64,
}

impl ReferentialGaps {
    pub fn has_gaps(&self) -> bool {
        self.orphan_product_sales > 0 || self.orphan_customer_sales > 0
    }
}

// ---------------------------------------------------------------------------
// Business report
// ---------------------------------------------------------------------------

/// A metric value that keeps "undefined" distinct from zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Decimal(f64),
    /// Ratio or average over an empty set. Serializes as `null`.
    Undefined,
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Decimal(v) => Some(*v),
            Self::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::Undefined, Self::Decimal)
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v:.2}"),
            Self::Undefined => write!(f, "n/a"),
        }
    }
}

/// One `(metric_name, metric_value)` entry of the business report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetric {
    pub name: String,
    pub value: MetricValue,
}

/// Consolidated business-metrics report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessReport {
    pub metrics: Vec<ReportMetric>,
}

impl BusinessReport {
    /// Names in report order.
    pub const METRIC_NAMES: [&'static str; 7] = [
        "total_sales",
        "total_quantity",
        "avg_price",
        "total_orders",
        "total_products",
        "total_customers",
        "avg_shipping_days",
    ];

    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }

    /// Produce the flat `[{metric_name, metric_value}]` JSON shape.
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .metrics
            .iter()
            .map(|m| {
                serde_json::json!({
                    "metric_name": m.name,
                    "metric_value": m.value,
                })
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
