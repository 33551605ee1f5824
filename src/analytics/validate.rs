//! Data-quality validation for a loaded snapshot.
//!
//! Provides deterministic checks for:
//! - **Presence**: all three star-schema tables exist.
//! - **Referential integrity**: sales whose product or customer key has no
//!   dimension row.
//! - **Date ordering**: order ≤ shipping ≤ due.
//! - **Measures**: no negative amounts, and `sales_amount = quantity × price`.
//! - **Dimension hygiene**: duplicate customer keys, products without a
//!   start date.
//!
//! None of these defects stop metrics from running; the report exists so
//! callers can see them. Output is a structured [`ValidationReport`] that
//! serialises to JSON.

use rusqlite::Connection;
use serde::Serialize;

use super::query::query_duplicate_customers;
use crate::storage::schema::{self, TABLES};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Severity level for a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation check result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub id: String,
    pub ok: bool,
    pub severity: Severity,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub tables_checked: usize,
    pub sample_limit: usize,
}

/// Full validation report.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
    pub _meta: ReportMeta,
}

impl ValidationReport {
    /// True if no check failed at `Warning` or `Error` severity.
    pub fn all_ok(&self) -> bool {
        self.checks
            .iter()
            .all(|c| c.ok || c.severity == Severity::Info)
    }

    /// Count of checks that failed with a given severity.
    pub fn count_failures(&self, sev: Severity) -> usize {
        self.checks
            .iter()
            .filter(|c| !c.ok && c.severity == sev)
            .count()
    }

    pub fn get(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Produce the JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({"error": "serialization failed"}))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    /// Maximum number of offending keys quoted in a check's details.
    /// `0` lists none.
    pub sample_limit: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self { sample_limit: 10 }
    }
}

impl ValidateConfig {
    /// Quote every offending key.
    pub fn exhaustive() -> Self {
        Self {
            sample_limit: usize::MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Run the full validation suite and return a structured report.
pub fn run_validation(conn: &Connection, config: &ValidateConfig) -> ValidationReport {
    let mut checks = Vec::new();

    let missing: Vec<&str> = TABLES
        .iter()
        .map(|t| t.name)
        .filter(|name| !schema::table_exists(conn, name))
        .collect();
    if missing.is_empty() {
        checks.push(Check {
            id: "schema.tables_exist".into(),
            ok: true,
            severity: Severity::Info,
            details: "customers, products and sales tables exist".into(),
            suggested_action: None,
        });
        checks.extend(validate_integrity(conn, config));
        checks.extend(validate_dates(conn, config));
        checks.extend(validate_measures(conn, config));
        checks.extend(validate_dimensions(conn, config));
    } else {
        checks.push(Check {
            id: "schema.tables_exist".into(),
            ok: false,
            severity: Severity::Error,
            details: format!("missing table(s): {}", missing.join(", ")),
            suggested_action: Some("Load a complete snapshot before validating".into()),
        });
    }

    let report = ValidationReport {
        checks,
        _meta: ReportMeta {
            tables_checked: TABLES.len() - missing.len(),
            sample_limit: config.sample_limit,
        },
    };
    tracing::debug!(
        checks = report.checks.len(),
        errors = report.count_failures(Severity::Error),
        warnings = report.count_failures(Severity::Warning),
        "validation finished"
    );
    report
}

// ---------------------------------------------------------------------------
// Check helpers
// ---------------------------------------------------------------------------

/// Build a count-based check: `count_sql` yields the number of offending
/// rows, `sample_sql` (bound with `?1` = limit) yields example keys.
///
/// A query that fails is reported as an `Error` check rather than hidden.
#[allow(clippy::too_many_arguments)]
fn count_check(
    conn: &Connection,
    config: &ValidateConfig,
    id: &str,
    fail_severity: Severity,
    count_sql: &str,
    sample_sql: &str,
    describe: impl Fn(i64) -> String,
    action: &str,
) -> Check {
    let counted = conn
        .query_row(count_sql, [], |r| r.get::<_, i64>(0))
        .and_then(|bad| Ok((bad, sample_keys(conn, sample_sql, config.sample_limit)?)));

    match counted {
        Ok((0, _)) => Check {
            id: id.into(),
            ok: true,
            severity: Severity::Info,
            details: describe(0),
            suggested_action: None,
        },
        Ok((bad, samples)) => {
            let mut details = describe(bad);
            if !samples.is_empty() {
                details.push_str(&format!(" (e.g. {})", samples.join(", ")));
            }
            Check {
                id: id.into(),
                ok: false,
                severity: fail_severity,
                details,
                suggested_action: Some(action.into()),
            }
        }
        Err(err) => Check {
            id: id.into(),
            ok: false,
            severity: Severity::Error,
            details: format!("check query failed: {err}"),
            suggested_action: Some("Verify the snapshot schema".into()),
        },
    }
}

fn sample_keys(conn: &Connection, sql: &str, limit: usize) -> rusqlite::Result<Vec<String>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(sql)?;
    let keys = stmt
        .query_map([limit], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

// ---------------------------------------------------------------------------
// Referential integrity
// ---------------------------------------------------------------------------

fn validate_integrity(conn: &Connection, config: &ValidateConfig) -> Vec<Check> {
    vec![
        count_check(
            conn,
            config,
            "integrity.orphan_product_keys",
            Severity::Warning,
            "SELECT COUNT(*) FROM sales s
             WHERE NOT EXISTS (SELECT 1 FROM products p WHERE p.product_key = s.product_key)",
            "SELECT DISTINCT COALESCE(CAST(s.product_key AS TEXT), 'NULL') FROM sales s
             WHERE NOT EXISTS (SELECT 1 FROM products p WHERE p.product_key = s.product_key)
             ORDER BY 1 LIMIT ?1",
            |n| format!("sales: {n} rows reference a product key missing from products"),
            "Reload products or expect these sales to drop out of product rankings",
        ),
        count_check(
            conn,
            config,
            "integrity.orphan_customer_keys",
            Severity::Warning,
            "SELECT COUNT(*) FROM sales s
             WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_key = s.customer_key)",
            "SELECT DISTINCT COALESCE(CAST(s.customer_key AS TEXT), 'NULL') FROM sales s
             WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_key = s.customer_key)
             ORDER BY 1 LIMIT ?1",
            |n| format!("sales: {n} rows reference a customer key missing from customers"),
            "Reload customers or expect these sales to drop out of customer segments",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Date ordering
// ---------------------------------------------------------------------------

fn validate_dates(conn: &Connection, config: &ValidateConfig) -> Vec<Check> {
    vec![
        count_check(
            conn,
            config,
            "dates.order_before_shipping",
            Severity::Warning,
            "SELECT COUNT(*) FROM sales WHERE order_date > shipping_date",
            "SELECT DISTINCT order_number FROM sales WHERE order_date > shipping_date
             ORDER BY 1 LIMIT ?1",
            |n| format!("sales: {n} rows shipped before they were ordered"),
            "Correct shipping dates; these rows are left out of the shipping average",
        ),
        count_check(
            conn,
            config,
            "dates.shipping_before_due",
            Severity::Warning,
            "SELECT COUNT(*) FROM sales WHERE shipping_date > due_date",
            "SELECT DISTINCT order_number FROM sales WHERE shipping_date > due_date
             ORDER BY 1 LIMIT ?1",
            |n| format!("sales: {n} rows shipped after their due date"),
            "Review due dates for these orders",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

fn validate_measures(conn: &Connection, config: &ValidateConfig) -> Vec<Check> {
    vec![
        count_check(
            conn,
            config,
            "measures.non_negative",
            Severity::Error,
            "SELECT (SELECT COUNT(*) FROM sales
                     WHERE sales_amount < 0 OR quantity < 0 OR price < 0)
                  + (SELECT COUNT(*) FROM products WHERE cost < 0)",
            "SELECT label FROM (
                 SELECT DISTINCT 'order ' || order_number AS label FROM sales
                 WHERE sales_amount < 0 OR quantity < 0 OR price < 0
                 UNION ALL
                 SELECT DISTINCT 'product ' || product_key FROM products WHERE cost < 0
             ) ORDER BY 1 LIMIT ?1",
            |n| format!("{n} rows with a negative amount, quantity, price or cost"),
            "Fix the source rows; negative measures corrupt every revenue metric",
        ),
        count_check(
            conn,
            config,
            "measures.amount_matches_price",
            Severity::Warning,
            "SELECT COUNT(*) FROM sales
             WHERE sales_amount IS NOT NULL AND quantity IS NOT NULL AND price IS NOT NULL
               AND sales_amount != quantity * price",
            "SELECT DISTINCT order_number FROM sales
             WHERE sales_amount IS NOT NULL AND quantity IS NOT NULL AND price IS NOT NULL
               AND sales_amount != quantity * price
             ORDER BY 1 LIMIT ?1",
            |n| format!("sales: {n} rows where sales_amount != quantity * price"),
            "Recompute sales_amount from quantity and price",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Dimension hygiene
// ---------------------------------------------------------------------------

fn validate_dimensions(conn: &Connection, config: &ValidateConfig) -> Vec<Check> {
    let duplicates = match query_duplicate_customers(conn) {
        Ok(dups) if dups.is_empty() => Check {
            id: "customers.duplicate_keys".into(),
            ok: true,
            severity: Severity::Info,
            details: "customers: every customer_key is unique".into(),
            suggested_action: None,
        },
        Ok(dups) => {
            let sample: Vec<String> = dups
                .iter()
                .take(config.sample_limit)
                .map(|d| d.customer_key.to_string())
                .collect();
            let conflicting = dups.iter().filter(|d| d.distinct_variants > 1).count();
            let mut details = format!(
                "customers: {} keys appear more than once ({conflicting} with conflicting attributes)",
                dups.len()
            );
            if !sample.is_empty() {
                details.push_str(&format!(" (e.g. {})", sample.join(", ")));
            }
            Check {
                id: "customers.duplicate_keys".into(),
                ok: false,
                severity: Severity::Warning,
                details,
                suggested_action: Some(
                    "Deduplicate customers; distinct-key counts are unaffected but joins fan out"
                        .into(),
                ),
            }
        }
        Err(err) => Check {
            id: "customers.duplicate_keys".into(),
            ok: false,
            severity: Severity::Error,
            details: format!("check query failed: {err}"),
            suggested_action: Some("Verify the snapshot schema".into()),
        },
    };

    vec![
        duplicates,
        count_check(
            conn,
            config,
            "products.missing_start_date",
            Severity::Info,
            "SELECT COUNT(*) FROM products WHERE start_date IS NULL",
            "SELECT CAST(product_key AS TEXT) FROM products WHERE start_date IS NULL
             ORDER BY product_key LIMIT ?1",
            |n| format!("products: {n} rows without a start_date"),
            "Informational; historical products often lack a start date",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
