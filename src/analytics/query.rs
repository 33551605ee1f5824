//! SQL query builders for analytics.
//!
//! All functions accept a `&rusqlite::Connection` holding the star schema
//! and are pure reads: nothing here writes, and nothing reads the clock
//! except to log elapsed time. Anything age-related takes an explicit
//! `as_of` date.

use std::cmp::Ordering;
use std::time::Instant;

use chrono::NaiveDate;
use itertools::Itertools;
use rusqlite::Connection;

use super::bucketing::{self, AgeBand};
use super::derive;
use super::types::*;
use crate::config::AnalyticsConfig;
use crate::storage::schema::{self, TABLES};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Error out with [`AnalyticsError::MissingTable`] unless every table exists.
pub fn require_tables(conn: &Connection, tables: &[&str]) -> AnalyticsResult<()> {
    match tables.iter().find(|t| !schema::table_exists(conn, t)) {
        Some(missing) => Err(AnalyticsError::MissingTable((*missing).to_string())),
        None => Ok(()),
    }
}

fn log_query(query: &str, rows: usize, started: Instant) {
    tracing::debug!(
        query,
        rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analytics query"
    );
}

/// `LIMIT` bind value; SQLite treats a negative limit as unbounded.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

/// `Some` names sort before `None`, then lexically.
fn name_order(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ---------------------------------------------------------------------------
// Exploration
// ---------------------------------------------------------------------------

/// Row count of every snapshot table, in schema order.
pub fn query_table_counts(conn: &Connection) -> AnalyticsResult<Vec<TableCount>> {
    let started = Instant::now();
    let names: Vec<&str> = TABLES.iter().map(|t| t.name).collect();
    require_tables(conn, &names)?;

    let mut counts = Vec::with_capacity(names.len());
    for table in names {
        let row_count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
        counts.push(TableCount {
            table: table.into(),
            row_count,
        });
    }
    log_query("table_counts", counts.len(), started);
    Ok(counts)
}

/// Customer keys that occur on more than one row.
///
/// Rows are first grouped by every attribute, so the result also tells exact
/// duplicates (`distinct_variants == 1`) apart from conflicting ones.
pub fn query_duplicate_customers(conn: &Connection) -> AnalyticsResult<Vec<DuplicateCustomer>> {
    let started = Instant::now();
    require_tables(conn, &["customers"])?;

    let all_columns = schema::CUSTOMERS.column_names().join(", ");
    let sql = format!(
        "SELECT customer_key, SUM(n), COUNT(*)
         FROM (
             SELECT customer_key, COUNT(*) AS n
             FROM customers
             GROUP BY {all_columns}
         )
         GROUP BY customer_key
         HAVING SUM(n) > 1
         ORDER BY customer_key"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(DuplicateCustomer {
                customer_key: row.get(0)?,
                occurrences: row.get(1)?,
                distinct_variants: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if !rows.is_empty() {
        tracing::warn!(keys = rows.len(), "duplicate customer keys in snapshot");
    }
    log_query("duplicate_customers", rows.len(), started);
    Ok(rows)
}

/// Products whose `start_date` is NULL.
pub fn query_products_missing_start_date(
    conn: &Connection,
) -> AnalyticsResult<Vec<MissingStartDate>> {
    let started = Instant::now();
    require_tables(conn, &["products"])?;

    let mut stmt = conn.prepare(
        "SELECT product_key, product_name FROM products
         WHERE start_date IS NULL
         ORDER BY product_key",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MissingStartDate {
                product_key: row.get(0)?,
                product_name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    log_query("products_missing_start_date", rows.len(), started);
    Ok(rows)
}

/// Count of distinct customer keys.
pub fn query_distinct_customers(conn: &Connection) -> AnalyticsResult<i64> {
    require_tables(conn, &["customers"])?;
    let count = conn.query_row(
        "SELECT COUNT(DISTINCT customer_key) FROM customers",
        [],
        |r| r.get(0),
    )?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// Customer demographics
// ---------------------------------------------------------------------------

/// Customers per gender with their share of all known-gender customers.
///
/// NULL, blank, and any label in `unknown_labels` (case-insensitive) are
/// excluded before percentages are computed, so the returned shares sum to
/// 100 up to rounding. Returns an empty list when no gender is known.
pub fn query_gender_distribution(
    conn: &Connection,
    unknown_labels: &[String],
) -> AnalyticsResult<Vec<GenderShare>> {
    let started = Instant::now();
    require_tables(conn, &["customers"])?;

    let mut stmt = conn.prepare(
        "SELECT TRIM(gender), COUNT(DISTINCT customer_key)
         FROM customers
         WHERE gender IS NOT NULL AND TRIM(gender) != ''
         GROUP BY TRIM(gender)
         ORDER BY 2 DESC, 1",
    )?;
    let known: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|(gender, _)| {
            !unknown_labels
                .iter()
                .any(|u| u.trim().eq_ignore_ascii_case(gender))
        })
        .collect();

    let total: i64 = known.iter().map(|(_, n)| n).sum();
    let rows: Vec<GenderShare> = known
        .into_iter()
        .map(|(gender, customer_count)| GenderShare {
            gender,
            customer_count,
            pct: derive::safe_pct(customer_count, total).unwrap_or(0.0),
        })
        .collect();
    log_query("gender_distribution", rows.len(), started);
    Ok(rows)
}

/// Customers per age band, ages evaluated at `as_of`.
pub fn query_age_groups(
    conn: &Connection,
    as_of: NaiveDate,
    bands: &[AgeBand],
) -> AnalyticsResult<AgeGroupResult> {
    let started = Instant::now();
    require_tables(conn, &["customers"])?;

    let mut stmt = conn.prepare(
        "SELECT MAX(birthdate) FROM customers
         GROUP BY customer_key",
    )?;
    let birthdates: Vec<Option<NaiveDate>> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts = vec![0_i64; bands.len()];
    let mut unbanded = 0_i64;
    let mut unknown = 0_i64;
    for birthdate in birthdates {
        match birthdate.and_then(|b| bucketing::age_in_years(b, as_of)) {
            None => unknown += 1,
            Some(age) => match bucketing::band_index(age, bands) {
                Some(idx) => counts[idx] += 1,
                None => unbanded += 1,
            },
        }
    }

    let groups: Vec<AgeGroupRow> = bands
        .iter()
        .zip(counts)
        .map(|(band, customer_count)| AgeGroupRow {
            label: band.label.clone(),
            customer_count,
        })
        .collect();
    log_query("age_groups", groups.len(), started);
    Ok(AgeGroupResult {
        as_of,
        groups,
        unbanded,
        unknown,
    })
}

/// Customers per country, largest first. NULL or blank country is `n/a`.
pub fn query_country_distribution(conn: &Connection) -> AnalyticsResult<Vec<CountryRow>> {
    let started = Instant::now();
    require_tables(conn, &["customers"])?;

    let mut stmt = conn.prepare(
        "SELECT COALESCE(NULLIF(TRIM(country), ''), 'n/a') AS country,
                COUNT(DISTINCT customer_key)
         FROM customers
         GROUP BY 1
         ORDER BY 2 DESC, 1",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CountryRow {
                country: row.get(0)?,
                customer_count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    log_query("country_distribution", rows.len(), started);
    Ok(rows)
}

/// Oldest and youngest customers, ages evaluated at `as_of`.
pub fn query_customer_age_range(
    conn: &Connection,
    as_of: NaiveDate,
) -> AnalyticsResult<CustomerAgeRange> {
    require_tables(conn, &["customers"])?;
    let (earliest, latest): (Option<NaiveDate>, Option<NaiveDate>) = conn.query_row(
        "SELECT MIN(birthdate), MAX(birthdate) FROM customers",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    Ok(CustomerAgeRange {
        as_of,
        earliest_birthdate: earliest,
        latest_birthdate: latest,
        oldest_age: earliest.and_then(|b| bucketing::age_in_years(b, as_of)),
        youngest_age: latest.and_then(|b| bucketing::age_in_years(b, as_of)),
    })
}

/// Customers with at least one order, classified by lifespan and spend.
///
/// Lifespan is the month distance between a customer's first and last
/// order. Sales with an orphaned customer key are ignored. Always returns
/// one row per [`CustomerSegment`], in `VIP, Regular, New` order.
pub fn query_customer_segments(conn: &Connection) -> AnalyticsResult<Vec<SegmentRow>> {
    let started = Instant::now();
    require_tables(conn, &["customers", "sales"])?;

    let mut stmt = conn.prepare(
        "SELECT MIN(s.order_date), MAX(s.order_date), COALESCE(SUM(s.sales_amount), 0)
         FROM sales s
         WHERE EXISTS (SELECT 1 FROM customers c WHERE c.customer_key = s.customer_key)
         GROUP BY s.customer_key",
    )?;
    let customers: Vec<(Option<NaiveDate>, Option<NaiveDate>, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let counts = customers
        .into_iter()
        .map(|(first, last, spend)| {
            let lifespan = match (first, last) {
                (Some(f), Some(l)) => bucketing::months_between(f, l),
                _ => 0,
            };
            bucketing::classify_customer(lifespan, spend)
        })
        .counts();

    let rows: Vec<SegmentRow> = CustomerSegment::ALL
        .into_iter()
        .map(|segment| SegmentRow {
            segment,
            customer_count: counts.get(&segment).copied().unwrap_or(0) as i64,
        })
        .collect();
    log_query("customer_segments", rows.len(), started);
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Products and categories
// ---------------------------------------------------------------------------

/// Number of products per category + subcategory, largest first.
pub fn query_category_product_counts(
    conn: &Connection,
) -> AnalyticsResult<Vec<CategoryCountRow>> {
    let started = Instant::now();
    require_tables(conn, &["products"])?;

    let mut stmt = conn.prepare(
        "SELECT category, subcategory, COUNT(DISTINCT product_key)
         FROM products
         GROUP BY category, subcategory
         ORDER BY 3 DESC, category, subcategory",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CategoryCountRow {
                category: row.get(0)?,
                subcategory: row.get(1)?,
                product_count: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    log_query("category_product_counts", rows.len(), started);
    Ok(rows)
}

/// Revenue per category + subcategory.
///
/// Under [`JoinPolicy::Inclusive`] every category that has a product is
/// listed (zero when unsold) and sales whose product key matches no product
/// are appended as one `orphaned` row. Under [`JoinPolicy::MatchedOnly`]
/// only categories with matched sales appear.
pub fn query_category_revenue(
    conn: &Connection,
    policy: JoinPolicy,
) -> AnalyticsResult<CategoryRevenueResult> {
    let started = Instant::now();
    require_tables(conn, &["products", "sales"])?;

    let from = match policy {
        JoinPolicy::Inclusive => "products p LEFT JOIN sales s ON s.product_key = p.product_key",
        JoinPolicy::MatchedOnly => "sales s JOIN products p ON p.product_key = s.product_key",
    };
    let sql = format!(
        "SELECT p.category, p.subcategory, COALESCE(SUM(s.sales_amount), 0) AS revenue
         FROM {from}
         GROUP BY p.category, p.subcategory
         ORDER BY revenue DESC, p.category, p.subcategory"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map([], |row| {
            Ok(CategoryRevenueRow {
                category: row.get(0)?,
                subcategory: row.get(1)?,
                revenue: row.get(2)?,
                orphaned: false,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if policy == JoinPolicy::Inclusive {
        let gaps = query_referential_gaps(conn)?;
        if gaps.orphan_product_sales > 0 {
            rows.push(CategoryRevenueRow {
                category: None,
                subcategory: None,
                revenue: gaps.orphan_product_revenue,
                orphaned: true,
            });
        }
    }

    log_query("category_revenue", rows.len(), started);
    Ok(CategoryRevenueResult { policy, rows })
}

/// Each category's share of the revenue of matched sales.
///
/// Every category that has a product is listed. Shares are `None` when
/// there is no revenue at all.
pub fn query_category_share(conn: &Connection) -> AnalyticsResult<Vec<CategoryShareRow>> {
    let started = Instant::now();
    require_tables(conn, &["products", "sales"])?;

    let mut stmt = conn.prepare(
        "SELECT p.category, COALESCE(SUM(s.sales_amount), 0) AS revenue
         FROM products p
         LEFT JOIN sales s ON s.product_key = p.product_key
         GROUP BY p.category
         ORDER BY revenue DESC, p.category",
    )?;
    let totals: Vec<(Option<String>, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let grand_total: i128 = totals.iter().map(|(_, r)| i128::from(*r)).sum();
    let rows: Vec<CategoryShareRow> = totals
        .into_iter()
        .map(|(category, revenue)| CategoryShareRow {
            category,
            revenue,
            share_pct: derive::share_pct(revenue, grand_total),
        })
        .collect();
    log_query("category_share", rows.len(), started);
    Ok(rows)
}

/// Products per cost band, in [`bucketing::COST_RANGES`] order.
pub fn query_product_cost_ranges(conn: &Connection) -> AnalyticsResult<Vec<CostRangeRow>> {
    let started = Instant::now();
    require_tables(conn, &["products"])?;

    let mut stmt = conn.prepare("SELECT cost FROM products")?;
    let counts = stmt
        .query_map([], |row| row.get::<_, Option<i64>>(0))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(bucketing::cost_range)
        .counts();

    let rows: Vec<CostRangeRow> = bucketing::COST_RANGES
        .iter()
        .map(|range| CostRangeRow {
            range: (*range).to_string(),
            product_count: counts.get(range).copied().unwrap_or(0) as i64,
        })
        .collect();
    log_query("product_cost_ranges", rows.len(), started);
    Ok(rows)
}

/// Products ranked by revenue with quantity alongside.
///
/// [`JoinPolicy::MatchedOnly`] (the usual choice) ranks products with at
/// least one sale; sales with orphaned product keys drop out.
/// [`JoinPolicy::Inclusive`] also lists unsold products with zero revenue.
/// Ties are broken by product name ascending, then product key.
pub fn query_top_products(
    conn: &Connection,
    policy: JoinPolicy,
    limit: Option<usize>,
) -> AnalyticsResult<Vec<ProductRevenueRow>> {
    let started = Instant::now();
    require_tables(conn, &["products", "sales"])?;

    let from = match policy {
        JoinPolicy::Inclusive => "products p LEFT JOIN sales s ON s.product_key = p.product_key",
        JoinPolicy::MatchedOnly => "sales s JOIN products p ON p.product_key = s.product_key",
    };
    let sql = format!(
        "SELECT p.product_key, p.product_name,
                COALESCE(SUM(s.sales_amount), 0) AS revenue,
                COALESCE(SUM(s.quantity), 0)
         FROM {from}
         GROUP BY p.product_key, p.product_name
         ORDER BY revenue DESC, p.product_name IS NULL, p.product_name, p.product_key
         LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([sql_limit(limit)], |row| {
            Ok(ProductRevenueRow {
                product_key: row.get(0)?,
                product_name: row.get(1)?,
                revenue: row.get(2)?,
                quantity: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    log_query("top_products", rows.len(), started);
    Ok(rows)
}

/// Products ranked by `revenue - quantity * unit_cost`.
///
/// Sales are aggregated per product first and joined to the product row
/// afterwards, so each product's cost is applied once. Under
/// [`JoinPolicy::MatchedOnly`] unsold products are excluded; under
/// [`JoinPolicy::Inclusive`] they appear with profit `0`. Products with
/// unknown cost, or whose profit does not fit in an `i64`, rank last with
/// profit `None`.
pub fn query_product_profitability(
    conn: &Connection,
    policy: JoinPolicy,
    limit: Option<usize>,
) -> AnalyticsResult<Vec<ProductProfitRow>> {
    let started = Instant::now();
    require_tables(conn, &["products", "sales"])?;

    let join = match policy {
        JoinPolicy::Inclusive => "LEFT JOIN",
        JoinPolicy::MatchedOnly => "JOIN",
    };
    let sql = format!(
        "SELECT p.product_key, p.product_name,
                COALESCE(s.revenue, 0), COALESCE(s.quantity, 0), p.cost
         FROM products p
         {join} (
             SELECT product_key,
                    SUM(sales_amount) AS revenue,
                    SUM(quantity) AS quantity
             FROM sales
             GROUP BY product_key
         ) s ON s.product_key = p.product_key"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let revenue: i64 = row.get(2)?;
            let quantity: i64 = row.get(3)?;
            let unit_cost: Option<i64> = row.get(4)?;
            Ok(ProductProfitRow {
                product_key: row.get(0)?,
                product_name: row.get(1)?,
                revenue,
                quantity,
                unit_cost,
                profit: unit_cost.and_then(|cost| derive::profit(revenue, quantity, cost)),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let ranked: Vec<ProductProfitRow> = rows
        .into_iter()
        .sorted_by(|a, b| {
            b.profit
                .is_some()
                .cmp(&a.profit.is_some())
                .then_with(|| b.profit.cmp(&a.profit))
                .then_with(|| name_order(&a.product_name, &b.product_name))
                .then_with(|| a.product_key.cmp(&b.product_key))
        })
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    log_query("product_profitability", ranked.len(), started);
    Ok(ranked)
}

/// Top products and profitability, both limited to `config.top_limit`.
pub fn query_product_rankings(
    conn: &Connection,
    config: &AnalyticsConfig,
    policy: JoinPolicy,
) -> AnalyticsResult<ProductRankings> {
    let limit = Some(config.top_limit);
    Ok(ProductRankings {
        policy,
        limit: config.top_limit,
        top_products: query_top_products(conn, policy, limit)?,
        profitability: query_product_profitability(conn, policy, limit)?,
    })
}

/// Gender, age-group and country breakdowns using the configured unknown
/// gender labels and age bands. Ages use the configured `as_of` when one is
/// pinned, otherwise `fallback_as_of`.
pub fn query_demographics(
    conn: &Connection,
    config: &AnalyticsConfig,
    fallback_as_of: NaiveDate,
) -> AnalyticsResult<Demographics> {
    let as_of = config.resolve_as_of(fallback_as_of);
    Ok(Demographics {
        gender: query_gender_distribution(conn, &config.unknown_gender_labels)?,
        age_groups: query_age_groups(conn, as_of, &config.age_bands)?,
        countries: query_country_distribution(conn)?,
    })
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// First and last order dates and the month span between them.
pub fn query_order_date_range(conn: &Connection) -> AnalyticsResult<OrderDateRange> {
    require_tables(conn, &["sales"])?;
    let (first, last): (Option<NaiveDate>, Option<NaiveDate>) = conn.query_row(
        "SELECT MIN(order_date), MAX(order_date) FROM sales WHERE order_date IS NOT NULL",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    let span_months = match (first, last) {
        (Some(f), Some(l)) => Some(bucketing::months_between(f, l)),
        _ => None,
    };
    Ok(OrderDateRange {
        first_order: first,
        last_order: last,
        span_months,
    })
}

/// Orders, revenue, quantity and customers per period, ascending.
pub fn query_seasonal_pattern(
    conn: &Connection,
    grain: SeasonalGrain,
) -> AnalyticsResult<Vec<SeasonalRow>> {
    let started = Instant::now();
    require_tables(conn, &["sales"])?;

    let (year_expr, group_by) = match grain {
        SeasonalGrain::Month => ("NULL", "m"),
        SeasonalGrain::YearMonth => ("CAST(strftime('%Y', order_date) AS INTEGER)", "y, m"),
    };
    let sql = format!(
        "SELECT {year_expr} AS y,
                CAST(strftime('%m', order_date) AS INTEGER) AS m,
                COUNT(DISTINCT order_number),
                COALESCE(SUM(sales_amount), 0),
                COALESCE(SUM(quantity), 0),
                COUNT(DISTINCT customer_key)
         FROM sales
         WHERE order_date IS NOT NULL
         GROUP BY {group_by}
         ORDER BY {group_by}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let year: Option<i32> = row.get(0)?;
            let month: u32 = row.get(1)?;
            let period = match year {
                Some(y) => bucketing::period_label(y, month),
                None => bucketing::month_label(month),
            };
            Ok(SeasonalRow {
                period,
                year,
                month,
                order_count: row.get(2)?,
                revenue: row.get(3)?,
                quantity: row.get(4)?,
                customer_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    log_query("seasonal_pattern", rows.len(), started);
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Single-value aggregates. An empty fact table yields zero sums and
/// counts with `avg_price: None`.
pub fn query_sales_totals(conn: &Connection) -> AnalyticsResult<SalesTotals> {
    let started = Instant::now();
    require_tables(conn, &["customers", "products", "sales"])?;

    let (total_sales, total_quantity, avg_price, total_orders, customers_with_orders) = conn
        .query_row(
            "SELECT COALESCE(SUM(sales_amount), 0),
                    COALESCE(SUM(quantity), 0),
                    AVG(price),
                    COUNT(DISTINCT order_number),
                    COUNT(DISTINCT customer_key)
             FROM sales",
            [],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<f64>>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, i64>(4)?,
                ))
            },
        )?;
    let total_products: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT product_key) FROM products",
        [],
        |r| r.get(0),
    )?;
    let total_customers = query_distinct_customers(conn)?;

    log_query("sales_totals", 1, started);
    Ok(SalesTotals {
        total_sales,
        total_quantity,
        avg_price: derive::finite(avg_price),
        total_orders,
        total_products,
        total_customers,
        customers_with_orders,
    })
}

/// Average days from order to shipment.
///
/// Rows shipped before they were ordered are counted in `negative_rows`
/// and left out of the average rather than pulling it down.
pub fn query_shipping_duration(conn: &Connection) -> AnalyticsResult<ShippingDuration> {
    let started = Instant::now();
    require_tables(conn, &["sales"])?;

    let result = conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN d IS NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN d < 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN d >= 0 THEN 1 ELSE 0 END), 0),
                AVG(CASE WHEN d >= 0 THEN d END)
         FROM (
             SELECT julianday(shipping_date) - julianday(order_date) AS d
             FROM sales
         )",
        [],
        |r| {
            Ok(ShippingDuration {
                missing_date_rows: r.get(0)?,
                negative_rows: r.get(1)?,
                measured_rows: r.get(2)?,
                avg_days: r.get(3)?,
            })
        },
    )?;

    if result.has_negative() {
        tracing::warn!(
            rows = result.negative_rows,
            "sales shipped before their order date; excluded from shipping average"
        );
    }
    log_query("shipping_duration", 1, started);
    Ok(ShippingDuration {
        avg_days: derive::finite(result.avg_days),
        ..result
    })
}

/// The consolidated seven-metric business report.
///
/// All underlying queries run inside one deferred read transaction so the
/// figures describe a single snapshot. When the caller already holds a
/// transaction the queries simply join it.
pub fn query_business_report(conn: &Connection) -> AnalyticsResult<BusinessReport> {
    let started = Instant::now();
    let (totals, shipping) = if conn.is_autocommit() {
        let tx = conn.unchecked_transaction()?;
        let totals = query_sales_totals(&tx)?;
        let shipping = query_shipping_duration(&tx)?;
        tx.commit()?;
        (totals, shipping)
    } else {
        (query_sales_totals(conn)?, query_shipping_duration(conn)?)
    };

    let values: [MetricValue; 7] = [
        totals.total_sales.into(),
        totals.total_quantity.into(),
        totals.avg_price.into(),
        totals.total_orders.into(),
        totals.total_products.into(),
        totals.total_customers.into(),
        shipping.avg_days.into(),
    ];
    let metrics: Vec<ReportMetric> = BusinessReport::METRIC_NAMES
        .iter()
        .zip(values)
        .map(|(name, value)| ReportMetric {
            name: (*name).to_string(),
            value,
        })
        .collect();
    log_query("business_report", metrics.len(), started);
    Ok(BusinessReport { metrics })
}

/// Sales whose product or customer key matches no dimension row.
pub fn query_referential_gaps(conn: &Connection) -> AnalyticsResult<ReferentialGaps> {
    require_tables(conn, &["customers", "products", "sales"])?;

    let (orphan_product_sales, orphan_product_revenue): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(s.sales_amount), 0)
         FROM sales s
         WHERE NOT EXISTS (SELECT 1 FROM products p WHERE p.product_key = s.product_key)",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let (orphan_customer_sales, orphan_customer_revenue): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(s.sales_amount), 0)
         FROM sales s
         WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_key = s.customer_key)",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    let gaps = ReferentialGaps {
        orphan_product_sales,
        orphan_product_revenue,
        orphan_customer_sales,
        orphan_customer_revenue,
    };
    if gaps.has_gaps() {
        tracing::warn!(
            orphan_product_sales,
            orphan_customer_sales,
            "sales reference missing dimension rows"
        );
    }
    Ok(gaps)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
