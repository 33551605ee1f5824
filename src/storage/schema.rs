//! Star-schema definition and load-time conformance checks.
//!
//! The column catalogue drives both the DDL for stores we create and the
//! validation of databases we adopt. Key uniqueness and referential
//! integrity are deliberately left unenforced so a snapshot with those
//! defects can still be loaded and inspected; see
//! [`crate::analytics::validate`].

use rusqlite::{Connection, OptionalExtension};

use crate::analytics::types::{AnalyticsError, AnalyticsResult};

/// Logical column type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    /// `TEXT` holding `YYYY-MM-DD`.
    Date,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Text | Self::Date => "TEXT",
        }
    }

    fn storage_class(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Text | Self::Date => "text",
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub not_null: bool,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        name,
        kind,
        not_null: false,
    }
}

const fn key(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        name,
        kind,
        not_null: true,
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    /// Columns that get a (non-unique) lookup index.
    pub indexed: &'static [&'static str],
}

impl TableSpec {
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    fn create_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let null = if c.not_null { " NOT NULL" } else { "" };
                format!("{} {}{null}", c.name, c.kind.sql_type())
            })
            .collect();
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);\n",
            self.name,
            cols.join(",\n    ")
        );
        for column in self.indexed {
            sql.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column});\n",
                table = self.name
            ));
        }
        sql
    }
}

use ColumnKind::{Date, Integer, Text};

pub const CUSTOMERS: TableSpec = TableSpec {
    name: "customers",
    columns: &[
        key("customer_key", Integer),
        col("customer_id", Integer),
        col("customer_number", Text),
        col("first_name", Text),
        col("last_name", Text),
        col("country", Text),
        col("marital_status", Text),
        col("gender", Text),
        col("birthdate", Date),
        col("create_date", Date),
    ],
    indexed: &["customer_key"],
};

pub const PRODUCTS: TableSpec = TableSpec {
    name: "products",
    columns: &[
        key("product_key", Integer),
        col("product_id", Integer),
        col("product_number", Text),
        col("product_name", Text),
        col("category_id", Text),
        col("category", Text),
        col("subcategory", Text),
        col("maintenance", Text),
        col("cost", Integer),
        col("product_line", Text),
        col("start_date", Date),
    ],
    indexed: &["product_key"],
};

pub const SALES: TableSpec = TableSpec {
    name: "sales",
    columns: &[
        key("order_number", Text),
        col("product_key", Integer),
        col("customer_key", Integer),
        col("order_date", Date),
        col("shipping_date", Date),
        col("due_date", Date),
        col("sales_amount", Integer),
        col("quantity", Integer),
        col("price", Integer),
    ],
    indexed: &["product_key", "customer_key", "order_date"],
};

/// All tables of the snapshot.
pub const TABLES: [&TableSpec; 3] = [&CUSTOMERS, &PRODUCTS, &SALES];

/// Create every table and index that does not exist yet.
pub fn create_schema(conn: &Connection) -> AnalyticsResult<()> {
    let ddl: String = TABLES.iter().map(|t| t.create_sql()).collect();
    conn.execute_batch(&ddl)?;
    Ok(())
}

/// Check whether a table exists in the database.
pub fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |_| Ok(()),
    )
    .is_ok()
}

/// Column names of `table` as reported by `PRAGMA table_info`.
pub fn table_columns(conn: &Connection, table: &str) -> AnalyticsResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Fail fast unless every table, column and stored value conforms.
///
/// Checks, per table: presence; presence of every catalogue column; NOT NULL
/// on key columns; SQLite storage class of every non-NULL value; and that
/// date columns hold canonical `YYYY-MM-DD` text.
pub fn validate_schema(conn: &Connection) -> AnalyticsResult<()> {
    for table in TABLES {
        validate_table(conn, table)?;
    }
    Ok(())
}

fn validate_table(conn: &Connection, table: &TableSpec) -> AnalyticsResult<()> {
    if !table_exists(conn, table.name) {
        return Err(AnalyticsError::schema(table.name, "table is missing"));
    }

    let present = table_columns(conn, table.name)?;
    let missing: Vec<&str> = table
        .column_names()
        .filter(|name| !present.iter().any(|p| p.eq_ignore_ascii_case(name)))
        .collect();
    if !missing.is_empty() {
        return Err(AnalyticsError::schema(
            table.name,
            format!("missing column(s): {}", missing.join(", ")),
        ));
    }

    for column in table.columns {
        if column.not_null {
            let nulls: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE {} IS NULL",
                    table.name, column.name
                ),
                [],
                |r| r.get(0),
            )?;
            if nulls > 0 {
                return Err(AnalyticsError::schema(
                    table.name,
                    format!("{nulls} row(s) with NULL {}", column.name),
                ));
            }
        }

        let wrong_type: Option<String> = conn.query_row(
            &format!(
                "SELECT typeof({c}) FROM {t}
                 WHERE {c} IS NOT NULL AND typeof({c}) != ?1
                 LIMIT 1",
                c = column.name,
                t = table.name
            ),
            [column.kind.storage_class()],
            |r| r.get(0),
        )
        .optional()?;
        if let Some(found) = wrong_type {
            return Err(AnalyticsError::schema(
                table.name,
                format!(
                    "column {} expects {} values, found {found}",
                    column.name,
                    column.kind.storage_class()
                ),
            ));
        }

        if column.kind == ColumnKind::Date {
            let bad: Option<String> = conn.query_row(
                &format!(
                    "SELECT {c} FROM {t}
                     WHERE {c} IS NOT NULL AND (date({c}) IS NULL OR date({c}) != {c})
                     LIMIT 1",
                    c = column.name,
                    t = table.name
                ),
                [],
                |r| r.get(0),
            )
            .optional()?;
            if let Some(value) = bad {
                return Err(AnalyticsError::InvalidDate {
                    table: table.name.into(),
                    column: column.name.into(),
                    value,
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
