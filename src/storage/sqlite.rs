//! SQLite-backed snapshot store.
//!
//! A [`SalesStore`] owns one `rusqlite::Connection` holding the three
//! star-schema tables. Stores are built once (from typed records or an
//! existing database file) and queried read-only afterwards through the
//! functions in [`crate::analytics::query`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{Connection, OpenFlags, params};

use super::schema;
use crate::analytics::types::AnalyticsResult;
use crate::model::{Customer, Product, Sale};

pub struct SalesStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SalesStore {
    /// Empty in-memory store with the schema created.
    pub fn open_in_memory() -> AnalyticsResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::create_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Create (or reuse) a database file with the schema, opened read-write
    /// so records can be inserted.
    pub fn create(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        schema::create_schema(&conn)?;
        schema::validate_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened writable sales store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing database read-only and validate its schema.
    ///
    /// Each call gets its own connection, so independent metrics can run on
    /// separate threads against the same file.
    pub fn open(path: impl AsRef<Path>) -> AnalyticsResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let started = Instant::now();
        schema::validate_schema(&conn)?;
        tracing::debug!(
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "validated sales store schema"
        );
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Adopt an already-populated connection after validating its schema.
    pub fn from_connection(conn: Connection) -> AnalyticsResult<Self> {
        schema::validate_schema(&conn)?;
        let path = conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Ok(Self { conn, path })
    }

    /// Build an in-memory snapshot from typed records.
    pub fn from_records(
        customers: &[Customer],
        products: &[Product],
        sales: &[Sale],
    ) -> AnalyticsResult<Self> {
        let mut store = Self::open_in_memory()?;
        store.insert_customers(customers)?;
        store.insert_products(products)?;
        store.insert_sales(sales)?;
        Ok(store)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Insert customers in one transaction. Returns the number of rows written.
    pub fn insert_customers(&mut self, customers: &[Customer]) -> AnalyticsResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customers (customer_key, customer_id, customer_number,
                    first_name, last_name, country, marital_status, gender,
                    birthdate, create_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for c in customers {
                stmt.execute(params![
                    c.customer_key,
                    c.customer_id,
                    c.customer_number,
                    c.first_name,
                    c.last_name,
                    c.country,
                    c.marital_status,
                    c.gender,
                    c.birthdate,
                    c.create_date,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(rows = customers.len(), "loaded customers");
        Ok(customers.len())
    }

    /// Insert products in one transaction. Returns the number of rows written.
    pub fn insert_products(&mut self, products: &[Product]) -> AnalyticsResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO products (product_key, product_id, product_number,
                    product_name, category_id, category, subcategory, maintenance,
                    cost, product_line, start_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for p in products {
                stmt.execute(params![
                    p.product_key,
                    p.product_id,
                    p.product_number,
                    p.product_name,
                    p.category_id,
                    p.category,
                    p.subcategory,
                    p.maintenance,
                    p.cost,
                    p.product_line,
                    p.start_date,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(rows = products.len(), "loaded products");
        Ok(products.len())
    }

    /// Insert sales in one transaction. Returns the number of rows written.
    pub fn insert_sales(&mut self, sales: &[Sale]) -> AnalyticsResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sales (order_number, product_key, customer_key,
                    order_date, shipping_date, due_date, sales_amount, quantity, price)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for s in sales {
                stmt.execute(params![
                    s.order_number,
                    s.product_key,
                    s.customer_key,
                    s.order_date,
                    s.shipping_date,
                    s.due_date,
                    s.sales_amount,
                    s.quantity,
                    s.price,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(rows = sales.len(), "loaded sales");
        Ok(sales.len())
    }
}

impl std::fmt::Debug for SalesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
