use chrono::NaiveDate;
use sales_analytics::{Customer, Product, Sale, SalesStore};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Reference date used by age-based tests.
#[allow(dead_code)]
pub fn as_of() -> NaiveDate {
    date(2014, 1, 1)
}

/// Typed records for a small bike-shop snapshot.
///
/// Five customers (one with unknown gender, one with no birthdate), six
/// products across three categories (two never sold), and nine sales lines
/// including one with an orphaned product key and one shipped early.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub sales: Vec<Sale>,
}

#[allow(dead_code)]
impl Snapshot {
    pub fn bike_shop() -> Self {
        let customers = vec![
            Customer::new(11000)
                .with_gender("Male")
                .with_country("Australia")
                .with_birthdate(date(1971, 10, 6)),
            Customer::new(11001)
                .with_gender("Female")
                .with_country("Australia")
                .with_birthdate(date(1976, 5, 10)),
            Customer::new(11002)
                .with_gender("Male")
                .with_country("United Kingdom")
                .with_birthdate(date(1993, 2, 9)),
            Customer::new(11003)
                .with_gender("n/a")
                .with_country("Germany")
                .with_birthdate(date(1968, 2, 15)),
            Customer::new(11004)
                .with_gender("Female")
                .with_country("United States"),
        ];

        let products = vec![
            Product::new(1, "Mountain-100 Silver, 38")
                .with_category("Bikes", "Mountain Bikes")
                .with_cost(1912)
                .with_start_date(date(2011, 7, 1)),
            Product::new(2, "Road-250 Black, 44")
                .with_category("Bikes", "Road Bikes")
                .with_cost(1519)
                .with_start_date(date(2012, 7, 1)),
            Product::new(3, "Sport-100 Helmet, Red")
                .with_category("Accessories", "Helmets")
                .with_cost(13)
                .with_start_date(date(2012, 7, 1)),
            Product::new(4, "Water Bottle - 30 oz.")
                .with_category("Accessories", "Bottles and Cages")
                .with_cost(2)
                .with_start_date(date(2013, 7, 1)),
            Product::new(5, "HL Road Frame - Red, 58")
                .with_category("Components", "Road Frames")
                .with_cost(868),
            Product::new(6, "LL Fork").with_category("Components", "Forks"),
        ];

        let sales = vec![
            Sale::new("SO43697", 1, 11000)
                .with_amount(3400, 1)
                .with_dates(date(2010, 12, 29), date(2011, 1, 5), date(2011, 1, 10)),
            Sale::new("SO43698", 2, 11001)
                .with_amount(2443, 1)
                .with_dates(date(2011, 1, 10), date(2011, 1, 17), date(2011, 1, 22)),
            Sale::new("SO51522", 3, 11001)
                .with_amount(70, 2)
                .with_dates(date(2013, 1, 10), date(2013, 1, 17), date(2013, 1, 22)),
            Sale::new("SO51522", 4, 11001)
                .with_amount(5, 1)
                .with_dates(date(2013, 1, 10), date(2013, 1, 17), date(2013, 1, 22)),
            Sale::new("SO51700", 1, 11002)
                .with_amount(3400, 1)
                .with_dates(date(2013, 3, 1), date(2013, 3, 8), date(2013, 3, 13)),
            Sale::new("SO51701", 3, 11002)
                .with_amount(35, 1)
                .with_dates(date(2013, 3, 2), date(2013, 3, 9), date(2013, 3, 14)),
            Sale::new("SO60000", 2, 11000)
                .with_amount(4886, 2)
                .with_dates(date(2013, 12, 1), date(2013, 12, 8), date(2013, 12, 13)),
            // Product key 999 is not in the products table.
            Sale::new("SO60001", 999, 11003)
                .with_amount(120, 1)
                .with_dates(date(2013, 12, 2), date(2013, 12, 9), date(2013, 12, 14)),
            // Shipped before it was ordered.
            Sale::new("SO60002", 4, 11004)
                .with_amount(10, 2)
                .with_dates(date(2013, 12, 20), date(2013, 12, 18), date(2013, 12, 30)),
        ];

        Self {
            customers,
            products,
            sales,
        }
    }

    pub fn into_store(self) -> SalesStore {
        SalesStore::from_records(&self.customers, &self.products, &self.sales)
            .expect("build in-memory store")
    }

    /// Persist into a SQLite file at `path`.
    pub fn write_to(&self, path: &Path) {
        let mut store = SalesStore::create(path).expect("create store");
        store.insert_customers(&self.customers).expect("customers");
        store.insert_products(&self.products).expect("products");
        store.insert_sales(&self.sales).expect("sales");
    }
}

/// A temp dir holding `sales.db` written from a snapshot.
#[allow(dead_code)]
pub struct SnapshotFile {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl SnapshotFile {
    pub fn new(snapshot: &Snapshot) -> Self {
        let dir = TempDir::new().expect("tempdir");
        snapshot.write_to(&dir.path().join("sales.db"));
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("sales.db")
    }
}

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
