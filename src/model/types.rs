//! Star-schema entity structs.
//!
//! One struct per table. Every non-key attribute is optional because the
//! source snapshot carries NULLs in most columns (missing birthdates, order
//! dates, costs, start dates).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A row of the `customers` dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_key: i64,
    pub customer_id: Option<i64>,
    pub customer_number: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub marital_status: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub create_date: Option<NaiveDate>,
}

impl Customer {
    /// Minimal customer with only a key.
    pub fn new(customer_key: i64) -> Self {
        Self {
            customer_key,
            ..Default::default()
        }
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_birthdate(mut self, birthdate: NaiveDate) -> Self {
        self.birthdate = Some(birthdate);
        self
    }

    /// "First Last", skipping whichever half is missing.
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => None,
        }
    }
}

/// A row of the `products` dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_key: i64,
    pub product_id: Option<i64>,
    pub product_number: Option<String>,
    pub product_name: Option<String>,
    pub category_id: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub maintenance: Option<String>,
    /// Unit cost used by profitability calculations.
    pub cost: Option<i64>,
    pub product_line: Option<String>,
    pub start_date: Option<NaiveDate>,
}

impl Product {
    pub fn new(product_key: i64, product_name: impl Into<String>) -> Self {
        Self {
            product_key,
            product_name: Some(product_name.into()),
            ..Default::default()
        }
    }

    pub fn with_category(
        mut self,
        category: impl Into<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        self.category = Some(category.into());
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn with_cost(mut self, cost: i64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }
}

/// A row of the `sales` fact table.
///
/// `product_key` and `customer_key` are expected to reference dimension rows
/// but the store does not enforce it; see
/// [`crate::analytics::query::query_referential_gaps`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub order_number: String,
    pub product_key: Option<i64>,
    pub customer_key: Option<i64>,
    pub order_date: Option<NaiveDate>,
    pub shipping_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub sales_amount: Option<i64>,
    pub quantity: Option<i64>,
    pub price: Option<i64>,
}

impl Sale {
    pub fn new(order_number: impl Into<String>, product_key: i64, customer_key: i64) -> Self {
        Self {
            order_number: order_number.into(),
            product_key: Some(product_key),
            customer_key: Some(customer_key),
            ..Default::default()
        }
    }

    /// Set amount, quantity, and a unit price derived from them when exact.
    pub fn with_amount(mut self, sales_amount: i64, quantity: i64) -> Self {
        self.sales_amount = Some(sales_amount);
        self.quantity = Some(quantity);
        if quantity != 0 && sales_amount % quantity == 0 {
            self.price = Some(sales_amount / quantity);
        }
        self
    }

    pub fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_dates(
        mut self,
        order_date: NaiveDate,
        shipping_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        self.order_date = Some(order_date);
        self.shipping_date = Some(shipping_date);
        self.due_date = Some(due_date);
        self
    }

    pub fn with_order_date(mut self, order_date: NaiveDate) -> Self {
        self.order_date = Some(order_date);
        self
    }
}
