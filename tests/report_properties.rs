use std::collections::{BTreeSet, HashSet};

use chrono::Days;
use proptest::prelude::*;
use sales_analytics::analytics::bucketing::default_age_bands;
use sales_analytics::analytics::query::*;
use sales_analytics::{Customer, JoinPolicy, Product, Sale, SeasonalGrain};

mod util;
use util::{Snapshot, as_of, date};

const NAMES: [&str; 5] = [
    "Mountain-200 Black, 42",
    "Road-550-W Yellow, 40",
    "Sport-100 Helmet, Blue",
    "Patch Kit/8 Patches",
    "Touring Tire Tube",
];

const CATEGORIES: [(&str, &str); 4] = [
    ("Bikes", "Mountain Bikes"),
    ("Bikes", "Road Bikes"),
    ("Accessories", "Helmets"),
    ("Accessories", "Tires and Tubes"),
];

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    let customers = prop::collection::vec(
        prop::option::of(prop::sample::select(vec!["Male", "Female", "n/a"])),
        1..12,
    );
    let products = prop::collection::vec(
        (
            prop::sample::select(NAMES.to_vec()),
            prop::sample::select(CATEGORIES.to_vec()),
            prop::option::of(1i64..2500),
        ),
        1..8,
    );
    // Product and customer keys range past the dimension sizes so some sales
    // are orphaned.
    let sales = prop::collection::vec(
        (1i64..11, 1i64..15, 0i64..4000, 1i64..5, 0u64..1100),
        0..40,
    );

    (customers, products, sales).prop_map(|(customers, products, sales)| {
        let customers = customers
            .into_iter()
            .enumerate()
            .map(|(i, gender)| {
                let c = Customer::new(i as i64 + 1)
                    .with_birthdate(date(1950 + (i as i32 * 3) % 45, 1 + i as u32 % 12, 1));
                match gender {
                    Some(g) => c.with_gender(g),
                    None => c,
                }
            })
            .collect();
        let products = products
            .into_iter()
            .enumerate()
            .map(|(i, (name, (cat, sub), cost))| {
                let p = Product::new(i as i64 + 1, name).with_category(cat, sub);
                match cost {
                    Some(c) => p.with_cost(c),
                    None => p,
                }
            })
            .collect();
        let sales = sales
            .into_iter()
            .enumerate()
            .map(|(i, (product_key, customer_key, amount, qty, day))| {
                let ordered = date(2011, 1, 1) + Days::new(day);
                Sale::new(format!("SO{}", 50000 + i / 2), product_key, customer_key)
                    .with_amount(amount, qty)
                    .with_dates(
                        ordered,
                        ordered + Days::new(7),
                        ordered + Days::new(12),
                    )
            })
            .collect();
        Snapshot {
            customers,
            products,
            sales,
        }
    })
}

fn matched_product_keys(snapshot: &Snapshot) -> HashSet<i64> {
    snapshot.products.iter().map(|p| p.product_key).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn metrics_are_pure(snapshot in snapshot_strategy()) {
        let store = snapshot.into_store();
        let conn = store.conn();

        prop_assert_eq!(
            query_business_report(conn).unwrap(),
            query_business_report(conn).unwrap()
        );
        prop_assert_eq!(
            query_top_products(conn, JoinPolicy::MatchedOnly, None).unwrap(),
            query_top_products(conn, JoinPolicy::MatchedOnly, None).unwrap()
        );
        prop_assert_eq!(
            query_category_revenue(conn, JoinPolicy::Inclusive).unwrap(),
            query_category_revenue(conn, JoinPolicy::Inclusive).unwrap()
        );
        prop_assert_eq!(
            query_age_groups(conn, as_of(), &default_age_bands()).unwrap(),
            query_age_groups(conn, as_of(), &default_age_bands()).unwrap()
        );
        prop_assert_eq!(
            query_seasonal_pattern(conn, SeasonalGrain::YearMonth).unwrap(),
            query_seasonal_pattern(conn, SeasonalGrain::YearMonth).unwrap()
        );
    }

    #[test]
    fn known_gender_shares_sum_to_100(snapshot in snapshot_strategy()) {
        let store = snapshot.into_store();
        let rows = query_gender_distribution(store.conn(), &["n/a".to_string()]).unwrap();
        if !rows.is_empty() {
            let total: f64 = rows.iter().map(|r| r.pct).sum();
            prop_assert!((total - 100.0).abs() <= 0.01 + 1e-9, "sum was {}", total);
        }
        prop_assert!(rows.iter().all(|r| r.gender != "n/a"));
    }

    #[test]
    fn inclusive_categories_cover_every_product_backed_pair(snapshot in snapshot_strategy()) {
        let known = matched_product_keys(&snapshot);
        let expected_pairs: BTreeSet<(String, String)> = snapshot
            .products
            .iter()
            .map(|p| (p.category.clone().unwrap(), p.subcategory.clone().unwrap()))
            .collect();
        let matched_revenue: i64 = snapshot
            .sales
            .iter()
            .filter(|s| s.product_key.is_some_and(|k| known.contains(&k)))
            .filter_map(|s| s.sales_amount)
            .sum();

        let store = snapshot.into_store();
        let result = query_category_revenue(store.conn(), JoinPolicy::Inclusive).unwrap();
        let pairs: BTreeSet<(String, String)> = result
            .rows
            .iter()
            .filter(|r| !r.orphaned)
            .map(|r| (r.category.clone().unwrap(), r.subcategory.clone().unwrap()))
            .collect();

        prop_assert_eq!(pairs, expected_pairs);
        prop_assert_eq!(result.matched_revenue(), Some(matched_revenue));
        prop_assert!(result.rows.iter().all(|r| r.revenue >= 0));
    }

    #[test]
    fn top_products_rank_every_sold_product(snapshot in snapshot_strategy()) {
        let known = matched_product_keys(&snapshot);
        let expected: BTreeSet<i64> = snapshot
            .sales
            .iter()
            .filter_map(|s| s.product_key)
            .filter(|k| known.contains(k))
            .collect();

        let store = snapshot.into_store();
        let rows = query_top_products(store.conn(), JoinPolicy::MatchedOnly, None).unwrap();
        let keys: BTreeSet<i64> = rows.iter().map(|r| r.product_key).collect();
        prop_assert_eq!(keys.len(), rows.len());
        prop_assert_eq!(keys, expected);

        for pair in rows.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.revenue >= b.revenue);
            if a.revenue == b.revenue {
                prop_assert!(
                    (&a.product_name, a.product_key) <= (&b.product_name, b.product_key),
                    "tie not broken by name: {:?} then {:?}", a, b
                );
            }
        }
    }

    #[test]
    fn unsold_products_profit_depends_on_policy(snapshot in snapshot_strategy()) {
        let sold: HashSet<i64> = snapshot.sales.iter().filter_map(|s| s.product_key).collect();
        let unsold: Vec<(i64, Option<i64>)> = snapshot
            .products
            .iter()
            .filter(|p| !sold.contains(&p.product_key))
            .map(|p| (p.product_key, p.cost))
            .collect();

        let store = snapshot.into_store();
        let matched =
            query_product_profitability(store.conn(), JoinPolicy::MatchedOnly, None).unwrap();
        let inclusive =
            query_product_profitability(store.conn(), JoinPolicy::Inclusive, None).unwrap();

        for (key, cost) in unsold {
            prop_assert!(matched.iter().all(|r| r.product_key != key));
            let row = inclusive.iter().find(|r| r.product_key == key).unwrap();
            prop_assert_eq!(row.profit, cost.map(|_| 0));
        }
    }
}
