//! Stock and order bookkeeping against a real database.
//!
//! These tests require a migrated database:
//! `LIVESHOP_TEST_DATABASE_URL=... liveshop migrate`, then run with
//! `--ignored`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use chrono::NaiveDate;

use liveshop_admin::db::live_orders::QuickAddError;
use liveshop_admin::db::{
    CustomerRepository, LiveOrderRepository, LiveProductRepository, LiveSessionRepository,
    RepositoryError,
};
use liveshop_admin::models::{
    CustomerFields, CustomerFilter, NewCustomer, NewLiveOrder, NewLiveProduct, OrderFilter,
};
use liveshop_core::{Price, SessionIndex};
use liveshop_integration_tests::database_pool;

fn new_product(code: &str, prepared: i32) -> NewLiveProduct {
    NewLiveProduct {
        session_index: SessionIndex::parse(code).unwrap(),
        product_code: format!("SKU-{code}"),
        product_name: "Ao thun".to_string(),
        variant: None,
        price: Price::from_dong(150_000),
        prepared_quantity: prepared,
        tpos_product_id: None,
    }
}

fn walk_in(phase_id: liveshop_core::LivePhaseId, code: &str, quantity: i32) -> NewLiveOrder {
    NewLiveOrder {
        phase_id,
        order_code: SessionIndex::parse(code).unwrap(),
        quantity,
        customer_id: None,
        comment: None,
        created_by: None,
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LIVESHOP_TEST_DATABASE_URL)"]
async fn test_session_creates_two_phases_per_day() {
    let pool = database_pool().await;
    let sessions = LiveSessionRepository::new(&pool);

    let detail = sessions
        .create_with_phases(
            "Phase generation",
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 11).unwrap(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(detail.phases.len(), 6);
    assert!(detail.phases.windows(2).all(|w| w[0].phase_date <= w[1].phase_date));

    sessions.delete(detail.session.id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LIVESHOP_TEST_DATABASE_URL)"]
async fn test_quick_add_tracks_stock_and_oversell() {
    let pool = database_pool().await;
    let sessions = LiveSessionRepository::new(&pool);
    let products = LiveProductRepository::new(&pool);
    let orders = LiveOrderRepository::new(&pool);

    let day = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
    let detail = sessions
        .create_with_phases("Quick add", day, day, None)
        .await
        .unwrap();
    let phase_id = detail.phases[0].id;

    let product = products
        .create(phase_id, &new_product("A1", 2))
        .await
        .unwrap();

    let (first, after_first) = orders.quick_add(&walk_in(phase_id, "a1", 2)).await.unwrap();
    assert!(!first.is_oversell);
    assert_eq!(after_first.sold_quantity, 2);

    let (second, after_second) = orders.quick_add(&walk_in(phase_id, "A1", 1)).await.unwrap();
    assert!(second.is_oversell);
    assert_eq!(after_second.sold_quantity, 3);

    let unknown = orders.quick_add(&walk_in(phase_id, "Z9", 1)).await;
    assert!(matches!(unknown, Err(QuickAddError::UnknownCode(_))));

    // Restocking clears the flag on the late order.
    let (restocked, report) = products.set_prepared(product.id, 3).await.unwrap();
    assert_eq!(restocked.prepared_quantity, 3);
    assert_eq!(report.oversell_count(), 0);

    let flagged = orders
        .list_by_phase(
            phase_id,
            OrderFilter {
                oversell_only: true,
                ..OrderFilter::default()
            },
        )
        .await
        .unwrap();
    assert!(flagged.is_empty());

    // Products with orders cannot be deleted.
    let delete = products.delete(product.id).await;
    assert!(matches!(delete, Err(RepositoryError::Conflict(_))));

    sessions.delete(detail.session.id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LIVESHOP_TEST_DATABASE_URL)"]
async fn test_order_edits_move_stock_and_flags() {
    let pool = database_pool().await;
    let sessions = LiveSessionRepository::new(&pool);
    let products = LiveProductRepository::new(&pool);
    let orders = LiveOrderRepository::new(&pool);

    let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    let detail = sessions
        .create_with_phases("Order edits", day, day, None)
        .await
        .unwrap();
    let phase_id = detail.phases[0].id;
    let product = products
        .create(phase_id, &new_product("B1", 2))
        .await
        .unwrap();

    let (first, _) = orders.quick_add(&walk_in(phase_id, "B1", 2)).await.unwrap();
    let (second, _) = orders.quick_add(&walk_in(phase_id, "B1", 1)).await.unwrap();
    assert!(!first.is_oversell);
    assert!(second.is_oversell);

    // Raising the first order pushes it past the stock as well.
    let raised = orders.update_quantity(first.id, 3).await.unwrap();
    assert_eq!(raised.quantity, 3);
    assert!(raised.is_oversell);
    assert!(orders.get(second.id).await.unwrap().unwrap().is_oversell);
    assert_eq!(products.get(product.id).await.unwrap().unwrap().sold_quantity, 4);

    // Deleting it gives the units back and clears the late order.
    let deleted = orders.delete(first.id).await.unwrap();
    assert_eq!(deleted.id, first.id);
    assert!(orders.get(first.id).await.unwrap().is_none());
    assert!(!orders.get(second.id).await.unwrap().unwrap().is_oversell);
    assert_eq!(products.get(product.id).await.unwrap().unwrap().sold_quantity, 1);

    let missing = orders.delete(first.id).await;
    assert!(matches!(missing, Err(RepositoryError::NotFound)));

    // Prepared quantity never goes below zero.
    let (emptied, report) = products.adjust_prepared(product.id, -100).await.unwrap();
    assert_eq!(emptied.prepared_quantity, 0);
    assert_eq!(report.oversell_count(), 1);

    orders.delete(second.id).await.unwrap();
    sessions.delete(detail.session.id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LIVESHOP_TEST_DATABASE_URL)"]
async fn test_concurrent_edits_of_one_product_do_not_deadlock() {
    let pool = database_pool().await;
    let sessions = LiveSessionRepository::new(&pool);
    let products = LiveProductRepository::new(&pool);
    let orders = LiveOrderRepository::new(&pool);

    let day = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
    let detail = sessions
        .create_with_phases("Concurrent edits", day, day, None)
        .await
        .unwrap();
    let phase_id = detail.phases[0].id;
    let product = products
        .create(phase_id, &new_product("C1", 3))
        .await
        .unwrap();

    let (left, _) = orders.quick_add(&walk_in(phase_id, "C1", 1)).await.unwrap();
    let (right, _) = orders.quick_add(&walk_in(phase_id, "C1", 1)).await.unwrap();

    for quantity in 1..=10 {
        let (a, b, c) = tokio::join!(
            orders.update_quantity(left.id, quantity),
            orders.update_quantity(right.id, 11 - quantity),
            products.adjust_prepared(product.id, 1),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();
    }

    let product = products.get(product.id).await.unwrap().unwrap();
    assert_eq!(product.sold_quantity, 11);
    assert_eq!(product.prepared_quantity, 13);

    orders.delete(left.id).await.unwrap();
    orders.delete(right.id).await.unwrap();
    sessions.delete(detail.session.id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LIVESHOP_TEST_DATABASE_URL)"]
async fn test_racing_quick_adds_keep_their_flags_on_recompute() {
    let pool = database_pool().await;
    let sessions = LiveSessionRepository::new(&pool);
    let products = LiveProductRepository::new(&pool);
    let orders = LiveOrderRepository::new(&pool);

    let day = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
    let detail = sessions
        .create_with_phases("Racing quick adds", day, day, None)
        .await
        .unwrap();
    let phase_id = detail.phases[0].id;
    let product = products
        .create(phase_id, &new_product("D1", 1))
        .await
        .unwrap();

    let first = walk_in(phase_id, "D1", 1);
    let second = walk_in(phase_id, "D1", 1);
    let (a, b) = tokio::join!(orders.quick_add(&first), orders.quick_add(&second));
    let (a, _) = a.unwrap();
    let (b, _) = b.unwrap();
    assert_ne!(a.is_oversell, b.is_oversell);

    // The timeline follows the order in which the stock was claimed.
    let (winner, loser) = if a.is_oversell { (&b, &a) } else { (&a, &b) };
    assert!(winner.created_at < loser.created_at);

    let report = orders.recompute_product(product.id).await.unwrap();
    assert_eq!(report.oversold_ids(), vec![loser.id]);

    orders.delete(a.id).await.unwrap();
    orders.delete(b.id).await.unwrap();
    sessions.delete(detail.session.id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (LIVESHOP_TEST_DATABASE_URL)"]
async fn test_customer_search_treats_wildcards_literally() {
    let pool = database_pool().await;
    let customers = CustomerRepository::new(&pool);

    let create = |name: &str| NewCustomer {
        fields: CustomerFields {
            name: name.to_string(),
            ..CustomerFields::default()
        },
        ..NewCustomer::default()
    };
    let percent = customers.create(&create("Giam 50% hom nay")).await.unwrap();
    let plain = customers.create(&create("Giam 50k hom nay")).await.unwrap();
    let underscore = customers.create(&create("shop_linh")).await.unwrap();
    let dotted = customers.create(&create("shop.linh")).await.unwrap();

    let search = |term: &str| CustomerFilter {
        search: Some(term.to_string()),
        limit: 500,
        ..CustomerFilter::default()
    };

    let found: Vec<_> = customers
        .list(&search("50%"))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert!(found.contains(&percent.id));
    assert!(!found.contains(&plain.id));

    let found: Vec<_> = customers
        .list(&search("SHOP_LINH"))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert!(found.contains(&underscore.id));
    assert!(!found.contains(&dotted.id));

    for id in [percent.id, plain.id, underscore.id, dotted.id] {
        customers.delete(id).await.unwrap();
    }
}
