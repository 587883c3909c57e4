mod common;

use assert_matches::assert_matches;
use common::TestApp;
use purchase_management_api::{
    entities::purchase_order_item,
    errors::ServiceError,
    services::{
        products::ProductInput,
        purchase_orders::{
            CreatePurchaseOrder, OrderLineInput, PricedLineInput, PurchaseOrderView,
            UpdatePurchaseOrder,
        },
    },
};
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

fn line(product_id: i32, quantity: i32) -> OrderLineInput {
    OrderLineInput {
        product_id,
        quantity,
    }
}

#[tokio::test]
async fn create_snapshots_catalog_prices_and_totals_lines() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(12.50)).await;
    let nut = app.seed_product("Nut", "N-1", dec!(4.25)).await;
    let orders = &app.state.services.purchase_orders;

    let order = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 2), line(nut.id, 3)],
        })
        .await
        .unwrap();

    assert_eq!(order.vendor_name, "Acme");
    assert_eq!(order.status, "Pending");
    assert_eq!(order.total_amount, dec!(37.75));
    assert_eq!(order.items.len(), 2);

    // Later catalog edits leave the order untouched
    app.state
        .services
        .products
        .update(
            bolt.id,
            ProductInput {
                name: "Bolt".to_string(),
                code: "B-1".to_string(),
                unit: None,
                unit_price: dec!(99.00),
            },
        )
        .await
        .unwrap();

    let reloaded = orders.get(order.id).await.unwrap();
    let bolt_line = reloaded
        .items
        .iter()
        .find(|item| item.product_id == bolt.id)
        .unwrap();
    assert_eq!(bolt_line.unit_price, dec!(12.50));
    assert_eq!(bolt_line.product_name, "Bolt");
    assert_eq!(reloaded.total_amount, dec!(37.75));
}

#[tokio::test]
async fn create_reports_every_missing_product() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;

    let result = app
        .state
        .services
        .purchase_orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(99, 1), line(bolt.id, 1), line(5, 2)],
        })
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(msg)) => {
        assert!(msg.contains("5, 99"), "unexpected message: {}", msg);
    });
    assert!(app.state.services.purchase_orders.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_for_unknown_vendor_is_not_found() {
    let app = TestApp::new().await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;

    let result = app
        .state
        .services
        .purchase_orders
        .create(CreatePurchaseOrder {
            vendor_id: 42,
            items: vec![line(bolt.id, 1)],
        })
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn create_rejects_empty_orders_and_zero_quantities() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    let orders = &app.state.services.purchase_orders;

    let empty = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![],
        })
        .await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));

    let zero = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 0)],
        })
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn list_returns_newest_first() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    let orders = &app.state.services.purchase_orders;

    let first = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 1)],
        })
        .await
        .unwrap();
    let second = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 2)],
        })
        .await
        .unwrap();

    let ids: Vec<i32> = orders.list().await.unwrap().iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn update_replaces_items_with_caller_prices_and_status() {
    let app = TestApp::new().await;
    let acme = app.seed_vendor("Acme").await;
    let bolt_bros = app.seed_vendor("Bolt Brothers").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(12.50)).await;
    let nut = app.seed_product("Nut", "N-1", dec!(4.25)).await;
    let orders = &app.state.services.purchase_orders;

    let order = orders
        .create(CreatePurchaseOrder {
            vendor_id: acme.id,
            items: vec![line(bolt.id, 2), line(nut.id, 3)],
        })
        .await
        .unwrap();

    let updated = orders
        .update(
            order.id,
            UpdatePurchaseOrder {
                vendor_id: bolt_bros.id,
                status: Some("Approved".to_string()),
                items: vec![PricedLineInput {
                    product_id: nut.id,
                    quantity: 4,
                    unit_price: dec!(3.50),
                }],
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.vendor_name, "Bolt Brothers");
    assert_eq!(updated.status, "Approved");
    assert_eq!(updated.total_amount, dec!(14.00));
    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.items[0].unit_price, dec!(3.50));
    assert_eq!(updated.order_date, order.order_date);

    let stored_items = purchase_order_item::Entity::find()
        .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(stored_items, 1);
}

#[tokio::test]
async fn update_with_blank_status_keeps_current_status() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    let orders = &app.state.services.purchase_orders;
    let order = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 1)],
        })
        .await
        .unwrap();

    let updated = orders
        .update(
            order.id,
            UpdatePurchaseOrder {
                vendor_id: vendor.id,
                status: Some("   ".to_string()),
                items: vec![PricedLineInput {
                    product_id: bolt.id,
                    quantity: 2,
                    unit_price: dec!(1.50),
                }],
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, "Pending");
    assert_eq!(updated.total_amount, dec!(3.00));
}

#[tokio::test]
async fn update_of_missing_order_is_not_found() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;

    let result = app
        .state
        .services
        .purchase_orders
        .update(
            404,
            UpdatePurchaseOrder {
                vendor_id: vendor.id,
                status: None,
                items: vec![PricedLineInput {
                    product_id: bolt.id,
                    quantity: 1,
                    unit_price: dec!(1.50),
                }],
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_order_and_items() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    let orders = &app.state.services.purchase_orders;
    let order = orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 1)],
        })
        .await
        .unwrap();

    orders.delete(order.id).await.unwrap();

    assert_matches!(orders.get(order.id).await, Err(ServiceError::NotFound(_)));
    let remaining = purchase_order_item::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert_matches!(orders.delete(order.id).await, Err(ServiceError::NotFound(_)));
}

async fn seeded_order(app: &TestApp) -> (i32, PurchaseOrderView) {
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(12.50)).await;
    let nut = app.seed_product("Nut", "N-1", dec!(4.25)).await;
    let order = app
        .state
        .services
        .purchase_orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![line(bolt.id, 2), line(nut.id, 3)],
        })
        .await
        .unwrap();
    (nut.id, order)
}

fn priced(product_id: i32, quantity: i32, unit_price: Decimal) -> PricedLineInput {
    PricedLineInput {
        product_id,
        quantity,
        unit_price,
    }
}

async fn assert_unchanged(app: &TestApp, before: &PurchaseOrderView) {
    let after = app.state.services.purchase_orders.get(before.id).await.unwrap();
    assert_eq!(after.vendor_id, before.vendor_id);
    assert_eq!(after.status, before.status);
    assert_eq!(after.total_amount, before.total_amount);
    assert_eq!(after.items, before.items);
}

#[tokio::test]
async fn update_with_unknown_vendor_is_not_found_and_changes_nothing() {
    let app = TestApp::new().await;
    let (nut_id, order) = seeded_order(&app).await;

    let result = app
        .state
        .services
        .purchase_orders
        .update(
            order.id,
            UpdatePurchaseOrder {
                vendor_id: 4_040,
                status: Some("Approved".to_string()),
                items: vec![priced(nut_id, 1, dec!(3.50))],
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(msg)) => {
        assert!(msg.contains("4040"), "unexpected message: {}", msg);
    });
    assert_unchanged(&app, &order).await;
}

#[tokio::test]
async fn update_with_unknown_products_names_them_and_changes_nothing() {
    let app = TestApp::new().await;
    let (nut_id, order) = seeded_order(&app).await;

    let result = app
        .state
        .services
        .purchase_orders
        .update(
            order.id,
            UpdatePurchaseOrder {
                vendor_id: order.vendor_id,
                status: Some("Approved".to_string()),
                items: vec![
                    priced(77, 1, dec!(1.50)),
                    priced(nut_id, 2, dec!(3.50)),
                    priced(8, 1, dec!(1.50)),
                ],
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(msg)) => {
        assert!(msg.contains("8, 77"), "unexpected message: {}", msg);
    });
    assert_unchanged(&app, &order).await;
    let stored_items = purchase_order_item::Entity::find()
        .filter(purchase_order_item::Column::PurchaseOrderId.eq(order.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(stored_items, 2);
}

#[rstest]
#[case(Decimal::MAX)]
#[case(dec!(1000000.00))]
#[case(dec!(0.005))]
#[case(dec!(0))]
#[tokio::test]
async fn update_rejects_prices_outside_cents_range(#[case] unit_price: Decimal) {
    let app = TestApp::new().await;
    let (nut_id, order) = seeded_order(&app).await;

    let result = app
        .state
        .services
        .purchase_orders
        .update(
            order.id,
            UpdatePurchaseOrder {
                vendor_id: order.vendor_id,
                status: None,
                items: vec![priced(nut_id, 3, unit_price)],
            },
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_unchanged(&app, &order).await;
}
