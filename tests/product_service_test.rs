mod common;

use assert_matches::assert_matches;
use common::TestApp;
use purchase_management_api::{
    errors::ServiceError,
    services::{
        products::ProductInput,
        purchase_orders::{CreatePurchaseOrder, OrderLineInput},
    },
};
use rust_decimal_macros::dec;

fn input(name: &str, code: &str) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        code: code.to_string(),
        unit: None,
        unit_price: dec!(2.50),
    }
}

#[tokio::test]
async fn list_is_ordered_by_name() {
    let app = TestApp::new().await;
    app.seed_product("Washer", "W-1", dec!(0.25)).await;
    app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    app.seed_product("Nut", "N-1", dec!(0.75)).await;

    let names: Vec<String> = app
        .state
        .services
        .products
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();

    assert_eq!(names, vec!["Bolt", "Nut", "Washer"]);
}

#[tokio::test]
async fn create_rejects_duplicate_code() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    products.create(input("Bolt", "B-1")).await.unwrap();

    let result = products.create(input("Other bolt", "B-1")).await;

    assert_matches!(result, Err(ServiceError::ValidationError(msg)) => {
        assert!(msg.contains("B-1"));
    });
    assert_eq!(products.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_overwrites_fields_and_allows_keeping_own_code() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let created = products.create(input("Bolt", "B-1")).await.unwrap();

    let updated = products
        .update(
            created.id,
            ProductInput {
                name: "Hex bolt".to_string(),
                code: "B-1".to_string(),
                unit: Some("box".to_string()),
                unit_price: dec!(4.25),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Hex bolt");
    assert_eq!(updated.unit.as_deref(), Some("box"));
    assert_eq!(updated.unit_price, dec!(4.25));
}

#[tokio::test]
async fn update_rejects_code_owned_by_another_product() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    products.create(input("Bolt", "B-1")).await.unwrap();
    let nut = products.create(input("Nut", "N-1")).await.unwrap();

    let result = products.update(nut.id, input("Nut", "B-1")).await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    let reloaded = products.get(nut.id).await.unwrap().unwrap();
    assert_eq!(reloaded.code, "N-1");
}

#[tokio::test]
async fn update_of_missing_product_is_not_found() {
    let app = TestApp::new().await;

    let result = app
        .state
        .services
        .products
        .update(404, input("Ghost", "G-1"))
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn exists_and_delete_report_missing_ids() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let bolt = products.create(input("Bolt", "B-1")).await.unwrap();

    assert!(products.exists(bolt.id).await.unwrap());
    assert!(!products.exists(bolt.id + 1).await.unwrap());

    assert!(products.delete(bolt.id).await.unwrap());
    assert!(!products.delete(bolt.id).await.unwrap());
    assert!(products.get(bolt.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_refuses_product_used_by_an_order() {
    let app = TestApp::new().await;
    let vendor = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    app.state
        .services
        .purchase_orders
        .create(CreatePurchaseOrder {
            vendor_id: vendor.id,
            items: vec![OrderLineInput {
                product_id: bolt.id,
                quantity: 3,
            }],
        })
        .await
        .unwrap();

    let result = app.state.services.products.delete(bolt.id).await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert!(app.state.services.products.exists(bolt.id).await.unwrap());
}

#[tokio::test]
async fn prices_outside_cents_range_are_rejected() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;

    for price in [dec!(0.005), dec!(0), dec!(1000000)] {
        let result = products
            .create(ProductInput {
                unit_price: price,
                ..input("Bolt", "B-1")
            })
            .await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }
    assert!(products.list().await.unwrap().is_empty());
}
