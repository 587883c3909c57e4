mod common;

use assert_matches::assert_matches;
use common::TestApp;
use purchase_management_api::{
    errors::ServiceError,
    services::{
        purchase_orders::{CreatePurchaseOrder, OrderLineInput},
        vendors::VendorInput,
    },
};
use rstest::rstest;
use rust_decimal_macros::dec;

fn vendor(name: &str, email: Option<&str>) -> VendorInput {
    VendorInput {
        name: name.to_string(),
        address: None,
        contact_person: None,
        phone: None,
        email: email.map(str::to_string),
    }
}

async fn seed_directory(app: &TestApp) {
    let vendors = &app.state.services.vendors;
    vendors
        .create(VendorInput {
            name: "Acme Supplies".to_string(),
            address: Some("12 Harbour Road, Springfield".to_string()),
            contact_person: Some("Dana Whitfield".to_string()),
            phone: Some("+1 555 0100".to_string()),
            email: Some("sales@acme.example".to_string()),
        })
        .await
        .unwrap();
    vendors
        .create(VendorInput {
            name: "Bolt Brothers".to_string(),
            address: Some("7 Mill Lane, Shelbyville".to_string()),
            contact_person: Some("Ravi Patel".to_string()),
            phone: Some("(555) 0200".to_string()),
            email: Some("orders@boltbros.example".to_string()),
        })
        .await
        .unwrap();
    vendors
        .create(vendor("Zenith Metals", None))
        .await
        .unwrap();
}

#[rstest]
#[case("", vec!["Acme Supplies", "Bolt Brothers", "Zenith Metals"])]
#[case("   ", vec!["Acme Supplies", "Bolt Brothers", "Zenith Metals"])]
#[case("ACME", vec!["Acme Supplies"])]
#[case("springfield", vec!["Acme Supplies"])]
#[case("patel", vec!["Bolt Brothers"])]
#[case("0200", vec!["Bolt Brothers"])]
#[case("EXAMPLE", vec!["Acme Supplies", "Bolt Brothers"])]
#[case("metal", vec!["Zenith Metals"])]
#[case("nobody", vec![])]
#[case("%", vec![])]
#[tokio::test]
async fn search_matches_text_fields(#[case] term: &str, #[case] expected: Vec<&str>) {
    let app = TestApp::new().await;
    seed_directory(&app).await;

    let names: Vec<String> = app
        .state
        .services
        .vendors
        .search(term)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect();

    assert_eq!(names, expected);
}

#[tokio::test]
async fn create_rejects_name_differing_only_in_case() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;
    vendors.create(vendor("Acme Supplies", None)).await.unwrap();

    let result = vendors.create(vendor("ACME supplies", None)).await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn create_rejects_email_differing_only_in_case() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;
    vendors
        .create(vendor("Acme", Some("sales@acme.example")))
        .await
        .unwrap();

    let result = vendors
        .create(vendor("Acme West", Some("Sales@ACME.example")))
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(msg)) => {
        assert!(msg.contains("sales@acme.example"));
    });
}

#[tokio::test]
async fn vendors_without_email_do_not_collide() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;

    vendors.create(vendor("First", None)).await.unwrap();
    vendors.create(vendor("Second", None)).await.unwrap();

    assert_eq!(vendors.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn update_keeps_own_name_but_rejects_another_vendors() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;
    let acme = vendors.create(vendor("Acme", None)).await.unwrap();
    vendors.create(vendor("Bolt Brothers", None)).await.unwrap();

    let renamed = vendors
        .update(acme.id, vendor("ACME", Some("hello@acme.example")))
        .await
        .unwrap();
    assert_eq!(renamed.name, "ACME");
    assert_eq!(renamed.email.as_deref(), Some("hello@acme.example"));

    let clash = vendors.update(acme.id, vendor("bolt brothers", None)).await;
    assert_matches!(clash, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn update_of_missing_vendor_is_not_found() {
    let app = TestApp::new().await;

    let result = app
        .state
        .services
        .vendors
        .update(77, vendor("Ghost", None))
        .await;

    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn delete_refuses_vendor_with_orders() {
    let app = TestApp::new().await;
    let acme = app.seed_vendor("Acme").await;
    let bolt = app.seed_product("Bolt", "B-1", dec!(1.50)).await;
    app.state
        .services
        .purchase_orders
        .create(CreatePurchaseOrder {
            vendor_id: acme.id,
            items: vec![OrderLineInput {
                product_id: bolt.id,
                quantity: 1,
            }],
        })
        .await
        .unwrap();

    let vendors = &app.state.services.vendors;
    assert_matches!(
        vendors.delete(acme.id).await,
        Err(ServiceError::ValidationError(_))
    );
    assert!(vendors.exists(acme.id).await.unwrap());
}

#[tokio::test]
async fn delete_reports_missing_vendor() {
    let app = TestApp::new().await;
    let acme = app.seed_vendor("Acme").await;
    let vendors = &app.state.services.vendors;

    assert!(vendors.delete(acme.id).await.unwrap());
    assert!(!vendors.delete(acme.id).await.unwrap());
    assert!(!vendors.exists(acme.id).await.unwrap());
}

#[tokio::test]
async fn non_ascii_names_are_compared_case_insensitively() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;
    vendors
        .create(vendor("ÖKO Handel", Some("Info@Öko.example")))
        .await
        .unwrap();

    assert_matches!(
        vendors.create(vendor("öko handel", None)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        vendors.create(vendor("Öko Nord", Some("info@öko.EXAMPLE"))).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_eq!(vendors.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn search_folds_non_ascii_terms() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;
    vendors.create(vendor("ÖKO Handel", None)).await.unwrap();
    vendors.create(vendor("Bäckerei Öztürk", None)).await.unwrap();
    vendors.create(vendor("Acme", None)).await.unwrap();

    let names: Vec<String> = vendors
        .search("ö")
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect();

    assert_eq!(names, vec!["Bäckerei Öztürk", "ÖKO Handel"]);
}

#[tokio::test]
async fn renamed_vendor_is_found_by_its_new_name_only() {
    let app = TestApp::new().await;
    let vendors = &app.state.services.vendors;
    let acme = vendors.create(vendor("Acme", None)).await.unwrap();

    vendors
        .update(acme.id, vendor("Zenith Metals", None))
        .await
        .unwrap();

    assert!(vendors.search("acme").await.unwrap().is_empty());
    assert_eq!(vendors.search("zenith").await.unwrap().len(), 1);
}
