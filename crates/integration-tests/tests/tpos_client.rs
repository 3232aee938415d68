//! TPOS client against a mock server.

#![allow(clippy::unwrap_used)]

use liveshop_core::Price;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use liveshop_admin::tpos::{SaleOnlineOrderDetail, SaleOnlineOrderInput, TposClient, TposError};
use liveshop_integration_tests::tpos_config;

async fn mount_token(server: &MockServer, expected_logins: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok", "expires_in": 3600})),
        )
        .expect(expected_logins)
        .mount(server)
        .await;
}

fn product_body() -> serde_json::Value {
    json!({
        "value": [
            {"Id": 42, "DefaultCode": "AO01", "Name": "Ao thun", "ListPrice": 150000}
        ]
    })
}

#[tokio::test]
async fn test_find_product_reuses_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/odata/Product"))
        .and(header("authorization", "Bearer tok"))
        .and(query_param("$filter", "DefaultCode eq 'AO01'"))
        .respond_with(ResponseTemplate::new(200).set_body_json(product_body()))
        .expect(2)
        .mount(&server)
        .await;

    let client = TposClient::new(&tpos_config(&server.uri()));
    let product = client.find_product_by_code(" AO01 ").await.unwrap().unwrap();
    client.find_product_by_code("AO01").await.unwrap();

    assert_eq!(product.id, 42);
    assert_eq!(product.name, "Ao thun");
}

#[tokio::test]
async fn test_find_product_missing() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/odata/Product"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .mount(&server)
        .await;

    let client = TposClient::new(&tpos_config(&server.uri()));
    assert!(client.find_product_by_code("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_token_is_dropped() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/odata/Product"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/odata/Product"))
        .respond_with(ResponseTemplate::new(200).set_body_json(product_body()))
        .mount(&server)
        .await;

    let client = TposClient::new(&tpos_config(&server.uri()));
    let first = client.find_product_by_code("AO01").await;
    assert!(matches!(first, Err(TposError::Unauthorized)));

    let second = client.find_product_by_code("AO01").await.unwrap();
    assert!(second.is_some());
}

#[tokio::test]
async fn test_login_failure_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The user name or password is incorrect."
        })))
        .mount(&server)
        .await;

    let client = TposClient::new(&tpos_config(&server.uri()));
    match client.find_product_by_code("AO01").await {
        Err(TposError::AuthenticationFailed(message)) => {
            assert_eq!(message, "The user name or password is incorrect.");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_orders_follows_next_link() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/odata/SaleOnline_Order"))
        .and(query_param("$filter", "Facebook_PostId eq '555'"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"Id": "a", "Code": "SO1", "Facebook_PostId": "555", "TotalQuantity": 2}
            ],
            "@odata.nextLink": format!("{}/odata/SaleOnline_Order?page=2", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/odata/SaleOnline_Order"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"Id": "b", "Code": "SO2", "Facebook_PostId": "555", "TotalQuantity": 1.0}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TposClient::new(&tpos_config(&server.uri()));
    let orders = client.list_sale_online_orders_for_post("555").await.unwrap();

    let codes: Vec<Option<&str>> = orders.iter().map(|o| o.code.as_deref()).collect();
    assert_eq!(codes, [Some("SO1"), Some("SO2")]);
    assert_eq!(orders.iter().map(|o| o.total_units()).sum::<i64>(), 3);
}

#[tokio::test]
async fn test_list_orders_refuses_endless_listing() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/odata/SaleOnline_Order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"Id": "a", "Code": "SO1", "Facebook_PostId": "555", "TotalQuantity": 1}
            ],
            "@odata.nextLink": format!("{}/odata/SaleOnline_Order?page=next", server.uri())
        })))
        .expect(50)
        .mount(&server)
        .await;

    let client = TposClient::new(&tpos_config(&server.uri()));
    let result = client.list_sale_online_orders_for_post("555").await;

    assert!(matches!(result, Err(TposError::TooManyPages(50))));
}

#[tokio::test]
async fn test_create_order_posts_facebook_fields() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/odata/SaleOnline_Order"))
        .and(header("authorization", "Bearer tok"))
        .and(body_partial_json(json!({
            "Facebook_PostId": "555",
            "Facebook_CommentId": "555_1",
            "TotalQuantity": 2
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "Id": "new-order",
            "Code": "SO9",
            "Facebook_PostId": "555",
            "Facebook_CommentId": "555_1",
            "TotalQuantity": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let price = Price::from_dong(150_000);
    let input = SaleOnlineOrderInput {
        name: "Lan".to_string(),
        telephone: None,
        address: None,
        facebook_post_id: Some("555".to_string()),
        facebook_user_id: Some("900".to_string()),
        facebook_user_name: Some("Lan".to_string()),
        facebook_comment_id: Some("555_1".to_string()),
        note: "A1 x2".to_string(),
        total_quantity: 2,
        total_amount: price.times(2).amount(),
        details: vec![SaleOnlineOrderDetail {
            product_id: Some(42),
            product_code: "AO01".to_string(),
            product_name: "Ao thun".to_string(),
            price: price.amount(),
            quantity: 2,
        }],
    };

    let client = TposClient::new(&tpos_config(&server.uri()));
    let created = client.create_sale_online_order(&input).await.unwrap();

    assert_eq!(created.id, "new-order");
    assert_eq!(created.total_units(), 2);
}
