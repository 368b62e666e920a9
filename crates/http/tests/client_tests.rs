//! Integration tests for the dealdesk HTTP client

use dealdesk_core::{ClientConfig, CredentialPair, CredentialStore, MemoryCredentialStore};
use dealdesk_http::client::{ApiClient, ApiClientBuilder, error::ClientError};
use dealdesk_http::types::{BranchInput, OrderStatus, ProductInput};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authenticated_client(server: &MockServer) -> (ApiClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
        "access-1",
        "refresh-1",
    )));
    let client = ApiClient::builder()
        .base_url(server.uri())
        .credentials(store.clone())
        .build()
        .unwrap();
    (client, store)
}

#[tokio::test]
async fn test_client_builder() {
    let client = ApiClient::builder()
        .base_url("http://localhost:8000/api/")
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8000/api");
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = ApiClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_builder_from_config() {
    let config = ClientConfig {
        base_url: "https://merchant.example.com/api".to_string(),
        ..ClientConfig::default()
    };
    let client = ApiClientBuilder::from_config(&config).build().unwrap();
    assert_eq!(client.base_url(), "https://merchant.example.com/api");
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/store/"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "Corner Bakery",
            "is_active": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);
    let store = client.get_store().await.unwrap();
    assert_eq!(store.name, "Corner Bakery");
    assert!(store.is_active);
}

#[tokio::test]
async fn test_caller_authorization_header_is_replaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/store/"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_static("Bearer forged"),
    );

    let response = client
        .request(Method::GET, "/store/", None, Some(headers))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_no_token_sends_no_authorization() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/store/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = ApiClient::new(mock_server.uri()).unwrap();
    let _: Value = client.get("/store/").await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_error_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/9/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/branches/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);

    let result = client.get_product(9).await;
    assert!(matches!(result, Err(ClientError::NotFound(_))));

    let result = client.list_orders(None).await;
    assert!(matches!(
        result,
        Err(ClientError::ServerError { status: 500, .. })
    ));

    let result = client.create_branch(&BranchInput::default()).await;
    assert!(matches!(result, Err(ClientError::Forbidden(_))));
}

#[tokio::test]
async fn test_network_error_passes_through() {
    // Nothing listens on the discard port
    let client = ApiClient::new("http://127.0.0.1:9").unwrap();
    let result: Result<Value, _> = client.get("/store/").await;
    assert!(matches!(result, Err(ClientError::Request(_))));
}

#[tokio::test]
async fn test_list_products_with_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 21,
            "next": null,
            "previous": "http://localhost/products/?page=1",
            "results": [{
                "id": 21,
                "title": "Croissant",
                "price": "45000.00",
                "is_active": true
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);
    let page = client.list_products(Some(2)).await.unwrap();

    assert_eq!(page.count, 21);
    assert!(!page.has_next());
    assert_eq!(page.results[0].title, "Croissant");
    assert_eq!(page.results[0].price, "45000.00");
}

#[tokio::test]
async fn test_create_product_sends_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/products/"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "title": "Baguette", "price": "30000.00" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 5,
            "title": "Baguette",
            "price": "30000.00"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);
    let product = client
        .create_product(&ProductInput {
            title: Some("Baguette".to_string()),
            price: Some("30000.00".to_string()),
            ..ProductInput::default()
        })
        .await
        .unwrap();

    assert_eq!(product.id, 5);
    assert!(!product.is_active);
}

#[tokio::test]
async fn test_delete_branch_accepts_empty_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/branches/3/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);
    client.delete_branch(3).await.unwrap();
}

#[tokio::test]
async fn test_get_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/orders/42/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "status": "paid",
            "total": "90000.00",
            "created_at": "2024-05-04T08:30:00Z",
            "items": [
                { "product": 5, "title": "Baguette", "quantity": 3, "price": "30000.00" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let (client, _) = authenticated_client(&mock_server);
    let order = client.get_order(42).await.unwrap();

    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 3);
}

#[tokio::test]
async fn test_login_stores_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token/"))
        .and(body_json(json!({ "username": "merchant", "password": "secret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "access-1",
            "refresh": "refresh-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .credentials(store.clone())
        .build()
        .unwrap();

    client.login("merchant", "secret").await.unwrap();

    assert!(client.is_authenticated());
    assert_eq!(store.pair(), Some(CredentialPair::new("access-1", "refresh-1")));

    client.logout().unwrap();
    assert!(store.pair().is_none());
}

#[tokio::test]
async fn test_rejected_login_does_not_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, store) = authenticated_client(&mock_server);
    let result = client.login("merchant", "wrong").await;

    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    // A failed login leaves the existing session alone
    assert_eq!(store.access_token().as_deref(), Some("access-1"));
}
