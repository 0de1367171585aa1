use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use itemgate::{
    config::Config, repositories::InMemoryStore, router::create_router, state::AppState,
};

fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut pairs = vec![
        ("jwt_secret", "integration-test-secret"),
        ("argon2_memory_kib", "1024"),
        ("argon2_iterations", "1"),
        ("argon2_parallelism", "1"),
    ];
    pairs.extend_from_slice(extra);
    Config::from_pairs(pairs).unwrap()
}

fn app_with(extra: &[(&str, &str)]) -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let state = AppState::with_store(store.clone(), test_config(extra)).unwrap();
    (create_router(state), store)
}

fn app() -> Router {
    app_with(&[]).0
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

async fn signup(app: &Router, email: &str, username: &str) -> Value {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({
            "email": email,
            "username": username,
            "password": "Secret123!",
            "full_name": "Test <User>",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    (status, body)
}

async fn token_for(app: &Router, email: &str, username: &str) -> String {
    signup(app, email, username).await;
    let (status, body) = login(app, username, "Secret123!").await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_item(app: &Router, token: &str, body: Value) -> Value {
    let (status, _, item) = send(app, Method::POST, "/api/items", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    item
}

#[tokio::test]
async fn health_and_root() {
    let app = app();
    let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn security_headers_on_every_response() {
    let app = app();
    for uri in ["/health", "/api/auth/me"] {
        let (_, headers, _) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert_eq!(
            headers["strict-transport-security"],
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(headers["content-security-policy"], "default-src 'self'");
    }
}

#[tokio::test]
async fn signup_returns_user_without_secrets() {
    let app = app();
    let user = signup(&app, "  Alice@Example.com ", "alice").await;
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["username"], "alice");
    assert_eq!(user["full_name"], "Test &lt;User&gt;");
    assert_eq!(user["is_active"], true);
    assert!(user.get("password_hash").is_none());
    assert!(user.get("reset_token_hash").is_none());
}

#[tokio::test]
async fn signup_conflicts_on_email_or_username() {
    let app = app();
    signup(&app, "alice@example.com", "alice").await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"email": "alice@example.com", "username": "alice2", "password": "Secret123!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        None,
        Some(json!({"email": "other@example.com", "username": "alice", "password": "Secret123!"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn signup_rejects_invalid_input() {
    let app = app();
    for body in [
        json!({"email": "not-an-email", "username": "alice", "password": "Secret123!"}),
        json!({"email": "a@example.com", "username": "a!", "password": "Secret123!"}),
        json!({"email": "a@example.com", "username": "alice", "password": "short"}),
        json!({"email": "a@example.com"}),
    ] {
        let (status, _, error) =
            send(&app, Method::POST, "/api/auth/signup", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error["error"].is_string());
    }
}

#[tokio::test]
async fn login_then_me() {
    let app = app();
    signup(&app, "alice@example.com", "alice").await;

    let (status, body) = login(&app, "alice", "Secret123!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["username"], "alice");
    let token = body["access_token"].as_str().unwrap();

    let (status, _, me) = send(&app, Method::GET, "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
}

#[tokio::test]
async fn me_without_valid_token_is_unauthenticated() {
    let app = app();

    let (status, headers, body) = send(&app, Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    assert!(body["error"].is_string());

    let (status, headers, _) =
        send(&app, Method::GET, "/api/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = app();
    signup(&app, "alice@example.com", "alice").await;

    let (wrong_status, wrong_body) = login(&app, "alice", "WrongPass1!").await;
    let (unknown_status, unknown_body) = login(&app, "nobody", "Secret123!").await;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn deactivated_user_loses_access() {
    let (app, store) = app_with(&[]);
    let token = token_for(&app, "alice@example.com", "alice").await;
    let (_, _, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;

    store.set_user_active(me["id"].as_i64().unwrap(), false).await;

    let (status, _, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "alice", "Secret123!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owner_scoped_item_lifecycle() {
    let app = app();
    let alice = token_for(&app, "alice@example.com", "alice").await;
    let bob = token_for(&app, "bob@example.com", "bob").await;

    let item = create_item(&app, &alice, json!({"name": "Laptop", "price": 999.0, "quantity": 1})).await;
    let uri = format!("/api/items/{}", item["id"]);

    // 読み取りは誰でも可能
    let (status, _, read) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["name"], "Laptop");

    // 所有者以外の変更は 403
    let (status, _, _) = send(&app, Method::PATCH, &uri, Some(&bob), Some(json!({"name": "Mine"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 未認証は所有者チェックより先に 401
    let (status, _, _) = send(&app, Method::PATCH, &uri, None, Some(json!({"name": "Mine"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 所有者の部分更新
    let (status, _, patched) =
        send(&app, Method::PATCH, &uri, Some(&alice), Some(json!({"quantity": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["quantity"], 5);
    assert_eq!(patched["name"], "Laptop");
    assert_eq!(patched["owner_id"], item["owner_id"]);

    // 所有者の削除
    let (status, _, body) = send(&app, Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _, _) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn item_responses_embed_owner() {
    let app = app();
    let user = signup(&app, "alice@example.com", "alice").await;
    let (_, body) = login(&app, "alice", "Secret123!").await;
    let alice = body["access_token"].as_str().unwrap().to_string();

    let item = create_item(&app, &alice, json!({"name": "Laptop"})).await;
    assert_eq!(item["owner"]["id"], user["id"]);
    assert_eq!(item["owner"]["username"], "alice");
    assert_eq!(item["owner"]["full_name"], user["full_name"]);
    assert!(item["owner"].get("email").is_none());
    assert!(item["owner"].get("password_hash").is_none());

    let uri = format!("/api/items/{}", item["id"]);
    let (_, _, read) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(read["owner"]["username"], "alice");

    let (_, _, list) = send(&app, Method::GET, "/api/items", Some(&alice), None).await;
    assert_eq!(list["items"][0]["owner"]["username"], "alice");

    let (_, _, patched) =
        send(&app, Method::PATCH, &uri, Some(&alice), Some(json!({"quantity": 2}))).await;
    assert_eq!(patched["owner"]["username"], "alice");

    let (_, _, replaced) =
        send(&app, Method::PUT, &uri, Some(&alice), Some(json!({"name": "Desk"}))).await;
    assert_eq!(replaced["owner"]["username"], "alice");
}

#[tokio::test]
async fn put_replaces_all_fields() {
    let app = app();
    let alice = token_for(&app, "alice@example.com", "alice").await;
    let item = create_item(
        &app,
        &alice,
        json!({"name": "Laptop", "description": "dev", "category": "Electronics", "price": 10.0, "quantity": 2}),
    )
    .await;
    let uri = format!("/api/items/{}", item["id"]);

    let (status, _, replaced) =
        send(&app, Method::PUT, &uri, Some(&alice), Some(json!({"name": "Desk"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["name"], "Desk");
    assert_eq!(replaced["description"], Value::Null);
    assert_eq!(replaced["category"], Value::Null);
    assert_eq!(replaced["price"], 0.0);
    assert_eq!(replaced["quantity"], 0);
    assert_eq!(replaced["is_active"], true);
}

#[tokio::test]
async fn item_routes_require_authentication() {
    let app = app();
    for (method, uri) in [
        (Method::GET, "/api/items"),
        (Method::GET, "/api/items/stats"),
        (Method::GET, "/api/items/1"),
        (Method::DELETE, "/api/items/1"),
    ] {
        let (status, headers, _) = send(&app, method, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    }
}

#[tokio::test]
async fn list_filters_sorts_and_paginates() {
    let app = app();
    let alice = token_for(&app, "alice@example.com", "alice").await;
    let bob = token_for(&app, "bob@example.com", "bob").await;

    create_item(&app, &alice, json!({"name": "Laptop", "category": "Electronics", "price": 900.0})).await;
    create_item(&app, &alice, json!({"name": "Mouse", "category": "Electronics", "price": 20.0})).await;
    create_item(&app, &alice, json!({"name": "Chair", "description": "office chair", "category": "Furniture", "price": 150.0})).await;
    let bobs = create_item(&app, &bob, json!({"name": "Lamp", "price": 30.0})).await;

    let (status, _, page) =
        send(&app, Method::GET, "/api/items?sort_by=price&order=asc&limit=2", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 4);
    assert_eq!(page["limit"], 2);
    let names: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Mouse", "Lamp"]);

    let (_, _, page) =
        send(&app, Method::GET, "/api/items?category=Electronics", Some(&alice), None).await;
    assert_eq!(page["total"], 2);

    let (_, _, page) = send(&app, Method::GET, "/api/items?search=OFFICE", Some(&alice), None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name"], "Chair");

    let uri = format!("/api/items?owner_id={}", bobs["owner_id"]);
    let (_, _, page) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name"], "Lamp");
}

#[tokio::test]
async fn list_rejects_invalid_parameters() {
    let app = app();
    let alice = token_for(&app, "alice@example.com", "alice").await;
    for uri in [
        "/api/items?sort_by=password_hash",
        "/api/items?order=sideways",
        "/api/items?limit=0",
        "/api/items?limit=101",
        "/api/items?skip=-1",
        "/api/items?skip=abc",
    ] {
        let (status, _, body) = send(&app, Method::GET, uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn stats_cover_only_own_items() {
    let app = app();
    let alice = token_for(&app, "alice@example.com", "alice").await;
    let bob = token_for(&app, "bob@example.com", "bob").await;

    create_item(&app, &alice, json!({"name": "Laptop", "category": "Electronics", "price": 100.0, "quantity": 2})).await;
    create_item(&app, &alice, json!({"name": "Pen", "price": 1.5, "quantity": 4})).await;
    create_item(&app, &bob, json!({"name": "Lamp", "category": "Home", "price": 30.0, "quantity": 1})).await;

    let (status, _, stats) = send(&app, Method::GET, "/api/items/stats", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_items"], 2);
    assert_eq!(stats["total_value"], 206.0);
    assert_eq!(stats["recent_items"], 2);
    assert_eq!(stats["categories"], json!([{"name": "Electronics", "count": 1}]));
}

#[tokio::test]
async fn password_reset_flow() {
    let app = app();
    signup(&app, "alice@example.com", "alice").await;

    let forgot = |email: &'static str| {
        let app = app.clone();
        async move {
            send(
                &app,
                Method::POST,
                "/api/auth/forgot-password",
                None,
                Some(json!({ "email": email })),
            )
            .await
        }
    };

    let (status, _, first) = forgot("alice@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["expires_in"], 3600);
    let first_ticket = first["reset_token"].as_str().unwrap().to_string();

    // 再発行で古いチケットは無効
    let (_, _, second) = forgot("ALICE@example.com").await;
    let second_ticket = second["reset_token"].as_str().unwrap().to_string();
    assert_ne!(first_ticket, second_ticket);

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({"reset_token": first_ticket, "new_password": "NewSecret456!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // `token` 別名も受け付ける
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({"token": second_ticket, "new_password": "NewSecret456!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // 消費済みチケットは再利用不可
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/auth/reset-password",
        None,
        Some(json!({"reset_token": second_ticket, "new_password": "Another789!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = login(&app, "alice", "Secret123!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "alice", "NewSecret456!").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn forgot_password_does_not_reveal_unknown_email() {
    let app = app();
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/forgot-password",
        None,
        Some(json!({"email": "nobody@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("reset_token").is_none());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn email_delivery_keeps_ticket_out_of_body() {
    let (app, store) = app_with(&[("reset_ticket_delivery", "email")]);
    signup(&app, "alice@example.com", "alice").await;

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/forgot-password",
        None,
        Some(json!({"email": "alice@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("reset_token").is_none());

    use itemgate::repositories::UserRepository;
    let user = store.find_by_email("alice@example.com").await.unwrap().unwrap();
    assert!(user.reset_token_hash.is_some());
}

#[tokio::test]
async fn malformed_json_is_validation_error() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
