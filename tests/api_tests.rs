use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use shop_api::{
    AppConfig, AppState, InMemoryRepository, create_router,
    auth::{Identity, TokenCodec},
    models::{CreateProductRequest, ProductStatus, UserRole},
    policy::{AccessGate, PolicyRegistry},
    repository::{NewUser, Repository, RepositoryState},
};

const TEST_JWT_SECRET: &str = "super-secure-test-secret-value-local";

struct TestApp {
    address: String,
    repo: Arc<InMemoryRepository>,
    codec: TokenCodec,
}

impl TestApp {
    fn bearer(&self, subject_id: i64, role: UserRole) -> String {
        let token = self
            .codec
            .issue(&Identity { subject_id, role })
            .expect("token issue failed");
        format!("Bearer {token}")
    }
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let config = AppConfig::default();

    let gate = Arc::new(AccessGate::new(
        PolicyRegistry::new(),
        TokenCodec::new(&config.jwt_secret, config.token_ttl_hours),
    ));

    let state = AppState {
        repo: repo.clone() as RepositoryState,
        gate,
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        repo,
        codec: TokenCodec::new(TEST_JWT_SECRET, 24),
    }
}

fn product(name: &str, price: f64, status: ProductStatus) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        description: "a perfectly adequate description".to_string(),
        price,
        discount: None,
        rating: None,
        stock: 5,
        status,
        image_url: None,
    }
}

async fn seed_catalog(app: &TestApp) {
    // Seven active products inside [100, 500], plus records outside the
    // range or with other statuses.
    for (i, price) in [100.0, 150.0, 200.0, 250.0, 300.0, 400.0, 500.0]
        .iter()
        .enumerate()
    {
        app.repo
            .create_product(&product(&format!("in-range-{i}"), *price, ProductStatus::Active))
            .await
            .unwrap();
    }
    app.repo
        .create_product(&product("too-cheap", 40.0, ProductStatus::Active))
        .await
        .unwrap();
    app.repo
        .create_product(&product("too-dear", 1200.0, ProductStatus::Active))
        .await
        .unwrap();
    app.repo
        .create_product(&product("sold-out", 300.0, ProductStatus::OutOfStock))
        .await
        .unwrap();
}

// --- Unprotected endpoints ---

#[tokio::test]
async fn health_check_is_open_to_anyone() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // A garbled token on an open endpoint is ignored, not rejected.
    let response = client
        .get(format!("{}/health", app.address))
        .header("Authorization", "Bearer complete-garbage")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

// --- Authentication gate ---

#[tokio::test]
async fn protected_endpoint_rejects_missing_and_malformed_headers() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let url = format!("{}/products", app.address);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(&url)
        .header("Authorization", "Token abcdef")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_endpoint_rejects_expired_and_tampered_tokens() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let url = format!("{}/products", app.address);

    // Correct secret, already expired.
    let stale_codec = TokenCodec::new(TEST_JWT_SECRET, -2);
    let expired = stale_codec
        .issue(&Identity {
            subject_id: 1,
            role: UserRole::Admin,
        })
        .unwrap();
    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {expired}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Valid shape, wrong signature.
    let forged_codec = TokenCodec::new("attacker-controlled-secret", 24);
    let forged = forged_codec
        .issue(&Identity {
            subject_id: 1,
            role: UserRole::Admin,
        })
        .unwrap();
    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {forged}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Role authorization gate ---

#[tokio::test]
async fn product_listing_is_admin_only() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let url = format!("{}/products", app.address);

    // Role denial uses the API's historical 406 status.
    let response = client
        .get(&url)
        .header("Authorization", app.bearer(2, UserRole::User))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

    let response = client
        .get(&url)
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn plain_users_may_create_products_but_not_modify_them() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // POST /products allows [admin, user].
    let response = client
        .post(format!("{}/products", app.address))
        .header("Authorization", app.bearer(2, UserRole::User))
        .json(&json!({
            "name": "iphone 16 pro",
            "description": "a perfectly adequate description",
            "price": 999.99,
            "stock": 50,
            "status": "active"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "created");
    let id = body["data"]["id"].as_i64().unwrap();

    // PATCH /products/{id} allows only admin.
    let response = client
        .patch(format!("{}/products/{id}", app.address))
        .header("Authorization", app.bearer(2, UserRole::User))
        .json(&json!({ "price": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn token_role_is_not_revalidated_against_storage() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // The stored user is an admin, but the token was issued while the role
    // was plain user. The gate trusts the token until it is reissued.
    let user = app
        .repo
        .create_user(NewUser {
            name: "promoted".into(),
            email: "promoted@example.com".into(),
            age: 30,
            role: UserRole::Admin,
            password_hash: "irrelevant".into(),
        })
        .await
        .unwrap();

    let response = client
        .get(format!("{}/products", app.address))
        .header("Authorization", app.bearer(user.id, UserRole::User))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

// --- Listing pipeline ---

#[tokio::test]
async fn listing_defaults_to_first_page_of_ten() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    seed_catalog(&app).await;

    let response = client
        .get(format!("{}/products", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], 10);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["page"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn filtered_listing_counts_before_pagination() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    seed_catalog(&app).await;

    let response = client
        .get(format!(
            "{}/products?minPrice=100&maxPrice=500&status=active&page=2&limit=5",
            app.address
        ))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    // Seven active products fall inside [100, 500]; page 2 with limit 5
    // means offset 5, so two rows remain.
    assert_eq!(body["count"], 7);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["page"], 2);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    for item in data {
        let price = item["price"].as_f64().unwrap();
        assert!((100.0..=500.0).contains(&price));
        assert_eq!(item["status"], "active");
    }
}

#[tokio::test]
async fn sorted_listing_honors_whitelisted_key_and_defaults_descending() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    seed_catalog(&app).await;

    let response = client
        .get(format!("{}/products?sortField=price&limit=3", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let prices: Vec<f64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices, vec![1200.0, 500.0, 400.0]);

    // Unknown sort keys fail the request.
    let response = client
        .get(format!("{}/products?sortField=password", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn projection_is_whitelisted_and_defaults_to_all_columns() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    seed_catalog(&app).await;
    let admin = app.bearer(1, UserRole::Admin);

    // Explicit projection returns exactly the requested keys.
    let response = client
        .get(format!("{}/products?fields=name,price", app.address))
        .header("Authorization", &admin)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let first = body["data"][0].as_object().unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.contains_key("name"));
    assert!(first.contains_key("price"));

    // A non-whitelisted column fails the whole request and names the value.
    let response = client
        .get(format!("{}/products?fields=name,secret_column", app.address))
        .header("Authorization", &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("secret_column")
    );

    // An empty fields value yields the full whitelisted column set.
    let response = client
        .get(format!("{}/products?fields=", app.address))
        .header("Authorization", &admin)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let first = body["data"][0].as_object().unwrap();
    assert_eq!(first.len(), 11);
    assert!(first.contains_key("createdAt"));
    assert!(first.contains_key("image_url"));
}

#[tokio::test]
async fn invalid_pagination_values_fail_with_the_value_named() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/products?page=zero", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("zero"));

    // A page whose offset does not fit in an i64 is rejected, not computed.
    let response = client
        .get(format!(
            "{}/products?page=9223372036854775807&limit=10",
            app.address
        ))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Users resource ---

#[tokio::test]
async fn user_listing_never_exposes_password_hashes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.repo
        .create_user(NewUser {
            name: "akhmed".into(),
            email: "akhmed@gmail.com".into(),
            age: 25,
            role: UserRole::User,
            password_hash: "bcrypt-hash-here".into(),
        })
        .await
        .unwrap();

    let response = client
        .get(format!("{}/users", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let first = body["data"][0].as_object().unwrap();
    assert!(first.contains_key("email"));
    assert!(!first.contains_key("password_hash"));

    // Price filters do not exist on the users resource.
    let response = client
        .get(format!("{}/users?minPrice=10", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_manages_users_end_to_end() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = app.bearer(1, UserRole::Admin);

    // POST /users may set the role explicitly, unlike registration.
    let response = client
        .post(format!("{}/users", app.address))
        .header("Authorization", &admin)
        .json(&json!({
            "name": "dina",
            "email": "dina@example.com",
            "age": 31,
            "password": "dina1234",
            "role": "admin"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "created");
    assert_eq!(body["data"]["role"], "admin");
    assert!(body["data"].get("password_hash").is_none());
    let id = body["data"]["id"].as_i64().unwrap();

    // PATCH /users/{id} is open to both roles and only changes the supplied
    // fields.
    let response = client
        .patch(format!("{}/users/{id}", app.address))
        .header("Authorization", app.bearer(id, UserRole::User))
        .json(&json!({ "name": "dina renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["name"], "dina renamed");
    assert_eq!(body["data"]["email"], "dina@example.com");

    // DELETE /users/{id} returns the removed record once, then 404.
    let response = client
        .delete(format!("{}/users/{id}", app.address))
        .header("Authorization", &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "deleted");

    let response = client
        .delete(format!("{}/users/{id}", app.address))
        .header("Authorization", &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Updates against a missing id are also not found.
    let response = client
        .patch(format!("{}/users/{id}", app.address))
        .header("Authorization", &admin)
        .json(&json!({ "name": "ghost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- Identity flow ---

#[tokio::test]
async fn register_login_and_spend_the_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/register", app.address))
        .json(&json!({
            "name": "akhmed",
            "email": "akhmed@gmail.com",
            "age": 25,
            "password": "akhmed"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Duplicate registration conflicts.
    let response = client
        .post(format!("{}/register", app.address))
        .json(&json!({
            "name": "akhmed",
            "email": "akhmed@gmail.com",
            "age": 25,
            "password": "akhmed"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Wrong password is rejected.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&json!({ "email": "akhmed@gmail.com", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Unknown email is not found.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&json!({ "email": "nobody@gmail.com", "password": "akhmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Correct credentials yield a usable token with the plain user role.
    let response = client
        .post(format!("{}/login", app.address))
        .json(&json!({ "email": "akhmed@gmail.com", "password": "akhmed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["data"].get("password_hash").is_none());

    // The token works where users are allowed...
    let response = client
        .post(format!("{}/products", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .json(&json!({
            "name": "desk lamp",
            "description": "a perfectly adequate description",
            "price": 35.0,
            "stock": 3,
            "status": "active"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // ...and is denied where only admins are.
    let response = client
        .get(format!("{}/products", app.address))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn duplicate_product_names_conflict() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.repo
        .create_product(&product("Laptop", 1200.0, ProductStatus::Active))
        .await
        .unwrap();

    let response = client
        .post(format!("{}/products", app.address))
        .header("Authorization", app.bearer(1, UserRole::Admin))
        .json(&json!({
            "name": "Laptop",
            "description": "a perfectly adequate description",
            "price": 1100.0,
            "stock": 2,
            "status": "active"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
