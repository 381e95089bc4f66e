use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};

use crate::{
    AppState,
    auth::Identity,
    error::ApiError,
    models::{
        CreateProductRequest, CreateUserRequest, Envelope, LoginRequest, LoginResponse, Product,
        RegisterRequest, UpdateProductRequest, UpdateUserRequest, User, UserRole,
    },
    policy::Endpoint,
    query::{self, ListCriteria, PagedResult, RawListQuery},
    repository::NewUser,
};

// Every handler runs the same pipeline shape: gate check first (policy
// lookup, authentication, role authorization), then input validation, then
// the storage call. The first failure short-circuits the rest.

/// health
///
/// [Public Route] Liveness probe for monitoring and load balancers. Runs the
/// same gate pipeline as every other handler; the registry resolves it to the
/// open default, so a stale or garbled token never blocks it.
pub async fn health(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<&'static str, ApiError> {
    state.gate.check(Endpoint::Health, &headers)?;
    Ok("ok")
}

// --- Auth ---

/// login
///
/// [Public Route] Verifies the credentials against the stored bcrypt hash and
/// issues a fresh identity token. The token carries the role at issue time;
/// later role changes in storage do not affect it until reissue.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    state.gate.check(Endpoint::Login, &headers)?;
    payload.validate()?;

    let user = state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    let matches = bcrypt::verify(&payload.password, &user.password_hash).map_err(|e| {
        tracing::error!("bcrypt verification failed: {:?}", e);
        ApiError::Internal
    })?;
    if !matches {
        return Err(ApiError::Conflict("given password is wrong".to_string()));
    }

    let token = state
        .gate
        .codec()
        .issue(&Identity {
            subject_id: user.id,
            role: user.role,
        })
        .map_err(|_| ApiError::Internal)?;

    Ok(Json(LoginResponse {
        message: "welcome".to_string(),
        token,
        data: user,
    }))
}

/// register
///
/// [Public Route] Creates a plain-role user. The password is hashed with
/// bcrypt before it reaches the repository.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Envelope<User>>, ApiError> {
    state.gate.check(Endpoint::Register, &headers)?;
    payload.validate()?;

    if state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("user already exists".to_string()));
    }

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("bcrypt hashing failed: {:?}", e);
        ApiError::Internal
    })?;

    let user = state
        .repo
        .create_user(NewUser {
            name: payload.name,
            email: payload.email,
            age: payload.age,
            role: UserRole::User,
            password_hash,
        })
        .await?;

    Ok(Json(Envelope::new("success", user)))
}

// --- Users ---

/// get_users
///
/// [Admin Route] Lists users through the full pipeline: gates, criteria
/// parsing against the users schema, bounded query, projection.
pub async fn get_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(raw): Query<RawListQuery>,
) -> Result<Json<PagedResult<serde_json::Value>>, ApiError> {
    state.gate.check(Endpoint::UsersList, &headers)?;

    let criteria = ListCriteria::parse(&raw, &query::USERS)?;
    let (count, rows) = state.repo.list_users(&criteria).await?;
    let data = query::project(&rows, &criteria.fields);

    Ok(Json(PagedResult {
        count,
        limit: criteria.limit,
        page: criteria.page,
        data,
    }))
}

/// create_user
///
/// [Admin Route] Creates a user with an explicit role (defaults to the plain
/// user role when omitted).
pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<Envelope<User>>, ApiError> {
    state.gate.check(Endpoint::UsersCreate, &headers)?;
    payload.validate()?;

    if state
        .repo
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("user already exists".to_string()));
    }

    let password_hash = bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!("bcrypt hashing failed: {:?}", e);
        ApiError::Internal
    })?;

    let user = state
        .repo
        .create_user(NewUser {
            name: payload.name,
            email: payload.email,
            age: payload.age,
            role: payload.role.unwrap_or(UserRole::User),
            password_hash,
        })
        .await?;

    Ok(Json(Envelope::new("created", user)))
}

/// update_user
///
/// [Authenticated Route, roles admin+user] Partial update of a user record.
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Envelope<User>>, ApiError> {
    state.gate.check(Endpoint::UsersUpdate, &headers)?;

    let user = state
        .repo
        .update_user(id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    Ok(Json(Envelope::new("success", user)))
}

/// delete_user
///
/// [Admin Route] Removes a user and returns the removed record.
pub async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<User>>, ApiError> {
    state.gate.check(Endpoint::UsersDelete, &headers)?;

    let user = state
        .repo
        .delete_user(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    Ok(Json(Envelope::new("deleted", user)))
}

// --- Products ---

/// get_products
///
/// [Admin Route] Lists products through the full pipeline. The criteria
/// parser bounds pagination, whitelists sort/status/projection fields, and
/// the repository compiles the result into a bound-parameter query; `count`
/// reflects the filter before pagination.
pub async fn get_products(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(raw): Query<RawListQuery>,
) -> Result<Json<PagedResult<serde_json::Value>>, ApiError> {
    state.gate.check(Endpoint::ProductsList, &headers)?;

    let criteria = ListCriteria::parse(&raw, &query::PRODUCTS)?;
    let (count, rows) = state.repo.list_products(&criteria).await?;
    let data = query::project(&rows, &criteria.fields);

    Ok(Json(PagedResult {
        count,
        limit: criteria.limit,
        page: criteria.page,
        data,
    }))
}

/// create_product
///
/// [Authenticated Route, roles admin+user] Creates a product; product names
/// are unique.
pub async fn create_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<Envelope<Product>>, ApiError> {
    state.gate.check(Endpoint::ProductsCreate, &headers)?;
    payload.validate()?;

    if state
        .repo
        .find_product_by_name(&payload.name)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("product already exists".to_string()));
    }

    let product = state.repo.create_product(&payload).await?;
    Ok(Json(Envelope::new("created", product)))
}

/// update_product
///
/// [Admin Route] Partial update of a product record.
pub async fn update_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Envelope<Product>>, ApiError> {
    state.gate.check(Endpoint::ProductsUpdate, &headers)?;
    payload.validate()?;

    let product = state
        .repo
        .update_product(id, &payload)
        .await?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    Ok(Json(Envelope::new("success", product)))
}

/// delete_product
///
/// [Admin Route] Removes a product and returns the removed record.
pub async fn delete_product(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<Product>>, ApiError> {
    state.gate.check(Endpoint::ProductsDelete, &headers)?;

    let product = state
        .repo
        .delete_product(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    Ok(Json(Envelope::new("deleted", product)))
}
