use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};

use crate::error::ApiError;

// --- Core Application Schemas (Mapped to Database) ---

/// UserRole
///
/// The RBAC field carried inside identity tokens and checked by the
/// authorization gate. Exact membership only: admin gains nothing implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "user" => Some(UserRole::User),
            _ => None,
        }
    }
}

/// ProductStatus
///
/// Stock status enumeration, stored as text in the `products` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    OutOfStock,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::OutOfStock => "out_of_stock",
            ProductStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "out_of_stock" => Some(ProductStatus::OutOfStock),
            "inactive" => Some(ProductStatus::Inactive),
            _ => None,
        }
    }
}

/// User
///
/// Canonical identity record from the `users` table. The password hash never
/// leaves the process: it is skipped during serialization, so no projection
/// or response shape can expose it.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: i32,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for User {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let role_raw: String = row.try_get("role")?;
        let role = UserRole::parse(&role_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "role".into(),
            source: format!("unknown role value: {role_raw}").into(),
        })?;
        Ok(User {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            age: row.try_get("age")?,
            role,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Product
///
/// A catalog record from the `products` table. Timestamps serialize under
/// their camelCase wire names, matching the projection column whitelist.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub discount: f64,
    pub rating: f64,
    pub stock: i32,
    pub status: ProductStatus,
    pub image_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for Product {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let status_raw: String = row.try_get("status")?;
        let status =
            ProductStatus::parse(&status_raw).ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "status".into(),
                source: format!("unknown status value: {status_raw}").into(),
            })?;
        Ok(Product {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            discount: row.try_get("discount")?,
            rating: row.try_get("rating")?,
            stock: row.try_get("stock")?,
            status,
            image_url: row.try_get("image_url")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for POST /login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if !self.email.contains('@') {
            return Err(ApiError::Validation(format!(
                "email is not a valid address: {}",
                self.email
            )));
        }
        if self.password.len() < 4 || self.password.len() > 20 {
            return Err(ApiError::Validation(
                "password must be between 4 and 20 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// RegisterRequest
///
/// Input payload for POST /register. The password is hashed before storage
/// and never persisted or logged in clear text.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        if !self.email.contains('@') {
            return Err(ApiError::Validation(format!(
                "email is not a valid address: {}",
                self.email
            )));
        }
        if self.age < 0 {
            return Err(ApiError::Validation(format!(
                "age must be non-negative: {}",
                self.age
            )));
        }
        if self.password.len() < 4 || self.password.len() > 20 {
            return Err(ApiError::Validation(
                "password must be between 4 and 20 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// CreateUserRequest
///
/// Admin payload for POST /users. Unlike registration it may set the role
/// explicitly; the default is the plain user role.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub password: String,
    pub role: Option<UserRole>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        if !self.email.contains('@') {
            return Err(ApiError::Validation(format!(
                "email is not a valid address: {}",
                self.email
            )));
        }
        if self.age < 0 {
            return Err(ApiError::Validation(format!(
                "age must be non-negative: {}",
                self.age
            )));
        }
        if self.password.len() < 4 || self.password.len() > 20 {
            return Err(ApiError::Validation(
                "password must be between 4 and 20 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// UpdateUserRequest
///
/// Partial update payload for PATCH /users/{id}. Only provided fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
}

/// CreateProductRequest
///
/// Input payload for POST /products.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub discount: Option<f64>,
    pub rating: Option<f64>,
    pub stock: i32,
    pub status: ProductStatus,
    pub image_url: Option<String>,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.len() < 2 || self.name.len() > 100 {
            return Err(ApiError::Validation(
                "name must be between 2 and 100 characters".to_string(),
            ));
        }
        if self.description.len() < 10 {
            return Err(ApiError::Validation(
                "description must be at least 10 characters".to_string(),
            ));
        }
        if !(self.price > 0.0) {
            return Err(ApiError::Validation(format!(
                "price must be a positive number: {}",
                self.price
            )));
        }
        if let Some(d) = self.discount {
            if !(0.0..=100.0).contains(&d) {
                return Err(ApiError::Validation(format!(
                    "discount must be between 0 and 100: {d}"
                )));
            }
        }
        if let Some(r) = self.rating {
            if !(0.0..=5.0).contains(&r) {
                return Err(ApiError::Validation(format!(
                    "rating must be between 0 and 5: {r}"
                )));
            }
        }
        if self.stock < 0 {
            return Err(ApiError::Validation(format!(
                "stock must be non-negative: {}",
                self.stock
            )));
        }
        Ok(())
    }
}

/// UpdateProductRequest
///
/// Partial update payload for PATCH /products/{id}. Only provided fields
/// change; the repository keeps existing values for the rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub discount: Option<f64>,
    pub rating: Option<f64>,
    pub stock: Option<i32>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(p) = self.price {
            if !(p > 0.0) {
                return Err(ApiError::Validation(format!(
                    "price must be a positive number: {p}"
                )));
            }
        }
        if let Some(d) = self.discount {
            if !(0.0..=100.0).contains(&d) {
                return Err(ApiError::Validation(format!(
                    "discount must be between 0 and 100: {d}"
                )));
            }
        }
        if let Some(r) = self.rating {
            if !(0.0..=5.0).contains(&r) {
                return Err(ApiError::Validation(format!(
                    "rating must be between 0 and 5: {r}"
                )));
            }
        }
        if let Some(s) = self.stock {
            if s < 0 {
                return Err(ApiError::Validation(format!(
                    "stock must be non-negative: {s}"
                )));
            }
        }
        Ok(())
    }
}

// --- Response Envelopes ---

/// LoginResponse
///
/// Output of POST /login: a freshly issued token plus the matched user.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub data: User,
}

/// Envelope
///
/// Mutation response shape: a short status message plus the affected record.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(message: &str, data: T) -> Self {
        Self {
            message: message.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_wire_names() {
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("user"), Some(UserRole::User));
        assert_eq!(UserRole::parse("superadmin"), None);
        assert_eq!(UserRole::Admin.as_str(), "admin");
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        assert_eq!(ProductStatus::parse("active"), Some(ProductStatus::Active));
        assert_eq!(
            ProductStatus::parse("out_of_stock"),
            Some(ProductStatus::OutOfStock)
        );
        assert_eq!(ProductStatus::parse("ACTIVE"), None);
        assert_eq!(ProductStatus::OutOfStock.as_str(), "out_of_stock");
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: 1,
            name: "a".into(),
            email: "a@b.c".into(),
            age: 30,
            role: UserRole::User,
            password_hash: "secret-hash".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn create_product_rejects_short_description() {
        let req = CreateProductRequest {
            name: "phone".into(),
            description: "short".into(),
            price: 10.0,
            discount: None,
            rating: None,
            stock: 1,
            status: ProductStatus::Active,
            image_url: None,
        };
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }
}
