use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, query_builder::QueryBuilder};

use crate::{
    error::ApiError,
    models::{
        CreateProductRequest, Product, UpdateProductRequest, UpdateUserRequest, User, UserRole,
    },
    query::{ListCriteria, Sort, SortOrder, sql_ident},
};

/// NewUser
///
/// Internal insertion record for the users table. Built by handlers after
/// hashing the password; the clear-text password never reaches this layer.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub age: i32,
    pub role: UserRole,
    pub password_hash: String,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers talk to
/// this trait only, so the storage engine stays an external collaborator.
///
/// Listing methods take validated ListCriteria and return
/// `(count, rows)`: the total number of records matching the filter before
/// pagination, plus the filtered/sorted/paginated slice. Projection happens
/// above this layer.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Products ---
    async fn list_products(&self, criteria: &ListCriteria)
    -> Result<(i64, Vec<Product>), ApiError>;
    async fn find_product_by_id(&self, id: i64) -> Result<Option<Product>, ApiError>;
    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>, ApiError>;
    async fn create_product(&self, req: &CreateProductRequest) -> Result<Product, ApiError>;
    // Partial update; returns None when the id does not exist.
    async fn update_product(
        &self,
        id: i64,
        req: &UpdateProductRequest,
    ) -> Result<Option<Product>, ApiError>;
    // Returns the deleted record, None when the id does not exist.
    async fn delete_product(&self, id: i64) -> Result<Option<Product>, ApiError>;

    // --- Users ---
    async fn list_users(&self, criteria: &ListCriteria) -> Result<(i64, Vec<User>), ApiError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn create_user(&self, user: NewUser) -> Result<User, ApiError>;
    async fn update_user(
        &self,
        id: i64,
        req: &UpdateUserRequest,
    ) -> Result<Option<User>, ApiError>;
    async fn delete_user(&self, id: i64) -> Result<Option<User>, ApiError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, discount, rating, stock, status, image_url, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, age, role, password_hash, created_at, updated_at";

/// PostgresRepository
///
/// Production implementation backed by PostgreSQL. List queries are compiled
/// from ListCriteria with QueryBuilder: every caller-supplied value is bound
/// as a parameter, and the only interpolated identifiers are the `'static`
/// sort fields drawn from the schema whitelists.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the conjunction filter shared by the row query and the count
/// query. Absent criteria impose no constraint.
fn push_product_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, criteria: &ListCriteria) {
    if let Some(min) = criteria.min_price {
        builder.push(" AND price >= ");
        builder.push_bind(min);
    }
    if let Some(max) = criteria.max_price {
        builder.push(" AND price <= ");
        builder.push_bind(max);
    }
    if let Some(status) = criteria.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
}

/// Appends the sort and pagination clauses. An omitted sort leaves the
/// ordering store-defined.
fn push_sort_and_page(builder: &mut QueryBuilder<'_, sqlx::Postgres>, criteria: &ListCriteria) {
    if let Some(Sort { field, order }) = criteria.sort {
        builder.push(" ORDER BY ");
        builder.push(sql_ident(field));
        builder.push(" ");
        builder.push(order.as_sql());
    }
    builder.push(" LIMIT ");
    builder.push_bind(criteria.limit);
    builder.push(" OFFSET ");
    builder.push_bind(criteria.offset());
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_products(
        &self,
        criteria: &ListCriteria,
    ) -> Result<(i64, Vec<Product>), ApiError> {
        // Count first, against the same filter but ignoring pagination.
        let mut count_builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM products WHERE 1=1");
        push_product_filters(&mut count_builder, criteria);
        let count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1"
        ));
        push_product_filters(&mut builder, criteria);
        push_sort_and_page(&mut builder, criteria);

        let rows = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        Ok((count, rows))
    }

    async fn find_product_by_id(&self, id: i64) -> Result<Option<Product>, ApiError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>, ApiError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn create_product(&self, req: &CreateProductRequest) -> Result<Product, ApiError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products
                (name, description, price, discount, rating, stock, status, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.price)
        .bind(req.discount.unwrap_or(0.0))
        .bind(req.rating.unwrap_or(0.0))
        .bind(req.stock)
        .bind(req.status.as_str())
        .bind(&req.image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: i64,
        req: &UpdateProductRequest,
    ) -> Result<Option<Product>, ApiError> {
        // COALESCE keeps existing values for fields not supplied.
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                discount = COALESCE($5, discount),
                rating = COALESCE($6, rating),
                stock = COALESCE($7, stock),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.price)
        .bind(req.discount)
        .bind(req.rating)
        .bind(req.stock)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn delete_product(&self, id: i64) -> Result<Option<Product>, ApiError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn list_users(&self, criteria: &ListCriteria) -> Result<(i64, Vec<User>), ApiError> {
        // Users carry no filterable criteria; the parser rejects price and
        // status parameters for this resource.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1"));
        push_sort_and_page(&mut builder, criteria);

        let rows = builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;

        Ok((count, rows))
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, ApiError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, age, role, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.age)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_user(
        &self,
        id: i64,
        req: &UpdateUserRequest,
    ) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                age = COALESCE($4, age),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&req.name)
        .bind(&req.email)
        .bind(req.age)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: i64) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

// --- In-memory implementation ---

#[derive(Default)]
struct MemoryInner {
    products: Vec<Product>,
    users: Vec<User>,
    next_product_id: i64,
    next_user_id: i64,
}

/// InMemoryRepository
///
/// Trait-complete in-memory double used by the integration tests and local
/// experiments; it applies the same filter/sort/paginate/count semantics as
/// the Postgres implementation so pipeline behavior can be asserted without
/// a database.
pub struct InMemoryRepository {
    inner: RwLock<MemoryInner>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                next_product_id: 1,
                next_user_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn order_by<T, F: Fn(&T, &T) -> Ordering>(rows: &mut [T], order: SortOrder, cmp: F) {
    rows.sort_by(|a, b| match order {
        SortOrder::Asc => cmp(a, b),
        SortOrder::Desc => cmp(b, a),
    });
}

fn float_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn paginate<T>(rows: Vec<T>, criteria: &ListCriteria) -> Vec<T> {
    rows.into_iter()
        .skip(criteria.offset().max(0) as usize)
        .take(criteria.limit as usize)
        .collect()
}

fn sort_products(rows: &mut [Product], sort: Sort) {
    match sort.field {
        "name" => order_by(rows, sort.order, |a, b| a.name.cmp(&b.name)),
        "price" => order_by(rows, sort.order, |a, b| float_cmp(a.price, b.price)),
        "discount" => order_by(rows, sort.order, |a, b| float_cmp(a.discount, b.discount)),
        "rating" => order_by(rows, sort.order, |a, b| float_cmp(a.rating, b.rating)),
        "stock" => order_by(rows, sort.order, |a, b| a.stock.cmp(&b.stock)),
        "createdAt" => order_by(rows, sort.order, |a, b| a.created_at.cmp(&b.created_at)),
        "updatedAt" => order_by(rows, sort.order, |a, b| a.updated_at.cmp(&b.updated_at)),
        // Sort fields come from the whitelist; anything else is unreachable.
        _ => {}
    }
}

fn sort_users(rows: &mut [User], sort: Sort) {
    match sort.field {
        "name" => order_by(rows, sort.order, |a, b| a.name.cmp(&b.name)),
        "email" => order_by(rows, sort.order, |a, b| a.email.cmp(&b.email)),
        "age" => order_by(rows, sort.order, |a, b| a.age.cmp(&b.age)),
        "createdAt" => order_by(rows, sort.order, |a, b| a.created_at.cmp(&b.created_at)),
        "updatedAt" => order_by(rows, sort.order, |a, b| a.updated_at.cmp(&b.updated_at)),
        _ => {}
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_products(
        &self,
        criteria: &ListCriteria,
    ) -> Result<(i64, Vec<Product>), ApiError> {
        let inner = self.inner.read().expect("repository lock poisoned");
        let mut matching: Vec<Product> = inner
            .products
            .iter()
            .filter(|p| criteria.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| criteria.max_price.is_none_or(|max| p.price <= max))
            .filter(|p| criteria.status.is_none_or(|s| p.status.as_str() == s))
            .cloned()
            .collect();
        drop(inner);

        let count = matching.len() as i64;
        if let Some(sort) = criteria.sort {
            sort_products(&mut matching, sort);
        }
        Ok((count, paginate(matching, criteria)))
    }

    async fn find_product_by_id(&self, id: i64) -> Result<Option<Product>, ApiError> {
        let inner = self.inner.read().expect("repository lock poisoned");
        Ok(inner.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>, ApiError> {
        let inner = self.inner.read().expect("repository lock poisoned");
        Ok(inner.products.iter().find(|p| p.name == name).cloned())
    }

    async fn create_product(&self, req: &CreateProductRequest) -> Result<Product, ApiError> {
        let mut inner = self.inner.write().expect("repository lock poisoned");
        let now = Utc::now();
        let product = Product {
            id: inner.next_product_id,
            name: req.name.clone(),
            description: Some(req.description.clone()),
            price: req.price,
            discount: req.discount.unwrap_or(0.0),
            rating: req.rating.unwrap_or(0.0),
            stock: req.stock,
            status: req.status,
            image_url: req.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.next_product_id += 1;
        inner.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: i64,
        req: &UpdateProductRequest,
    ) -> Result<Option<Product>, ApiError> {
        let mut inner = self.inner.write().expect("repository lock poisoned");
        let Some(product) = inner.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            product.name = name.clone();
        }
        if let Some(description) = &req.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = req.price {
            product.price = price;
        }
        if let Some(discount) = req.discount {
            product.discount = discount;
        }
        if let Some(rating) = req.rating {
            product.rating = rating;
        }
        if let Some(stock) = req.stock {
            product.stock = stock;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: i64) -> Result<Option<Product>, ApiError> {
        let mut inner = self.inner.write().expect("repository lock poisoned");
        let position = inner.products.iter().position(|p| p.id == id);
        Ok(position.map(|i| inner.products.remove(i)))
    }

    async fn list_users(&self, criteria: &ListCriteria) -> Result<(i64, Vec<User>), ApiError> {
        let inner = self.inner.read().expect("repository lock poisoned");
        let mut rows = inner.users.clone();
        drop(inner);

        let count = rows.len() as i64;
        if let Some(sort) = criteria.sort {
            sort_users(&mut rows, sort);
        }
        Ok((count, paginate(rows, criteria)))
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, ApiError> {
        let inner = self.inner.read().expect("repository lock poisoned");
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let inner = self.inner.read().expect("repository lock poisoned");
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, ApiError> {
        let mut inner = self.inner.write().expect("repository lock poisoned");
        let now = Utc::now();
        let created = User {
            id: inner.next_user_id,
            name: user.name,
            email: user.email,
            age: user.age,
            role: user.role,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.next_user_id += 1;
        inner.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(
        &self,
        id: i64,
        req: &UpdateUserRequest,
    ) -> Result<Option<User>, ApiError> {
        let mut inner = self.inner.write().expect("repository lock poisoned");
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            user.name = name.clone();
        }
        if let Some(email) = &req.email {
            user.email = email.clone();
        }
        if let Some(age) = req.age {
            user.age = age;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> Result<Option<User>, ApiError> {
        let mut inner = self.inner.write().expect("repository lock poisoned");
        let position = inner.users.iter().position(|u| u.id == id);
        Ok(position.map(|i| inner.users.remove(i)))
    }
}
