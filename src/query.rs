use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// SortOrder
///
/// Direction of the single sort key. The wire values are the uppercase
/// `ASC`/`DESC` literals; anything else is rejected, never coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Sort
///
/// A validated sort key. The field is always a reference into a schema
/// whitelist, never caller-supplied text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sort {
    pub field: &'static str,
    pub order: SortOrder,
}

/// ResourceSchema
///
/// The fixed, code-defined whitelists for one listable resource: which fields
/// may be sorted on, which columns may be projected, which status values
/// exist, and whether the resource carries a price column for range filters.
/// Everything the criteria parser accepts is drawn from here.
pub struct ResourceSchema {
    pub sortable: &'static [&'static str],
    pub columns: &'static [&'static str],
    pub statuses: &'static [&'static str],
    pub price_column: Option<&'static str>,
}

/// Whitelists for the products listing. Wire names match the API contract:
/// timestamps are camelCase while image_url stays snake_case.
pub const PRODUCTS: ResourceSchema = ResourceSchema {
    sortable: &[
        "name",
        "price",
        "discount",
        "rating",
        "stock",
        "createdAt",
        "updatedAt",
    ],
    columns: &[
        "id",
        "name",
        "description",
        "price",
        "discount",
        "rating",
        "stock",
        "status",
        "image_url",
        "createdAt",
        "updatedAt",
    ],
    statuses: &["active", "out_of_stock", "inactive"],
    price_column: Some("price"),
};

/// Whitelists for the users listing. The password hash is not a column here,
/// so no projection can request it. Users carry no price or status filters.
pub const USERS: ResourceSchema = ResourceSchema {
    sortable: &["name", "email", "age", "createdAt", "updatedAt"],
    columns: &["id", "name", "email", "age", "role", "createdAt", "updatedAt"],
    statuses: &[],
    price_column: None,
};

/// Maps a whitelisted wire name to the SQL identifier it sorts on. Only ever
/// called with values already drawn from a schema whitelist.
pub fn sql_ident(field: &'static str) -> &'static str {
    match field {
        "createdAt" => "created_at",
        "updatedAt" => "updated_at",
        other => other,
    }
}

/// RawListQuery
///
/// The untrusted query string of a listing request, deserialized with every
/// parameter as an optional string. Validation happens in ListCriteria::parse
/// so that errors can name the exact offending value instead of surfacing a
/// generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub status: Option<String>,
    pub fields: Option<String>,
}

/// ListCriteria
///
/// The validated, typed representation of a caller's listing request. Built
/// fresh per request; every field reference (sort key, projection columns,
/// status) points into a fixed whitelist, never at arbitrary caller input.
#[derive(Debug, Clone, PartialEq)]
pub struct ListCriteria {
    pub page: i64,
    pub limit: i64,
    pub sort: Option<Sort>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub status: Option<&'static str>,
    pub fields: Vec<&'static str>,
}

impl ListCriteria {
    /// Pagination offset: page is 1-based. Parsing rejects combinations whose
    /// offset cannot be represented, so saturation here is unreachable for
    /// criteria that came through `parse`.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// parse
    ///
    /// Validates and normalizes raw query parameters against a resource
    /// schema. Fails on the first invalid field with a message naming the
    /// offending value; on success every referenced field is whitelisted.
    ///
    /// `minPrice <= maxPrice` is deliberately not enforced: an inverted range
    /// passes validation and simply matches nothing.
    pub fn parse(raw: &RawListQuery, schema: &ResourceSchema) -> Result<Self, ApiError> {
        let page = parse_positive_int("page", raw.page.as_deref())?.unwrap_or(1);
        let limit = parse_positive_int("limit", raw.limit.as_deref())?.unwrap_or(10);

        // Both values are individually valid i64s, but their product is the
        // pagination offset and must itself fit in an i64.
        if (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::Validation(format!("page is out of range: {page}")));
        }

        let min_price = parse_price("minPrice", raw.min_price.as_deref(), schema)?;
        let max_price = parse_price("maxPrice", raw.max_price.as_deref(), schema)?;

        // The order is validated even when no sort field accompanies it, but
        // an order without a field leaves the store-defined ordering intact.
        let order = match raw.sort_order.as_deref() {
            None => None,
            Some(v) => Some(SortOrder::parse(v).ok_or_else(|| {
                ApiError::Validation(format!("sortOrder must be ASC or DESC: {v}"))
            })?),
        };

        let sort = match raw.sort_field.as_deref() {
            None => None,
            Some(v) => {
                let field = whitelisted(v, schema.sortable).ok_or_else(|| {
                    ApiError::Validation(format!("unknown sort field: {v}"))
                })?;
                Some(Sort {
                    field,
                    order: order.unwrap_or(SortOrder::Desc),
                })
            }
        };

        let status = match raw.status.as_deref() {
            None => None,
            Some(v) => Some(whitelisted(v, schema.statuses).ok_or_else(|| {
                ApiError::Validation(format!("unknown status value: {v}"))
            })?),
        };

        let fields = match raw.fields.as_deref() {
            // Absent or empty projection defaults to the full whitelist.
            None | Some("") => schema.columns.to_vec(),
            Some(list) => {
                let mut fields = Vec::new();
                for token in list.split(',') {
                    let column = whitelisted(token, schema.columns).ok_or_else(|| {
                        ApiError::Validation(format!("invalid field requested: {token}"))
                    })?;
                    fields.push(column);
                }
                fields
            }
        };

        Ok(ListCriteria {
            page,
            limit,
            sort,
            min_price,
            max_price,
            status,
            fields,
        })
    }
}

/// Returns the whitelist's own entry when the value matches, so downstream
/// code only ever handles `'static` strings defined in this module.
fn whitelisted(value: &str, allowed: &'static [&'static str]) -> Option<&'static str> {
    allowed.iter().find(|entry| **entry == value).copied()
}

fn parse_positive_int(name: &str, value: Option<&str>) -> Result<Option<i64>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => match v.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(Some(n)),
            _ => Err(ApiError::Validation(format!(
                "{name} must be a positive integer: {v}"
            ))),
        },
    }
}

fn parse_price(
    name: &str,
    value: Option<&str>,
    schema: &ResourceSchema,
) -> Result<Option<f64>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => {
            if schema.price_column.is_none() {
                return Err(ApiError::Validation(format!(
                    "{name} is not supported for this resource"
                )));
            }
            match v.parse::<f64>() {
                Ok(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
                _ => Err(ApiError::Validation(format!(
                    "{name} must be a non-negative number: {v}"
                ))),
            }
        }
    }
}

/// PagedResult
///
/// One page of a listing response. `count` is the total number of records
/// matching the filter before pagination; page and limit never affect it.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub count: i64,
    pub limit: i64,
    pub page: i64,
    pub data: Vec<T>,
}

/// project
///
/// Restricts each record to the requested columns, in whitelist order. The
/// records serialize to JSON objects first, so serde-level redactions (the
/// user password hash) are already gone before projection runs.
pub fn project<T: Serialize>(items: &[T], fields: &[&'static str]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let full = serde_json::to_value(item).unwrap_or(Value::Null);
            let mut projected = serde_json::Map::with_capacity(fields.len());
            for field in fields {
                let value = full.get(*field).cloned().unwrap_or(Value::Null);
                projected.insert((*field).to_string(), value);
            }
            Value::Object(projected)
        })
        .collect()
}
