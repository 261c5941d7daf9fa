//! Item and cart endpoints of the main application.

use crate::api::validation::{BodySchema, Field, FieldType, Shape, ValidatedJson, parse_path_int};
use crate::types::{AppError, Decimal, Result};
use axum::Json;
use axum::extract::{Path, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Item {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub is_offr: Option<bool>,
}

impl BodySchema for Item {
    const SHAPE: Shape = Shape::Object(&[
        Field::required("name", FieldType::Str),
        Field::required("price", FieldType::Float),
        Field::optional("is_offr", FieldType::Bool),
    ]);
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemPrice {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Cart {
    pub name: String,
    /// Decimal amount, as a JSON number or numeric string
    #[schema(value_type = String)]
    pub price: Decimal,
    pub count: i64,
}

/// Request body of `POST /cart`: a JSON list of cart lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct CartItems(pub Vec<Cart>);

impl BodySchema for CartItems {
    const SHAPE: Shape = Shape::ListOf(&[
        Field::required("name", FieldType::Str),
        Field::required("price", FieldType::Decimal),
        Field::required("count", FieldType::Int),
    ]);
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemQuery {
    pub q: Option<String>,
}

/// Exact `Σ price × count`.
pub fn cart_total(items: &[Cart]) -> Result<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |total, item| {
        item.price
            .checked_mul_int(item.count)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| AppError::InvalidInput("cart total is out of range".to_string()))
    })
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Greeting")),
    tag = "demo"
)]
pub async fn read_root() -> Json<Value> {
    Json(json!({ "Hello": "World" }))
}

#[utoipa::path(
    get,
    path = "/items/{item_id}",
    params(("item_id" = i64, Path, description = "Item id"), ItemQuery),
    responses(
        (status = 200, description = "Item id and query echo"),
        (status = 422, description = "Validation error")
    ),
    tag = "demo"
)]
pub async fn read_item(
    Path(item_id): Path<String>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Value>> {
    let item_id = parse_path_int("item_id", &item_id)?;
    Ok(Json(json!({ "item_id": item_id, "q": query.q })))
}

#[utoipa::path(
    put,
    path = "/items/{item_id}",
    params(("item_id" = String, Path, description = "Item id")),
    request_body = Item,
    responses(
        (status = 200, description = "Stored item", body = ItemPrice),
        (status = 422, description = "Validation error")
    ),
    tag = "demo"
)]
pub async fn update_item(
    Path(_item_id): Path<String>,
    ValidatedJson(item): ValidatedJson<Item>,
) -> Json<ItemPrice> {
    Json(ItemPrice {
        name: item.name,
        price: item.price,
    })
}

#[utoipa::path(
    post,
    path = "/cart",
    request_body = Vec<Cart>,
    responses(
        (status = 200, description = "Cart total"),
        (status = 422, description = "Validation error")
    ),
    tag = "demo"
)]
pub async fn total_price(
    ValidatedJson(CartItems(items)): ValidatedJson<CartItems>,
) -> Result<Json<Value>> {
    let total = cart_total(&items)?;
    Ok(Json(json!({ "total": total.to_json() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart(price: &str, count: i64) -> Cart {
        Cart {
            name: "x".to_string(),
            price: price.parse().unwrap(),
            count,
        }
    }

    #[test]
    fn test_cart_total_is_exact() {
        let items = vec![cart("0.19", 3), cart("1.01", 1)];
        assert_eq!(cart_total(&items).unwrap().to_string(), "1.58");
        assert_eq!(cart_total(&[]).unwrap().to_json(), json!(0));
    }

    #[test]
    fn test_cart_total_overflow() {
        let items = vec![cart("99999999999999999999999999", i64::MAX)];
        assert!(cart_total(&items).is_err());
    }
}
