use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::{Product, ProductSpec};

/// `price` and `stock` accept JSON numbers or numeric strings.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    #[schema(value_type = f64, example = 129.99)]
    pub price: Value,
    #[schema(value_type = Option<i32>, example = 10)]
    pub stock: Option<Value>,
    #[serde(alias = "categoryName")]
    pub category: String,
    pub image: Option<String>,
    pub features: Option<Vec<String>>,
    pub specs: Option<Vec<ProductSpec>>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}

/// Only fields present in the payload are validated and written.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price: Option<Value>,
    #[schema(value_type = Option<i32>)]
    pub stock: Option<Value>,
    #[serde(alias = "categoryName")]
    pub category: Option<String>,
    pub image: Option<String>,
    pub features: Option<Vec<String>>,
    pub specs: Option<Vec<ProductSpec>>,
    pub tags: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductList {
    pub products: Vec<Product>,
}
