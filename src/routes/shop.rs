use axum::{Json, Router, extract::State, routing::get};
use uuid::Uuid;

use crate::{
    dto::{categories::CategoryList, products::ProductList, reviews::ReviewList},
    error::AppResult,
    extract::{AppPath, AppQuery},
    models::Product,
    response::ApiResponse,
    routes::params::{BestsellerQuery, CatalogQuery},
    services::{category_service, product_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/featured", get(featured_products))
        .route("/products/bestsellers", get(bestsellers))
        .route("/products/{id}", get(get_product))
        .route("/products/{id}/reviews", get(product_reviews))
        .route("/categories", get(list_categories))
}

#[utoipa::path(
    get,
    path = "/api/shop/products",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Paginated catalog", body = ApiResponse<ProductList>),
        (status = 400, description = "Invalid page, limit, sort or order"),
        (status = 404, description = "Unknown category slug")
    ),
    tag = "Shop"
)]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CatalogQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_shop_products(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/shop/products/featured",
    responses(
        (status = 200, description = "Newest featured products", body = ApiResponse<ProductList>)
    ),
    tag = "Shop"
)]
pub async fn featured_products(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_featured(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/shop/products/bestsellers",
    params(BestsellerQuery),
    responses(
        (status = 200, description = "Ranked by units sold", body = ApiResponse<ProductList>),
        (status = 400, description = "Limit outside 1-100")
    ),
    tag = "Shop"
)]
pub async fn bestsellers(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<BestsellerQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_bestsellers(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/shop/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    tag = "Shop"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_shop_product(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/shop/products/{id}/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews with average rating", body = ApiResponse<ReviewList>),
        (status = 404, description = "Product not found")
    ),
    tag = "Shop"
)]
pub async fn product_reviews(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    Ok(Json(review_service::list_product_reviews(&state, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/shop/categories",
    responses(
        (status = 200, description = "With product counts", body = ApiResponse<CategoryList>)
    ),
    tag = "Shop"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    Ok(Json(category_service::list_shop_categories(&state).await?))
}
