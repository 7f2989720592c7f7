use axum::{
    Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::wishlist::{AddWishlistRequest, WishlistView},
    error::AppResult,
    extract::{AppJson, AppPath},
    middleware::auth::{AuthContext, require_auth},
    response::ApiResponse,
    services::wishlist_service,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_wishlist).post(add_to_wishlist))
        .route("/{product_id}", delete(remove_from_wishlist))
        .route_layer(from_fn_with_state(state, require_auth))
}

#[utoipa::path(
    get,
    path = "/api/wishlist",
    responses(
        (status = 200, description = "Wishlisted products", body = ApiResponse<WishlistView>)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Wishlist"
)]
pub async fn list_wishlist(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    Ok(Json(wishlist_service::list_wishlist(&state, &ctx).await?))
}

#[utoipa::path(
    post,
    path = "/api/wishlist",
    request_body = AddWishlistRequest,
    responses(
        (status = 200, description = "Product wishlisted", body = ApiResponse<WishlistView>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Wishlist"
)]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<AddWishlistRequest>,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    Ok(Json(
        wishlist_service::add_to_wishlist(&state, &ctx, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/wishlist/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product removed", body = ApiResponse<WishlistView>),
        (status = 404, description = "Product not in wishlist")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Wishlist"
)]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(product_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<WishlistView>>> {
    Ok(Json(
        wishlist_service::remove_from_wishlist(&state, &ctx, product_id).await?,
    ))
}
