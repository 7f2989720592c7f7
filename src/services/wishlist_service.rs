use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    dto::wishlist::{AddWishlistRequest, WishlistView},
    entity::{
        products::Entity as Products,
        wishlist_items::{self, Column as WishCol, Entity as WishlistItems},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthContext,
    response::ApiResponse,
    services::product_service,
    state::AppState,
};

async fn wishlist_view(state: &AppState, user_id: Uuid) -> AppResult<WishlistView> {
    let models = WishlistItems::find()
        .find_also_related(Products)
        .filter(WishCol::UserId.eq(user_id))
        .order_by_desc(WishCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(_, product)| product)
        .collect();
    Ok(WishlistView {
        products: product_service::hydrate(&state.orm, models).await?,
    })
}

pub async fn list_wishlist(
    state: &AppState,
    ctx: &AuthContext,
) -> AppResult<ApiResponse<WishlistView>> {
    let view = wishlist_view(state, ctx.user_id).await?;
    Ok(ApiResponse::success("Wishlist", view))
}

/// Adding a product that is already present is a no-op.
pub async fn add_to_wishlist(
    state: &AppState,
    ctx: &AuthContext,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<WishlistView>> {
    Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product with ID {}", payload.product_id)))?;

    let inserted = WishlistItems::insert(wishlist_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(ctx.user_id),
        product_id: Set(payload.product_id),
        created_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([WishCol::UserId, WishCol::ProductId])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(&state.orm)
    .await?;

    tracing::debug!(
        user_id = %ctx.user_id,
        product_id = %payload.product_id,
        inserted,
        "wishlist add"
    );
    Ok(ApiResponse::success(
        "Added to wishlist",
        wishlist_view(state, ctx.user_id).await?,
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    ctx: &AuthContext,
    product_id: Uuid,
) -> AppResult<ApiResponse<WishlistView>> {
    let result = WishlistItems::delete_many()
        .filter(WishCol::UserId.eq(ctx.user_id))
        .filter(WishCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Wishlist item"));
    }
    Ok(ApiResponse::success(
        "Removed from wishlist",
        wishlist_view(state, ctx.user_id).await?,
    ))
}
