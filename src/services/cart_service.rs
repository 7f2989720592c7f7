use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        products::{self, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthContext,
    response::ApiResponse,
    services::product_service,
    state::AppState,
};

fn positive_quantity(quantity: i32) -> AppResult<i32> {
    if quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".into()));
    }
    Ok(quantity)
}

fn ensure_stock(product: &products::Model, quantity: i32) -> AppResult<()> {
    if quantity > product.stock {
        return Err(AppError::InsufficientStock {
            product_id: product.id,
        });
    }
    Ok(())
}

/// Locks the product row for the rest of the transaction. Every write to a
/// cart line takes this lock first, so concurrent writes to the same line
/// queue behind each other.
async fn lock_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<products::Model> {
    Products::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product with ID {id}")))
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<Option<cart_items::Model>> {
    Ok(CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::UserId.eq(user_id))
                .add(CartCol::ProductId.eq(product_id)),
        )
        .one(conn)
        .await?)
}

pub async fn cart_view(state: &AppState, user_id: Uuid) -> AppResult<CartView> {
    let rows = CartItems::find()
        .find_also_related(Products)
        .filter(CartCol::UserId.eq(user_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let (lines, models): (Vec<cart_items::Model>, Vec<products::Model>) = rows
        .into_iter()
        .filter_map(|(line, product)| product.map(|p| (line, p)))
        .unzip();
    let products: HashMap<Uuid, _> = product_service::hydrate(&state.orm, models)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut items = Vec::with_capacity(lines.len());
    let mut subtotal = 0.0;
    let mut item_count = 0_i64;
    for line in lines {
        let Some(product) = products.get(&line.product_id).cloned() else {
            continue;
        };
        let line_total = product.price * f64::from(line.quantity);
        subtotal += line_total;
        item_count += i64::from(line.quantity);
        items.push(CartLine {
            id: line.id,
            product,
            quantity: line.quantity,
            line_total,
        });
    }

    Ok(CartView {
        items,
        item_count,
        subtotal,
    })
}

pub async fn get_cart(state: &AppState, ctx: &AuthContext) -> AppResult<ApiResponse<CartView>> {
    let view = cart_view(state, ctx.user_id).await?;
    Ok(ApiResponse::success("Cart", view))
}

/// Adds to an existing line; the resulting quantity may not exceed stock.
pub async fn add_to_cart(
    state: &AppState,
    ctx: &AuthContext,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let quantity = positive_quantity(payload.quantity)?;
    let txn = state.orm.begin().await?;
    let product = lock_product(&txn, payload.product_id).await?;

    match find_line(&txn, ctx.user_id, product.id).await? {
        Some(line) => {
            let total = line
                .quantity
                .checked_add(quantity)
                .ok_or(AppError::InsufficientStock {
                    product_id: product.id,
                })?;
            ensure_stock(&product, total)?;
            let mut active: cart_items::ActiveModel = line.into();
            active.quantity = Set(total);
            active.updated_at = Set(Utc::now().fixed_offset());
            active.update(&txn).await?;
        }
        None => {
            ensure_stock(&product, quantity)?;
            cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(ctx.user_id),
                product_id: Set(product.id),
                quantity: Set(quantity),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&txn)
            .await?;
        }
    }
    txn.commit().await?;

    tracing::debug!(
        user_id = %ctx.user_id,
        product_id = %product.id,
        quantity,
        "cart line added"
    );
    let view = cart_view(state, ctx.user_id).await?;
    Ok(ApiResponse::success("Added to cart", view))
}

pub async fn update_cart_item(
    state: &AppState,
    ctx: &AuthContext,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    let quantity = positive_quantity(payload.quantity)?;
    let txn = state.orm.begin().await?;
    let product = lock_product(&txn, product_id).await?;
    let line = find_line(&txn, ctx.user_id, product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart item"))?;
    ensure_stock(&product, quantity)?;

    let mut active: cart_items::ActiveModel = line.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&txn).await?;
    txn.commit().await?;

    let view = cart_view(state, ctx.user_id).await?;
    Ok(ApiResponse::success("Cart updated", view))
}

pub async fn remove_cart_item(
    state: &AppState,
    ctx: &AuthContext,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(ctx.user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Cart item"));
    }
    let view = cart_view(state, ctx.user_id).await?;
    Ok(ApiResponse::success("Removed from cart", view))
}

pub async fn clear_cart(state: &AppState, ctx: &AuthContext) -> AppResult<ApiResponse<CartView>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(ctx.user_id))
        .exec(&state.orm)
        .await?;
    tracing::debug!(user_id = %ctx.user_id, removed = result.rows_affected, "cart cleared");
    let view = cart_view(state, ctx.user_id).await?;
    Ok(ApiResponse::success("Cart cleared", view))
}
