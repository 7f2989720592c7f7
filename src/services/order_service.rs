//! Order placement and lifecycle.
//!
//! [`place_order`] is the single write path for new orders. It runs inside a
//! caller-owned transaction, locks every referenced product row in id order,
//! prices lines from the locked rows and decrements stock with a guarded
//! update. Dropping the transaction on any error rolls every write back.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{self, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, Column as OrderCol, Entity as Orders, OrderStatus},
        products::{self, Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthContext, ensure_admin},
    models::OrderItem,
    response::{ApiResponse, Pagination},
    routes::params::{OrderListQuery, SortOrder, ValidOrderQuery},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: f64,
}

/// Reject empty orders and non-positive quantities, then merge repeated
/// products. The result is sorted by product id.
pub fn merge_lines(items: &[OrderLineRequest]) -> AppResult<Vec<OrderLine>> {
    if items.is_empty() {
        return Err(AppError::BadRequest(
            "Order must contain at least one item".into(),
        ));
    }

    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid quantity for product with ID {}",
                item.product_id
            )));
        }
        let entry = merged.entry(item.product_id).or_insert(0);
        *entry = entry.checked_add(item.quantity).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid quantity for product with ID {}",
                item.product_id
            ))
        })?;
    }

    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLine {
            product_id,
            quantity,
        })
        .collect())
}

/// Every product must exist before any stock is checked. Prices come from
/// `products` only.
pub fn price_lines(
    lines: &[OrderLine],
    products: &HashMap<Uuid, products::Model>,
) -> AppResult<(Vec<PricedLine>, f64)> {
    if let Some(missing) = lines.iter().find(|l| !products.contains_key(&l.product_id)) {
        return Err(AppError::not_found(format!(
            "Product with ID {}",
            missing.product_id
        )));
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut total = 0.0;
    for line in lines {
        let Some(product) = products.get(&line.product_id) else {
            continue;
        };
        if product.stock < line.quantity {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
            });
        }
        total += product.price * f64::from(line.quantity);
        priced.push(PricedLine {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: line.quantity,
            unit_price: product.price,
        });
    }
    Ok((priced, total))
}

pub async fn place_order(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    lines: &[OrderLine],
    status: OrderStatus,
) -> AppResult<OrderWithItems> {
    let ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let locked: HashMap<Uuid, products::Model> = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let (priced, total) = price_lines(lines, &locked)?;

    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        status: Set(status),
        total: Set(total),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for line in priced {
        let item = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;

        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(ProdCol::Id.eq(line.product_id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::InsufficientStock {
                product_id: line.product_id,
            });
        }
        items.push(OrderItem::from(item));
    }

    Ok(OrderWithItems {
        order: order.into(),
        items,
    })
}

pub async fn with_items<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<orders::Model>,
) -> AppResult<Vec<OrderWithItems>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    if !ids.is_empty() {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(ids))
            .order_by_asc(OrderItemCol::CreatedAt)
            .all(conn)
            .await?;
        for item in items {
            grouped.entry(item.order_id).or_default().push(item.into());
        }
    }
    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: grouped.remove(&order.id).unwrap_or_default(),
            order: order.into(),
        })
        .collect())
}

async fn list_page(
    state: &AppState,
    user_id: Option<Uuid>,
    query: ValidOrderQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let mut condition = Condition::all();
    if let Some(user_id) = user_id {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(query.window.limit as u64)
        .offset(query.window.offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::paginated(
        "Orders",
        OrderList {
            orders: with_items(&state.orm, orders).await?,
        },
        Pagination::new(total, query.window.page, query.window.limit),
    ))
}

async fn load_order<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    owner: Option<Uuid>,
) -> AppResult<OrderWithItems> {
    let mut finder = Orders::find_by_id(id);
    if let Some(user_id) = owner {
        finder = finder.filter(OrderCol::UserId.eq(user_id));
    }
    let order = finder
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    with_items(conn, vec![order])
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("Order"))
}

/// Places an order from the caller's cart and empties it in the same
/// transaction.
pub async fn checkout(
    state: &AppState,
    ctx: &AuthContext,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = CartItems::find()
        .filter(CartCol::UserId.eq(ctx.user_id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    let requested: Vec<OrderLineRequest> = cart
        .iter()
        .map(|item| OrderLineRequest {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();
    let lines = merge_lines(&requested)?;

    let placed = place_order(&txn, ctx.user_id, &lines, OrderStatus::Pending).await?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(ctx.user_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    state.cache.invalidate_shop().await;
    tracing::info!(
        order_id = %placed.order.id,
        user_id = %ctx.user_id,
        total = placed.order.total,
        "order placed"
    );
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": placed.order.id }),
    )
    .await;

    Ok(ApiResponse::success("Order placed", placed))
}

pub async fn list_my_orders(
    state: &AppState,
    ctx: &AuthContext,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let query = query.validate()?;
    list_page(state, Some(ctx.user_id), query).await
}

/// Orders owned by someone else are reported as missing.
pub async fn get_my_order(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = load_order(&state.orm, id, Some(ctx.user_id)).await?;
    Ok(ApiResponse::success("Order", order))
}

pub async fn create_order(
    state: &AppState,
    ctx: &AuthContext,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(ctx)?;
    let requested = payload.status.as_deref().map(str::trim);
    let status = match requested.filter(|s| !s.is_empty()) {
        Some(raw) => OrderStatus::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid status '{raw}'")))?,
        None => OrderStatus::Pending,
    };
    if status == OrderStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Orders cannot be created as CANCELLED".into(),
        ));
    }
    let lines = merge_lines(&payload.items)?;

    let txn = state.orm.begin().await?;
    // Held until commit so the buyer cannot be deleted under the new order.
    Users::find_by_id(payload.user_id)
        .lock(LockType::Share)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User with ID {}", payload.user_id)))?;
    let placed = place_order(&txn, payload.user_id, &lines, status).await?;
    txn.commit().await?;

    state.cache.invalidate_shop().await;
    tracing::info!(
        order_id = %placed.order.id,
        user_id = %payload.user_id,
        "order created by admin"
    );
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": placed.order.id, "user_id": payload.user_id }),
    )
    .await;

    Ok(ApiResponse::success("Order created", placed))
}

pub async fn list_orders(
    state: &AppState,
    ctx: &AuthContext,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(ctx)?;
    let query = query.validate()?;
    list_page(state, None, query).await
}

pub async fn get_order(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(ctx)?;
    let order = load_order(&state.orm, id, None).await?;
    Ok(ApiResponse::success("Order", order))
}

/// `DELIVERED` and `CANCELLED` are final. Cancelling returns every item's
/// quantity to stock.
pub async fn update_order_status(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(ctx)?;
    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid status '{}'", payload.status)))?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    let previous = order.status;
    if previous.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Order is already {} and cannot be changed",
            previous.as_str()
        )));
    }

    if next == OrderStatus::Cancelled {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(id))
            .order_by_asc(OrderItemCol::ProductId)
            .all(&txn)
            .await?;
        for item in items {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                .col_expr(ProdCol::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }
    }

    let mut active: orders::ActiveModel = order.into();
    active.status = Set(next);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(&txn).await?;
    let updated = load_order(&txn, id, None).await?;
    txn.commit().await?;

    if next == OrderStatus::Cancelled {
        state.cache.invalidate_shop().await;
    }
    tracing::info!(
        order_id = %id,
        from = previous.as_str(),
        to = next.as_str(),
        "order status changed"
    );
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": id, "from": previous.as_str(), "to": next.as_str() }),
    )
    .await;

    Ok(ApiResponse::success("Order status updated", updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_line(product_id: Uuid, quantity: i32) -> OrderLine {
        OrderLine {
            product_id,
            quantity,
        }
    }

    fn line(product_id: Uuid, quantity: i32) -> OrderLineRequest {
        OrderLineRequest {
            product_id,
            quantity,
        }
    }

    fn product(id: Uuid, price: f64, stock: i32) -> products::Model {
        let now = Utc::now().fixed_offset();
        products::Model {
            id,
            name: format!("Product {stock}"),
            description: "A piece".into(),
            price,
            stock,
            category_id: Uuid::nil(),
            image: None,
            features: vec![],
            specs: serde_json::json!([]),
            tags: vec![],
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_orders_are_rejected() {
        assert!(matches!(merge_lines(&[]), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let id = Uuid::new_v4();
        assert!(merge_lines(&[line(id, 0)]).is_err());
        assert!(merge_lines(&[line(id, 2), line(Uuid::new_v4(), -1)]).is_err());
    }

    #[test]
    fn repeated_products_are_merged_and_sorted() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        let merged = merge_lines(&[line(a, 1), line(b, 2), line(a, 3)]).unwrap();
        assert_eq!(merged, vec![order_line(b, 2), order_line(a, 4)]);
    }

    #[test]
    fn totals_use_stored_prices() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let products = HashMap::from([(a, product(a, 100.0, 5)), (b, product(b, 50.0, 1))]);
        let lines = [order_line(a, 2), order_line(b, 1)];
        let (priced, total) = price_lines(&lines, &products).unwrap();
        assert_eq!(total, 250.0);
        assert_eq!(priced[0].unit_price, 100.0);
        assert_eq!(priced[1].product_name, "Product 1");
    }

    #[test]
    fn missing_products_win_over_stock_shortfalls() {
        let a = Uuid::from_u128(1);
        let missing = Uuid::from_u128(9);
        let products = HashMap::from([(a, product(a, 10.0, 0))]);
        let lines = [order_line(a, 1), order_line(missing, 1)];
        match price_lines(&lines, &products) {
            Err(AppError::NotFound(msg)) => assert!(msg.contains(&missing.to_string())),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn shortfall_names_the_product() {
        let a = Uuid::from_u128(1);
        let products = HashMap::from([(a, product(a, 10.0, 1))]);
        let result = price_lines(&[order_line(a, 2)], &products);
        assert!(matches!(
            result,
            Err(AppError::InsufficientStock { product_id }) if product_id == a
        ));
    }
}
