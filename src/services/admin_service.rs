use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use validator::Validate;
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        dashboard::DashboardStats,
        users::{CreateUserRequest, UpdateRoleRequest, UpdateUserRequest, UserList},
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders, OrderStatus},
        products::{Column as ProdCol, Entity as Products},
        users::{self, Column as UserCol, Entity as Users, Role},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthContext, ensure_admin},
    models::User,
    response::{ApiResponse, Deleted, Pagination},
    routes::params::UserListQuery,
    services::{
        auth_service::{email_taken, hash_password, normalize_email},
        order_service, product_service,
    },
    state::AppState,
};

pub const LOW_STOCK_THRESHOLD: i32 = 5;
const LOW_STOCK_LIMIT: u64 = 10;
const RECENT_ORDERS: u64 = 5;

pub async fn list_users(
    state: &AppState,
    ctx: &AuthContext,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(ctx)?;
    let (window, search) = query.validate()?;

    let mut finder = Users::find().order_by_desc(UserCol::CreatedAt);
    if let Some(search) = search {
        let pattern = format!("%{search}%");
        finder = finder.filter(
            Condition::any()
                .add(Expr::col(UserCol::Name).ilike(pattern.clone()))
                .add(Expr::col(UserCol::Email).ilike(pattern)),
        );
    }

    let total = finder.clone().count(&state.orm).await? as i64;
    let users = finder
        .limit(window.limit as u64)
        .offset(window.offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::paginated(
        "Users",
        UserList { users },
        Pagination::new(total, window.page, window.limit),
    ))
}

fn parse_role(raw: &str) -> AppResult<Role> {
    Role::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Invalid role '{raw}'")))
}

fn user_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("User with ID {id}"))
}

pub async fn create_user(
    state: &AppState,
    ctx: &AuthContext,
    mut payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(ctx)?;
    payload.email = normalize_email(&payload.email);
    payload.name = payload.name.trim().to_string();
    payload.validate()?;
    let role = parse_role(&payload.role)?;

    if email_taken(&state.orm, &payload.email, None).await? {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(payload.email),
        password_hash: Set(hash_password(&payload.password)?),
        name: Set(payload.name),
        role: Set(role),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(user_id = %user.id, role = role.as_str(), "user created by admin");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "user_create",
        "users",
        serde_json::json!({ "user_id": user.id, "role": role.as_str() }),
    )
    .await;

    Ok(ApiResponse::success("User created", user.into()))
}

/// Replaces name, email and role; the password only changes when given.
/// Admins cannot demote themselves.
pub async fn update_user(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
    mut payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(ctx)?;
    payload.email = normalize_email(&payload.email);
    payload.name = payload.name.trim().to_string();
    payload.validate()?;
    let role = parse_role(&payload.role)?;
    if id == ctx.user_id && role != Role::Admin {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role".into(),
        ));
    }

    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    if email_taken(&state.orm, &payload.email, Some(id)).await? {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let mut active: users::ActiveModel = user.into();
    active.name = Set(payload.name);
    active.email = Set(payload.email);
    active.role = Set(role);
    if let Some(password) = payload.password.as_deref() {
        active.password_hash = Set(hash_password(password)?);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let user = active.update(&state.orm).await?;

    tracing::info!(user_id = %id, "user updated by admin");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "user_update",
        "users",
        serde_json::json!({
            "user_id": id,
            "role": role.as_str(),
            "password_changed": payload.password.is_some(),
        }),
    )
    .await;

    Ok(ApiResponse::success("User updated", user.into()))
}

/// Users with orders are kept so order history stays intact.
pub async fn delete_user(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    ensure_admin(ctx)?;
    if id == ctx.user_id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".into(),
        ));
    }
    Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| user_not_found(id))?;

    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(id))
        .count(&state.orm)
        .await?;
    if orders > 0 {
        return Err(AppError::Conflict("User has existing orders".into()));
    }

    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(user_not_found(id));
    }

    tracing::info!(user_id = %id, "user deleted");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::success("User deleted", Deleted { id }))
}

/// Admins cannot demote themselves.
pub async fn update_user_role(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(ctx)?;
    let role = parse_role(&payload.role)?;
    if id == ctx.user_id && role != Role::Admin {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role".into(),
        ));
    }

    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| user_not_found(id))?;
    let previous = user.role;

    let mut active: users::ActiveModel = user.into();
    active.role = Set(role);
    active.updated_at = Set(Utc::now().fixed_offset());
    let user = active.update(&state.orm).await?;

    tracing::info!(
        user_id = %id,
        from = previous.as_str(),
        to = role.as_str(),
        "user role changed"
    );
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "user_role_update",
        "users",
        serde_json::json!({ "user_id": id, "from": previous.as_str(), "to": role.as_str() }),
    )
    .await;

    Ok(ApiResponse::success("User role updated", user.into()))
}

pub async fn dashboard(
    state: &AppState,
    ctx: &AuthContext,
) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(ctx)?;

    let total_products = Products::find().count(&state.orm).await? as i64;
    let total_orders = Orders::find().count(&state.orm).await? as i64;
    let total_revenue: Option<f64> = Orders::find()
        .select_only()
        .column_as(Expr::col(OrderCol::Total).sum(), "revenue")
        .filter(OrderCol::Status.ne(OrderStatus::Cancelled))
        .into_tuple::<Option<f64>>()
        .one(&state.orm)
        .await?
        .flatten();

    let low_stock = Products::find()
        .filter(ProdCol::Stock.lte(LOW_STOCK_THRESHOLD))
        .order_by_asc(ProdCol::Stock)
        .order_by_asc(ProdCol::Name)
        .limit(LOW_STOCK_LIMIT)
        .all(&state.orm)
        .await?;
    let recent = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Dashboard",
        DashboardStats {
            total_products,
            total_orders,
            total_revenue: total_revenue.unwrap_or(0.0),
            low_stock_products: product_service::hydrate(&state.orm, low_stock).await?,
            recent_orders: order_service::with_items(&state.orm, recent).await?,
        },
    ))
}
