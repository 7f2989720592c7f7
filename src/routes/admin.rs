use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        dashboard::DashboardStats,
        orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{CreateUserRequest, UpdateRoleRequest, UpdateUserRequest, UserList},
    },
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    middleware::auth::{AuthContext, require_admin},
    models::{Category, Product, User},
    response::{ApiResponse, Deleted},
    routes::params::{CatalogQuery, CategoryListQuery, OrderListQuery, UserListQuery},
    services::{admin_service, category_service, order_service, product_service},
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/users/{id}/role", patch(update_user_role))
        .route("/dashboard", get(dashboard))
        .route_layer(from_fn_with_state(state, require_admin))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Paginated products", body = ApiResponse<ProductList>),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn list_products(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppQuery(query): AppQuery<CatalogQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        product_service::list_admin_products(&state, &ctx, query).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid price, stock or required field"),
        (status = 404, description = "Unknown category"),
        (status = 409, description = "Duplicate product name")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Product>>)> {
    let resp = product_service::create_product(&state, &ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn get_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_admin_product(&state, &ctx, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 400, description = "Invalid field"),
        (status = 404, description = "Product or category not found"),
        (status = 409, description = "Duplicate product name")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::update_product(&state, &ctx, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product is referenced by orders")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    Ok(Json(product_service::delete_product(&state, &ctx, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/categories",
    params(CategoryListQuery),
    responses(
        (status = 200, description = "Paginated categories", body = ApiResponse<CategoryList>),
        (status = 400, description = "Invalid query")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppQuery(query): AppQuery<CategoryListQuery>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    Ok(Json(
        category_service::list_categories(&state, &ctx, query).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Empty name"),
        (status = 409, description = "Duplicate name")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let resp = category_service::create_category(&state, &ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<Category>),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn get_category(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    Ok(Json(category_service::get_category(&state, &ctx, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name collides with another category")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn update_category(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateCategoryRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    Ok(Json(
        category_service::update_category(&state, &ctx, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = ApiResponse<Deleted>),
        (status = 400, description = "Category still has products"),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    Ok(Json(category_service::delete_category(&state, &ctx, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Paginated orders with items", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list_orders(&state, &ctx, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Empty order, bad quantity, bad status or insufficient stock"),
        (status = 404, description = "Unknown user or product")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn create_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderWithItems>>)> {
    let resp = order_service::create_order(&state, &ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(order_service::get_order(&state, &ctx, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Unknown status or order already final"),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(
        order_service::update_order_status(&state, &ctx, id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Paginated users", body = ApiResponse<UserList>)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    Ok(Json(admin_service::list_users(&state, &ctx, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<User>),
        (status = 400, description = "Invalid field or role"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn create_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = admin_service::create_user(&state, &ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 400, description = "Invalid field, role or self-demotion"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email belongs to another user")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        admin_service::update_user(&state, &ctx, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse<Deleted>),
        (status = 400, description = "Admins cannot delete themselves"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User has orders")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Deleted>>> {
    Ok(Json(admin_service::delete_user(&state, &ctx, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<User>),
        (status = 400, description = "Unknown role or self-demotion"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        admin_service::update_user_role(&state, &ctx, id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses(
        (status = 200, description = "Store totals", body = ApiResponse<DashboardStats>)
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Admin"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    Ok(Json(admin_service::dashboard(&state, &ctx).await?))
}
