use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit,
    cache::SHOP_PREFIX,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        categories::{self, Column as CatCol, Entity as Categories},
        order_items::{Column as OrderItemCol, Entity as OrderItems, Relation as OrderItemRel},
        orders::{Column as OrderCol, OrderStatus},
        products::{self, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthContext, ensure_admin},
    models::{Product, ProductSpec},
    response::{ApiResponse, Deleted, Pagination},
    routes::params::{
        ADMIN_DEFAULT_LIMIT, BestsellerQuery, CatalogQuery, ProductSortBy, SHOP_DEFAULT_LIMIT,
        SortOrder, ValidCatalogQuery,
    },
    services::category_service,
    state::AppState,
};

pub const FEATURED_LIMIT: u64 = 8;

#[derive(Serialize, Deserialize)]
struct CatalogPage {
    data: ProductList,
    pagination: Pagination,
}

/// Accepts a JSON number or numeric string; must be a finite positive value.
pub fn parse_price(raw: &Value) -> AppResult<f64> {
    let price = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match price {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        _ => Err(AppError::BadRequest("price must be a positive number".into())),
    }
}

/// Accepts a JSON integer or integer string; must be zero or more.
pub fn parse_stock(raw: &Value) -> AppResult<i32> {
    let stock = match raw {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    match stock {
        Some(s) if s >= 0 => Ok(s),
        _ => Err(AppError::BadRequest(
            "stock must be a non-negative integer".into(),
        )),
    }
}

pub fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

pub fn clean_specs(specs: Vec<ProductSpec>) -> Vec<ProductSpec> {
    specs
        .into_iter()
        .map(|spec| ProductSpec {
            name: spec.name.trim().to_string(),
            value: spec.value.trim().to_string(),
        })
        .filter(|spec| !spec.name.is_empty() && !spec.value.is_empty())
        .collect()
}

fn specs_json(specs: Vec<ProductSpec>) -> AppResult<Value> {
    serde_json::to_value(clean_specs(specs)).map_err(|e| AppError::Internal(e.into()))
}

fn required_text(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn search_condition(search: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(search));
    let needle = search.to_lowercase();
    Condition::any()
        .add(Expr::col((Products, ProdCol::Name)).ilike(pattern.clone()))
        .add(Expr::col((Products, ProdCol::Description)).ilike(pattern))
        .add(Expr::cust_with_values(
            r#"EXISTS (SELECT 1 FROM unnest("products"."features") AS f WHERE lower(f) = $1)"#,
            [needle.clone()],
        ))
        .add(Expr::cust_with_values(
            r#"EXISTS (SELECT 1 FROM unnest("products"."tags") AS t WHERE lower(t) = $1)"#,
            [needle],
        ))
}

/// Runs a validated catalog query. An unknown category slug is a 404, not an
/// empty page.
pub async fn query_catalog<C: ConnectionTrait>(
    conn: &C,
    query: &ValidCatalogQuery,
) -> AppResult<(ProductList, Pagination)> {
    let mut condition = Condition::all();
    if let Some(slug) = &query.category {
        let category = category_service::resolve_slug(conn, slug).await?;
        condition = condition.add(ProdCol::CategoryId.eq(category.id));
    }
    if let Some(search) = &query.search {
        condition = condition.add(search_condition(search));
    }

    let total = Products::find()
        .filter(condition.clone())
        .count(conn)
        .await? as i64;

    let column = match query.sort {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Name => ProdCol::Name,
    };
    let mut finder = Products::find()
        .find_also_related(Categories)
        .filter(condition);
    finder = match query.order {
        SortOrder::Asc => finder.order_by_asc(column),
        SortOrder::Desc => finder.order_by_desc(column),
    };

    let products = finder
        .order_by_asc(ProdCol::Id)
        .limit(query.window.limit as u64)
        .offset(query.window.offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(|(product, category)| Product::from_entity(product, category))
        .collect();

    Ok((
        ProductList { products },
        Pagination::new(total, query.window.page, query.window.limit),
    ))
}

/// Attach category names to a batch of products, preserving order.
pub async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<products::Model>,
) -> AppResult<Vec<Product>> {
    let ids: Vec<Uuid> = models.iter().map(|p| p.category_id).collect();
    let categories: HashMap<Uuid, categories::Model> = if ids.is_empty() {
        HashMap::new()
    } else {
        Categories::find()
            .filter(CatCol::Id.is_in(ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };
    Ok(models
        .into_iter()
        .map(|product| {
            let category = categories.get(&product.category_id).cloned();
            Product::from_entity(product, category)
        })
        .collect())
}

pub async fn load_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<Product> {
    let (product, category) = Products::find_by_id(id)
        .find_also_related(Categories)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product with ID {id}")))?;
    Ok(Product::from_entity(product, category))
}

pub async fn list_shop_products(
    state: &AppState,
    query: CatalogQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let query = query.validate(SHOP_DEFAULT_LIMIT)?;
    let key = query.cache_key();
    if let Some(page) = state.cache.get::<CatalogPage>(&key).await {
        return Ok(ApiResponse::paginated(
            "Products",
            page.data,
            page.pagination,
        ));
    }

    let (data, pagination) = query_catalog(&state.orm, &query).await?;
    let page = CatalogPage { data, pagination };
    state.cache.set(key, &page).await;
    Ok(ApiResponse::paginated(
        "Products",
        page.data,
        page.pagination,
    ))
}

pub async fn list_featured(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    let key = format!("{SHOP_PREFIX}featured");
    if let Some(cached) = state.cache.get::<ProductList>(&key).await {
        return Ok(ApiResponse::success("Featured products", cached));
    }

    let products = Products::find()
        .find_also_related(Categories)
        .filter(ProdCol::IsFeatured.eq(true))
        .order_by_desc(ProdCol::CreatedAt)
        .limit(FEATURED_LIMIT)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(product, category)| Product::from_entity(product, category))
        .collect();
    let data = ProductList { products };
    state.cache.set(key, &data).await;
    Ok(ApiResponse::success("Featured products", data))
}

/// Ranked by units sold across orders that were not cancelled. Products that
/// never sold are left out.
pub async fn list_bestsellers(
    state: &AppState,
    query: BestsellerQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let limit = query.validate()?;
    let key = format!("{SHOP_PREFIX}bestsellers:{limit}");
    if let Some(cached) = state.cache.get::<ProductList>(&key).await {
        return Ok(ApiResponse::success("Bestsellers", cached));
    }

    let sold = Expr::col((OrderItems, OrderItemCol::Quantity)).sum();
    let ranked: Vec<(Uuid, i64)> = OrderItems::find()
        .select_only()
        .column(OrderItemCol::ProductId)
        .column_as(sold.clone(), "sold")
        .join(JoinType::InnerJoin, OrderItemRel::Orders.def())
        .filter(OrderCol::Status.ne(OrderStatus::Cancelled))
        .group_by(OrderItemCol::ProductId)
        .order_by_desc(sold)
        .order_by_asc(OrderItemCol::ProductId)
        .limit(limit as u64)
        .into_tuple()
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
    let mut by_id: HashMap<Uuid, products::Model> = Products::find()
        .filter(ProdCol::Id.is_in(ids.clone()))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let models = ids.iter().filter_map(|id| by_id.remove(id)).collect();

    let data = ProductList {
        products: hydrate(&state.orm, models).await?,
    };
    state.cache.set(key, &data).await;
    Ok(ApiResponse::success("Bestsellers", data))
}

pub async fn get_shop_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let key = format!("{SHOP_PREFIX}product:{id}");
    if let Some(cached) = state.cache.get::<Product>(&key).await {
        return Ok(ApiResponse::success("Product", cached));
    }
    let product = load_product(&state.orm, id).await?;
    state.cache.set(key, &product).await;
    Ok(ApiResponse::success("Product", product))
}

pub async fn list_admin_products(
    state: &AppState,
    ctx: &AuthContext,
    query: CatalogQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(ctx)?;
    let query = query.validate(ADMIN_DEFAULT_LIMIT)?;
    let (data, pagination) = query_catalog(&state.orm, &query).await?;
    Ok(ApiResponse::paginated("Products", data, pagination))
}

pub async fn get_admin_product(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(ctx)?;
    let product = load_product(&state.orm, id).await?;
    Ok(ApiResponse::success("Product", product))
}

async fn ensure_unique_name(state: &AppState, name: &str, exclude: Option<Uuid>) -> AppResult<()> {
    let mut finder = Products::find().filter(ProdCol::Name.eq(name));
    if let Some(id) = exclude {
        finder = finder.filter(ProdCol::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::Conflict(format!("Product '{name}' already exists")));
    }
    Ok(())
}

async fn category_id_by_name(state: &AppState, name: &str) -> AppResult<Uuid> {
    let name = required_text(name, "category")?;
    category_service::find_by_name(&state.orm, &name, None)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| AppError::not_found(format!("Category '{name}'")))
}

pub async fn create_product(
    state: &AppState,
    ctx: &AuthContext,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(ctx)?;
    let name = required_text(&payload.name, "name")?;
    let description = required_text(&payload.description, "description")?;
    let price = parse_price(&payload.price)?;
    let stock = match &payload.stock {
        Some(Value::Null) | None => 0,
        Some(raw) => parse_stock(raw)?,
    };
    let category_id = category_id_by_name(state, &payload.category).await?;
    ensure_unique_name(state, &name, None).await?;

    let model = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(description),
        price: Set(price),
        stock: Set(stock),
        category_id: Set(category_id),
        image: Set(payload
            .image
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())),
        features: Set(clean_list(payload.features.unwrap_or_default())),
        specs: Set(specs_json(payload.specs.unwrap_or_default())?),
        tags: Set(clean_list(payload.tags.unwrap_or_default())),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    state.cache.invalidate_shop().await;
    tracing::info!(product_id = %model.id, name = %model.name, "product created");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": model.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        load_product(&state.orm, model.id).await?,
    ))
}

/// Absent or null fields keep their stored value.
pub async fn update_product(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(ctx)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product with ID {id}")))?;

    let mut active: products::ActiveModel = existing.into();
    if let Some(name) = &payload.name {
        let name = required_text(name, "name")?;
        ensure_unique_name(state, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = &payload.description {
        active.description = Set(required_text(description, "description")?);
    }
    if let Some(price) = payload.price.as_ref().filter(|v| !v.is_null()) {
        active.price = Set(parse_price(price)?);
    }
    if let Some(stock) = payload.stock.as_ref().filter(|v| !v.is_null()) {
        active.stock = Set(parse_stock(stock)?);
    }
    if let Some(category) = &payload.category {
        active.category_id = Set(category_id_by_name(state, category).await?);
    }
    if let Some(image) = payload.image {
        let image = image.trim().to_string();
        active.image = Set(if image.is_empty() { None } else { Some(image) });
    }
    if let Some(features) = payload.features {
        active.features = Set(clean_list(features));
    }
    if let Some(specs) = payload.specs {
        active.specs = Set(specs_json(specs)?);
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(clean_list(tags));
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let model = active.update(&state.orm).await?;

    state.cache.invalidate_shop().await;
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": model.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        load_product(&state.orm, model.id).await?,
    ))
}

pub async fn delete_product(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    ensure_admin(ctx)?;
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Product with ID {id}")))?;

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "Product is referenced by existing orders".into(),
        ));
    }

    // An order placed after the check still trips the foreign key (409).
    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found(format!("Product with ID {id}")));
    }

    state.cache.invalidate_shop().await;
    tracing::info!(product_id = %id, "product deleted");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Product deleted", Deleted { id }))
}
