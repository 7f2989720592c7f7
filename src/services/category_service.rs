use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Func, LockType, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::{
    audit,
    cache::SHOP_PREFIX,
    dto::categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
    entity::{
        categories::{self, Column as CatCol, Entity as Categories},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthContext, ensure_admin},
    models::Category,
    response::{ApiResponse, Deleted, Pagination},
    routes::params::{CategoryListQuery, CategorySortBy, SortOrder},
    state::AppState,
};

/// Trim, collapse inner whitespace and capitalise each word.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Case-insensitive exact match on the stored name.
pub async fn find_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<Option<categories::Model>> {
    let lowered = Expr::expr(Func::lower(Expr::col(CatCol::Name)));
    let mut condition = Condition::all().add(lowered.eq(name.trim().to_lowercase()));
    if let Some(id) = exclude {
        condition = condition.add(CatCol::Id.ne(id));
    }
    Ok(Categories::find().filter(condition).one(conn).await?)
}

/// Match on the slug form of the stored name, so names that already contain
/// `-` resolve to the slug [`slugify`] gives them.
pub async fn find_by_slug<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
    exclude: Option<Uuid>,
) -> AppResult<Option<categories::Model>> {
    let mut condition = Condition::all().add(Expr::cust_with_values(
        r#"regexp_replace(lower("categories"."name"), '\s+', '-', 'g') = $1"#,
        [slug.trim().to_lowercase()],
    ));
    if let Some(id) = exclude {
        condition = condition.add(CatCol::Id.ne(id));
    }
    Ok(Categories::find().filter(condition).one(conn).await?)
}

pub async fn resolve_slug<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
) -> AppResult<categories::Model> {
    find_by_slug(conn, slug, None)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Category '{slug}'")))
}

/// Names must be unique both as written and as slugs.
async fn ensure_available<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    if find_by_name(conn, name, exclude).await?.is_some() {
        return Err(AppError::Conflict(format!("Category '{name}' already exists")));
    }
    let slug = slugify(name);
    if find_by_slug(conn, &slug, exclude).await?.is_some() {
        let message = format!("A category with slug '{slug}' already exists");
        return Err(AppError::Conflict(message));
    }
    Ok(())
}

pub async fn product_counts<C: ConnectionTrait>(
    conn: &C,
    category_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, i64>> {
    if category_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = Products::find()
        .select_only()
        .column(ProdCol::CategoryId)
        .column_as(Expr::col(ProdCol::Id).count(), "product_count")
        .filter(ProdCol::CategoryId.is_in(category_ids.iter().copied()))
        .group_by(ProdCol::CategoryId)
        .into_tuple()
        .all(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn with_counts<C: ConnectionTrait>(
    conn: &C,
    models: Vec<categories::Model>,
) -> AppResult<Vec<Category>> {
    let ids: Vec<Uuid> = models.iter().map(|c| c.id).collect();
    let counts = product_counts(conn, &ids).await?;
    Ok(models
        .into_iter()
        .map(|model| {
            let count = counts.get(&model.id).copied().unwrap_or(0);
            Category::from_entity(model, count)
        })
        .collect())
}

pub async fn list_shop_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let key = format!("{SHOP_PREFIX}categories");
    if let Some(cached) = state.cache.get::<CategoryList>(&key).await {
        return Ok(ApiResponse::success("Categories", cached));
    }

    let models = Categories::find()
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?;
    let data = CategoryList {
        categories: with_counts(&state.orm, models).await?,
    };
    state.cache.set(key, &data).await;
    Ok(ApiResponse::success("Categories", data))
}

pub async fn list_categories(
    state: &AppState,
    ctx: &AuthContext,
    query: CategoryListQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    ensure_admin(ctx)?;
    let query = query.validate()?;

    let mut finder = Categories::find();
    if let Some(search) = &query.search {
        finder = finder.filter(Expr::col(CatCol::Name).ilike(format!("%{search}%")));
    }
    let column = match query.sort {
        CategorySortBy::CreatedAt => CatCol::CreatedAt,
        CategorySortBy::Name => CatCol::Name,
    };
    finder = match query.order {
        SortOrder::Asc => finder.order_by_asc(column),
        SortOrder::Desc => finder.order_by_desc(column),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(query.window.limit as u64)
        .offset(query.window.offset as u64)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::paginated(
        "Categories",
        CategoryList {
            categories: with_counts(&state.orm, models).await?,
        },
        Pagination::new(total, query.window.page, query.window.limit),
    ))
}

pub async fn get_category(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(ctx)?;
    let model = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    let mut categories = with_counts(&state.orm, vec![model]).await?;
    let category = categories
        .pop()
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::success("Category", category))
}

pub async fn create_category(
    state: &AppState,
    ctx: &AuthContext,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(ctx)?;
    let name = title_case(&payload.name);
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".into()));
    }
    ensure_available(&state.orm, &name, None).await?;

    let model = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        description: Set(clean_optional(payload.description)),
        image: Set(clean_optional(payload.image)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    state.cache.invalidate_shop().await;
    tracing::info!(category_id = %model.id, name = %model.name, "category created");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "category_create",
        "categories",
        serde_json::json!({ "category_id": model.id }),
    )
    .await;

    let category = Category::from_entity(model, 0);
    Ok(ApiResponse::success("Category created", category))
}

/// Renaming to the current name is allowed; only other categories collide.
pub async fn update_category(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(ctx)?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let name = title_case(&payload.name);
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".into()));
    }
    ensure_available(&state.orm, &name, Some(id)).await?;

    let mut active: categories::ActiveModel = existing.into();
    active.name = Set(name);
    if payload.description.is_some() {
        active.description = Set(clean_optional(payload.description));
    }
    if payload.image.is_some() {
        active.image = Set(clean_optional(payload.image));
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let model = active.update(&state.orm).await?;

    state.cache.invalidate_shop().await;
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "category_update",
        "categories",
        serde_json::json!({ "category_id": model.id }),
    )
    .await;

    let mut categories = with_counts(&state.orm, vec![model]).await?;
    let category = categories
        .pop()
        .ok_or_else(|| AppError::not_found("Category"))?;
    Ok(ApiResponse::success("Category updated", category))
}

pub async fn delete_category(
    state: &AppState,
    ctx: &AuthContext,
    id: Uuid,
) -> AppResult<ApiResponse<Deleted>> {
    ensure_admin(ctx)?;
    let txn = state.orm.begin().await?;

    // Row lock blocks concurrent product inserts referencing this category.
    Categories::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;

    let in_use = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(&txn)
        .await?;
    if in_use > 0 {
        return Err(AppError::BadRequest(format!(
            "Cannot delete category with {in_use} associated product(s)"
        )));
    }

    Categories::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    state.cache.invalidate_shop().await;
    tracing::info!(category_id = %id, "category deleted");
    audit::record(
        &state.pool,
        Some(ctx.user_id),
        "category_delete",
        "categories",
        serde_json::json!({ "category_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Category deleted", Deleted { id }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("the NORTH face", "The North Face")]
    #[case("  gold   rings ", "Gold Rings")]
    #[case("ÉTOILE pendants", "Étoile Pendants")]
    #[case("", "")]
    fn title_cases_and_collapses_whitespace(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(title_case(raw), expected);
    }

    #[rstest]
    #[case("Gold Rings", "gold-rings")]
    #[case("Necklaces", "necklaces")]
    #[case("Pearl  Drop   Earrings", "pearl-drop-earrings")]
    fn slugs_are_lowercase_and_hyphenated(#[case] name: &str, #[case] slug: &str) {
        assert_eq!(slugify(name), slug);
    }

    #[rstest]
    #[case("rose-gold", "rose-gold")]
    #[case("white gold-plated", "white-gold-plated")]
    fn hyphenated_names_keep_their_hyphens(#[case] raw: &str, #[case] slug: &str) {
        assert_eq!(slugify(&title_case(raw)), slug);
    }
}
