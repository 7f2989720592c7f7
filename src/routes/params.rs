//! Query-string types and their validation.
//!
//! Every list endpoint validates its query here before any database work, so a
//! bad `limit` or `sort` is rejected with 400 without touching persistence.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    entity::orders::OrderStatus,
    error::{AppError, AppResult},
};

pub const MAX_LIMIT: i64 = 100;
pub const SHOP_DEFAULT_LIMIT: i64 = 12;
pub const ADMIN_DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Validate raw page parameters: `page >= 1`, `1 <= limit <= 100`, and an
/// offset that fits in `i64`.
pub fn page_window(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
) -> AppResult<PageWindow> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::BadRequest("page must be at least 1".into()));
    }
    let limit = limit.unwrap_or(default_limit);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::BadRequest("page is out of range".into()))?;
    Ok(PageWindow {
        page,
        limit,
        offset,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(SortOrder::Desc),
            Some(s) if s.eq_ignore_ascii_case("asc") => Ok(SortOrder::Asc),
            Some(s) if s.eq_ignore_ascii_case("desc") => Ok(SortOrder::Desc),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid order '{other}', expected asc or desc"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

impl ProductSortBy {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("createdAt") => Ok(ProductSortBy::CreatedAt),
            Some("price") => Ok(ProductSortBy::Price),
            Some("name") => Ok(ProductSortBy::Name),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid sort '{other}', expected createdAt, price or name"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductSortBy::CreatedAt => "createdAt",
            ProductSortBy::Price => "price",
            ProductSortBy::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySortBy {
    CreatedAt,
    Name,
}

impl CategorySortBy {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("createdAt") => Ok(CategorySortBy::CreatedAt),
            Some("name") => Ok(CategorySortBy::Name),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid sort '{other}', expected createdAt or name"
            ))),
        }
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Product listing query shared by the storefront and the admin catalog.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CatalogQuery {
    /// Page number, default 1
    pub page: Option<i64>,
    /// Items per page, 1-100
    pub limit: Option<i64>,
    /// Category slug
    pub category: Option<String>,
    pub search: Option<String>,
    /// createdAt, price or name
    pub sort: Option<String>,
    /// asc or desc
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidCatalogQuery {
    pub window: PageWindow,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: ProductSortBy,
    pub order: SortOrder,
}

impl CatalogQuery {
    pub fn validate(self, default_limit: i64) -> AppResult<ValidCatalogQuery> {
        let window = page_window(self.page, self.limit, default_limit)?;
        let sort = ProductSortBy::parse(self.sort.as_deref())?;
        let order = SortOrder::parse(self.order.as_deref())?;
        Ok(ValidCatalogQuery {
            window,
            category: non_empty(self.category).map(|c| c.to_lowercase()),
            search: non_empty(self.search),
            sort,
            order,
        })
    }
}

impl ValidCatalogQuery {
    /// Cache key derived from the normalised parameters. Free-text fields are
    /// JSON-encoded so no value can spill into a neighbouring field.
    pub fn cache_key(&self) -> String {
        let fields = serde_json::json!([
            self.window.page,
            self.window.limit,
            self.category,
            self.search.as_deref().map(str::to_lowercase),
            self.sort.as_str(),
            self.order.as_str(),
        ]);
        format!("{}products:{fields}", crate::cache::SHOP_PREFIX)
    }
}

pub const BESTSELLER_DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BestsellerQuery {
    /// Number of products, 1-100 (default 10)
    pub limit: Option<i64>,
}

impl BestsellerQuery {
    pub fn validate(self) -> AppResult<i64> {
        Ok(page_window(None, self.limit, BESTSELLER_DEFAULT_LIMIT)?.limit)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    /// createdAt or name
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidCategoryQuery {
    pub window: PageWindow,
    pub search: Option<String>,
    pub sort: CategorySortBy,
    pub order: SortOrder,
}

impl CategoryListQuery {
    pub fn validate(self) -> AppResult<ValidCategoryQuery> {
        Ok(ValidCategoryQuery {
            window: page_window(self.page, self.limit, ADMIN_DEFAULT_LIMIT)?,
            search: non_empty(self.search),
            sort: CategorySortBy::parse(self.sort.as_deref())?,
            order: SortOrder::parse(self.order.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// PENDING, PROCESSING, SHIPPED, DELIVERED or CANCELLED
    pub status: Option<String>,
    /// asc or desc by creation time
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidOrderQuery {
    pub window: PageWindow,
    pub status: Option<OrderStatus>,
    pub order: SortOrder,
}

impl OrderListQuery {
    pub fn validate(self) -> AppResult<ValidOrderQuery> {
        let status = match non_empty(self.status) {
            Some(raw) => Some(
                OrderStatus::parse(&raw)
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid status '{raw}'")))?,
            ),
            None => None,
        };
        Ok(ValidOrderQuery {
            window: page_window(self.page, self.limit, ADMIN_DEFAULT_LIMIT)?,
            status,
            order: SortOrder::parse(self.order.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Matches name or email
    pub search: Option<String>,
}

impl UserListQuery {
    pub fn validate(self) -> AppResult<(PageWindow, Option<String>)> {
        Ok((
            page_window(self.page, self.limit, ADMIN_DEFAULT_LIMIT)?,
            non_empty(self.search),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(0), None)]
    #[case(None, Some(0))]
    #[case(None, Some(101))]
    #[case(Some(-3), Some(10))]
    #[case(Some(i64::MAX), Some(100))]
    #[case(Some(i64::MAX / 2), Some(3))]
    fn rejects_out_of_range_windows(#[case] page: Option<i64>, #[case] limit: Option<i64>) {
        assert!(matches!(
            page_window(page, limit, SHOP_DEFAULT_LIMIT),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn computes_offset_from_page() {
        let window = page_window(Some(3), Some(20), SHOP_DEFAULT_LIMIT).unwrap();
        assert_eq!(
            window,
            PageWindow {
                page: 3,
                limit: 20,
                offset: 40
            }
        );
        let defaults = page_window(None, None, SHOP_DEFAULT_LIMIT).unwrap();
        assert_eq!(defaults.limit, 12);
        assert_eq!(defaults.offset, 0);
    }

    #[rstest]
    #[case("rating")]
    #[case("created_at")]
    #[case("stock")]
    fn unknown_product_sort_is_rejected(#[case] sort: &str) {
        let query = CatalogQuery {
            sort: Some(sort.into()),
            ..Default::default()
        };
        assert!(query.validate(SHOP_DEFAULT_LIMIT).is_err());
    }

    #[test]
    fn unknown_order_direction_is_rejected() {
        assert!(SortOrder::parse(Some("sideways")).is_err());
        assert_eq!(SortOrder::parse(Some("ASC")).unwrap(), SortOrder::Asc);
        assert_eq!(SortOrder::parse(None).unwrap(), SortOrder::Desc);
    }

    #[test]
    fn cache_key_ignores_blank_filters_and_search_case() {
        let a = CatalogQuery {
            search: Some("  Gold ".into()),
            category: Some("".into()),
            ..Default::default()
        }
        .validate(SHOP_DEFAULT_LIMIT)
        .unwrap();
        let b = CatalogQuery {
            search: Some("gold".into()),
            ..Default::default()
        }
        .validate(SHOP_DEFAULT_LIMIT)
        .unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("shop:"));
    }

    #[test]
    fn cache_key_fields_cannot_collide() {
        let crafted = CatalogQuery {
            category: Some("x:search=y".into()),
            ..Default::default()
        }
        .validate(SHOP_DEFAULT_LIMIT)
        .unwrap();
        let plain = CatalogQuery {
            category: Some("x".into()),
            search: Some("y:search=".into()),
            ..Default::default()
        }
        .validate(SHOP_DEFAULT_LIMIT)
        .unwrap();
        assert_ne!(crafted.cache_key(), plain.cache_key());

        let quoted = CatalogQuery {
            category: Some("a\",\"b".into()),
            ..Default::default()
        }
        .validate(SHOP_DEFAULT_LIMIT)
        .unwrap();
        let split = CatalogQuery {
            category: Some("a".into()),
            search: Some("b".into()),
            ..Default::default()
        }
        .validate(SHOP_DEFAULT_LIMIT)
        .unwrap();
        assert_ne!(quoted.cache_key(), split.cache_key());
    }

    #[rstest]
    #[case(None, 10)]
    #[case(Some(25), 25)]
    fn bestseller_limit_defaults_to_ten(#[case] limit: Option<i64>, #[case] expected: i64) {
        assert_eq!(BestsellerQuery { limit }.validate().unwrap(), expected);
    }

    #[test]
    fn bestseller_limit_is_bounded() {
        assert!(BestsellerQuery { limit: Some(0) }.validate().is_err());
        assert!(BestsellerQuery { limit: Some(101) }.validate().is_err());
    }

    #[test]
    fn order_status_filter_must_be_known() {
        let bad = OrderListQuery {
            status: Some("LOST".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let ok = OrderListQuery {
            status: Some("shipped".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(ok.status, Some(OrderStatus::Shipped));
    }
}
