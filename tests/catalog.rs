mod common;

use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use storefront_api::{
    cache::CatalogCache,
    dto::{
        categories::UpdateCategoryRequest,
        orders::{CreateOrderRequest, OrderLineRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
        reviews::CreateReviewRequest,
        wishlist::AddWishlistRequest,
    },
    entity::users::Role,
    error::AppError,
    routes::params::{BestsellerQuery, CatalogQuery},
    services::{
        category_service, order_service, product_service, review_service, wishlist_service,
    },
};
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn storefront_listing_filters_and_paginates() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    common::create_category(&state, &admin, "wedding rings").await?;
    common::create_category(&state, &admin, "Necklaces").await?;
    for (i, price) in [120.0, 80.0, 300.0, 45.0, 210.0].iter().enumerate() {
        let name = format!("Band {i}");
        common::create_product(&state, &admin, &name, *price, 3, "Wedding Rings").await?;
    }
    product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Chain".into(),
            description: "Plain chain".into(),
            price: json!("59.90"),
            stock: None,
            category: "necklaces".into(),
            image: None,
            features: Some(vec![" Adjustable ".into(), "".into()]),
            specs: None,
            tags: Some(vec!["Minimalist".into()]),
            is_featured: Some(true),
        },
    )
    .await?;

    let page = product_service::list_shop_products(
        &state,
        CatalogQuery {
            limit: Some(2),
            category: Some("wedding-rings".into()),
            sort: Some("price".into()),
            order: Some("asc".into()),
            ..Default::default()
        },
    )
    .await?;
    let pagination = page.pagination.expect("pagination");
    assert_eq!(pagination.total, 5);
    assert_eq!(pagination.pages, 3);
    let products = page.data.expect("products").products;
    let prices: Vec<f64> = products.iter().map(|p| p.price).collect();
    assert_eq!(prices, vec![45.0, 80.0]);

    let tagged = product_service::list_shop_products(
        &state,
        CatalogQuery {
            search: Some("minimalist".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products");
    assert_eq!(tagged.products.len(), 1);
    let chain = &tagged.products[0];
    assert_eq!(chain.name, "Chain");
    assert_eq!(chain.stock, 0);
    assert!(!chain.in_stock);
    assert_eq!(chain.features, vec!["Adjustable".to_string()]);
    assert_eq!(chain.category_slug.as_deref(), Some("necklaces"));

    let featured = product_service::list_featured(&state)
        .await?
        .data
        .expect("featured");
    assert_eq!(featured.products.len(), 1);

    let err = product_service::list_shop_products(
        &state,
        CatalogQuery {
            category: Some("anklets".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Category 'anklets' not found");

    let categories = category_service::list_shop_categories(&state)
        .await?
        .data
        .expect("categories");
    let rings = categories
        .categories
        .iter()
        .find(|c| c.slug == "wedding-rings")
        .expect("rings listed");
    assert_eq!(rings.name, "Wedding Rings");
    assert_eq!(rings.product_count, 5);
    Ok(())
}

#[tokio::test]
#[serial]
async fn shop_cache_is_invalidated_by_writes() -> anyhow::Result<()> {
    let Some(mut state) = common::setup_state().await? else {
        return Ok(());
    };
    state.cache = CatalogCache::new(Duration::from_secs(60));
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let ring = common::create_product(&state, &admin, "Gold Ring", 100.0, 1, "Rings").await?;

    let before = product_service::get_shop_product(&state, ring)
        .await?
        .data
        .expect("product");
    assert_eq!(before.price, 100.0);
    assert!(state.cache.len().await > 0);

    product_service::update_product(
        &state,
        &admin,
        ring,
        UpdateProductRequest {
            price: Some(json!(125)),
            ..Default::default()
        },
    )
    .await?;
    let after = product_service::get_shop_product(&state, ring)
        .await?
        .data
        .expect("product");
    assert_eq!(after.price, 125.0);
    assert_eq!(after.name, "Gold Ring");
    assert_eq!(after.stock, 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn category_rules() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let rings = common::create_category(&state, &admin, "rings").await?;
    let charms = common::create_category(&state, &admin, "Charms").await?;

    let dup = common::create_category(&state, &admin, "RINGS")
        .await
        .unwrap_err();
    assert!(
        dup.downcast_ref::<AppError>()
            .is_some_and(|e| matches!(e, AppError::Conflict(_)))
    );

    let same = category_service::update_category(
        &state,
        &admin,
        rings,
        UpdateCategoryRequest {
            name: "rings".into(),
            description: Some("Bands and solitaires".into()),
            image: None,
        },
    )
    .await?
    .data
    .expect("category");
    assert_eq!(same.name, "Rings");
    assert_eq!(same.description.as_deref(), Some("Bands and solitaires"));

    let collision = category_service::update_category(
        &state,
        &admin,
        charms,
        UpdateCategoryRequest {
            name: "Rings".into(),
            description: None,
            image: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(collision, AppError::Conflict(_)));

    common::create_product(&state, &admin, "Signet", 150.0, 2, "Rings").await?;
    let in_use = category_service::delete_category(&state, &admin, rings)
        .await
        .unwrap_err();
    assert!(matches!(in_use, AppError::BadRequest(_)));

    category_service::delete_category(&state, &admin, charms).await?;
    let missing = category_service::get_category(&state, &admin, charms)
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
#[serial]
async fn product_rules() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let ring = common::create_product(&state, &admin, "Emerald Ring", 410.0, 4, "Rings").await?;
    let spare = common::create_product(&state, &admin, "Spare Ring", 20.0, 1, "Rings").await?;

    let dup = common::create_product(&state, &admin, "Emerald Ring", 1.0, 1, "Rings")
        .await
        .unwrap_err();
    assert!(
        dup.downcast_ref::<AppError>()
            .is_some_and(|e| matches!(e, AppError::Conflict(_)))
    );

    let bad_price = product_service::update_product(
        &state,
        &admin,
        ring,
        UpdateProductRequest {
            price: Some(json!("free")),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(bad_price, AppError::BadRequest(_)));

    let no_category = product_service::update_product(
        &state,
        &admin,
        ring,
        UpdateProductRequest {
            category: Some("Tiaras".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(no_category, AppError::NotFound(_)));

    order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            user_id: buyer.user_id,
            items: vec![OrderLineRequest {
                product_id: ring,
                quantity: 1,
            }],
            status: None,
        },
    )
    .await?;
    let referenced = product_service::delete_product(&state, &admin, ring)
        .await
        .unwrap_err();
    assert!(matches!(referenced, AppError::Conflict(_)));

    product_service::delete_product(&state, &admin, spare).await?;
    let gone = product_service::get_shop_product(&state, spare)
        .await
        .unwrap_err();
    assert!(matches!(gone, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
#[serial]
async fn reviews_and_wishlist() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let ring = common::create_product(&state, &admin, "Topaz Ring", 95.0, 2, "Rings").await?;

    let review = |rating| CreateReviewRequest {
        product_id: ring,
        rating,
        comment: Some("  Lovely  ".into()),
    };
    let out_of_range = review_service::upsert_review(&state, &buyer, review(6))
        .await
        .unwrap_err();
    assert!(matches!(out_of_range, AppError::BadRequest(_)));

    review_service::upsert_review(&state, &buyer, review(2)).await?;
    let saved = review_service::upsert_review(&state, &buyer, review(5))
        .await?
        .data
        .expect("review");
    assert_eq!(saved.rating, 5);
    assert_eq!(saved.comment.as_deref(), Some("Lovely"));
    review_service::upsert_review(&state, &admin, review(4)).await?;

    let list = review_service::list_product_reviews(&state, ring)
        .await?
        .data
        .expect("reviews");
    assert_eq!(list.count, 2);
    assert_eq!(list.average_rating, Some(4.5));

    let add = || AddWishlistRequest { product_id: ring };
    wishlist_service::add_to_wishlist(&state, &buyer, add()).await?;
    let twice = wishlist_service::add_to_wishlist(&state, &buyer, add())
        .await?
        .data
        .expect("wishlist");
    assert_eq!(twice.products.len(), 1);

    wishlist_service::remove_from_wishlist(&state, &buyer, ring).await?;
    let missing = wishlist_service::remove_from_wishlist(&state, &buyer, ring)
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
#[serial]
async fn hyphenated_category_names_resolve_by_slug() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let rose = common::create_category(&state, &admin, "rose-gold").await?;
    common::create_product(&state, &admin, "Rose Band", 210.0, 2, "Rose-gold").await?;

    let filtered = product_service::list_shop_products(
        &state,
        CatalogQuery {
            category: Some("rose-gold".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products");
    assert_eq!(filtered.products.len(), 1);
    assert_eq!(filtered.products[0].category_slug.as_deref(), Some("rose-gold"));

    let same_slug = common::create_category(&state, &admin, "Rose Gold")
        .await
        .unwrap_err();
    assert!(
        same_slug
            .downcast_ref::<AppError>()
            .is_some_and(|e| matches!(e, AppError::Conflict(_)))
    );

    let renamed = category_service::update_category(
        &state,
        &admin,
        rose,
        UpdateCategoryRequest {
            name: "Rose Gold".into(),
            description: None,
            image: None,
        },
    )
    .await?
    .data
    .expect("category");
    assert_eq!(renamed.name, "Rose Gold");
    let categories = category_service::list_shop_categories(&state)
        .await?
        .data
        .expect("categories");
    assert_eq!(categories.categories[0].slug, "rose-gold");
    assert_eq!(categories.categories[0].product_count, 1);
    Ok(())
}

fn order_of(user_id: Uuid, lines: &[(Uuid, i32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id,
        items: lines
            .iter()
            .map(|&(product_id, quantity)| OrderLineRequest {
                product_id,
                quantity,
            })
            .collect(),
        status: None,
    }
}

#[tokio::test]
#[serial]
async fn bestsellers_rank_by_units_sold() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let solitaire = common::create_product(&state, &admin, "Solitaire", 900.0, 20, "Rings").await?;
    let signet = common::create_product(&state, &admin, "Signet", 150.0, 20, "Rings").await?;
    let eternity = common::create_product(&state, &admin, "Eternity", 700.0, 20, "Rings").await?;
    common::create_product(&state, &admin, "Unsold", 10.0, 20, "Rings").await?;

    let first = order_of(buyer.user_id, &[(solitaire, 1), (signet, 2)]);
    order_service::create_order(&state, &admin, first).await?;
    let second = order_of(buyer.user_id, &[(signet, 1), (solitaire, 1)]);
    order_service::create_order(&state, &admin, second).await?;
    let big = order_of(buyer.user_id, &[(eternity, 9)]);
    let cancelled = order_service::create_order(&state, &admin, big)
        .await?
        .data
        .expect("order");
    order_service::update_order_status(
        &state,
        &admin,
        cancelled.order.id,
        UpdateOrderStatusRequest {
            status: "CANCELLED".into(),
        },
    )
    .await?;

    let ranked = product_service::list_bestsellers(&state, BestsellerQuery::default())
        .await?
        .data
        .expect("bestsellers");
    let names: Vec<&str> = ranked.products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Signet", "Solitaire"]);
    assert_eq!(ranked.products[0].category_name.as_deref(), Some("Rings"));

    let top = product_service::list_bestsellers(&state, BestsellerQuery { limit: Some(1) })
        .await?
        .data
        .expect("bestsellers");
    assert_eq!(top.products.len(), 1);
    assert_eq!(top.products[0].id, signet);
    Ok(())
}
