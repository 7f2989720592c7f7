mod common;

use std::time::Duration;

use sea_orm::{EntityTrait, TransactionTrait};
use serde_json::json;
use serial_test::serial;
use storefront_api::{
    dto::{
        cart::AddToCartRequest,
        orders::{CreateOrderRequest, OrderLineRequest, UpdateOrderStatusRequest},
        products::UpdateProductRequest,
    },
    entity::{
        orders::{Entity as Orders, OrderStatus},
        products::Entity as Products,
        users::{Entity as Users, Role},
    },
    error::AppError,
    middleware::auth::AuthContext,
    services::{cart_service, order_service, product_service},
    state::AppState,
};
use uuid::Uuid;

async fn stock_of(state: &AppState, id: Uuid) -> anyhow::Result<i32> {
    Ok(Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .expect("product exists")
        .stock)
}

fn order_for(user: &AuthContext, product_id: Uuid, quantity: i32) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: user.user_id,
        items: vec![OrderLineRequest {
            product_id,
            quantity,
        }],
        status: None,
    }
}

#[tokio::test]
#[serial]
async fn insufficient_stock_leaves_no_trace() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "rings").await?;
    let ring = common::create_product(&state, &admin, "Gold Ring", 250.0, 2, "Rings").await?;

    let err = order_service::create_order(&state, &admin, order_for(&buyer, ring, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { product_id } if product_id == ring));
    assert_eq!(stock_of(&state, ring).await?, 2);
    assert!(Orders::find().all(&state.orm).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[serial]
async fn order_snapshots_price_and_moves_stock() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Necklaces").await?;
    let pendant =
        common::create_product(&state, &admin, "Pearl Pendant", 100.0, 5, "Necklaces").await?;

    let placed = order_service::create_order(
        &state,
        &admin,
        CreateOrderRequest {
            user_id: buyer.user_id,
            items: vec![
                OrderLineRequest {
                    product_id: pendant,
                    quantity: 1,
                },
                OrderLineRequest {
                    product_id: pendant,
                    quantity: 1,
                },
            ],
            status: Some("processing".into()),
        },
    )
    .await?
    .data
    .expect("order");

    assert_eq!(placed.order.status, OrderStatus::Processing);
    assert_eq!(placed.order.total, 200.0);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 2);
    assert_eq!(placed.items[0].price, 100.0);
    assert_eq!(placed.items[0].product_name, "Pearl Pendant");
    assert_eq!(stock_of(&state, pendant).await?, 3);

    product_service::update_product(
        &state,
        &admin,
        pendant,
        UpdateProductRequest {
            price: Some(json!("180")),
            ..Default::default()
        },
    )
    .await?;

    let reloaded = order_service::get_my_order(&state, &buyer, placed.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(reloaded.order.total, 200.0);
    assert_eq!(reloaded.items[0].price, 100.0);
    Ok(())
}

#[tokio::test]
#[serial]
async fn concurrent_orders_for_the_last_unit() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let first = common::create_user(&state, "first@example.com", Role::Customer).await?;
    let second = common::create_user(&state, "second@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Earrings").await?;
    let stud = common::create_product(&state, &admin, "Diamond Stud", 900.0, 1, "Earrings").await?;

    let (a, b) = tokio::join!(
        order_service::create_order(&state, &admin, order_for(&first, stud, 1)),
        order_service::create_order(&state, &admin, order_for(&second, stud, 1)),
    );
    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    for result in [a, b] {
        if let Err(err) = result {
            assert!(matches!(err, AppError::InsufficientStock { .. }));
        }
    }
    assert_eq!(stock_of(&state, stud).await?, 0);
    assert_eq!(Orders::find().all(&state.orm).await?.len(), 1);
    Ok(())
}

#[tokio::test]
#[serial]
async fn checkout_empties_the_cart() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Bracelets").await?;
    let bangle =
        common::create_product(&state, &admin, "Silver Bangle", 45.5, 4, "Bracelets").await?;

    let empty = order_service::checkout(&state, &buyer).await.unwrap_err();
    assert!(matches!(empty, AppError::BadRequest(_)));

    let add = |quantity| AddToCartRequest {
        product_id: bangle,
        quantity,
    };
    cart_service::add_to_cart(&state, &buyer, add(1)).await?;
    let cart = cart_service::add_to_cart(&state, &buyer, add(2))
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.item_count, 3);
    assert_eq!(cart.subtotal, 136.5);

    let placed = order_service::checkout(&state, &buyer).await?.data.expect("order");
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.total, 136.5);
    assert_eq!(stock_of(&state, bangle).await?, 1);

    let cart = cart_service::get_cart(&state, &buyer).await?.data.expect("cart");
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, 0.0);
    Ok(())
}

#[tokio::test]
#[serial]
async fn concurrent_cart_adds_accumulate() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Charms").await?;
    let charm = common::create_product(&state, &admin, "Heart Charm", 12.0, 50, "Charms").await?;
    let one = || AddToCartRequest {
        product_id: charm,
        quantity: 1,
    };

    let (a, b) = tokio::join!(
        cart_service::add_to_cart(&state, &buyer, one()),
        cart_service::add_to_cart(&state, &buyer, one()),
    );
    a?;
    b?;
    for _ in 0..5 {
        let (a, b) = tokio::join!(
            cart_service::add_to_cart(&state, &buyer, one()),
            cart_service::add_to_cart(&state, &buyer, one()),
        );
        a?;
        b?;
    }

    let cart = cart_service::get_cart(&state, &buyer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.item_count, 12);
    Ok(())
}

#[tokio::test]
#[serial]
async fn cancelling_restocks_and_is_final() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let band = common::create_product(&state, &admin, "Platinum Band", 600.0, 3, "Rings").await?;

    let placed = order_service::create_order(&state, &admin, order_for(&buyer, band, 2))
        .await?
        .data
        .expect("order");
    assert_eq!(stock_of(&state, band).await?, 1);

    let status = |s: &str| UpdateOrderStatusRequest {
        status: s.to_string(),
    };
    let order_id = placed.order.id;
    order_service::update_order_status(&state, &admin, order_id, status("SHIPPED")).await?;
    let cancel = status("CANCELLED");
    let cancelled = order_service::update_order_status(&state, &admin, order_id, cancel)
        .await?
        .data
        .expect("order");
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, band).await?, 3);

    let reopen = status("PENDING");
    let err = order_service::update_order_status(&state, &admin, order_id, reopen)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, band).await?, 3);
    Ok(())
}

#[tokio::test]
#[serial]
async fn rejected_order_requests() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let ring = common::create_product(&state, &admin, "Opal Ring", 80.0, 10, "Rings").await?;

    let unknown = order_service::create_order(&state, &admin, order_for(&buyer, Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(unknown, AppError::NotFound(_)));

    let zero = order_service::create_order(&state, &admin, order_for(&buyer, ring, 0))
        .await
        .unwrap_err();
    assert!(matches!(zero, AppError::BadRequest(_)));

    let mut cancelled = order_for(&buyer, ring, 1);
    cancelled.status = Some("CANCELLED".into());
    let err = order_service::create_order(&state, &admin, cancelled).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let mut ghost = order_for(&buyer, ring, 1);
    ghost.user_id = Uuid::new_v4();
    let err = order_service::create_order(&state, &admin, ghost).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = order_service::create_order(&state, &buyer, order_for(&buyer, ring, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    assert_eq!(stock_of(&state, ring).await?, 10);
    assert!(Orders::find().all(&state.orm).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[serial]
async fn buyer_deleted_mid_order_is_not_found() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let buyer = common::create_user(&state, "buyer@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let ring = common::create_product(&state, &admin, "Jade Ring", 70.0, 3, "Rings").await?;

    let deleting = state.orm.begin().await?;
    Users::delete_by_id(buyer.user_id).exec(&deleting).await?;
    let placing = {
        let state = state.clone();
        let request = order_for(&buyer, ring, 1);
        tokio::spawn(async move { order_service::create_order(&state, &admin, request).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    deleting.commit().await?;

    let err = placing.await?.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(stock_of(&state, ring).await?, 3);
    assert!(Orders::find().all(&state.orm).await?.is_empty());
    Ok(())
}

#[tokio::test]
#[serial]
async fn customers_only_see_their_own_orders() -> anyhow::Result<()> {
    let Some(state) = common::setup_state().await? else {
        return Ok(());
    };
    let admin = common::create_user(&state, "admin@example.com", Role::Admin).await?;
    let owner = common::create_user(&state, "owner@example.com", Role::Customer).await?;
    let other = common::create_user(&state, "other@example.com", Role::Customer).await?;
    common::create_category(&state, &admin, "Rings").await?;
    let ring = common::create_product(&state, &admin, "Ruby Ring", 320.0, 4, "Rings").await?;

    let placed = order_service::create_order(&state, &admin, order_for(&owner, ring, 1))
        .await?
        .data
        .expect("order");

    let err = order_service::get_my_order(&state, &other, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let mine = order_service::list_my_orders(&state, &owner, Default::default()).await?;
    assert_eq!(mine.data.expect("orders").orders.len(), 1);
    let theirs = order_service::list_my_orders(&state, &other, Default::default()).await?;
    assert!(theirs.data.expect("orders").orders.is_empty());
    assert_eq!(theirs.pagination.expect("pagination").total, 0);
    Ok(())
}
