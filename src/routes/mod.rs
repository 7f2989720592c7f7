use axum::{Router, http::Uri, routing::get};

use crate::{error::AppError, state::AppState};

pub mod admin;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod reviews;
pub mod shop;
pub mod user;
pub mod wishlist;

/// Everything mounted under `/api`. Protected groups carry their own auth layer.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/shop", shop::router())
        .nest("/cart", cart::router(state.clone()))
        .nest("/wishlist", wishlist::router(state.clone()))
        .nest("/orders", orders::router(state.clone()))
        .nest("/reviews", reviews::router(state.clone()))
        .nest("/user", user::router(state.clone()))
        .nest("/admin", admin::router(state))
}

/// Full application without transport layers.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router(state.clone()))
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(format!("Route {}", uri.path()))
}
