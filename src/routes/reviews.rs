use axum::{Json, Router, extract::State, middleware::from_fn_with_state, routing::post};

use crate::{
    dto::reviews::CreateReviewRequest,
    error::AppResult,
    extract::AppJson,
    middleware::auth::{AuthContext, require_auth},
    models::Review,
    response::ApiResponse,
    services::review_service,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_review))
        .route_layer(from_fn_with_state(state, require_auth))
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Review created or replaced", body = ApiResponse<Review>),
        (status = 400, description = "Rating outside 1-5"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    Ok(Json(review_service::upsert_review(&state, &ctx, payload).await?))
}
