use axum::{Json, Router, extract::State, middleware::from_fn_with_state, routing::get};

use crate::{
    dto::users::UpdateProfileRequest,
    error::AppResult,
    extract::AppJson,
    middleware::auth::{AuthContext, require_auth},
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route_layer(from_fn_with_state(state, require_auth))
}

#[utoipa::path(
    get,
    path = "/api/user/profile",
    responses(
        (status = 200, description = "Profile of the caller", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "User"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(auth_service::get_profile(&state, &ctx).await?))
}

#[utoipa::path(
    put,
    path = "/api/user/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<User>),
        (status = 400, description = "Invalid name or email"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Email already registered")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "User"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    ctx: AuthContext,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        auth_service::update_profile(&state, &ctx, payload).await?,
    ))
}
