use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    dto::auth::{AuthPayload, LoginRequest, RegisterRequest},
    error::AppResult,
    extract::AppJson,
    middleware::auth::{AuthContext, require_auth},
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route_layer(from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(authenticated)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered, cookie set", body = ApiResponse<AuthPayload>),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let (resp, cookie) = auth_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, cookie set", body = ApiResponse<AuthPayload>),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account does not hold the requested role")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let (resp, cookie) = auth_service::login(&state, payload).await?;
    Ok(([(header::SET_COOKIE, cookie)], Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New token issued", body = ApiResponse<AuthPayload>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<impl IntoResponse> {
    let (resp, cookie) = auth_service::refresh(&state, &ctx).await?;
    Ok(([(header::SET_COOKIE, cookie)], Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookie cleared")
    ),
    tag = "Auth"
)]
pub async fn logout(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let cookie = state.tokens.clear_cookie()?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success("Logged out", serde_json::json!({}))),
    ))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = []), ("cookie_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(auth_service::me(&state, &ctx).await?))
}
