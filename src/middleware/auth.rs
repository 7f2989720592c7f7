use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use uuid::Uuid;

use crate::{
    entity::users::{Entity as Users, Role},
    error::{AppError, AppResult},
    services::auth_service::AUTH_COOKIE,
    state::AppState,
};

/// Authenticated caller, inserted into request extensions by [`require_auth`]
/// and [`require_admin`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn ensure_admin(ctx: &AuthContext) -> AppResult<()> {
    if !ctx.is_admin() {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Cookie first, then `Authorization: Bearer`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(AUTH_COOKIE)?.strip_prefix('='))
        .find(|token| !token.is_empty())
        .map(str::to_string);
    if from_cookie.is_some() {
        return from_cookie;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    authorize(&state, req, next, false).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    authorize(&state, req, next, true).await
}

async fn authorize(
    state: &AppState,
    mut req: Request,
    next: Next,
    admin_only: bool,
) -> AppResult<Response> {
    let token = extract_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let claims = state.tokens.verify(&token)?;
    // Non-admin tokens never reach the database on admin routes.
    if admin_only && claims.role != Role::Admin {
        return Err(AppError::Unauthorized);
    }
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if admin_only && user.role != Role::Admin {
        return Err(AppError::Unauthorized);
    }

    let rotated = if state.tokens.needs_rotation(&claims) {
        let token = state.tokens.issue(user.id, &user.email, user.role)?;
        Some(state.tokens.cookie(&token)?)
    } else {
        None
    };

    req.extensions_mut().insert(AuthContext {
        user_id: user.id,
        email: user.email,
        role: user.role,
    });

    let mut response = next.run(req).await;
    if let Some(cookie) = rotated {
        tracing::debug!(%user_id, "session token rotated");
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_cookie_over_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=from-cookie"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("tokenish=1; token="),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn missing_or_foreign_scheme_yields_none() {
        let mut headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcg=="),
        );
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        let mut ctx = AuthContext {
            user_id: Uuid::new_v4(),
            email: "c@example.com".into(),
            role: Role::Customer,
        };
        assert!(matches!(ensure_admin(&ctx), Err(AppError::Unauthorized)));
        ctx.role = Role::Admin;
        assert!(ensure_admin(&ctx).is_ok());
    }
}
