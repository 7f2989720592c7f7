use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use axum::http::HeaderValue;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    QueryFilter, Set,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    config::AppConfig,
    dto::{
        auth::{AuthPayload, Claims, LoginRequest, RegisterRequest},
        users::UpdateProfileRequest,
    },
    entity::users::{self, Column as UserCol, Entity as Users, Role},
    error::{AppError, AppResult},
    middleware::auth::AuthContext,
    models::User,
    response::ApiResponse,
    state::AppState,
};

pub const AUTH_COOKIE: &str = "token";

/// Issues and verifies session tokens and builds the matching cookies.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    refresh_threshold: Duration,
    secure_cookie: bool,
}

impl TokenService {
    pub fn new(
        secret: &str,
        ttl: Duration,
        refresh_threshold: Duration,
        secure_cookie: bool,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            refresh_threshold,
            secure_cookie,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::hours(config.token_ttl_hours),
            Duration::hours(config.token_refresh_threshold_hours),
            config.production,
        )
    }

    pub fn issue(&self, user_id: Uuid, email: &str, role: Role) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {e}")))
    }

    /// Expired, malformed or foreign tokens are all `Unauthorized`.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                AppError::Unauthorized
            })
    }

    pub fn needs_rotation(&self, claims: &Claims) -> bool {
        claims.exp - Utc::now().timestamp() < self.refresh_threshold.num_seconds()
    }

    pub fn cookie(&self, token: &str) -> AppResult<HeaderValue> {
        self.build_cookie(token, self.ttl.num_seconds())
    }

    pub fn clear_cookie(&self) -> AppResult<HeaderValue> {
        self.build_cookie("", 0)
    }

    fn build_cookie(&self, token: &str, max_age: i64) -> AppResult<HeaderValue> {
        let mut cookie =
            format!("{AUTH_COOKIE}={token}; Path=/; HttpOnly; Max-Age={max_age}; SameSite=Lax");
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.into()))
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Expects a normalized email.
pub(crate) async fn email_taken<C: ConnectionTrait>(
    conn: &C,
    email: &str,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let mut condition = Condition::all().add(UserCol::Email.eq(email));
    if let Some(id) = exclude {
        condition = condition.add(UserCol::Id.ne(id));
    }
    Ok(Users::find().filter(condition).one(conn).await?.is_some())
}

fn session(state: &AppState, user: users::Model) -> AppResult<(AuthPayload, HeaderValue)> {
    let token = state.tokens.issue(user.id, &user.email, user.role)?;
    let cookie = state.tokens.cookie(&token)?;
    Ok((
        AuthPayload {
            user: user.into(),
            token,
        },
        cookie,
    ))
}

/// Self-registration always creates a `CUSTOMER`.
pub async fn register(
    state: &AppState,
    mut payload: RegisterRequest,
) -> AppResult<(ApiResponse<AuthPayload>, HeaderValue)> {
    payload.email = normalize_email(&payload.email);
    payload.name = payload.name.trim().to_string();
    payload.validate()?;

    if email_taken(&state.orm, &payload.email, None).await? {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(payload.email),
        password_hash: Set(hash_password(&payload.password)?),
        name: Set(payload.name),
        role: Set(Role::Customer),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(user_id = %user.id, "user registered");
    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let (payload, cookie) = session(state, user)?;
    Ok((ApiResponse::success("User registered", payload), cookie))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<(ApiResponse<AuthPayload>, HeaderValue)> {
    let email = normalize_email(&payload.email);
    let requested = payload.role.as_deref().map(str::trim);
    let requested_role = match requested.filter(|r| !r.is_empty()) {
        Some(raw) => Some(
            Role::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Invalid role '{raw}'")))?,
        ),
        None => None,
    };

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    if let Some(role) = requested_role {
        if role != user.role {
            tracing::debug!(user_id = %user.id, "login with mismatched role");
            return Err(AppError::Forbidden);
        }
    }

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let (payload, cookie) = session(state, user)?;
    Ok((ApiResponse::success("Logged in", payload), cookie))
}

pub async fn refresh(
    state: &AppState,
    ctx: &AuthContext,
) -> AppResult<(ApiResponse<AuthPayload>, HeaderValue)> {
    let user = current_user(state, ctx).await?;
    let (payload, cookie) = session(state, user)?;
    Ok((ApiResponse::success("Token refreshed", payload), cookie))
}

pub async fn me(state: &AppState, ctx: &AuthContext) -> AppResult<ApiResponse<User>> {
    let user = current_user(state, ctx).await?;
    Ok(ApiResponse::success("Current user", user.into()))
}

async fn current_user(state: &AppState, ctx: &AuthContext) -> AppResult<users::Model> {
    Users::find_by_id(ctx.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn get_profile(state: &AppState, ctx: &AuthContext) -> AppResult<ApiResponse<User>> {
    let user = current_user(state, ctx).await?;
    Ok(ApiResponse::success("Profile", user.into()))
}

/// Only fields present in the payload change. Role and password are not
/// editable here.
pub async fn update_profile(
    state: &AppState,
    ctx: &AuthContext,
    mut payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    payload.name = payload.name.map(|name| name.trim().to_string());
    payload.email = payload.email.as_deref().map(normalize_email);
    payload.validate()?;

    let user = current_user(state, ctx).await?;
    if let Some(email) = payload.email.as_deref() {
        if email_taken(&state.orm, email, Some(user.id)).await? {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
    }

    let mut active: users::ActiveModel = user.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(email) = payload.email {
        active.email = Set(email);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let user = active.update(&state.orm).await?;

    tracing::info!(user_id = %user.id, "profile updated");
    audit::record(
        &state.pool,
        Some(user.id),
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("Profile updated", user.into()))
}
