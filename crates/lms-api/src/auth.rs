use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use lms_db::entities::Role;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::api::users::{UserDto, map_user};
use crate::config::Config;
use crate::error::AppError;
use crate::extract::Json;
use crate::password::{hash_password_blocking, verify_against_dummy, verify_password_blocking};
use crate::services::users::{self as user_service, NewUser};
use crate::state::AppState;
use crate::tokens::{TokenError, TokenPair};
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshInput {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct DetailOutput {
    pub detail: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    if input.role.is_some_and(|r| r != Role::Student) {
        return Err(AppError::forbidden("self-registration is limited to students"));
    }

    let email = validation::normalize_email(&input.email)?;
    validation::password(&input.password)?;
    let full_name = validation::optional_text("full_name", input.full_name, 200)?;

    let db = &*state.db;
    if user_service::get_user_by_email(db, &email).await?.is_some() {
        return Err(AppError::bad_request("email already registered"));
    }

    let password_hash = hash_password_blocking(input.password).await?;
    let user = user_service::create_user(
        db,
        NewUser {
            email,
            password_hash,
            full_name,
            role: Role::Student,
        },
    )
    .await
    .map_err(|e| match e {
        // Lost a race with a concurrent registration of the same address.
        AppError::Conflict(_) => AppError::bad_request("email already registered"),
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(map_user(user))))
}

fn throttled(retry_after_secs: u64) -> Response {
    let mut resp = AppError::TooManyRequests(
        "too many failed login attempts, try again later".to_string(),
    )
    .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
        resp.headers_mut().insert(header::RETRY_AFTER, value);
    }
    resp
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Response, AppError> {
    let identity = input.email.trim().to_lowercase();
    if state.throttle.is_blocked(&identity) {
        tracing::warn!("login rejected: throttled");
        return Ok(throttled(state.throttle.window().as_secs()));
    }

    let invalid = || AppError::unauthorized("incorrect email or password");
    let user = user_service::get_user_by_email(&state.db, &identity).await?;
    let Some(user) = user else {
        verify_against_dummy(input.password).await?;
        state.throttle.record_attempt(&identity);
        tracing::info!("login failed: unknown email");
        return Err(invalid());
    };

    if !verify_password_blocking(input.password, user.password_hash.clone()).await? {
        state.throttle.record_attempt(&identity);
        tracing::info!(user_id = %user.id, "login failed: bad password");
        return Err(invalid());
    }

    state.throttle.clear(&identity);
    let pair = state.tokens.issue_pair(user.id, user.role)?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "login succeeded");
    Ok(Json(pair).into_response())
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshInput>,
) -> Result<Json<TokenPair>, AppError> {
    let (old, pair) = state.tokens.rotate(&input.refresh_token)?;

    // The old token is spent either way; a deleted account gets nothing new.
    if user_service::get_user(&state.db, old.user_id).await?.is_none() {
        return Err(AppError::unauthorized("user no longer exists"));
    }

    tracing::info!(user_id = %old.user_id, "refresh token rotated");
    Ok(Json(pair))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(input): Json<RefreshInput>,
) -> Result<Json<DetailOutput>, AppError> {
    match state.tokens.logout(&input.refresh_token) {
        Ok(identity) => {
            tracing::info!(user_id = %identity.user_id, "logged out");
            Ok(Json(DetailOutput {
                detail: "logged out".to_string(),
            }))
        }
        Err(TokenError::AlreadyRevoked) => Err(AppError::bad_request("token already revoked")),
        Err(e) => Err(e.into()),
    }
}

/// Creates the configured admin account if no user holds that email yet. Returns
/// whether a row was written.
pub async fn ensure_admin_user(db: &DatabaseConnection, config: &Config) -> anyhow::Result<bool> {
    let (Some(raw_email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(false);
    };

    let email = validation::normalize_email(raw_email)
        .map_err(|e| anyhow::anyhow!("LMS_ADMIN_EMAIL: {e}"))?;
    validation::password(password).map_err(|e| anyhow::anyhow!("LMS_ADMIN_PASSWORD: {e}"))?;

    if user_service::get_user_by_email(db, &email).await?.is_some() {
        return Ok(false);
    }

    let password_hash = hash_password_blocking(password.clone())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    user_service::create_user(
        db,
        NewUser {
            email,
            password_hash,
            full_name: Some("Administrator".to_string()),
            role: Role::Admin,
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("admin bootstrap failed: {e}"))?;
    Ok(true)
}
