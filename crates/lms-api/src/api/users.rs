use axum::extract::State;
use lms_db::entities::{Role, users};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::guard::Identity;
use crate::services;
use crate::state::AppState;

/// Public view of an account. The password hash never leaves the service.
#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: DateTimeWithTimeZone,
}

pub fn map_user(user: users::Model) -> UserDto {
    UserDto {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
        created_at: user.created_at,
    }
}

pub async fn me(identity: Identity) -> Json<UserDto> {
    Json(map_user(identity.0))
}

pub async fn get_user(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDto>, AppError> {
    identity.require_admin()?;
    let user = services::users::get_user(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(map_user(user)))
}
