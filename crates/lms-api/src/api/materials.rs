use axum::{
    extract::State,
    http::StatusCode,
};
use lms_db::entities::{MaterialType, materials};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::guard::{self, Identity, OptionalIdentity};
use crate::services::{self, materials::NewMaterial};
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Serialize)]
pub struct MaterialDto {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub link: String,
    pub material_type: MaterialType,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Debug, Deserialize)]
pub struct CreateMaterialInput {
    pub title: String,
    pub link: String,
    #[serde(alias = "type")]
    pub material_type: MaterialType,
}

fn map_material(m: materials::Model) -> MaterialDto {
    MaterialDto {
        id: m.id,
        course_id: m.course_id,
        title: m.title,
        link: m.link,
        material_type: m.material_type,
        created_at: m.created_at,
    }
}

pub async fn list_materials(
    State(state): State<AppState>,
    viewer: OptionalIdentity,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<MaterialDto>>, AppError> {
    guard::ensure_course_access(&state.db, viewer.0.as_ref(), course_id).await?;
    let rows = services::materials::list_materials(&state.db, course_id).await?;
    Ok(Json(rows.into_iter().map(map_material).collect()))
}

pub async fn create_material(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<Uuid>,
    Json(input): Json<CreateMaterialInput>,
) -> Result<(StatusCode, Json<MaterialDto>), AppError> {
    identity.require_admin()?;
    if services::courses::get_course(&state.db, course_id).await?.is_none() {
        return Err(AppError::not_found("course not found"));
    }

    let material = services::materials::create_material(
        &state.db,
        course_id,
        NewMaterial {
            title: validation::title("title", &input.title)?,
            link: validation::link("link", &input.link)?,
            material_type: input.material_type,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(map_material(material))))
}

pub async fn delete_material(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    identity.require_admin()?;
    let material = services::materials::get_material(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("material not found"))?;
    services::materials::delete_material(&state.db, material).await?;
    Ok(StatusCode::NO_CONTENT)
}
