use axum::{
    extract::State,
    http::StatusCode,
};
use lms_db::entities::enrollments;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use uuid::Uuid;

use crate::api::users::{UserDto, map_user};
use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::guard::Identity;
use crate::services;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EnrollmentDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTimeWithTimeZone,
}

fn map_enrollment(e: enrollments::Model) -> EnrollmentDto {
    EnrollmentDto {
        id: e.id,
        user_id: e.user_id,
        course_id: e.course_id,
        enrolled_at: e.enrolled_at,
    }
}

pub async fn enroll(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnrollmentDto>), AppError> {
    identity.require_student("enroll in courses")?;
    let course = services::courses::get_course(&state.db, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))?;
    let enrollment = services::enrollments::create_enrollment(&state.db, identity.id(), &course).await?;
    Ok((StatusCode::CREATED, Json(map_enrollment(enrollment))))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<EnrollmentDto>>, AppError> {
    let rows = services::enrollments::list_for_user(&state.db, identity.id()).await?;
    Ok(Json(rows.into_iter().map(map_enrollment).collect()))
}

pub async fn course_students(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<UserDto>>, AppError> {
    identity.require_admin()?;
    if services::courses::get_course(&state.db, course_id).await?.is_none() {
        return Err(AppError::not_found("course not found"));
    }
    let students = services::enrollments::list_course_students(&state.db, course_id).await?;
    Ok(Json(students.into_iter().map(map_user).collect()))
}
