use axum::{
    extract::State,
    http::StatusCode,
};
use lms_db::entities::{CourseLevel, courses};
use sea_orm::Iterable;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::guard::{self, Identity, OptionalIdentity};
use crate::services::courses::{self as course_service, CourseChanges, CourseQuery, NewCourse};
use crate::state::AppState;
use crate::validation;

const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Debug, Serialize)]
pub struct CourseDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub level: CourseLevel,
    pub duration_minutes: Option<i32>,
    pub is_published: bool,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub students_count: u64,
}

#[derive(Debug, Serialize)]
pub struct CoursePageDto {
    pub items: Vec<CourseDto>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
pub struct LevelDto {
    pub value: CourseLevel,
    pub label: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ListCoursesInput {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub level: CourseLevel,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    pub duration_minutes: Option<i32>,
    pub is_published: Option<bool>,
}

pub fn map_course(course: courses::Model, students_count: u64) -> CourseDto {
    CourseDto {
        id: course.id,
        title: course.title,
        description: course.description,
        level: course.level,
        duration_minutes: course.duration_minutes,
        is_published: course.is_published,
        created_by: course.created_by,
        created_at: course.created_at,
        updated_at: course.updated_at,
        students_count,
    }
}

pub async fn list_courses(
    State(state): State<AppState>,
    viewer: OptionalIdentity,
    Query(input): Query<ListCoursesInput>,
) -> Result<Json<CoursePageDto>, AppError> {
    let admin = viewer.is_admin();
    let query = CourseQuery {
        skip: input.skip.unwrap_or(0),
        limit: input
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, course_service::MAX_PAGE_SIZE),
        search: input.search,
        published_only: !admin,
        is_published: if admin { input.is_published } else { None },
    };

    let (rows, total) = course_service::list_courses(&state.db, &query).await?;
    Ok(Json(CoursePageDto {
        items: rows
            .into_iter()
            .map(|(course, students)| map_course(course, students))
            .collect(),
        total,
        skip: query.skip,
        limit: query.limit,
    }))
}

pub async fn levels() -> Json<Vec<LevelDto>> {
    Json(
        CourseLevel::iter()
            .map(|level| LevelDto {
                value: level,
                label: level.label(),
            })
            .collect(),
    )
}

pub async fn create_course(
    State(state): State<AppState>,
    identity: Identity,
    Json(input): Json<CreateCourseInput>,
) -> Result<(StatusCode, Json<CourseDto>), AppError> {
    identity.require_admin()?;
    let course = course_service::create_course(
        &state.db,
        NewCourse {
            title: validation::course_title(&input.title)?,
            description: validation::optional_text(
                "description",
                input.description,
                validation::DESCRIPTION_MAX_CHARS,
            )?,
            level: input.level,
            duration_minutes: validation::duration_minutes(input.duration_minutes)?,
        },
        identity.id(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(map_course(course, 0))))
}

pub async fn get_course(
    State(state): State<AppState>,
    viewer: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseDto>, AppError> {
    let course = guard::visible_course(&state.db, &viewer, id).await?;
    let students = course_service::count_students(&state.db, course.id).await?;
    Ok(Json(map_course(course, students)))
}

pub async fn update_course(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCourseInput>,
) -> Result<Json<CourseDto>, AppError> {
    identity.require_admin()?;
    let course = course_service::get_course(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))?;

    let changes = CourseChanges {
        title: input
            .title
            .as_deref()
            .map(validation::course_title)
            .transpose()?,
        description: validation::optional_text(
            "description",
            input.description,
            validation::DESCRIPTION_MAX_CHARS,
        )?,
        level: input.level,
        duration_minutes: validation::duration_minutes(input.duration_minutes)?,
        is_published: input.is_published,
    };

    let course = course_service::update_course(&state.db, course, changes).await?;
    let students = course_service::count_students(&state.db, course.id).await?;
    Ok(Json(map_course(course, students)))
}

pub async fn delete_course(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    identity.require_admin()?;
    let course = course_service::get_course(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))?;
    course_service::delete_course(&state.db, course).await?;
    Ok(StatusCode::NO_CONTENT)
}
