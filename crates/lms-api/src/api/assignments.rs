use axum::{
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, FixedOffset};
use lms_db::entities::{assignments, submissions};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{Json, Path};
use crate::guard::{self, Identity};
use crate::services;
use crate::services::assignments::{self as assignment_service, AssignmentChanges, NewAssignment};
use crate::services::submissions::{self as submission_service, NewSubmission, OverviewRow};
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Serialize)]
pub struct AssignmentDto {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub due_date: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Debug, Serialize)]
pub struct SubmissionDto {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub link: Option<String>,
    pub submitted_at: DateTimeWithTimeZone,
}

#[derive(Debug, Serialize)]
pub struct OverviewDto {
    #[serde(flatten)]
    pub submission: SubmissionDto,
    pub assignment_title: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub student_email: String,
    pub student_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentInput {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssignmentInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitInput {
    pub message: String,
    pub link: Option<String>,
}

fn map_assignment(a: assignments::Model) -> AssignmentDto {
    AssignmentDto {
        id: a.id,
        course_id: a.course_id,
        title: a.title,
        description: a.description,
        link: a.link,
        due_date: a.due_date,
        created_at: a.created_at,
    }
}

fn map_submission(s: submissions::Model) -> SubmissionDto {
    SubmissionDto {
        id: s.id,
        assignment_id: s.assignment_id,
        user_id: s.user_id,
        message: s.message,
        link: s.link,
        submitted_at: s.submitted_at,
    }
}

fn map_overview(row: OverviewRow) -> OverviewDto {
    OverviewDto {
        submission: map_submission(row.submission),
        assignment_title: row.assignment_title,
        course_id: row.course_id,
        course_title: row.course_title,
        student_email: row.student_email,
        student_name: row.student_name,
    }
}

async fn load_assignment(state: &AppState, id: Uuid) -> Result<assignments::Model, AppError> {
    assignment_service::get_assignment(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("assignment not found"))
}

/// Admins see every assignment; students see those of the courses they are in.
pub async fn my_assignments(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<AssignmentDto>>, AppError> {
    let scope = if identity.is_admin() {
        None
    } else {
        Some(services::enrollments::course_ids_for_user(&state.db, identity.id()).await?)
    };
    let rows = assignment_service::list_for_courses(&state.db, scope).await?;
    Ok(Json(rows.into_iter().map(map_assignment).collect()))
}

pub async fn course_assignments(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentDto>>, AppError> {
    guard::ensure_course_access(&state.db, Some(&identity), course_id).await?;
    let rows = assignment_service::list_for_course(&state.db, course_id).await?;
    Ok(Json(rows.into_iter().map(map_assignment).collect()))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    identity: Identity,
    Path(course_id): Path<Uuid>,
    Json(input): Json<CreateAssignmentInput>,
) -> Result<(StatusCode, Json<AssignmentDto>), AppError> {
    identity.require_admin()?;
    if services::courses::get_course(&state.db, course_id).await?.is_none() {
        return Err(AppError::not_found("course not found"));
    }

    let assignment = assignment_service::create_assignment(
        &state.db,
        course_id,
        NewAssignment {
            title: validation::title("title", &input.title)?,
            description: validation::optional_text(
                "description",
                input.description,
                validation::DESCRIPTION_MAX_CHARS,
            )?,
            link: validation::optional_link("link", input.link)?,
            due_date: input.due_date,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(map_assignment(assignment))))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateAssignmentInput>,
) -> Result<Json<AssignmentDto>, AppError> {
    identity.require_admin()?;
    let assignment = load_assignment(&state, id).await?;

    let changes = AssignmentChanges {
        title: input
            .title
            .as_deref()
            .map(|t| validation::title("title", t))
            .transpose()?,
        description: validation::optional_text(
            "description",
            input.description,
            validation::DESCRIPTION_MAX_CHARS,
        )?,
        link: validation::optional_link("link", input.link)?,
        due_date: input.due_date,
    };
    let assignment = assignment_service::update_assignment(&state.db, assignment, changes).await?;
    Ok(Json(map_assignment(assignment)))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    identity.require_admin()?;
    let assignment = load_assignment(&state, id).await?;
    assignment_service::delete_assignment(&state.db, assignment).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(input): Json<SubmitInput>,
) -> Result<(StatusCode, Json<SubmissionDto>), AppError> {
    identity.require_student("submit assignments")?;
    let assignment = load_assignment(&state, id).await?;

    let submission = submission_service::create_submission(
        &state.db,
        identity.id(),
        &assignment,
        NewSubmission {
            message: validation::message(&input.message)?,
            link: validation::optional_link("link", input.link)?,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(map_submission(submission))))
}

pub async fn my_submission(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmissionDto>, AppError> {
    identity.require_student("view their submissions")?;
    let assignment = load_assignment(&state, id).await?;
    let submission = submission_service::latest_for(&state.db, assignment.id, identity.id())
        .await?
        .ok_or_else(|| AppError::not_found("no submission for this assignment yet"))?;
    Ok(Json(map_submission(submission)))
}

pub async fn my_submissions(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<SubmissionDto>>, AppError> {
    let rows = submission_service::list_for_user(&state.db, identity.id()).await?;
    Ok(Json(rows.into_iter().map(map_submission).collect()))
}

pub async fn assignment_submissions(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionDto>>, AppError> {
    identity.require_admin()?;
    let assignment = load_assignment(&state, id).await?;
    let rows = submission_service::list_for_assignment(&state.db, assignment.id).await?;
    Ok(Json(rows.into_iter().map(map_submission).collect()))
}

pub async fn admin_overview(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<OverviewDto>>, AppError> {
    identity.require_admin()?;
    let rows = submission_service::overview(&state.db).await?;
    Ok(Json(rows.into_iter().map(map_overview).collect()))
}
