use std::collections::HashMap;

use chrono::Utc;
use lms_db::entities::{assignments, courses, submissions, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::enrollments;

pub struct NewSubmission {
    pub message: String,
    pub link: Option<String>,
}

/// One row of the admin overview: a submission with the names around it resolved.
#[derive(Debug, Clone)]
pub struct OverviewRow {
    pub submission: submissions::Model,
    pub assignment_title: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub student_email: String,
    pub student_name: Option<String>,
}

/// Resubmission is allowed; every call appends a new row.
pub async fn create_submission(
    db: &DatabaseConnection,
    user_id: Uuid,
    assignment: &assignments::Model,
    input: NewSubmission,
) -> Result<submissions::Model, AppError> {
    if !enrollments::is_enrolled(db, user_id, assignment.course_id).await? {
        return Err(AppError::bad_request("not enrolled in this course"));
    }

    let submission = submissions::ActiveModel {
        id: Set(Uuid::new_v4()),
        assignment_id: Set(assignment.id),
        user_id: Set(user_id),
        message: Set(input.message),
        link: Set(input.link),
        submitted_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    tracing::info!(
        submission_id = %submission.id,
        assignment_id = %assignment.id,
        user_id = %user_id,
        "submission received"
    );
    Ok(submission)
}

pub async fn latest_for(
    db: &DatabaseConnection,
    assignment_id: Uuid,
    user_id: Uuid,
) -> Result<Option<submissions::Model>, DbErr> {
    submissions::Entity::find()
        .filter(submissions::Column::AssignmentId.eq(assignment_id))
        .filter(submissions::Column::UserId.eq(user_id))
        .order_by_desc(submissions::Column::SubmittedAt)
        .one(db)
        .await
}

pub async fn list_for_assignment(
    db: &DatabaseConnection,
    assignment_id: Uuid,
) -> Result<Vec<submissions::Model>, DbErr> {
    submissions::Entity::find()
        .filter(submissions::Column::AssignmentId.eq(assignment_id))
        .order_by_desc(submissions::Column::SubmittedAt)
        .all(db)
        .await
}

pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Vec<submissions::Model>, DbErr> {
    submissions::Entity::find()
        .filter(submissions::Column::UserId.eq(user_id))
        .order_by_desc(submissions::Column::SubmittedAt)
        .all(db)
        .await
}

/// Every submission in the system, newest first. Rows whose assignment, course, or
/// author vanished mid-read are skipped.
pub async fn overview(db: &DatabaseConnection) -> Result<Vec<OverviewRow>, DbErr> {
    let rows = submissions::Entity::find()
        .order_by_desc(submissions::Column::SubmittedAt)
        .all(db)
        .await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let assignment_ids: Vec<Uuid> = rows.iter().map(|s| s.assignment_id).collect();
    let user_ids: Vec<Uuid> = rows.iter().map(|s| s.user_id).collect();

    let assignments: HashMap<Uuid, assignments::Model> = assignments::Entity::find()
        .filter(assignments::Column::Id.is_in(assignment_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    let course_ids: Vec<Uuid> = assignments.values().map(|a| a.course_id).collect();
    let courses: HashMap<Uuid, courses::Model> = courses::Entity::find()
        .filter(courses::Column::Id.is_in(course_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let users: HashMap<Uuid, users::Model> = users::Entity::find()
        .filter(users::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(rows
        .into_iter()
        .filter_map(|submission| {
            let assignment = assignments.get(&submission.assignment_id)?;
            let course = courses.get(&assignment.course_id)?;
            let student = users.get(&submission.user_id)?;
            Some(OverviewRow {
                assignment_title: assignment.title.clone(),
                course_id: course.id,
                course_title: course.title.clone(),
                student_email: student.email.clone(),
                student_name: student.full_name.clone(),
                submission,
            })
        })
        .collect())
}
