use chrono::{DateTime, FixedOffset, Utc};
use lms_db::entities::assignments;
use sea_orm::sea_query::NullOrdering;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait, Order,
    QueryFilter, QueryOrder, Select, Set,
};
use uuid::Uuid;

use crate::error::AppError;

pub struct NewAssignment {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Default)]
pub struct AssignmentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub due_date: Option<DateTime<FixedOffset>>,
}

fn ensure_not_past(due: Option<&DateTime<FixedOffset>>) -> Result<(), AppError> {
    if let Some(due) = due {
        if due.with_timezone(&Utc) < Utc::now() {
            return Err(AppError::invalid("due_date", "due_date must not be in the past"));
        }
    }
    Ok(())
}

/// Soonest deadline first, undated work last, then newest.
fn ordered(select: Select<assignments::Entity>) -> Select<assignments::Entity> {
    select
        .order_by_with_nulls(assignments::Column::DueDate, Order::Asc, NullOrdering::Last)
        .order_by_desc(assignments::Column::CreatedAt)
}

pub async fn get_assignment(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<assignments::Model>, DbErr> {
    assignments::Entity::find_by_id(id).one(db).await
}

pub async fn list_for_course(
    db: &DatabaseConnection,
    course_id: Uuid,
) -> Result<Vec<assignments::Model>, DbErr> {
    ordered(assignments::Entity::find().filter(assignments::Column::CourseId.eq(course_id)))
        .all(db)
        .await
}

/// Everything in the given courses; an admin passes `None` to see all of them.
pub async fn list_for_courses(
    db: &DatabaseConnection,
    course_ids: Option<Vec<Uuid>>,
) -> Result<Vec<assignments::Model>, DbErr> {
    let select = match course_ids {
        Some(ids) if ids.is_empty() => return Ok(Vec::new()),
        Some(ids) => assignments::Entity::find().filter(assignments::Column::CourseId.is_in(ids)),
        None => assignments::Entity::find(),
    };
    ordered(select).all(db).await
}

pub async fn create_assignment(
    db: &DatabaseConnection,
    course_id: Uuid,
    input: NewAssignment,
) -> Result<assignments::Model, AppError> {
    ensure_not_past(input.due_date.as_ref())?;

    let assignment = assignments::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_id: Set(course_id),
        title: Set(input.title),
        description: Set(input.description),
        link: Set(input.link),
        due_date: Set(input.due_date),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    tracing::info!(assignment_id = %assignment.id, course_id = %course_id, "assignment created");
    Ok(assignment)
}

pub async fn update_assignment(
    db: &DatabaseConnection,
    assignment: assignments::Model,
    changes: AssignmentChanges,
) -> Result<assignments::Model, AppError> {
    ensure_not_past(changes.due_date.as_ref())?;

    let mut active: assignments::ActiveModel = assignment.into();
    if let Some(title) = changes.title {
        active.title = Set(title);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(link) = changes.link {
        active.link = Set(Some(link));
    }
    if let Some(due) = changes.due_date {
        active.due_date = Set(Some(due));
    }

    let assignment = active.update(db).await?;
    tracing::info!(assignment_id = %assignment.id, "assignment updated");
    Ok(assignment)
}

pub async fn delete_assignment(
    db: &DatabaseConnection,
    assignment: assignments::Model,
) -> Result<(), DbErr> {
    let id = assignment.id;
    assignment.delete(db).await?;
    tracing::info!(assignment_id = %id, "assignment deleted");
    Ok(())
}
