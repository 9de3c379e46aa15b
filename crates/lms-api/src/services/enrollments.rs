use chrono::Utc;
use lms_db::entities::{courses, enrollments, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::{AppError, conflict_on_unique};

const ALREADY_ENROLLED: &str = "already enrolled in this course";

pub async fn get_enrollment(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<enrollments::Model>, DbErr> {
    enrollments::Entity::find()
        .filter(enrollments::Column::UserId.eq(user_id))
        .filter(enrollments::Column::CourseId.eq(course_id))
        .one(db)
        .await
}

pub async fn is_enrolled(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<bool, DbErr> {
    Ok(get_enrollment(db, user_id, course_id).await?.is_some())
}

/// The caller has already checked that `user_id` is a student.
pub async fn create_enrollment(
    db: &DatabaseConnection,
    user_id: Uuid,
    course: &courses::Model,
) -> Result<enrollments::Model, AppError> {
    if !course.is_published {
        return Err(AppError::not_found("course not found"));
    }
    if is_enrolled(db, user_id, course.id).await? {
        return Err(AppError::conflict(ALREADY_ENROLLED));
    }

    let model = enrollments::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        course_id: Set(course.id),
        enrolled_at: Set(Utc::now().into()),
    };
    // The unique (user_id, course_id) index settles a race between two requests.
    let enrollment = model
        .insert(db)
        .await
        .map_err(|e| conflict_on_unique(e, ALREADY_ENROLLED))?;
    tracing::info!(user_id = %user_id, course_id = %course.id, "student enrolled");
    Ok(enrollment)
}

pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<Vec<enrollments::Model>, DbErr> {
    enrollments::Entity::find()
        .filter(enrollments::Column::UserId.eq(user_id))
        .order_by_desc(enrollments::Column::EnrolledAt)
        .all(db)
        .await
}

pub async fn course_ids_for_user(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<Uuid>, DbErr> {
    enrollments::Entity::find()
        .select_only()
        .column(enrollments::Column::CourseId)
        .filter(enrollments::Column::UserId.eq(user_id))
        .into_tuple::<Uuid>()
        .all(db)
        .await
}

pub async fn list_course_students(
    db: &DatabaseConnection,
    course_id: Uuid,
) -> Result<Vec<users::Model>, DbErr> {
    users::Entity::find()
        .inner_join(enrollments::Entity)
        .filter(enrollments::Column::CourseId.eq(course_id))
        .order_by_asc(users::Column::Email)
        .all(db)
        .await
}
