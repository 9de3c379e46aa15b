use chrono::Utc;
use lms_db::entities::{Role, users};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::error::{AppError, conflict_on_unique};

pub struct NewUser {
    /// Already normalized.
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: Role,
}

pub async fn get_user(db: &DatabaseConnection, id: Uuid) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find_by_id(id).one(db).await
}

pub async fn get_user_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<users::Model>, DbErr> {
    users::Entity::find()
        .filter(users::Column::Email.eq(email.to_lowercase()))
        .one(db)
        .await
}

pub async fn create_user(db: &DatabaseConnection, input: NewUser) -> Result<users::Model, AppError> {
    let model = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(input.email),
        password_hash: Set(input.password_hash),
        full_name: Set(input.full_name),
        role: Set(input.role),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };

    let user = model
        .insert(db)
        .await
        .map_err(|e| conflict_on_unique(e, "a user with this email already exists"))?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok(user)
}
