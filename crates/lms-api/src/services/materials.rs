use chrono::Utc;
use lms_db::entities::{MaterialType, materials};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

pub struct NewMaterial {
    pub title: String,
    pub link: String,
    pub material_type: MaterialType,
}

pub async fn get_material(db: &DatabaseConnection, id: Uuid) -> Result<Option<materials::Model>, DbErr> {
    materials::Entity::find_by_id(id).one(db).await
}

pub async fn list_materials(
    db: &DatabaseConnection,
    course_id: Uuid,
) -> Result<Vec<materials::Model>, DbErr> {
    materials::Entity::find()
        .filter(materials::Column::CourseId.eq(course_id))
        .order_by_desc(materials::Column::CreatedAt)
        .all(db)
        .await
}

pub async fn create_material(
    db: &DatabaseConnection,
    course_id: Uuid,
    input: NewMaterial,
) -> Result<materials::Model, DbErr> {
    let material = materials::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_id: Set(course_id),
        title: Set(input.title),
        link: Set(input.link),
        material_type: Set(input.material_type),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    tracing::info!(material_id = %material.id, course_id = %course_id, "material added");
    Ok(material)
}

pub async fn delete_material(db: &DatabaseConnection, material: materials::Model) -> Result<(), DbErr> {
    let id = material.id;
    material.delete(db).await?;
    tracing::info!(material_id = %id, "material deleted");
    Ok(())
}
