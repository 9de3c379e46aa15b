use std::collections::HashMap;

use chrono::Utc;
use lms_db::entities::{CourseLevel, courses, enrollments};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::error::{AppError, conflict_on_unique};

pub const MAX_PAGE_SIZE: u64 = 100;
const DUPLICATE_TITLE: &str = "a course with this title already exists";

#[derive(Debug, Clone, Default)]
pub struct CourseQuery {
    pub skip: u64,
    pub limit: u64,
    pub search: Option<String>,
    /// Non-admin callers: hide drafts no matter what `is_published` says.
    pub published_only: bool,
    pub is_published: Option<bool>,
}

pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub level: CourseLevel,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Default)]
pub struct CourseChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub level: Option<CourseLevel>,
    pub duration_minutes: Option<i32>,
    pub is_published: Option<bool>,
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

const LIKE_ESCAPE: char = '\\';

/// Makes `%`, `_` and the escape character itself match literally inside a LIKE
/// pattern that uses `LIKE_ESCAPE`.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

fn contains_pattern(needle: &str) -> LikeExpr {
    LikeExpr::new(format!("%{}%", escape_like(needle))).escape(LIKE_ESCAPE)
}

fn filtered(query: &CourseQuery) -> sea_orm::Select<courses::Entity> {
    let mut select = courses::Entity::find();

    if query.published_only {
        select = select.filter(courses::Column::IsPublished.eq(true));
    } else if let Some(flag) = query.is_published {
        select = select.filter(courses::Column::IsPublished.eq(flag));
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        select = select.filter(
            Condition::any()
                .add(
                    Expr::col((courses::Entity, courses::Column::TitleKey))
                        .like(contains_pattern(&needle)),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col((
                        courses::Entity,
                        courses::Column::Description,
                    ))))
                    .like(contains_pattern(&needle)),
                ),
        );
    }

    select
}

/// One page of courses, newest first, each with its enrollment count, plus the total
/// number of matching courses.
pub async fn list_courses(
    db: &DatabaseConnection,
    query: &CourseQuery,
) -> Result<(Vec<(courses::Model, u64)>, u64), DbErr> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let total = filtered(query).count(db).await?;

    let page = filtered(query)
        .order_by_desc(courses::Column::CreatedAt)
        .order_by_asc(courses::Column::Id)
        .offset(query.skip)
        .limit(limit)
        .all(db)
        .await?;

    let ids: Vec<Uuid> = page.iter().map(|c| c.id).collect();
    let counts = count_students_for(db, &ids).await?;
    let items = page
        .into_iter()
        .map(|course| {
            let students = counts.get(&course.id).copied().unwrap_or(0);
            (course, students)
        })
        .collect();
    Ok((items, total))
}

/// Enrollment counts for several courses in one grouped query. Courses without
/// enrollments are absent from the map.
pub async fn count_students_for(
    db: &DatabaseConnection,
    course_ids: &[Uuid],
) -> Result<HashMap<Uuid, u64>, DbErr> {
    if course_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = enrollments::Entity::find()
        .select_only()
        .column(enrollments::Column::CourseId)
        .column_as(Expr::col(enrollments::Column::Id).count(), "students")
        .filter(enrollments::Column::CourseId.is_in(course_ids.iter().copied()))
        .group_by(enrollments::Column::CourseId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, n)| (id, u64::try_from(n).unwrap_or(0)))
        .collect())
}

pub async fn get_course(db: &DatabaseConnection, id: Uuid) -> Result<Option<courses::Model>, DbErr> {
    courses::Entity::find_by_id(id).one(db).await
}

pub async fn count_students(db: &DatabaseConnection, course_id: Uuid) -> Result<u64, DbErr> {
    enrollments::Entity::find()
        .filter(enrollments::Column::CourseId.eq(course_id))
        .count(db)
        .await
}

async fn title_taken(
    db: &DatabaseConnection,
    key: &str,
    except: Option<Uuid>,
) -> Result<bool, DbErr> {
    let mut select = courses::Entity::find().filter(courses::Column::TitleKey.eq(key));
    if let Some(id) = except {
        select = select.filter(courses::Column::Id.ne(id));
    }
    Ok(select.one(db).await?.is_some())
}

pub async fn create_course(
    db: &DatabaseConnection,
    input: NewCourse,
    creator: Uuid,
) -> Result<courses::Model, AppError> {
    let key = title_key(&input.title);
    if title_taken(db, &key, None).await? {
        return Err(AppError::conflict(DUPLICATE_TITLE));
    }

    let now = Utc::now();
    let model = courses::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(input.title),
        title_key: Set(key),
        description: Set(input.description),
        level: Set(input.level),
        duration_minutes: Set(input.duration_minutes),
        is_published: Set(false),
        created_by: Set(creator),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    let course = model
        .insert(db)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_TITLE))?;
    tracing::info!(course_id = %course.id, created_by = %creator, "course created");
    Ok(course)
}

pub async fn update_course(
    db: &DatabaseConnection,
    course: courses::Model,
    changes: CourseChanges,
) -> Result<courses::Model, AppError> {
    let course_id = course.id;
    let mut active: courses::ActiveModel = course.into();

    if let Some(title) = changes.title {
        let key = title_key(&title);
        if title_taken(db, &key, Some(course_id)).await? {
            return Err(AppError::conflict(DUPLICATE_TITLE));
        }
        active.title = Set(title);
        active.title_key = Set(key);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(level) = changes.level {
        active.level = Set(level);
    }
    if let Some(minutes) = changes.duration_minutes {
        active.duration_minutes = Set(Some(minutes));
    }
    if let Some(published) = changes.is_published {
        active.is_published = Set(published);
    }
    active.updated_at = Set(Utc::now().into());

    let course = active
        .update(db)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_TITLE))?;
    tracing::info!(course_id = %course.id, published = course.is_published, "course updated");
    Ok(course)
}

/// Enrollments, materials, assignments, and submissions go with it via FK cascade.
pub async fn delete_course(db: &DatabaseConnection, course: courses::Model) -> Result<(), DbErr> {
    let course_id = course.id;
    course.delete(db).await?;
    tracing::info!(course_id = %course_id, "course deleted");
    Ok(())
}
