//! Caller identity and the access rules every handler leans on.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use lms_db::entities::{Role, courses, users};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::AppError;
use crate::services;
use crate::state::AppState;

/// An authenticated caller, loaded fresh from the store on every request so a deleted
/// account stops working immediately.
#[derive(Debug, Clone)]
pub struct Identity(pub users::Model);

impl Identity {
    pub fn id(&self) -> Uuid {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn is_admin(&self) -> bool {
        self.0.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("admin role required"))
        }
    }

    pub fn require_student(&self, action: &str) -> Result<(), AppError> {
        if self.0.role == Role::Student {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("only students can {action}")))
        }
    }
}

/// Never rejects; anything short of a valid token for an existing user is anonymous.
#[derive(Debug, Clone)]
pub struct OptionalIdentity(pub Option<Identity>);

impl OptionalIdentity {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(Identity::is_admin)
    }
}

async fn bearer_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
        .await
        .ok()
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
}

async fn authenticate(state: &AppState, token: &str) -> Result<Identity, AppError> {
    let claims = state.tokens.validate_access(token)?;
    let user = services::users::get_user(&state.db, claims.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("user no longer exists"))?;
    Ok(Identity(user))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts, state)
            .await
            .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
        authenticate(state, &token).await
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts, state).await else {
            return Ok(Self(None));
        };
        match authenticate(state, &token).await {
            Ok(identity) => Ok(Self(Some(identity))),
            Err(AppError::Database(err)) => {
                tracing::warn!(%err, "optional auth lookup failed; treating caller as anonymous");
                Ok(Self(None))
            }
            Err(_) => Ok(Self(None)),
        }
    }
}

/// Drafts exist only for admins: everyone else gets the same 404 as for a missing id.
pub async fn visible_course(
    db: &DatabaseConnection,
    viewer: &OptionalIdentity,
    course_id: Uuid,
) -> Result<courses::Model, AppError> {
    let course = services::courses::get_course(db, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))?;
    if !course.is_published && !viewer.is_admin() {
        return Err(AppError::not_found("course not found"));
    }
    Ok(course)
}

/// Course content (materials, assignments) is for admins and enrolled students.
pub async fn ensure_course_access(
    db: &DatabaseConnection,
    viewer: Option<&Identity>,
    course_id: Uuid,
) -> Result<courses::Model, AppError> {
    let course = services::courses::get_course(db, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))?;

    let allowed = match viewer {
        Some(identity) if identity.is_admin() => true,
        Some(identity) => services::enrollments::is_enrolled(db, identity.id(), course_id).await?,
        None => false,
    };
    if !allowed {
        return Err(AppError::forbidden("enroll in this course to access its content"));
    }
    Ok(course)
}
