//! HTTP surface: route table, shared layers, and the per-resource handlers.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::security;
use crate::state::AppState;

pub mod assignments;
pub mod courses;
pub mod enrollments;
pub mod materials;
pub mod users;

#[cfg(test)]
mod tests;

#[derive(Debug, Serialize)]
struct PingOutput {
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthzOutput {
    status: &'static str,
    version: &'static str,
    database: bool,
}

async fn ping() -> Json<PingOutput> {
    Json(PingOutput {
        detail: "LMS API is running",
    })
}

async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthzOutput>) {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "database ping failed");
            false
        }
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthzOutput {
            status: if database { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database,
        }),
    )
}

pub fn router(state: AppState) -> Router {
    let auth_router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    let course_router = Router::new()
        .route("/", get(courses::list_courses).post(courses::create_course))
        .route("/levels", get(courses::levels))
        .route(
            "/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/:id/enroll", post(enrollments::enroll))
        .route("/:id/students", get(enrollments::course_students))
        .route(
            "/:id/materials",
            get(materials::list_materials).post(materials::create_material),
        );

    let assignment_router = Router::new()
        .route("/", get(assignments::my_assignments))
        .route("/submissions", get(assignments::my_submissions))
        .route("/admin-overview", get(assignments::admin_overview))
        .route(
            "/courses/:course_id",
            get(assignments::course_assignments).post(assignments::create_assignment),
        )
        .route(
            "/:id",
            put(assignments::update_assignment).delete(assignments::delete_assignment),
        )
        .route("/:id/submit", post(assignments::submit))
        .route("/:id/my-submission", get(assignments::my_submission))
        .route("/:id/submissions", get(assignments::assignment_submissions));

    let max_body = state.config.max_request_bytes;
    let cors = security::cors_layer(&state.config);

    Router::new()
        .route("/", get(ping))
        .route("/healthz", get(healthz))
        .route("/users/me", get(users::me))
        .route("/users/:id", get(users::get_user))
        .route("/me/enrollments", get(enrollments::my_enrollments))
        .route("/materials/:id", delete(materials::delete_material))
        .nest("/auth", auth_router)
        .nest("/courses", course_router)
        .nest("/assignments", assignment_router)
        .layer(middleware::from_fn_with_state(state.clone(), security::require_https))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(security::request_id))
        .with_state(state)
}
