use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use lms_db::entities::Role;
use sea_orm_migration::MigratorTrait;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::config::Config;
use crate::password::hash_password;
use crate::services::users::{NewUser, create_user};
use crate::state::AppState;

const ADMIN_EMAIL: &str = "admin@lms.test";
const PASSWORD: &str = "pw12345678";

struct TestApp {
    state: AppState,
    router: Router,
}

struct Resp {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Value,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(Config {
            login_max_attempts: 3,
            ..Config::default()
        })
        .await
    }

    async fn with_config(config: Config) -> Self {
        let db = lms_db::connect("sqlite::memory:").await.unwrap();
        lms_migration::Migrator::up(&db, None).await.unwrap();
        let state = AppState::new(db, config);
        let router = super::router(state.clone());
        Self { state, router }
    }

    async fn request(&self, req: Request<Body>) -> Resp {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Resp {
            status,
            headers,
            body,
        }
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Resp {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.request(req).await
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Resp {
        self.send("GET", uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Resp {
        self.send("POST", uri, token, Some(body)).await
    }

    async fn login(&self, email: &str, password: &str) -> Resp {
        self.post("/auth/login", None, json!({ "email": email, "password": password }))
            .await
    }

    async fn admin_token(&self) -> String {
        let existing = crate::services::users::get_user_by_email(&self.state.db, ADMIN_EMAIL)
            .await
            .unwrap();
        if existing.is_none() {
            create_user(
                &self.state.db,
                NewUser {
                    email: ADMIN_EMAIL.to_string(),
                    password_hash: hash_password(PASSWORD).unwrap(),
                    full_name: Some("Admin".into()),
                    role: Role::Admin,
                },
            )
            .await
            .unwrap();
        }
        let resp = self.login(ADMIN_EMAIL, PASSWORD).await;
        assert_eq!(resp.status, StatusCode::OK);
        resp.body["access_token"].as_str().unwrap().to_string()
    }

    /// Registers a student and returns (user id, access token, refresh token).
    async fn student(&self, email: &str) -> (String, String, String) {
        let reg = self
            .post(
                "/auth/register",
                None,
                json!({ "email": email, "password": PASSWORD, "full_name": "Student" }),
            )
            .await;
        assert_eq!(reg.status, StatusCode::CREATED, "{:?}", reg.body);
        let login = self.login(email, PASSWORD).await;
        assert_eq!(login.status, StatusCode::OK);
        (
            reg.body["id"].as_str().unwrap().to_string(),
            login.body["access_token"].as_str().unwrap().to_string(),
            login.body["refresh_token"].as_str().unwrap().to_string(),
        )
    }

    async fn course(&self, admin: &str, title: &str, published: bool) -> String {
        let created = self
            .post(
                "/courses",
                Some(admin),
                json!({ "title": title, "description": "An introductory course", "level": "beginner" }),
            )
            .await;
        assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
        let id = created.body["id"].as_str().unwrap().to_string();
        if published {
            let updated = self
                .send(
                    "PUT",
                    &format!("/courses/{id}"),
                    Some(admin),
                    Some(json!({ "is_published": true })),
                )
                .await;
            assert_eq!(updated.status, StatusCode::OK);
        }
        id
    }

    async fn assignment(&self, admin: &str, course_id: &str, title: &str) -> String {
        let due = (Utc::now() + chrono::Duration::days(7)).to_rfc3339();
        let resp = self
            .post(
                &format!("/assignments/courses/{course_id}"),
                Some(admin),
                json!({ "title": title, "due_date": due }),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "{:?}", resp.body);
        resp.body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn ping_and_healthz() {
    let app = TestApp::new().await;
    let ping = app.get("/", None).await;
    assert_eq!(ping.status, StatusCode::OK);
    assert!(ping.body["detail"].is_string());

    let health = app.get("/healthz", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");
    assert_eq!(health.body["database"], true);
}

#[tokio::test]
async fn request_id_is_minted_or_echoed() {
    let app = TestApp::new().await;
    let minted = app.get("/", None).await;
    assert!(minted.headers.contains_key("x-request-id"));

    let req = Request::builder()
        .uri("/")
        .header("x-request-id", "trace-abc-123")
        .body(Body::empty())
        .unwrap();
    let echoed = app.request(req).await;
    assert_eq!(echoed.headers["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn register_returns_public_user() {
    let app = TestApp::new().await;
    let resp = app
        .post(
            "/auth/register",
            None,
            json!({ "email": " New@Example.com ", "password": PASSWORD }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["email"], "new@example.com");
    assert_eq!(resp.body["role"], "student");
    assert!(resp.body.get("password_hash").is_none());
    assert!(resp.body["id"].is_string());
}

#[tokio::test]
async fn register_rejects_bad_input() {
    let app = TestApp::new().await;
    app.student("a@x.com").await;

    let dup = app
        .post("/auth/register", None, json!({ "email": "A@X.com", "password": PASSWORD }))
        .await;
    assert_eq!(dup.status, StatusCode::BAD_REQUEST);

    let admin = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "b@x.com", "password": PASSWORD, "role": "admin" }),
        )
        .await;
    assert_eq!(admin.status, StatusCode::FORBIDDEN);

    let short = app
        .post("/auth/register", None, json!({ "email": "c@x.com", "password": "short" }))
        .await;
    assert_eq!(short.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(short.body["field"], "password");
    assert_eq!(short.body["code"], "invalid_param");

    let email = app
        .post("/auth/register", None, json!({ "email": "not-an-email", "password": PASSWORD }))
        .await;
    assert_eq!(email.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(email.body["field"], "email");
}

#[tokio::test]
async fn login_issues_bearer_pair_and_me_works() {
    let app = TestApp::new().await;
    let (id, access, _) = app.student("a@x.com").await;

    let login = app.login("A@x.com", PASSWORD).await;
    assert_eq!(login.body["token_type"], "bearer");
    assert!(login.body["refresh_token"].is_string());

    let me = app.get("/users/me", Some(&access)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], id.as_str());
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let app = TestApp::new().await;
    app.student("a@x.com").await;
    assert_eq!(app.login("a@x.com", "wrong-password").await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.login("ghost@x.com", PASSWORD).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn throttle_blocks_after_limit_failures() {
    let app = TestApp::new().await;
    app.student("a@x.com").await;

    for _ in 0..3 {
        assert_eq!(app.login("a@x.com", "wrong-password").await.status, StatusCode::UNAUTHORIZED);
    }
    // Blocked even with the right password.
    let blocked = app.login("a@x.com", PASSWORD).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.body["code"], "rate_limited");
    assert_eq!(blocked.headers[header::RETRY_AFTER], "300");

    // Other identities are unaffected.
    app.student("b@x.com").await;
}

#[tokio::test]
async fn successful_login_resets_throttle() {
    let app = TestApp::new().await;
    app.student("a@x.com").await;

    for _ in 0..2 {
        app.login("a@x.com", "wrong-password").await;
    }
    assert_eq!(app.login("a@x.com", PASSWORD).await.status, StatusCode::OK);
    for _ in 0..2 {
        app.login("a@x.com", "wrong-password").await;
    }
    assert_eq!(app.login("a@x.com", PASSWORD).await.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_rotation_is_single_use() {
    let app = TestApp::new().await;
    let (_, _, refresh) = app.student("a@x.com").await;

    let rotated = app
        .post("/auth/refresh", None, json!({ "refresh_token": refresh }))
        .await;
    assert_eq!(rotated.status, StatusCode::OK);
    let next = rotated.body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(next, refresh);

    let replay = app
        .post("/auth/refresh", None, json!({ "refresh_token": refresh }))
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);

    let again = app.post("/auth/refresh", None, json!({ "refresh_token": next })).await;
    assert_eq!(again.status, StatusCode::OK);
}

#[tokio::test]
async fn access_token_cannot_refresh() {
    let app = TestApp::new().await;
    let (_, access, _) = app.student("a@x.com").await;
    let resp = app
        .post("/auth/refresh", None, json!({ "refresh_token": access }))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let (_, _, refresh) = app.student("a@x.com").await;

    let out = app.post("/auth/logout", None, json!({ "refresh_token": refresh })).await;
    assert_eq!(out.status, StatusCode::OK);
    assert!(out.body["detail"].is_string());

    let after = app
        .post("/auth/refresh", None, json!({ "refresh_token": refresh }))
        .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);

    let twice = app.post("/auth/logout", None, json!({ "refresh_token": refresh })).await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);

    let garbage = app
        .post("/auth/logout", None, json!({ "refresh_token": "not.a.token" }))
        .await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_bearer_and_role() {
    let app = TestApp::new().await;
    let (_, student, _) = app.student("a@x.com").await;

    assert_eq!(app.get("/users/me", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/users/me", Some("garbage")).await.status,
        StatusCode::UNAUTHORIZED
    );

    let forbidden = app
        .post("/courses", Some(&student), json!({ "title": "Sneaky" }))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["code"], "forbidden");
}

#[tokio::test]
async fn admin_can_look_up_users() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (id, student, _) = app.student("a@x.com").await;

    let found = app.get(&format!("/users/{id}"), Some(&admin)).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["email"], "a@x.com");

    let missing = app
        .get(&format!("/users/{}", uuid::Uuid::new_v4()), Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    assert_eq!(
        app.get(&format!("/users/{id}"), Some(&student)).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn unpublished_courses_are_hidden_from_non_admins() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, student, _) = app.student("a@x.com").await;
    let draft = app.course(&admin, "Draft course", false).await;
    app.course(&admin, "Live course", true).await;

    assert_eq!(
        app.get(&format!("/courses/{draft}"), None).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/courses/{draft}"), Some(&student)).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/courses/{draft}"), Some(&admin)).await.status,
        StatusCode::OK
    );

    // The filter is ignored for students.
    let listed = app.get("/courses?is_published=false", Some(&student)).await;
    assert_eq!(listed.body["total"], 1);
    assert_eq!(listed.body["items"][0]["title"], "Live course");

    let drafts = app.get("/courses?is_published=false", Some(&admin)).await;
    assert_eq!(drafts.body["total"], 1);
    assert_eq!(drafts.body["items"][0]["title"], "Draft course");

    let all = app.get("/courses", Some(&admin)).await;
    assert_eq!(all.body["total"], 2);
}

#[tokio::test]
async fn course_list_paginates_and_searches() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    for title in ["Rust basics", "Advanced Rust", "Cooking 101"] {
        app.course(&admin, title, true).await;
    }

    let page = app.get("/courses?limit=2", None).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["items"].as_array().unwrap().len(), 2);
    assert_eq!(page.body["total"], 3);
    assert_eq!(page.body["limit"], 2);

    let rest = app.get("/courses?skip=2&limit=2", None).await;
    assert_eq!(rest.body["items"].as_array().unwrap().len(), 1);

    let clamped = app.get("/courses?limit=500", None).await;
    assert_eq!(clamped.body["limit"], 100);
    let floor = app.get("/courses?limit=0", None).await;
    assert_eq!(floor.body["limit"], 1);

    let rust = app.get("/courses?search=RUST", None).await;
    assert_eq!(rust.body["total"], 2);

    let by_description = app.get("/courses?search=introductory", None).await;
    assert_eq!(by_description.body["total"], 3);
}

#[tokio::test]
async fn search_wildcards_match_literally() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.course(&admin, "Rust basics", true).await;
    app.course(&admin, "100% Rust", true).await;
    app.course(&admin, "snake_case naming", true).await;

    let percent = app.get("/courses?search=%25", None).await;
    assert_eq!(percent.status, StatusCode::OK);
    assert_eq!(percent.body["total"], 1);
    assert_eq!(percent.body["items"][0]["title"], "100% Rust");

    let underscore = app.get("/courses?search=_", None).await;
    assert_eq!(underscore.body["total"], 1);
    assert_eq!(underscore.body["items"][0]["title"], "snake_case naming");

    let nothing = app.get("/courses?search=R_st", None).await;
    assert_eq!(nothing.body["total"], 0);
}

#[tokio::test]
async fn course_list_reports_each_enrollment_count() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let popular = app.course(&admin, "Popular course", true).await;
    let quiet = app.course(&admin, "Quiet course", true).await;
    for email in ["s1@lms.test", "s2@lms.test"] {
        let (_, token, _) = app.student(email).await;
        let enrolled = app
            .post(&format!("/courses/{popular}/enroll"), Some(&token), json!({}))
            .await;
        assert_eq!(enrolled.status, StatusCode::CREATED);
    }

    let page = app.get("/courses", None).await;
    let counts: std::collections::HashMap<&str, u64> = page.body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| (c["id"].as_str().unwrap(), c["students_count"].as_u64().unwrap()))
        .collect();
    assert_eq!(counts[popular.as_str()], 2);
    assert_eq!(counts[quiet.as_str()], 0);
}

#[tokio::test]
async fn course_levels_are_listed() {
    let app = TestApp::new().await;
    let levels = app.get("/courses/levels", None).await;
    assert_eq!(levels.status, StatusCode::OK);
    let values: Vec<&str> = levels
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["value"].as_str().unwrap())
        .collect();
    assert_eq!(values, ["beginner", "intermediate", "advanced"]);
    assert_eq!(levels.body[0]["label"], "Beginner");
}

#[tokio::test]
async fn duplicate_course_titles_conflict() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.course(&admin, "Intro to Rust", false).await;
    let other = app.course(&admin, "Intro to Go", false).await;

    let dup = app
        .post("/courses", Some(&admin), json!({ "title": "intro TO rust" }))
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let renamed = app
        .send(
            "PUT",
            &format!("/courses/{other}"),
            Some(&admin),
            Some(json!({ "title": "INTRO to Rust" })),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::CONFLICT);

    let blank = app.post("/courses", Some(&admin), json!({ "title": "   " })).await;
    assert_eq!(blank.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(blank.body["field"], "title");

    let code = app.post("/courses", Some(&admin), json!({ "title": "C1" })).await;
    assert_eq!(code.status, StatusCode::CREATED, "{}", code.body);
}

#[tokio::test]
async fn course_update_bumps_updated_at() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let id = app.course(&admin, "Intro to Rust", false).await;
    let before = app.get(&format!("/courses/{id}"), Some(&admin)).await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let after = app
        .send(
            "PUT",
            &format!("/courses/{id}"),
            Some(&admin),
            Some(json!({ "level": "advanced", "duration_minutes": 90 })),
        )
        .await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.body["level"], "advanced");
    assert_eq!(after.body["duration_minutes"], 90);
    assert_eq!(after.body["title"], "Intro to Rust");
    assert_ne!(after.body["updated_at"], before.body["updated_at"]);
}

#[tokio::test]
async fn enrollment_rules() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (student_id, student, _) = app.student("a@x.com").await;
    let draft = app.course(&admin, "Draft course", false).await;
    let live = app.course(&admin, "Live course", true).await;

    let hidden = app
        .post(&format!("/courses/{draft}/enroll"), Some(&student), json!({}))
        .await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let ok = app
        .post(&format!("/courses/{live}/enroll"), Some(&student), json!({}))
        .await;
    assert_eq!(ok.status, StatusCode::CREATED);
    assert_eq!(ok.body["course_id"], live.as_str());

    let dup = app
        .post(&format!("/courses/{live}/enroll"), Some(&student), json!({}))
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let admin_enroll = app
        .post(&format!("/courses/{live}/enroll"), Some(&admin), json!({}))
        .await;
    assert_eq!(admin_enroll.status, StatusCode::FORBIDDEN);

    let mine = app.get("/me/enrollments", Some(&student)).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 1);

    let roster = app.get(&format!("/courses/{live}/students"), Some(&admin)).await;
    assert_eq!(roster.status, StatusCode::OK);
    assert_eq!(roster.body[0]["id"], student_id.as_str());

    let course = app.get(&format!("/courses/{live}"), None).await;
    assert_eq!(course.body["students_count"], 1);
}

#[tokio::test]
async fn materials_require_enrollment() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, student, _) = app.student("a@x.com").await;
    let course = app.course(&admin, "Live course", true).await;
    let uri = format!("/courses/{course}/materials");

    let created = app
        .post(
            &uri,
            Some(&admin),
            json!({ "title": "Lecture one", "link": "https://video.example.com/1", "type": "video" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
    assert_eq!(created.body["material_type"], "video");

    let bad_link = app
        .post(
            &uri,
            Some(&admin),
            json!({ "title": "Broken", "link": "javascript:alert(1)", "material_type": "link" }),
        )
        .await;
    assert_eq!(bad_link.status, StatusCode::UNPROCESSABLE_ENTITY);

    let by_student = app
        .post(
            &uri,
            Some(&student),
            json!({ "title": "Mine", "link": "https://x.example.com", "type": "link" }),
        )
        .await;
    assert_eq!(by_student.status, StatusCode::FORBIDDEN);

    assert_eq!(app.get(&uri, None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get(&uri, Some(&student)).await.status, StatusCode::FORBIDDEN);

    app.post(&format!("/courses/{course}/enroll"), Some(&student), json!({}))
        .await;
    let listed = app.get(&uri, Some(&student)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body.as_array().unwrap().len(), 1);

    let missing = app
        .get(&format!("/courses/{}/materials", uuid::Uuid::new_v4()), Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let id = created.body["id"].as_str().unwrap();
    let deleted = app.send("DELETE", &format!("/materials/{id}"), Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&student)).await.body, json!([]));
}

#[tokio::test]
async fn assignments_reject_past_due_dates_and_sort_by_deadline() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let course = app.course(&admin, "Live course", true).await;
    let uri = format!("/assignments/courses/{course}");

    let past = app
        .post(
            &uri,
            Some(&admin),
            json!({ "title": "Too late", "due_date": (Utc::now() - chrono::Duration::days(1)).to_rfc3339() }),
        )
        .await;
    assert_eq!(past.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(past.body["field"], "due_date");

    let undated = app.post(&uri, Some(&admin), json!({ "title": "Whenever" })).await;
    assert_eq!(undated.status, StatusCode::CREATED);
    let later = app
        .post(
            &uri,
            Some(&admin),
            json!({ "title": "Later", "due_date": (Utc::now() + chrono::Duration::days(10)).to_rfc3339() }),
        )
        .await;
    assert_eq!(later.status, StatusCode::CREATED);
    let sooner = app
        .post(
            &uri,
            Some(&admin),
            json!({ "title": "Sooner", "due_date": (Utc::now() + chrono::Duration::days(2)).to_rfc3339() }),
        )
        .await;
    assert_eq!(sooner.status, StatusCode::CREATED);

    let listed = app.get(&uri, Some(&admin)).await;
    let titles: Vec<&str> = listed
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Sooner", "Later", "Whenever"]);

    let all = app.get("/assignments", Some(&admin)).await;
    assert_eq!(all.body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn student_assignment_views_follow_enrollment() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, student, _) = app.student("a@x.com").await;
    let mine = app.course(&admin, "Enrolled course", true).await;
    let other = app.course(&admin, "Other course", true).await;
    app.assignment(&admin, &mine, "Homework one").await;
    app.assignment(&admin, &other, "Homework two").await;

    assert_eq!(
        app.get(&format!("/assignments/courses/{mine}"), Some(&student)).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get(&format!("/assignments/courses/{mine}"), None).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.get("/assignments", Some(&student)).await.body, json!([]));

    app.post(&format!("/courses/{mine}/enroll"), Some(&student), json!({}))
        .await;
    let listed = app.get("/assignments", Some(&student)).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
    assert_eq!(listed.body[0]["title"], "Homework one");
    assert_eq!(
        app.get(&format!("/assignments/courses/{mine}"), Some(&student)).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn assignment_update_and_delete() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let course = app.course(&admin, "Live course", true).await;
    let id = app.assignment(&admin, &course, "Homework one").await;

    let updated = app
        .send(
            "PUT",
            &format!("/assignments/{id}"),
            Some(&admin),
            Some(json!({ "title": "Homework 1 (revised)", "link": "https://task.example.com" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["title"], "Homework 1 (revised)");
    assert_eq!(updated.body["link"], "https://task.example.com");
    assert!(updated.body["due_date"].is_string());

    let deleted = app.send("DELETE", &format!("/assignments/{id}"), Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let gone = app.send("DELETE", &format!("/assignments/{id}"), Some(&admin), None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submissions_require_enrollment() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (student_id, student, _) = app.student("a@x.com").await;
    let course = app.course(&admin, "Live course", true).await;
    let assignment = app.assignment(&admin, &course, "Homework one").await;
    let submit_uri = format!("/assignments/{assignment}/submit");

    let unenrolled = app
        .post(&submit_uri, Some(&student), json!({ "message": "done" }))
        .await;
    assert_eq!(unenrolled.status, StatusCode::BAD_REQUEST);

    let missing = app
        .post(
            &format!("/assignments/{}/submit", uuid::Uuid::new_v4()),
            Some(&student),
            json!({ "message": "done" }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let by_admin = app.post(&submit_uri, Some(&admin), json!({ "message": "done" })).await;
    assert_eq!(by_admin.status, StatusCode::FORBIDDEN);

    app.post(&format!("/courses/{course}/enroll"), Some(&student), json!({}))
        .await;
    let empty = app.post(&submit_uri, Some(&student), json!({ "message": "   " })).await;
    assert_eq!(empty.status, StatusCode::UNPROCESSABLE_ENTITY);

    let first = app.post(&submit_uri, Some(&student), json!({ "message": "draft" })).await;
    assert_eq!(first.status, StatusCode::CREATED);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = app
        .post(
            &submit_uri,
            Some(&student),
            json!({ "message": "final", "link": "https://repo.example.com/pr/1" }),
        )
        .await;
    assert_eq!(second.status, StatusCode::CREATED);

    let latest = app
        .get(&format!("/assignments/{assignment}/my-submission"), Some(&student))
        .await;
    assert_eq!(latest.status, StatusCode::OK);
    assert_eq!(latest.body["message"], "final");

    let mine = app.get("/assignments/submissions", Some(&student)).await;
    assert_eq!(mine.body.as_array().unwrap().len(), 2);

    let per_assignment = app
        .get(&format!("/assignments/{assignment}/submissions"), Some(&admin))
        .await;
    assert_eq!(per_assignment.body.as_array().unwrap().len(), 2);
    assert_eq!(
        app.get(&format!("/assignments/{assignment}/submissions"), Some(&student))
            .await
            .status,
        StatusCode::FORBIDDEN
    );

    let overview = app.get("/assignments/admin-overview", Some(&admin)).await;
    assert_eq!(overview.status, StatusCode::OK);
    assert_eq!(overview.body.as_array().unwrap().len(), 2);
    assert_eq!(overview.body[0]["student_email"], "a@x.com");
    assert_eq!(overview.body[0]["user_id"], student_id.as_str());
    assert_eq!(overview.body[0]["course_title"], "Live course");
    assert_eq!(overview.body[0]["assignment_title"], "Homework one");
}

#[tokio::test]
async fn my_submission_is_not_found_before_submitting() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, student, _) = app.student("a@x.com").await;
    let course = app.course(&admin, "Live course", true).await;
    let assignment = app.assignment(&admin, &course, "Homework one").await;

    let resp = app
        .get(&format!("/assignments/{assignment}/my-submission"), Some(&student))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_course_cascades() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, student, _) = app.student("a@x.com").await;
    let course = app.course(&admin, "Live course", true).await;
    let assignment = app.assignment(&admin, &course, "Homework one").await;
    app.post(&format!("/courses/{course}/enroll"), Some(&student), json!({}))
        .await;
    app.post(
        &format!("/assignments/{assignment}/submit"),
        Some(&student),
        json!({ "message": "done" }),
    )
    .await;

    let deleted = app.send("DELETE", &format!("/courses/{course}"), Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    assert_eq!(
        app.get(&format!("/courses/{course}"), Some(&admin)).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.get("/me/enrollments", Some(&student)).await.body, json!([]));
    assert_eq!(app.get("/assignments/submissions", Some(&student)).await.body, json!([]));
}

#[tokio::test]
async fn end_to_end_student_journey() {
    let app = TestApp::new().await;

    let reg = app
        .post("/auth/register", None, json!({ "email": "a@x.com", "password": "pw12345678" }))
        .await;
    assert_eq!(reg.status, StatusCode::CREATED);
    let student_id = reg.body["id"].as_str().unwrap().to_string();

    let login = app.login("a@x.com", "pw12345678").await;
    assert_eq!(login.status, StatusCode::OK);
    let student = login.body["access_token"].as_str().unwrap().to_string();

    let admin = app.admin_token().await;
    let course = app.course(&admin, "C1", true).await;

    let enrolled = app
        .post(&format!("/courses/{course}/enroll"), Some(&student), json!({}))
        .await;
    assert_eq!(enrolled.status, StatusCode::CREATED);

    let assignment = app.assignment(&admin, &course, "First task").await;

    let submitted = app
        .post(
            &format!("/assignments/{assignment}/submit"),
            Some(&student),
            json!({ "message": "done" }),
        )
        .await;
    assert_eq!(submitted.status, StatusCode::CREATED);

    let listed = app
        .get(&format!("/assignments/{assignment}/submissions"), Some(&admin))
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    let rows = listed.body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["user_id"], student_id.as_str());
    assert_eq!(rows[0]["message"], "done");
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = TestApp::with_config(Config {
        max_request_bytes: 1024,
        ..Config::default()
    })
    .await;
    let resp = app
        .post(
            "/auth/register",
            None,
            json!({ "email": "a@x.com", "password": PASSWORD, "full_name": "x".repeat(4096) }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.body["code"], "payload_too_large");
}

#[tokio::test]
async fn malformed_input_gets_the_standard_error_body() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let broken = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();
    let resp = app.request(broken).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["code"], "invalid_request");
    assert!(resp.body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let missing_field = app.post("/auth/login", None, json!({ "email": "a@x.com" })).await;
    assert_eq!(missing_field.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(missing_field.body["code"], "invalid_request");

    let bad_id = app.get("/courses/not-a-uuid", Some(&admin)).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.body["code"], "invalid_request");

    let bad_query = app.get("/courses?limit=lots", None).await;
    assert_eq!(bad_query.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_query.body["code"], "invalid_request");
}

#[tokio::test]
async fn plain_http_is_refused_when_https_required() {
    let app = TestApp::with_config(Config {
        require_https: true,
        ..Config::default()
    })
    .await;

    let plain = app.get("/courses", None).await;
    assert_eq!(plain.status, StatusCode::UPGRADE_REQUIRED);
    assert_eq!(plain.body["code"], "https_required");

    let req = Request::builder()
        .uri("/courses")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.request(req).await.status, StatusCode::OK);

    assert_eq!(app.get("/healthz", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_bootstrap_is_idempotent() {
    let app = TestApp::new().await;
    let config = Config {
        admin_email: Some("Root@LMS.test".into()),
        admin_password: Some(PASSWORD.into()),
        ..Config::default()
    };
    assert!(crate::auth::ensure_admin_user(&app.state.db, &config).await.unwrap());
    assert!(!crate::auth::ensure_admin_user(&app.state.db, &config).await.unwrap());

    let login = app.login("root@lms.test", PASSWORD).await;
    assert_eq!(login.status, StatusCode::OK);
    let token = login.body["access_token"].as_str().unwrap();
    assert_eq!(app.get("/users/me", Some(token)).await.body["role"], "admin");
}
