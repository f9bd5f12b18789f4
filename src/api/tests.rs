use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use super::{build_router, AppState};
use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::test_support::setup_pool;
use crate::services::Notifier;
use crate::storage::LocalStore;

struct TestApp {
    router: Router,
    _files: TempDir,
}

async fn app() -> TestApp {
    let files = TempDir::new().unwrap();
    let mut config = Config::default();
    config.storage.local_path = files.path().to_path_buf();
    config.upload.max_file_size = 1024;

    let pool = setup_pool().await;
    let cache = Arc::new(MemoryCache::new(100, std::time::Duration::from_secs(60)));
    let store = Arc::new(LocalStore::new(
        files.path().to_path_buf(),
        config.storage.public_base_url.clone(),
    ));
    let state = AppState::new(config, pool, cache, store, Notifier::disabled());
    TestApp {
        router: build_router(state),
        _files: files,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Register an account and return its session token
    async fn register(&self, email: &str, role: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "email": email,
                    "password": "correct horse battery",
                    "display_name": email.split('@').next().unwrap(),
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn user_id(&self, token: &str) -> i64 {
        let (_, me) = self.request(Method::GET, "/api/v1/auth/me", Some(token), None).await;
        me["id"].as_i64().unwrap()
    }

    /// Create the caller's organization and return its id
    async fn organization(&self, token: &str, name: &str) -> i64 {
        let (status, org) = self
            .request(Method::POST, "/api/v1/organizations", Some(token), Some(json!({"name": name})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", org);
        org["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, body) = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_sets_cookie_and_first_user_is_admin() {
    let app = app().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "email": "Founder@Example.com",
                "password": "long enough pw",
                "display_name": "Founder",
                "role": "youth",
            })
            .to_string(),
        ))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let session = cookie.split(';').next().unwrap().to_string();
    let req = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, session)
        .body(Body::empty())
        .unwrap();
    let (status, me) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "founder@example.com");
    assert_eq!(me["role"], "admin");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_auth_error_codes() {
    let app = app().await;

    let (status, body) = app.request(Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app
        .request(Method::GET, "/api/v1/auth/me", Some("not-a-session"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({"email": "a@example.com", "password": "short", "display_name": "A"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    app.register("a@example.com", "youth").await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({"email": "A@example.com", "password": "long enough pw", "display_name": "A"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({"email": "a@example.com", "password": "wrong password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let app = app().await;
    let token = app.register("a@example.com", "youth").await;

    let (status, _) = app
        .request(Method::POST, "/api/v1/auth/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.request(Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = app().await;
    let admin = app.register("admin@example.com", "youth").await;
    let youth = app.register("y@example.com", "youth").await;

    let (status, _) = app.request(Method::GET, "/api/v1/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = app
        .request(Method::GET, "/api/v1/admin/users", Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = app
        .request(Method::GET, "/api/v1/admin/users?role=youth", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, overview) = app
        .request(Method::GET, "/api/v1/admin/analytics", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["open_reports"], 0);
}

#[tokio::test]
async fn test_suspended_user_is_signed_out() {
    let app = app().await;
    let admin = app.register("admin@example.com", "youth").await;
    let youth = app.register("y@example.com", "youth").await;
    let (_, me) = app.request(Method::GET, "/api/v1/auth/me", Some(&youth), None).await;
    let id = me["id"].as_i64().unwrap();

    let (status, user) = app
        .request(
            Method::PUT,
            &format!("/api/v1/admin/users/{}/status", id),
            Some(&admin),
            Some(json!({"status": "suspended"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["status"], "suspended");

    let (status, _) = app.request(Method::GET, "/api/v1/auth/me", Some(&youth), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_not_found_and_role_checks() {
    let app = app().await;
    app.register("admin@example.com", "youth").await;
    let youth = app.register("y@example.com", "youth").await;

    let (status, body) = app.request(Method::GET, "/api/v1/courses/no-such-course", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Course not found");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/organizations",
            Some(&youth),
            Some(json!({"name": "Not allowed"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, "/api/v1/analytics/company", Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // malformed bodies are rejected before reaching a service
    let (status, _) = app
        .request(Method::POST, "/api/v1/jobs", Some(&youth), Some(json!({"title": 5})))
        .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_job_application_flow() {
    let app = app().await;
    app.register("admin@example.com", "youth").await;
    let company = app.register("hr@acme.com", "company").await;
    let youth = app.register("amina@example.com", "youth").await;

    let (status, org) = app
        .request(
            Method::POST,
            "/api/v1/organizations",
            Some(&company),
            Some(json!({"name": "Acme Ltd", "industry": "Software"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", org);

    let (status, job) = app
        .request(
            Method::POST,
            "/api/v1/jobs",
            Some(&company),
            Some(json!({
                "title": "Junior Developer",
                "employment_type": "internship",
                "skills": ["Rust", "SQL"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", job);
    assert_eq!(job["status"], "draft");
    let job_id = job["id"].as_i64().unwrap();
    let slug = job["slug"].as_str().unwrap().to_string();

    // drafts stay hidden from the public
    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/jobs/{}", slug), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/jobs/{}/status", job_id),
            Some(&company),
            Some(json!({"status": "open"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = app.request(Method::GET, "/api/v1/jobs?skill=rust", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let apply_uri = format!("/api/v1/jobs/{}/apply", job_id);
    let (status, application) = app
        .request(Method::POST, &apply_uri, Some(&youth), Some(json!({"cover_letter": "Hello"})))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", application);
    let (status, _) = app
        .request(Method::POST, &apply_uri, Some(&youth), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app
        .request(Method::POST, &apply_uri, Some(&company), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let application_id = application["id"].as_i64().unwrap();
    let (status, updated) = app
        .request(
            Method::PUT,
            &format!("/api/v1/applications/{}/status", application_id),
            Some(&company),
            Some(json!({"status": "shortlisted", "note": "Strong profile"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["status"], "shortlisted");

    let (status, list) = app
        .request(
            Method::GET,
            &format!("/api/v1/jobs/{}/applications?status=shortlisted", job_id),
            Some(&company),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/jobs/{}/applications", job_id),
            Some(&youth),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/jobs/{}", job_id), Some(&company), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, mine) = app
        .request(Method::GET, "/api/v1/applications/mine", Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_messages_round_trip() {
    let app = app().await;
    app.register("admin@example.com", "youth").await;
    let a = app.register("a@example.com", "youth").await;
    let b = app.register("b@example.com", "company").await;
    let (_, b_me) = app.request(Method::GET, "/api/v1/auth/me", Some(&b), None).await;
    let (_, a_me) = app.request(Method::GET, "/api/v1/auth/me", Some(&a), None).await;
    let b_id = b_me["id"].as_i64().unwrap();
    let a_id = a_me["id"].as_i64().unwrap();

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/messages",
            Some(&a),
            Some(json!({"recipient_id": b_id, "body": "   "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/messages",
            Some(&a),
            Some(json!({"recipient_id": b_id, "body": "Is the internship paid?"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, unread) = app.request(Method::GET, "/api/v1/messages/unread", Some(&b), None).await;
    assert_eq!(unread["count"], 1);

    let (status, thread) = app
        .request(Method::GET, &format!("/api/v1/messages/with/{}", a_id), Some(&b), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(thread["items"][0]["body"], "Is the internship paid?");

    let (_, unread) = app.request(Method::GET, "/api/v1/messages/unread", Some(&b), None).await;
    assert_eq!(unread["count"], 0);
}

#[tokio::test]
async fn test_upload_and_download_url() {
    let app = app().await;
    let youth = app.register("y@example.com", "youth").await;

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"purpose\"\r\n\r\nresume\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n%PDF-1.4 test\r\n--{b}--\r\n",
        b = boundary
    );
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {}", youth))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, uploaded) = app.send(req).await;
    assert_eq!(status, StatusCode::CREATED, "{}", uploaded);
    assert_eq!(uploaded["asset"]["purpose"], "resume");
    assert_eq!(uploaded["asset"]["original_name"], "cv.pdf");
    let url = uploaded["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/files/resume/"));

    let req = Request::builder().uri(&url).body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.4 test");

    let id = uploaded["asset"]["id"].as_i64().unwrap();
    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/uploads/{}", id), Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/uploads/{}/url", id), Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recommendations_require_auth_and_rank() {
    let app = app().await;
    let youth = app.register("y@example.com", "youth").await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/recommendations/courses", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .request(Method::GET, "/api/v1/recommendations/jobs?limit=5", Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_course_enrollment_flow() {
    let app = app().await;
    app.register("admin@example.com", "youth").await;
    let school = app.register("school@example.com", "institution").await;
    let youth = app.register("y1@example.com", "youth").await;
    let other = app.register("y2@example.com", "youth").await;

    let course_body = json!({
        "title": "Intro to Rust",
        "level": "beginner",
        "mode": "online",
        "tags": ["Rust"],
        "capacity": 1,
    });
    let (status, _) = app
        .request(Method::POST, "/api/v1/courses", Some(&youth), Some(course_body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.organization(&school, "Bright Academy").await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/courses",
            Some(&school),
            Some(json!({"title": "  ", "level": "beginner", "mode": "online"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, course) = app
        .request(Method::POST, "/api/v1/courses", Some(&school), Some(course_body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", course);
    assert_eq!(course["status"], "draft");
    let course_id = course["id"].as_i64().unwrap();
    let slug = course["slug"].as_str().unwrap().to_string();
    let enroll_uri = format!("/api/v1/courses/{}/enroll", course_id);

    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/courses/{}", slug), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.request(Method::POST, &enroll_uri, Some(&youth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status_uri = format!("/api/v1/courses/{}/status", course_id);
    let (status, _) = app
        .request(Method::PUT, &status_uri, Some(&youth), Some(json!({"status": "published"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, published) = app
        .request(Method::PUT, &status_uri, Some(&school), Some(json!({"status": "published"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");

    let (_, page) = app.request(Method::GET, "/api/v1/courses?tag=rust", None, None).await;
    assert_eq!(page["total"], 1);

    let (status, _) = app.request(Method::POST, &enroll_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.request(Method::POST, &enroll_uri, Some(&school), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(Method::POST, "/api/v1/courses/9999/enroll", Some(&youth), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, enrollment) = app.request(Method::POST, &enroll_uri, Some(&youth), None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", enrollment);
    let enrollment_id = enrollment["id"].as_i64().unwrap();
    let (status, body) = app.request(Method::POST, &enroll_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "Course is full");

    let learners_uri = format!("/api/v1/courses/{}/enrollments", course_id);
    let (status, learners) = app.request(Method::GET, &learners_uri, Some(&school), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(learners.as_array().unwrap().len(), 1);
    let (status, _) = app.request(Method::GET, &learners_uri, Some(&youth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let progress_uri = format!("/api/v1/enrollments/{}/progress", enrollment_id);
    let (status, _) = app
        .request(Method::PUT, &progress_uri, Some(&other), Some(json!({"progress": 10})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(Method::PUT, "/api/v1/enrollments/9999/progress", Some(&youth), Some(json!({"progress": 10})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, updated) = app
        .request(Method::PUT, &progress_uri, Some(&youth), Some(json!({"progress": 40})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["progress"], 40);

    let drop_uri = format!("/api/v1/enrollments/{}/drop", enrollment_id);
    let (status, _) = app.request(Method::POST, &drop_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.request(Method::POST, &drop_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, dropped) = app.request(Method::POST, &drop_uri, Some(&youth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dropped["status"], "dropped");
    let (status, _) = app.request(Method::POST, &drop_uri, Some(&youth), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // the freed seat goes to the next learner
    let (status, _) = app.request(Method::POST, &enroll_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, mine) = app
        .request(Method::GET, "/api/v1/enrollments/mine", Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/courses/{}", course_id), Some(&school), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_organization_endpoints_and_verification() {
    let app = app().await;
    let admin = app.register("admin@example.com", "youth").await;
    let company = app.register("hr@acme.com", "company").await;
    let rival = app.register("hr@rival.com", "company").await;

    let (status, _) = app
        .request(Method::POST, "/api/v1/organizations", None, Some(json!({"name": "Acme"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request(Method::POST, "/api/v1/organizations", Some(&company), Some(json!({"name": " "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/organizations",
            Some(&company),
            Some(json!({"name": "Acme", "website": "ftp://acme.example"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let org_id = app.organization(&company, "Acme Ltd").await;
    let (status, _) = app
        .request(Method::POST, "/api/v1/organizations", Some(&company), Some(json!({"name": "Acme Two"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, mine) = app
        .request(Method::GET, "/api/v1/organizations/mine", Some(&company), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["id"], org_id);
    assert_eq!(mine["verified"], false);
    let slug = mine["slug"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/organizations/{}", slug), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .request(Method::GET, "/api/v1/organizations/no-such-org", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/organizations/{}", org_id),
            Some(&rival),
            Some(json!({"name": "Taken Over"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let verify_uri = format!("/api/v1/admin/organizations/{}/verify", org_id);
    let (status, _) = app
        .request(Method::PUT, &verify_uri, Some(&company), Some(json!({"verified": true})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/admin/organizations/9999/verify",
            Some(&admin),
            Some(json!({"verified": true})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, verified) = app
        .request(Method::PUT, &verify_uri, Some(&admin), Some(json!({"verified": true})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["verified"], true);

    let (_, page) = app
        .request(Method::GET, "/api/v1/organizations?verified=true", None, None)
        .await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn test_startup_support_and_review() {
    let app = app().await;
    let admin = app.register("admin@example.com", "youth").await;
    let founder = app.register("founder@example.com", "youth").await;
    let backer = app.register("backer@example.com", "youth").await;
    let company = app.register("hr@acme.com", "company").await;

    let startup_body = json!({"name": "Farm Link", "stage": "idea", "sector": "Agriculture"});
    let (status, _) = app
        .request(Method::POST, "/api/v1/startups", Some(&company), Some(startup_body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/startups",
            Some(&founder),
            Some(json!({"name": "  ", "stage": "idea"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, startup) = app
        .request(Method::POST, "/api/v1/startups", Some(&founder), Some(startup_body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", startup);
    assert_eq!(startup["status"], "pending");
    let id = startup["id"].as_i64().unwrap();
    let support_uri = format!("/api/v1/startups/{}/support", id);
    let review_uri = format!("/api/v1/admin/startups/{}/review", id);

    let (_, page) = app.request(Method::GET, "/api/v1/startups", None, None).await;
    assert_eq!(page["total"], 0);
    let (status, _) = app.request(Method::POST, &support_uri, Some(&backer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(Method::PUT, &review_uri, Some(&founder), Some(json!({"approve": true})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/admin/startups/9999/review",
            Some(&admin),
            Some(json!({"approve": true})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, approved) = app
        .request(Method::PUT, &review_uri, Some(&admin), Some(json!({"approve": true, "note": "Nice"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["status"], "approved");
    let (status, _) = app
        .request(Method::PUT, &review_uri, Some(&admin), Some(json!({"approve": false})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, page) = app.request(Method::GET, "/api/v1/startups", None, None).await;
    assert_eq!(page["total"], 1);

    let (status, _) = app.request(Method::POST, &support_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.request(Method::POST, &support_uri, Some(&founder), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, supported) = app.request(Method::POST, &support_uri, Some(&backer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(supported["supporters"], 1);
    let (_, supported) = app.request(Method::POST, &support_uri, Some(&backer), None).await;
    assert_eq!(supported["supporters"], 1);
    let (status, withdrawn) = app.request(Method::DELETE, &support_uri, Some(&backer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn["supporters"], 0);
}

#[tokio::test]
async fn test_reports_and_moderation() {
    let app = app().await;
    let admin = app.register("admin@example.com", "youth").await;
    let youth = app.register("y@example.com", "youth").await;
    let company = app.register("hr@acme.com", "company").await;
    let company_id = app.user_id(&company).await;

    let report = |target_id: i64, reason: &str| {
        json!({"target_type": "user", "target_id": target_id, "reason": reason})
    };
    let (status, _) = app
        .request(Method::POST, "/api/v1/reports", None, Some(report(company_id, "Spam offers")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request(Method::POST, "/api/v1/reports", Some(&youth), Some(report(company_id, "x")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .request(Method::POST, "/api/v1/reports", Some(&youth), Some(report(9999, "Spam offers")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, filed) = app
        .request(Method::POST, "/api/v1/reports", Some(&youth), Some(report(company_id, "Spam offers")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", filed);
    assert_eq!(filed["status"], "open");
    let report_id = filed["id"].as_i64().unwrap();
    let (status, _) = app
        .request(Method::POST, "/api/v1/reports", Some(&youth), Some(report(company_id, "Spam again")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.request(Method::GET, "/api/v1/admin/reports", Some(&youth), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, page) = app
        .request(Method::GET, "/api/v1/admin/reports?status=open", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let moderate_uri = format!("/api/v1/admin/reports/{}", report_id);
    let (status, reviewing) = app
        .request(Method::PUT, &moderate_uri, Some(&admin), Some(json!({"status": "reviewing"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewing["status"], "reviewing");
    let (status, _) = app
        .request(Method::PUT, &moderate_uri, Some(&admin), Some(json!({"status": "open"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, resolved) = app
        .request(
            Method::PUT,
            &moderate_uri,
            Some(&admin),
            Some(json!({"status": "resolved", "note": "Warned the account"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["status"], "resolved");
    let (status, _) = app
        .request(Method::PUT, "/api/v1/admin/reports/9999", Some(&admin), Some(json!({"status": "dismissed"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_organization_analytics_by_role() {
    let app = app().await;
    app.register("admin@example.com", "youth").await;
    let company = app.register("hr@acme.com", "company").await;
    let school = app.register("school@example.com", "institution").await;

    let (status, _) = app.request(Method::GET, "/api/v1/analytics/company", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .request(Method::GET, "/api/v1/analytics/company", Some(&company), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .request(Method::GET, "/api/v1/analytics/institution", Some(&company), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let org_id = app.organization(&company, "Acme Ltd").await;
    let (status, stats) = app
        .request(Method::GET, "/api/v1/analytics/company", Some(&company), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["organization_id"], org_id);
    assert_eq!(stats["total_applications"], 0);
    assert!(stats["jobs"].as_array().unwrap().is_empty());

    app.organization(&school, "Bright Academy").await;
    let (status, stats) = app
        .request(Method::GET, "/api/v1/analytics/institution", Some(&school), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(stats["courses"].as_array().unwrap().is_empty());
}
