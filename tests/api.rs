//! HTTP contract tests against the full router on an in-memory database

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use newsroom::api::{build_router, AppState};
use newsroom::config::Config;
use newsroom::db;

const PASSWORD: &str = "newsroom-2024";

struct Harness {
    server: TestServer,
    admin: String,
    _uploads: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.local.path = uploads.path().to_path_buf();

        let pool = db::create_test_pool().await.unwrap();
        db::migrations::run_migrations(&pool).await.unwrap();
        let state = AppState::new(pool, &config).unwrap();
        let server = TestServer::new(build_router(state, &config).unwrap()).unwrap();

        let response = server
            .post("/api/auth/sign-up")
            .json(&json!({ "name": "Chief Editor", "email": "chief@example.com", "password": PASSWORD }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["user"]["role"], "admin");
        let admin = body["token"].as_str().unwrap().to_string();

        Self {
            server,
            admin,
            _uploads: uploads,
        }
    }

    /// Create an account through the admin API and sign in as it
    async fn member(&self, email: &str, role: &str) -> String {
        self.server
            .post("/api/admin/users")
            .authorization_bearer(&self.admin)
            .json(&json!({ "name": "Staff Member", "email": email, "password": PASSWORD, "role": role }))
            .await
            .assert_status(StatusCode::CREATED);
        self.sign_in(email).await
    }

    async fn sign_in(&self, email: &str) -> String {
        let response = self
            .server
            .post("/api/auth/sign-in")
            .json(&json!({ "email": email, "password": PASSWORD }))
            .await;
        response.assert_status(StatusCode::OK);
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    async fn create_category(&self, name: &str) -> Value {
        let response = self
            .server
            .post("/api/admin/categories")
            .authorization_bearer(&self.admin)
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    async fn create_post(&self, body: Value) -> Value {
        let response = self
            .server
            .post("/api/admin/posts")
            .authorization_bearer(&self.admin)
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new().await;
    let response = h.server.get("/api/health").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["database"], "ok");
}

#[tokio::test]
async fn test_dashboard_gates() {
    let h = Harness::new().await;
    let editor = h.member("desk@example.com", "editor").await;
    let reader = h.member("reader@example.com", "user").await;

    let anonymous = h.server.get("/api/admin/posts").await;
    anonymous.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&anonymous.json()), "UNAUTHORIZED");

    h.server
        .get("/api/admin/posts")
        .authorization_bearer(&reader)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.server
        .get("/api/admin/posts")
        .authorization_bearer(&editor)
        .await
        .assert_status(StatusCode::OK);

    // Admin-only surfaces
    h.server
        .get("/api/admin/users")
        .authorization_bearer(&editor)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.server
        .get("/api/admin/users")
        .authorization_bearer(&h.admin)
        .await
        .assert_status(StatusCode::OK);

    h.server
        .post("/api/messages")
        .json(&json!({
            "name": "Reader",
            "email": "reader@example.com",
            "subject": "Tip",
            "content": "Something happened at the harbour."
        }))
        .await
        .assert_status(StatusCode::CREATED);
    let inbox: Value = h
        .server
        .get("/api/admin/messages")
        .authorization_bearer(&editor)
        .await
        .json();
    let id = inbox["items"][0]["id"].as_i64().unwrap();
    h.server
        .delete(&format!("/api/admin/messages/{}", id))
        .authorization_bearer(&editor)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    h.server
        .delete(&format!("/api/admin/messages/{}", id))
        .authorization_bearer(&h.admin)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_validation_errors_list_fields() {
    let h = Harness::new().await;
    let response = h
        .server
        .post("/api/admin/posts")
        .authorization_bearer(&h.admin)
        .json(&json!({ "title": "Hi", "content": "   " }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json();
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    let fields = body["error"]["details"]["fields"].as_object().unwrap();
    assert!(fields.contains_key("title"));
    assert!(fields.contains_key("content"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let h = Harness::new().await;
    let response = h
        .server
        .post("/api/auth/sign-in")
        .content_type("application/json")
        .bytes("{\"email\":".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json()), "BAD_REQUEST");
}

#[tokio::test]
async fn test_published_post_reaches_readers() {
    let h = Harness::new().await;
    let category = h.create_category("World News").await;
    assert_eq!(category["slug"], "world-news");

    let post = h
        .create_post(json!({
            "title": "Bridge reopens after repairs",
            "excerpt": "Traffic resumes on Tuesday",
            "content": "The bridge reopened to traffic this morning.",
            "category_id": category["id"],
            "published": true
        }))
        .await;
    assert_eq!(post["slug"], "bridge-reopens-after-repairs");
    assert!(post["published_at"].is_string());

    h.create_post(json!({
        "title": "Draft about the budget",
        "content": "Not ready yet.",
        "category_id": category["id"]
    }))
    .await;

    let listing: Value = h.server.get("/api/posts").await.json();
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["items"][0]["category_slug"], "world-news");

    let detail = h.server.get("/api/posts/bridge-reopens-after-repairs").await;
    detail.assert_status(StatusCode::OK);
    assert_eq!(detail.json::<Value>()["views"], 1);

    h.server
        .get("/api/posts/draft-about-the-budget")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let categories: Value = h.server.get("/api/categories").await.json();
    assert_eq!(categories[0]["post_count"], 1);

    let in_category: Value = h.server.get("/api/categories/world-news/posts").await.json();
    assert_eq!(in_category["total"], 1);

    let search: Value = h.server.get("/api/posts?q=bridge").await.json();
    assert_eq!(search["total"], 1);
    let search: Value = h.server.get("/api/posts?q=budget").await.json();
    assert_eq!(search["total"], 0);
}

#[tokio::test]
async fn test_duplicate_slug_already_exists() {
    let h = Harness::new().await;
    h.create_post(json!({ "title": "Storm warning", "content": "Body", "slug": "storm" }))
        .await;
    let response = h
        .server
        .post("/api/admin/posts")
        .authorization_bearer(&h.admin)
        .json(&json!({ "title": "Another storm", "content": "Body", "slug": "storm" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&response.json()), "ALREADY_EXISTS");
}

#[tokio::test]
async fn test_breaking_news_links() {
    let h = Harness::new().await;
    let post = h
        .create_post(json!({ "title": "Election results", "content": "Counting is over.", "published": true }))
        .await;

    let conflicting = h
        .server
        .post("/api/admin/breaking-news")
        .authorization_bearer(&h.admin)
        .json(&json!({ "title": "Results are in", "post_id": post["id"], "url": "https://example.com" }))
        .await;
    conflicting.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(conflicting.json::<Value>()["error"]["details"]["fields"]["url"].is_array());

    h.server
        .post("/api/admin/breaking-news")
        .authorization_bearer(&h.admin)
        .json(&json!({ "title": "Results are in", "post_id": post["id"], "priority": 10 }))
        .await
        .assert_status(StatusCode::CREATED);

    let ticker: Value = h.server.get("/api/breaking-news").await.json();
    assert_eq!(ticker[0]["link"], "/posts/election-results");
}

#[tokio::test]
async fn test_deleting_author_refreshes_listings() {
    let h = Harness::new().await;
    let world = h.create_category("World").await;
    let editor = h.member("desk@example.com", "editor").await;
    let editor_id = h
        .server
        .get("/api/auth/me")
        .authorization_bearer(&editor)
        .await
        .json::<Value>()["id"]
        .clone();

    let response = h
        .server
        .post("/api/admin/posts")
        .authorization_bearer(&editor)
        .json(&json!({
            "title": "Summit opens",
            "content": "Leaders arrived this morning.",
            "category_id": world["id"],
            "published": true
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let post: Value = response.json();
    h.server
        .post("/api/admin/breaking-news")
        .authorization_bearer(&h.admin)
        .json(&json!({ "title": "Summit under way", "post_id": post["id"] }))
        .await
        .assert_status(StatusCode::CREATED);

    // Warm both caches
    let categories: Value = h.server.get("/api/categories").await.json();
    assert_eq!(categories[0]["post_count"], 1);
    let ticker: Value = h.server.get("/api/breaking-news").await.json();
    assert_eq!(ticker[0]["link"], "/posts/summit-opens");

    h.server
        .delete(&format!("/api/admin/users/{}", editor_id))
        .authorization_bearer(&h.admin)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    h.server
        .get("/api/posts/summit-opens")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    let categories: Value = h.server.get("/api/categories").await.json();
    assert_eq!(categories[0]["post_count"], 0);
    let ticker: Value = h.server.get("/api/breaking-news").await.json();
    assert!(ticker[0]["link"].is_null());
}

#[tokio::test]
async fn test_sign_up_closed_after_first_admin() {
    let h = Harness::new().await;
    let response = h
        .server
        .post("/api/auth/sign-up")
        .json(&json!({ "name": "Someone", "email": "someone@example.com", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_cookie_and_sign_out() {
    let h = Harness::new().await;
    let response = h
        .server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "chief@example.com", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(cookie.starts_with("newsroom_session="));
    assert!(cookie.contains("HttpOnly"));
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();

    h.server
        .get("/api/auth/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::OK);
    h.server
        .post("/api/auth/sign-out")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .get("/api/auth/me")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_failed_sign_ins_are_rate_limited() {
    let h = Harness::new().await;
    for _ in 0..5 {
        h.server
            .post("/api/auth/sign-in")
            .json(&json!({ "email": "chief@example.com", "password": "wrong-password" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
    let response = h
        .server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "chief@example.com", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "RATE_LIMITED");
    assert!(body["error"]["details"]["retry_after"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_contact_form_is_rate_limited() {
    let h = Harness::new().await;
    let message = json!({
        "name": "Reader",
        "email": "reader@example.com",
        "phone": "+1 555 0100",
        "subject": "Correction",
        "content": "The match ended 2-1, not 2-0."
    });
    // A fresh forwarded address per request does not buy a fresh window
    // when the caller is not a configured proxy
    let forwarded_for = |n: usize| HeaderValue::from_str(&format!("203.0.113.{}", n)).unwrap();
    for n in 0..5 {
        h.server
            .post("/api/messages")
            .add_header(HeaderName::from_static("x-forwarded-for"), forwarded_for(n))
            .json(&message)
            .await
            .assert_status(StatusCode::CREATED);
    }
    h.server
        .post("/api/messages")
        .add_header(HeaderName::from_static("x-forwarded-for"), forwarded_for(99))
        .json(&message)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    let unread: Value = h
        .server
        .get("/api/admin/messages?read=false")
        .authorization_bearer(&h.admin)
        .await
        .json();
    assert_eq!(unread["total"], 5);
}

#[tokio::test]
async fn test_banned_user_cannot_sign_in() {
    let h = Harness::new().await;
    let reader = h.member("reader@example.com", "user").await;
    let me: Value = h
        .server
        .get("/api/auth/me")
        .authorization_bearer(&reader)
        .await
        .json();

    h.server
        .post(&format!("/api/admin/users/{}/ban", me["id"]))
        .authorization_bearer(&h.admin)
        .json(&json!({ "reason": "Spam" }))
        .await
        .assert_status(StatusCode::OK);

    h.server
        .get("/api/auth/me")
        .authorization_bearer(&reader)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = h
        .server
        .post("/api/auth/sign-in")
        .json(&json!({ "email": "reader@example.com", "password": PASSWORD }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "USER_BANNED");
    assert_eq!(body["error"]["details"]["reason"], "Spam");
}

#[tokio::test]
async fn test_admin_cannot_ban_self() {
    let h = Harness::new().await;
    let me: Value = h
        .server
        .get("/api/auth/me")
        .authorization_bearer(&h.admin)
        .await
        .json();
    h.server
        .post(&format!("/api/admin/users/{}/ban", me["id"]))
        .authorization_bearer(&h.admin)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_upload_is_served() {
    let h = Harness::new().await;
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0u8; 32]);

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(png.clone())
            .file_name("chart.png")
            .mime_type("image/png"),
    );
    let response = h
        .server
        .post("/api/admin/upload")
        .authorization_bearer(&h.admin)
        .multipart(form)
        .await;
    response.assert_status(StatusCode::CREATED);
    let stored: Value = response.json();
    let url = stored["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));
    assert_eq!(stored["size"], png.len());

    let served = h.server.get(&url).await;
    served.assert_status(StatusCode::OK);
    assert_eq!(served.as_bytes().as_ref(), png.as_slice());

    let disguised = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"<html><script>alert(1)</script></html>".to_vec())
            .file_name("chart.png")
            .mime_type("image/png"),
    );
    let rejected = h
        .server
        .post("/api/admin/upload")
        .authorization_bearer(&h.admin)
        .multipart(disguised)
        .await;
    rejected.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = rejected.json();
    assert!(body["error"]["details"]["fields"]["file"].is_array());

    let text = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"plain text".to_vec())
            .file_name("notes.txt")
            .mime_type("text/plain"),
    );
    h.server
        .post("/api/admin/upload")
        .authorization_bearer(&h.admin)
        .multipart(text)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let h = Harness::new().await;
    let response = h.server.get("/api/does-not-exist").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&response.json()), "NOT_FOUND");
}
