use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use backend::{api_router, auth::SessionKeys, store::TaskStore, AppState};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    keys: SessionKeys,
}

impl TestApp {
    fn new() -> Self {
        let keys = SessionKeys::from_secret(b"integration-secret");
        let router = api_router(AppState::new(TaskStore::memory(), keys.clone()));
        Self { router, keys }
    }

    fn token(&self, user_id: &str) -> String {
        self.keys.issue_token(user_id, Duration::hours(1)).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(&self, token: &str, title: &str) -> Value {
        let (status, task) = self
            .send(
                Method::POST,
                "/api/tasks",
                Some(token),
                Some(json!({
                    "title": title,
                    "description": "Electric+water",
                    "date": "2024-05-01",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", task);
        task
    }

    async fn list(&self, token: &str) -> Vec<Value> {
        let (status, tasks) = self.send(Method::GET, "/api/tasks", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        tasks.as_array().cloned().unwrap()
    }
}

#[tokio::test]
async fn create_assigns_id_owner_and_defaults() {
    let app = TestApp::new();
    let token = app.token("user_alice");

    let task = app.create(&token, "Pay bills").await;
    assert!(task["id"].as_str().is_some());
    assert_eq!(task["title"], "Pay bills");
    assert_eq!(task["date"], "2024-05-01");
    assert_eq!(task["isCompleted"], false);
    assert_eq!(task["isImportant"], false);
    assert_eq!(task["userId"], "user_alice");
    assert_eq!(task["createdAt"], task["updatedAt"]);
}

#[tokio::test]
async fn client_supplied_owner_is_ignored() {
    let app = TestApp::new();
    let token = app.token("user_alice");

    let (status, task) = app
        .send(
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({
                "title": "Pay bills",
                "description": "x",
                "date": "2024-05-01",
                "userId": "user_mallory",
                "important": true,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["userId"], "user_alice");
    assert_eq!(task["isImportant"], true);
}

#[tokio::test]
async fn short_title_is_rejected_and_nothing_is_stored() {
    let app = TestApp::new();
    let token = app.token("user_alice");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/tasks",
            Some(&token),
            Some(json!({ "title": "Hi", "description": "x", "date": "2024-05-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title must be at least 3 characters long");
    assert!(app.list(&token).await.is_empty());
}

#[tokio::test]
async fn missing_fields_are_rejected_and_nothing_is_stored() {
    let app = TestApp::new();
    let token = app.token("user_alice");

    for body in [
        json!({ "description": "x", "date": "2024-05-01" }),
        json!({ "title": "Pay bills", "date": "2024-05-01" }),
        json!({ "title": "Pay bills", "description": "x" }),
    ] {
        let (status, reply) = app
            .send(Method::POST, "/api/tasks", Some(&token), Some(body))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(reply["error"], "Missing required fields");
    }
    assert!(app.list(&token).await.is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = TestApp::new();
    let token = app.token("user_alice");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/tasks")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn every_endpoint_requires_a_session() {
    let app = TestApp::new();
    let stranger_keys = SessionKeys::from_secret(b"someone-else");
    let forged = stranger_keys.issue_token("user_alice", Duration::hours(1)).unwrap();

    for token in [None, Some(forged.as_str())] {
        let requests = [
            (Method::GET, "/api/tasks", None),
            (
                Method::POST,
                "/api/tasks",
                Some(json!({ "title": "Pay bills", "description": "x", "date": "2024-05-01" })),
            ),
            (Method::PUT, "/api/tasks", Some(json!({ "id": uuid::Uuid::new_v4(), "isCompleted": true }))),
            (Method::DELETE, "/api/00000000-0000-0000-0000-000000000000", None),
        ];
        for (method, uri, body) in requests {
            let (status, reply) = app.send(method, uri, token, body).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
            assert_eq!(reply["error"], "Unauthorized");
        }
    }
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = TestApp::new();
    let token = app.token("user_alice");
    app.create(&token, "Pay bills").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/tasks")
                .header(header::COOKIE, format!("__session={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn users_only_see_their_own_tasks() {
    let app = TestApp::new();
    let alice = app.token("user_alice");
    let bob = app.token("user_bob");

    let first = app.create(&alice, "Pay bills").await;
    app.create(&bob, "Walk dog").await;
    let second = app.create(&alice, "Buy milk").await;

    let titles: Vec<Value> = app.list(&alice).await.iter().map(|t| t["title"].clone()).collect();
    assert_eq!(titles, vec![first["title"].clone(), second["title"].clone()]);
    assert_eq!(app.list(&bob).await.len(), 1);
}

#[tokio::test]
async fn update_merges_partial_fields() {
    let app = TestApp::new();
    let token = app.token("user_alice");
    let task = app.create(&token, "Pay bills").await;

    let (status, updated) = app
        .send(
            Method::PUT,
            "/api/tasks",
            Some(&token),
            Some(json!({ "id": task["id"], "isCompleted": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["isCompleted"], true);
    assert_eq!(updated["title"], "Pay bills");

    let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());
    let (status, edited) = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({ "title": "Pay all bills", "date": "2024-06-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["title"], "Pay all bills");
    assert_eq!(edited["date"], "2024-06-01");
    assert_eq!(edited["isCompleted"], true);
    assert_eq!(edited["description"], "Electric+water");

    assert_eq!(app.list(&token).await[0], edited);
}

#[tokio::test]
async fn update_rejects_bad_edits() {
    let app = TestApp::new();
    let token = app.token("user_alice");
    let task = app.create(&token, "Pay bills").await;

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/tasks",
            Some(&token),
            Some(json!({ "id": task["id"], "title": "ab" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::PUT, "/api/tasks", Some(&token), Some(json!({ "isCompleted": true })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.list(&token).await[0]["title"], "Pay bills");
}

#[tokio::test]
async fn foreign_tasks_cannot_be_updated_or_deleted() {
    let app = TestApp::new();
    let alice = app.token("user_alice");
    let mallory = app.token("user_mallory");
    let task = app.create(&alice, "Pay bills").await;
    let id = task["id"].as_str().unwrap();

    let (status, reply) = app
        .send(
            Method::PUT,
            "/api/tasks",
            Some(&mallory),
            Some(json!({ "id": id, "title": "stolen" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(reply.get("title").is_none());

    let (status, reply) = app
        .send(Method::DELETE, &format!("/api/{}", id), Some(&mallory), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply["error"], "Task not found");

    assert_eq!(app.list(&alice).await, vec![task]);
}

#[tokio::test]
async fn delete_returns_the_removed_task() {
    let app = TestApp::new();
    let token = app.token("user_alice");
    let task = app.create(&token, "Pay bills").await;
    let id = task["id"].as_str().unwrap();

    let (status, reply) = app
        .send(Method::DELETE, &format!("/api/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["message"], "Task deleted successfully");
    assert_eq!(reply["task"], task);
    assert!(app.list(&token).await.is_empty());

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/tasks/{}", id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_unknown_ids_is_not_found() {
    let app = TestApp::new();
    let token = app.token("user_alice");

    for uri in [
        format!("/api/tasks/{}", uuid::Uuid::new_v4()),
        format!("/api/{}", uuid::Uuid::new_v4()),
        "/api/not-a-task-id".to_string(),
    ] {
        let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
