use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, MemoryStorage, PasswordHasher, RegistrationService,
    RegistrationServiceDependencies, SystemClock, UserRepository,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use domain::{User, Username};
use infrastructure::BcryptPasswordHasher;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use web_api::{router, AppState};

fn test_app() -> (Router, MemoryStorage, Arc<BcryptPasswordHasher>) {
    let storage = MemoryStorage::new();
    // 最低工作因子，避免拖慢用例
    let hasher = Arc::new(BcryptPasswordHasher::new(Some(4)));
    let clock = Arc::new(SystemClock);

    let registration_service = Arc::new(RegistrationService::new(
        RegistrationServiceDependencies {
            guest_request_repository: Arc::new(storage.clone()),
            user_repository: Arc::new(storage.clone()),
            password_hasher: hasher.clone(),
            clock: clock.clone(),
        },
    ));
    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        message_repository: Arc::new(storage.clone()),
        user_repository: Arc::new(storage.clone()),
        clock,
    }));

    let app = router(AppState::new(registration_service, chat_service));
    (app, storage, hasher)
}

async fn send_request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));
    (status, body)
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_request(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send_request(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    send_request(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn register(app: &Router, username: &str) -> (StatusCode, Value) {
    post_json(
        app,
        "/api/v1/guest-requests",
        json!({
            "username": username,
            "password": "password123",
            "email": format!("{username}@example.com"),
        }),
    )
    .await
}

async fn approved_user(app: &Router, storage: &MemoryStorage, username: &str) -> User {
    let (status, body) = register(app, username).await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = body["id"].as_str().unwrap();

    let (status, _) = post_json(
        app,
        &format!("/api/v1/guest-requests/{request_id}/judge"),
        json!({ "approve": true, "actor": "admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    UserRepository::find_active_by_username(storage, &Username::parse(username).unwrap())
        .await
        .unwrap()
        .expect("user provisioned")
}

#[tokio::test]
async fn guest_registration_to_chat_flow() {
    let (app, storage, hasher) = test_app();

    let (status, body) = register(&app, "walter").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "walter");
    assert_eq!(body["approved"], false);
    assert_eq!(body["deleted"], false);
    let request_id = body["id"].as_str().unwrap().to_owned();

    // 同名请求还挂着，注册被拒
    let (status, body) = register(&app, "walter").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_USERNAME");

    let (status, body) = post_json(
        &app,
        &format!("/api/v1/guest-requests/{request_id}/judge"),
        json!({ "approve": true, "actor": "admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // 请求关闭并带上批准标记
    let (status, body) = get(&app, &format!("/api/v1/guest-requests/{request_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], true);
    assert_eq!(body["deleted"], true);

    // 已关闭的请求不能再裁决
    let (status, body) = post_json(
        &app,
        &format!("/api/v1/guest-requests/{request_id}/judge"),
        json!({ "approve": false, "actor": "admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_PROCESSED");

    // 开通的账号还认注册时的密码
    let user = UserRepository::find_active_by_username(
        &storage,
        &Username::parse("walter").unwrap(),
    )
    .await
    .unwrap()
    .expect("user provisioned");
    assert!(hasher.verify("password123", &user.password).await.unwrap());

    let (status, body) = post_json(
        &app,
        "/api/v1/chat/messages",
        json!({ "author_id": Uuid::from(user.id), "content": "hello board" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["creator"], "walter");
    assert_eq!(body["content"], "hello board");
    let gravatar = body["creator_gravatar"].as_str().unwrap();
    assert_eq!(gravatar.len(), 64);
    assert!(gravatar.chars().all(|c| c.is_ascii_hexdigit()));
    let message_id = body["id"].as_str().unwrap().to_owned();

    let (status, body) = get(&app, "/api/v1/chat/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = delete(
        &app,
        &format!("/api/v1/chat/messages/{message_id}?actor=walter"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // 重复删除同一条消息
    let (status, body) = delete(
        &app,
        &format!("/api/v1/chat/messages/{message_id}?actor=walter"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = get(&app, "/api/v1/chat/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn register_rejects_invalid_payloads() {
    let (app, _storage, _hasher) = test_app();

    let cases = [
        json!({ "username": "ab", "password": "password123", "email": "ab@example.com" }),
        json!({ "username": "walter", "password": "short", "email": "walter@example.com" }),
        json!({ "username": "walter", "password": "password123", "email": "not-an-email" }),
    ];
    for payload in cases {
        let (status, body) = post_json(&app, "/api/v1/guest-requests", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ARGUMENT");
    }
}

#[tokio::test]
async fn rejected_username_can_register_again() {
    let (app, _storage, _hasher) = test_app();

    let (status, body) = register(&app, "jesse").await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = body["id"].as_str().unwrap().to_owned();

    let (status, _) = post_json(
        &app,
        &format!("/api/v1/guest-requests/{request_id}/judge"),
        json!({ "approve": false, "actor": "admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, &format!("/api/v1/guest-requests/{request_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], false);
    assert_eq!(body["deleted"], true);

    // 驳回释放用户名
    let (status, _) = register(&app, "jesse").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn guest_request_listing_keeps_history() {
    let (app, _storage, _hasher) = test_app();

    for name in ["alice", "bob", "alina"] {
        let (status, _) = register(&app, name).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, body) = get(&app, "/api/v1/guest-requests?search=bob").await;
    let bob_id = body[0]["id"].as_str().unwrap().to_owned();
    let (status, _) = delete(&app, &format!("/api/v1/guest-requests/{bob_id}?actor=admin")).await;
    assert_eq!(status, StatusCode::OK);

    // 撤掉的请求留在历史里
    let (status, body) = get(&app, "/api/v1/guest-requests").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["username"], "bob");
    assert_eq!(rows[1]["deleted"], true);

    let (_, body) = get(&app, "/api/v1/guest-requests?search=ALI").await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "alina"]);

    let (_, body) = get(&app, "/api/v1/guest-requests?sort_column=1&ascending=false").await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bob", "alina", "alice"]);

    // 重复删除同一条请求
    let (status, body) =
        delete(&app, &format!("/api/v1/guest-requests/{bob_id}?actor=admin")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let (app, _storage, _hasher) = test_app();
    let missing = Uuid::new_v4();

    let (status, body) = get(&app, &format!("/api/v1/guest-requests/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = post_json(
        &app,
        &format!("/api/v1/guest-requests/{missing}/judge"),
        json!({ "approve": true, "actor": "admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn chat_message_requires_active_author() {
    let (app, storage, _hasher) = test_app();

    let (status, body) = post_json(
        &app,
        "/api/v1/chat/messages",
        json!({ "author_id": Uuid::new_v4(), "content": "hello" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let author = approved_user(&app, &storage, "gus").await;
    let (status, body) = post_json(
        &app,
        "/api/v1/chat/messages",
        json!({ "author_id": Uuid::from(author.id), "content": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, _) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}
