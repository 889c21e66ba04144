use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use validator::Validate;

use application::{
    ChatMessageDto, GuestRequestDto, GuestRequestQuery, PostMessageRequest, RegisterGuestRequest,
};
use domain::ActorId;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize, Validate)]
struct RegisterPayload {
    #[validate(length(min = 3, max = 50))]
    username: String,
    #[validate(length(min = 8, max = 50))]
    password: String,
    #[validate(email, length(max = 100))]
    email: String,
}

#[derive(Debug, Deserialize)]
struct JudgePayload {
    approve: bool,
    actor: String,
}

#[derive(Debug, Deserialize)]
struct PostMessagePayload {
    author_id: Uuid,
    content: String,
}

/// 删除类接口通过查询参数说明操作者，写进审计日志。
#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor: String,
}

#[derive(Debug, Deserialize)]
struct RequestListQuery {
    search: Option<String>,
    sort_column: Option<u32>,
    ascending: Option<bool>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/guest-requests",
            post(register_guest).get(list_guest_requests),
        )
        .route(
            "/guest-requests/{request_id}",
            get(get_guest_request).delete(delete_guest_request),
        )
        .route("/guest-requests/{request_id}/judge", post(judge_guest_request))
        .route(
            "/chat/messages",
            post(post_chat_message).get(list_chat_messages),
        )
        .route("/chat/messages/{message_id}", delete(delete_chat_message))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_guest(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<GuestRequestDto>), ApiError> {
    payload
        .validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let dto = state
        .registration_service
        .register(RegisterGuestRequest {
            username: payload.username,
            password: payload.password,
            email: payload.email,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn list_guest_requests(
    State(state): State<AppState>,
    Query(query): Query<RequestListQuery>,
) -> Result<Json<Vec<GuestRequestDto>>, ApiError> {
    let dtos = state
        .registration_service
        .list_requests(GuestRequestQuery {
            search: query.search,
            sort_column: query.sort_column,
            ascending: query.ascending,
        })
        .await?;

    Ok(Json(dtos))
}

async fn get_guest_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<GuestRequestDto>, ApiError> {
    let dto = state.registration_service.get_request(request_id).await?;
    Ok(Json(dto))
}

async fn delete_guest_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .registration_service
        .delete_request(request_id, ActorId::new(query.actor))
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}

async fn judge_guest_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<JudgePayload>,
) -> Result<Json<Value>, ApiError> {
    state
        .registration_service
        .judge(request_id, payload.approve, ActorId::new(payload.actor))
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}

async fn post_chat_message(
    State(state): State<AppState>,
    Json(payload): Json<PostMessagePayload>,
) -> Result<(StatusCode, Json<ChatMessageDto>), ApiError> {
    let dto = state
        .chat_service
        .post_message(PostMessageRequest {
            author_id: payload.author_id,
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn list_chat_messages(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatMessageDto>>, ApiError> {
    let dtos = state.chat_service.list_messages().await?;
    Ok(Json(dtos))
}

async fn delete_chat_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .chat_service
        .delete_message(message_id, ActorId::new(query.actor))
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}
