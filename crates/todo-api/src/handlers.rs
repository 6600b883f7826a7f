use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use domain::{NewTodo, Todo, TodoId, TodoPatch};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApiError, ApiJson};
use crate::AppState;

/// POST /api/todos リクエスト
///
/// `text` の必須チェックはドメイン側で行うため、ここでは省略可能として受けます。
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

/// PUT /api/todos/:id リクエスト（指定されたフィールドのみ更新）
#[derive(Debug, Deserialize)]
pub struct UpdateTodoRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// データベース接続状態
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub database: DatabaseStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Endpoints {
    pub health: String,
    pub todos: String,
}

pub const SERVICE_NAME: &str = "todo-api";

/// GET /api/todos
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = state.store().list().await?;
    Ok(Json(todos))
}

/// POST /api/todos
pub async fn create_todo(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    // ストアに触れる前に検証する
    let draft = NewTodo::new(req.text, req.completed)?;
    let todo = state.store().insert(draft).await?;

    info!(todo_id = %todo.id, "Todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// PUT /api/todos/:id
pub async fn update_todo(
    Path(id): Path<String>,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateTodoRequest>,
) -> Result<Json<Todo>, ApiError> {
    let patch = TodoPatch::new(req.text, req.completed)?;
    let id = TodoId::from(id);
    let todo = state.store().update(&id, &patch).await?;

    info!(todo_id = %todo.id, completed = todo.completed, "Todo updated");
    Ok(Json(todo))
}

/// DELETE /api/todos/:id
pub async fn delete_todo(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = TodoId::from(id);
    state.store().delete(&id).await?;

    info!(todo_id = %id, "Todo deleted");
    Ok(Json(MessageResponse {
        message: "Todo deleted successfully".to_string(),
    }))
}

/// ヘルスチェック用ハンドラ
///
/// ストアに到達できなくても 200 を返し、`database` で状態を伝えます。
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store().ping().await {
        Ok(()) => DatabaseStatus::Connected,
        Err(e) => {
            warn!(error = %e, "Store ping failed");
            DatabaseStatus::Disconnected
        }
    };

    Json(HealthResponse {
        status: "OK".to_string(),
        service: SERVICE_NAME.to_string(),
        database,
        timestamp: Utc::now(),
    })
}

/// GET /
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Todo API Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            health: "/health".to_string(),
            todos: "/api/todos".to_string(),
        },
    })
}

pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// 既知のパスに対する未対応メソッド
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
