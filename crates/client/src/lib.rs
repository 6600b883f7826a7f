//! Todo API のクライアント
//!
//! - [`TodoClient`]: REST エンドポイントの薄いラッパー
//! - [`TodoBoard`]: 一覧画面の状態。変更のたびにサーバから再取得する

pub mod board;
pub mod error;

pub use board::TodoBoard;
pub use error::{ClientError, ClientResult};

use chrono::{DateTime, Utc};
use domain::{Todo, TodoId, TodoPatch};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

/// GET /health の結果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    pub service: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

impl Health {
    pub fn is_database_connected(&self) -> bool {
        self.database == "connected"
    }
}

#[derive(Debug, Clone)]
pub struct TodoClient {
    http: Client,
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// `TODO_API_URL` を読み、未設定なら `http://localhost:5000` を使う
    pub fn from_env() -> Self {
        let url = std::env::var("TODO_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn todos_url(&self) -> String {
        format!("{}/api/todos", self.base_url)
    }

    fn todo_url(&self, id: &TodoId) -> String {
        format!("{}/api/todos/{}", self.base_url, id)
    }

    pub async fn list(&self) -> ClientResult<Vec<Todo>> {
        let resp = self.http.get(self.todos_url()).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn create(&self, text: &str) -> ClientResult<Todo> {
        let resp = self
            .http
            .post(self.todos_url())
            .json(&CreateBody { text })
            .send()
            .await?;
        let todo: Todo = check(resp).await?.json().await?;
        debug!(todo_id = %todo.id, "Created todo");
        Ok(todo)
    }

    pub async fn set_completed(&self, id: &TodoId, completed: bool) -> ClientResult<Todo> {
        self.update(id, &TodoPatch::completion(completed)).await
    }

    pub async fn update(&self, id: &TodoId, patch: &TodoPatch) -> ClientResult<Todo> {
        let body = PatchBody {
            text: patch.text(),
            completed: patch.completed(),
        };
        let resp = self.http.put(self.todo_url(id)).json(&body).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    /// 削除し、サーバの確認メッセージを返す
    pub async fn delete(&self, id: &TodoId) -> ClientResult<String> {
        let resp = self.http.delete(self.todo_url(id)).send().await?;
        let body: MessageBody = check(resp).await?.json().await?;
        Ok(body.message)
    }

    pub async fn health(&self) -> ClientResult<Health> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// 非 2xx をサーバの `message` 付きの [`ClientError::Api`] に変換する
async fn check(resp: Response) -> ClientResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = TodoClient::new("http://example.test:5000/");
        assert_eq!(client.base_url(), "http://example.test:5000");
        assert_eq!(
            client.todo_url(&TodoId::from("abc")),
            "http://example.test:5000/api/todos/abc"
        );
    }

    #[test]
    fn test_patch_body_omits_unset_fields() {
        let patch = TodoPatch::completion(true);
        let body = PatchBody {
            text: patch.text(),
            completed: patch.completed(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"completed": true})
        );
    }
}
