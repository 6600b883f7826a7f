use domain::{Todo, TodoId};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::TodoClient;

/// 一覧画面の状態
///
/// ローカルで楽観的に書き換えず、変更のたびにサーバの一覧を取り直します。
#[derive(Debug, Clone)]
pub struct TodoBoard {
    client: TodoClient,
    todos: Vec<Todo>,
}

impl TodoBoard {
    pub fn new(client: TodoClient) -> Self {
        Self {
            client,
            todos: Vec::new(),
        }
    }

    /// 最後に同期した一覧（新しい順）
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn get(&self, id: &TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| &t.id == id)
    }

    pub async fn refresh(&mut self) -> ClientResult<()> {
        self.todos = self.client.list().await?;
        debug!(count = self.todos.len(), "Board refreshed");
        Ok(())
    }

    /// 空白のみの入力はリクエストせずに無視し、`None` を返す
    pub async fn add(&mut self, text: &str) -> ClientResult<Option<Todo>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let todo = self.client.create(text).await?;
        self.refresh().await?;
        Ok(Some(todo))
    }

    /// 手元の `completed` を反転して送信する
    pub async fn toggle(&mut self, id: &TodoId) -> ClientResult<Todo> {
        let completed = self
            .get(id)
            .map(|t| t.completed)
            .ok_or_else(|| ClientError::UnknownTodo(id.clone()))?;

        let todo = self.client.set_completed(id, !completed).await?;
        self.refresh().await?;
        Ok(todo)
    }

    pub async fn remove(&mut self, id: &TodoId) -> ClientResult<()> {
        self.client.delete(id).await?;
        self.refresh().await
    }
}
