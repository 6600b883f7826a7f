use async_trait::async_trait;
use domain::{NewTodo, Todo, TodoId, TodoPatch};
use thiserror::Error;

/// ストア層のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Todo not found: {0}")]
    NotFound(TodoId),

    /// 接続断・スロットリングなど一時的な障害
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Backend(String),

    #[error("Corrupt item: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Todo コレクションを保持するドキュメントストアの抽象
///
/// 識別子と作成時刻の払い出しはストアの責務です。
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// 全件を `created_at` の降順で返す
    async fn list(&self) -> StoreResult<Vec<Todo>>;

    async fn insert(&self, draft: NewTodo) -> StoreResult<Todo>;

    /// パッチに含まれるフィールドだけを更新し、更新後のドキュメントを返す
    async fn update(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Todo>;

    async fn delete(&self, id: &TodoId) -> StoreResult<()>;

    /// コレクションに触れずに接続状態を確認する
    async fn ping(&self) -> StoreResult<()>;

    /// シャットダウン時の後始末
    async fn close(&self) {}

    fn backend(&self) -> &'static str;
}
