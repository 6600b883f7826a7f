use async_trait::async_trait;
use chrono::Utc;
use domain::{sort_newest_first, NewTodo, Todo, TodoId, TodoPatch};
use tokio::sync::RwLock;

use crate::store::{StoreError, StoreResult, TodoStore};

/// 簡易な InMemory 実装（開発/テスト用）
///
/// 挿入順に保持し、一覧時に並べ替えます。
#[derive(Default)]
pub struct InMemoryTodoStore {
    todos: RwLock<Vec<Todo>>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.todos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.todos.read().await.is_empty()
    }
}

#[async_trait]
impl TodoStore for InMemoryTodoStore {
    async fn list(&self) -> StoreResult<Vec<Todo>> {
        let mut todos = self.todos.read().await.clone();
        sort_newest_first(&mut todos);
        Ok(todos)
    }

    async fn insert(&self, draft: NewTodo) -> StoreResult<Todo> {
        let todo = Todo::create(draft, TodoId::new(), Utc::now());
        self.todos.write().await.push(todo.clone());
        Ok(todo)
    }

    async fn update(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Todo> {
        let mut todos = self.todos.write().await;
        let todo = todos
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        todo.apply(patch);
        Ok(todo.clone())
    }

    async fn delete(&self, id: &TodoId) -> StoreResult<()> {
        let mut todos = self.todos.write().await;
        let index = todos
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        todos.remove(index);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
