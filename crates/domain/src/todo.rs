use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{DomainError, DomainResult};

/// Todo の識別子（ULID 文字列）
///
/// 外部からは不透明な文字列として扱います。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ULID に埋め込まれた生成時刻（ミリ秒）
    pub fn timestamp_ms(&self) -> Option<u64> {
        ulid::Ulid::from_string(&self.0)
            .ok()
            .map(|ulid| ulid.timestamp_ms())
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TodoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TodoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 永続化された Todo ドキュメント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// 検証済みの入力から Todo を組み立てます。
    /// `id` と `created_at` はストア側が払い出します。
    pub fn create(draft: NewTodo, id: TodoId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: draft.text,
            completed: draft.completed,
            created_at,
        }
    }

    /// パッチに含まれるフィールドだけを上書きします。
    /// `id` と `created_at` は変更しません。
    pub fn apply(&mut self, patch: &TodoPatch) {
        if let Some(text) = &patch.text {
            self.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }
}

/// 作成リクエストを検証した結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    text: String,
    completed: bool,
}

impl NewTodo {
    /// `text` は前後の空白を除いて空でないこと。
    /// `completed` 省略時は `false`。
    pub fn new(text: Option<String>, completed: Option<bool>) -> DomainResult<Self> {
        let text = text.ok_or(DomainError::MissingText)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DomainError::MissingText);
        }

        Ok(Self {
            text: trimmed.to_string(),
            completed: completed.unwrap_or(false),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn completed(&self) -> bool {
        self.completed
    }
}

/// 更新リクエストで実際に指定されたフィールドだけを保持するパッチ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    text: Option<String>,
    completed: Option<bool>,
}

impl TodoPatch {
    pub fn new(text: Option<String>, completed: Option<bool>) -> DomainResult<Self> {
        if text.is_none() && completed.is_none() {
            return Err(DomainError::EmptyPatch);
        }

        let text = match text {
            Some(t) => {
                let trimmed = t.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::EmptyText);
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        Ok(Self { text, completed })
    }

    pub fn completion(completed: bool) -> Self {
        Self {
            text: None,
            completed: Some(completed),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn completed(&self) -> Option<bool> {
        self.completed
    }
}

/// `created_at` の降順に並べ替えます（新しいものが先頭）。
/// 同時刻の場合は入力順の逆、つまり後から追加されたものを先にします。
pub fn sort_newest_first(todos: &mut [Todo]) {
    todos.reverse();
    todos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
