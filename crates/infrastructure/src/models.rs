use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, SecondsFormat, Utc};
use domain::{Todo, TodoId};
use std::collections::HashMap;

use crate::store::StoreError;

pub type Item = HashMap<String, AttributeValue>;

/// 単一テーブル上で Todo ドキュメントを識別するエンティティタイプ
pub const TODO_ENTITY_TYPE: &str = "Todo";

const TODO_SORT_KEY: &str = "TODO";

/// DynamoDB のキー構造
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbKeys {
    pub pk: String,
    pub sk: String,
}

impl DynamoDbKeys {
    pub fn for_todo(id: &TodoId) -> Self {
        Self {
            pk: format!("TODO#{}", id.as_str()),
            sk: TODO_SORT_KEY.to_string(),
        }
    }

    pub fn into_key(self) -> Item {
        HashMap::from([
            ("PK".to_string(), AttributeValue::S(self.pk)),
            ("SK".to_string(), AttributeValue::S(self.sk)),
        ])
    }
}

/// ナノ秒精度の RFC 3339。文字列比較でも時刻順になる。
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn todo_to_item(todo: &Todo) -> Item {
    let mut item = DynamoDbKeys::for_todo(&todo.id).into_key();
    item.insert(
        "EntityType".to_string(),
        AttributeValue::S(TODO_ENTITY_TYPE.to_string()),
    );
    item.insert("id".to_string(), AttributeValue::S(todo.id.to_string()));
    item.insert("text".to_string(), AttributeValue::S(todo.text.clone()));
    item.insert("completed".to_string(), AttributeValue::Bool(todo.completed));
    item.insert(
        "createdAt".to_string(),
        AttributeValue::S(format_timestamp(&todo.created_at)),
    );
    item
}

pub fn item_to_todo(item: &Item) -> Result<Todo, StoreError> {
    let id = string_attr(item, "id")?;
    let created_at = string_attr(item, "createdAt")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Corrupt(format!("createdAt of {id}: {e}")))?
        .with_timezone(&Utc);
    let completed = item
        .get("completed")
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| StoreError::Corrupt(format!("completed of {id} is missing")))?;

    Ok(Todo {
        text: string_attr(item, "text")?,
        id: TodoId::from(id),
        completed,
        created_at,
    })
}

/// スキャン結果を読み取る。読めない項目が一つでもあれば一覧全体をエラーにする。
pub fn items_to_todos(items: &[Item]) -> Result<Vec<Todo>, StoreError> {
    items.iter().map(item_to_todo).collect()
}

/// スキャン順は不定なので、`createdAt` の降順に並べ、同時刻は `id`（ULID）の降順で決める。
pub fn sort_scanned(todos: &mut [Todo]) {
    todos.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn string_attr(item: &Item, name: &str) -> Result<String, StoreError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| StoreError::Corrupt(format!("attribute '{name}' is missing")))
}
