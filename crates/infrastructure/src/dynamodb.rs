use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    config::Region,
    error::{DisplayErrorContext, SdkError},
    types::{
        AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, ReturnValue,
        ScalarAttributeType,
    },
    Client,
};
use chrono::Utc;
use domain::{NewTodo, Todo, TodoId, TodoPatch};
use tracing::info;

use crate::models::{
    item_to_todo, items_to_todos, sort_scanned, todo_to_item, DynamoDbKeys, Item,
    TODO_ENTITY_TYPE,
};
use crate::store::{StoreError, StoreResult, TodoStore};

/// DynamoDB を裏付けとする Todo ストア
///
/// パーティションキー `PK = TODO#<id>`、ソートキー `SK = TODO` の単一テーブル構成。
#[derive(Clone)]
pub struct DynamoDbTodoStore {
    client: Client,
    table_name: String,
}

impl DynamoDbTodoStore {
    /// 既定の認証情報チェーンでクライアントを構築します。
    /// `endpoint` を指定すると DynamoDB Local などに接続します。
    pub async fn connect(table_name: &str, endpoint: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        Self::from_client(Client::new(&config), table_name)
    }

    pub fn from_client(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    /// テーブルが無ければ作成します（ローカル開発・統合テスト用）。
    pub async fn create_table_if_missing(&self) -> StoreResult<()> {
        match self.ping().await {
            Ok(()) => return Ok(()),
            Err(StoreError::Backend(msg)) if msg.contains("ResourceNotFoundException") => {}
            Err(e) => return Err(e),
        }

        info!(table = %self.table_name, "Creating table");

        let key_attr = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(|e| StoreError::Backend(e.to_string()))
        };
        let key_schema = |name: &str, key_type: KeyType| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .map_err(|e| StoreError::Backend(e.to_string()))
        };

        self.client
            .create_table()
            .table_name(&self.table_name)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(key_attr("PK")?)
            .attribute_definitions(key_attr("SK")?)
            .key_schema(key_schema("PK", KeyType::Hash)?)
            .key_schema(key_schema("SK", KeyType::Range)?)
            .send()
            .await
            .map_err(|e| store_error("create_table", e))?;

        Ok(())
    }
}

#[async_trait]
impl TodoStore for DynamoDbTodoStore {
    /// 全ページをスキャンしてから並べ替える。読めない項目があれば `Corrupt` を返す。
    async fn list(&self) -> StoreResult<Vec<Todo>> {
        let mut todos = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("EntityType = :entity_type")
                .expression_attribute_values(
                    ":entity_type",
                    AttributeValue::S(TODO_ENTITY_TYPE.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| store_error("scan", e))?;

            todos.extend(items_to_todos(output.items())?);

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        sort_scanned(&mut todos);
        Ok(todos)
    }

    async fn insert(&self, draft: NewTodo) -> StoreResult<Todo> {
        let todo = Todo::create(draft, TodoId::new(), Utc::now());

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(todo_to_item(&todo)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| store_error("put_item", e))?;

        info!(todo_id = %todo.id, "Todo saved");
        Ok(todo)
    }

    async fn update(&self, id: &TodoId, patch: &TodoPatch) -> StoreResult<Todo> {
        let mut update_parts = Vec::new();
        let mut builder = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(DynamoDbKeys::for_todo(id).into_key()))
            .condition_expression("attribute_exists(PK)")
            .return_values(ReturnValue::AllNew);

        if let Some(text) = patch.text() {
            update_parts.push("#text = :text");
            builder = builder
                .expression_attribute_names("#text", "text")
                .expression_attribute_values(":text", AttributeValue::S(text.to_string()));
        }

        if let Some(completed) = patch.completed() {
            update_parts.push("#completed = :completed");
            builder = builder
                .expression_attribute_names("#completed", "completed")
                .expression_attribute_values(":completed", AttributeValue::Bool(completed));
        }

        if update_parts.is_empty() {
            return Err(StoreError::Backend("empty update patch".to_string()));
        }

        let result = builder
            .update_expression(format!("SET {}", update_parts.join(", ")))
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    StoreError::NotFound(id.clone())
                } else {
                    store_error("update_item", e)
                }
            })?;

        let item = result
            .attributes()
            .ok_or_else(|| StoreError::Corrupt(format!("update of {id} returned no attributes")))?;
        item_to_todo(item)
    }

    async fn delete(&self, id: &TodoId) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(DynamoDbKeys::for_todo(id).into_key()))
            .condition_expression("attribute_exists(PK)")
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    StoreError::NotFound(id.clone())
                } else {
                    store_error("delete_item", e)
                }
            })?;

        info!(todo_id = %id, "Todo deleted");
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
            .map_err(|e| store_error("describe_table", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "dynamodb"
    }
}

/// SDK エラーを分類します。通信断と一時的なサービスエラーのみリトライ対象。
fn store_error<E, R>(operation: &str, err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let transport = matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
    );
    let message = format!("{operation}: {}", DisplayErrorContext(&err));

    if transport || is_dynamodb_retryable(&message) {
        StoreError::Unavailable(message)
    } else {
        StoreError::Backend(message)
    }
}

/// DynamoDB のエラーメッセージから一時的な障害かどうかを判定
fn is_dynamodb_retryable(error_message: &str) -> bool {
    let retryable_errors = [
        "ThrottlingException",
        "ProvisionedThroughputExceededException",
        "ServiceUnavailable",
        "InternalServerError",
        "RequestLimitExceeded",
    ];

    retryable_errors
        .iter()
        .any(|&err| error_message.contains(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamodb_retryable_detection() {
        assert!(is_dynamodb_retryable("ThrottlingException: Rate exceeded"));
        assert!(is_dynamodb_retryable("ServiceUnavailable"));
        assert!(!is_dynamodb_retryable("ValidationException: Invalid input"));
        assert!(!is_dynamodb_retryable("ConditionalCheckFailedException"));
        assert!(!is_dynamodb_retryable("ResourceNotFoundException"));
    }
}
