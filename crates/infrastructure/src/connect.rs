use shared::{RetryExecutor, RetryResult, StoreUri};
use std::sync::Arc;
use tracing::{error, info};

use crate::dynamodb::DynamoDbTodoStore;
use crate::memory::InMemoryTodoStore;
use crate::store::{StoreError, TodoStore};

/// 接続先 URI からストアを構築します（接続確認はしない）。
pub async fn open_store(uri: &StoreUri) -> Arc<dyn TodoStore> {
    match uri {
        StoreUri::Memory => Arc::new(InMemoryTodoStore::new()),
        StoreUri::DynamoDb {
            table,
            endpoint,
            region,
        } => Arc::new(
            DynamoDbTodoStore::connect(table, endpoint.as_deref(), region.as_deref()).await,
        ),
    }
}

/// ストアを構築し、`ping` が通るまでバックオフ付きで再試行します。
///
/// 一時的でないエラー、または試行回数の上限に達した場合はエラーを返します。
pub async fn connect_with_retry(
    uri: &StoreUri,
    executor: &RetryExecutor,
) -> Result<Arc<dyn TodoStore>, StoreError> {
    let store = open_store(uri).await;
    verify_connection(store, executor).await
}

/// 既存のストアに対して接続確認を行います。
pub async fn verify_connection(
    store: Arc<dyn TodoStore>,
    executor: &RetryExecutor,
) -> Result<Arc<dyn TodoStore>, StoreError> {
    let probe = store.clone();
    let result = executor
        .execute(
            || {
                let store = probe.clone();
                async move { store.ping().await }
            },
            StoreError::is_retryable,
        )
        .await;

    match result {
        RetryResult::Success(()) => {
            info!(backend = store.backend(), "Connected to store");
            Ok(store)
        }
        RetryResult::MaxAttemptsReached { attempts, error } => {
            error!(backend = store.backend(), attempts, error = %error, "Store connection failed");
            Err(error)
        }
        RetryResult::NonRetryable(error) => {
            error!(backend = store.backend(), error = %error, "Store connection failed");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreResult;
    use async_trait::async_trait;
    use domain::{NewTodo, Todo, TodoId, TodoPatch};
    use shared::RetryStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// 指定回数だけ ping に失敗するストア
    struct FlakyStore {
        failures_left: AtomicU32,
        pings: AtomicU32,
        error: StoreError,
    }

    impl FlakyStore {
        fn new(failures: u32, error: StoreError) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                pings: AtomicU32::new(0),
                error,
            }
        }
    }

    #[async_trait]
    impl TodoStore for FlakyStore {
        async fn list(&self) -> StoreResult<Vec<Todo>> {
            Ok(vec![])
        }

        async fn insert(&self, _draft: NewTodo) -> StoreResult<Todo> {
            Err(self.error.clone())
        }

        async fn update(&self, id: &TodoId, _patch: &TodoPatch) -> StoreResult<Todo> {
            Err(StoreError::NotFound(id.clone()))
        }

        async fn delete(&self, id: &TodoId) -> StoreResult<()> {
            Err(StoreError::NotFound(id.clone()))
        }

        async fn ping(&self) -> StoreResult<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }

        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    fn executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryStrategy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            add_jitter: false,
        })
    }

    #[tokio::test]
    async fn test_memory_store_connects_immediately() {
        let store = connect_with_retry(&StoreUri::Memory, &executor(1))
            .await
            .unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let flaky = Arc::new(FlakyStore::new(
            2,
            StoreError::Unavailable("connection refused".into()),
        ));

        let store = verify_connection(flaky.clone(), &executor(5)).await;

        assert!(store.is_ok());
        assert_eq!(flaky.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyStore::new(
            10,
            StoreError::Unavailable("connection refused".into()),
        ));

        let err = verify_connection(flaky.clone(), &executor(3)).await.err();

        assert_eq!(
            err,
            Some(StoreError::Unavailable("connection refused".into()))
        );
        assert_eq!(flaky.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let flaky = Arc::new(FlakyStore::new(
            10,
            StoreError::Backend("ResourceNotFoundException".into()),
        ));

        let err = verify_connection(flaky.clone(), &executor(5)).await.err();

        assert!(matches!(err, Some(StoreError::Backend(_))));
        assert_eq!(flaky.pings.load(Ordering::SeqCst), 1);
    }
}
