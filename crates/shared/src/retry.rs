use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// リトライ戦略
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// 最大試行回数（初回を含む）
    pub max_attempts: u32,
    /// 初期遅延時間
    pub initial_delay: Duration,
    /// 最大遅延時間
    pub max_delay: Duration,
    /// バックオフ倍率
    pub backoff_multiplier: f64,
    /// ジッター追加フラグ
    pub add_jitter: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

/// リトライ実行結果
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// 成功
    Success(T),
    /// 最大試行回数に達して失敗
    MaxAttemptsReached { attempts: u32, error: E },
    /// リトライ不可能なエラーで失敗
    NonRetryable(E),
}

/// リトライ実行器
pub struct RetryExecutor {
    strategy: RetryStrategy,
}

impl RetryExecutor {
    /// 新しいリトライ実行器を作成
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    /// 指数バックオフ設定でリトライ実行器を作成
    pub fn exponential_backoff(max_attempts: u32, initial_delay: Duration) -> Self {
        Self::new(RetryStrategy {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        })
    }

    /// 操作をリトライ付きで実行
    ///
    /// `is_retryable` が `false` を返したエラーは即座に打ち切ります。
    pub async fn execute<F, Fut, T, E>(
        &self,
        operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> RetryResult<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.strategy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts, "Executing operation");

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retrying");
                    }
                    return RetryResult::Success(result);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        warn!(error = %error, "Non-retryable error encountered");
                        return RetryResult::NonRetryable(error);
                    }

                    if attempt >= max_attempts {
                        error!(max_attempts, error = %error, "Max attempts reached, giving up");
                        return RetryResult::MaxAttemptsReached {
                            attempts: attempt,
                            error,
                        };
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Operation failed, retrying"
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// 遅延時間を計算
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = self
            .strategy
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let base_delay =
            Duration::from_millis((self.strategy.initial_delay.as_millis() as f64 * multiplier) as u64);

        // 最大遅延時間でクランプ
        let delay = std::cmp::min(base_delay, self.strategy.max_delay);

        if self.strategy.add_jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryStrategy::default())
    }
}

/// ジッターを追加（±25%のランダム変動）
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor = rng.gen_range(0.75..=1.25);
    Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn retryable(e: &TestError) -> bool {
        matches!(e, TestError::Transient)
    }

    fn fast(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryStrategy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            add_jitter: false,
        })
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let result = fast(3)
            .execute(|| async { Ok::<i32, TestError>(42) }, retryable)
            .await;

        assert!(matches!(result, RetryResult::Success(42)));
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result = fast(5)
            .execute(
                || {
                    let count = attempt_count_clone.clone();
                    async move {
                        let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                        if current < 3 {
                            Err(TestError::Transient)
                        } else {
                            Ok(42)
                        }
                    }
                },
                retryable,
            )
            .await;

        assert!(matches!(result, RetryResult::Success(42)));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result = fast(5)
            .execute(
                || {
                    let count = attempt_count_clone.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        Err::<i32, TestError>(TestError::Fatal)
                    }
                },
                retryable,
            )
            .await;

        assert!(matches!(result, RetryResult::NonRetryable(TestError::Fatal)));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_attempts_reached() {
        let result = fast(2)
            .execute(|| async { Err::<i32, TestError>(TestError::Transient) }, retryable)
            .await;

        match result {
            RetryResult::MaxAttemptsReached { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("Expected max attempts reached, got {other:?}"),
        }
    }

    #[test]
    fn test_delay_calculation() {
        // 指数バックオフのテスト（ジッターなし）
        let executor = RetryExecutor::new(RetryStrategy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            add_jitter: false,
        });

        assert_eq!(executor.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(executor.calculate_delay(2), Duration::from_millis(200));
        // 最大遅延でクランプされる
        assert_eq!(executor.calculate_delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..100 {
            let delay = add_jitter(Duration::from_millis(1000));
            assert!(delay >= Duration::from_millis(750));
            assert!(delay <= Duration::from_millis(1250));
        }
    }
}
