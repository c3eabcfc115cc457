//! 固定间隔的有限重试

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::core::types::Result;
use crate::strategy::config::RetryConfig;

/// 重试策略：最多 `max_attempts` 次，每次失败后等待 `delay`
///
/// 只重试 `BotError::is_transient` 的错误，其余错误立即返回。
/// 次数用尽后原样返回最后一次的错误。
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// 不重试
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.delay_secs))
    }

    pub async fn run<F, Fut, T>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        %label,
                        attempt,
                        max_attempts = self.max_attempts,
                        %error,
                        "Attempt failed, retrying in {:?}",
                        self.delay
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
