//! 交易确认等待

use std::time::Duration;

use ethers::types::H256;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::core::chain::ChainClient;
use crate::core::types::TransactionOutcome;
use crate::strategy::config::ConfirmationConfig;

/// 轮询交易回执直到超时
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationWaiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(config: &ConfirmationConfig) -> Self {
        Self::new(
            Duration::from_secs(config.timeout_secs),
            Duration::from_millis(config.poll_interval_ms),
        )
    }

    /// 回执 status 1 为确认，0 为回滚；超时返回无回执的结果。
    /// 轮询中的RPC错误只记录日志，不中断等待。
    pub async fn wait(&self, client: &dyn ChainClient, hash: H256) -> TransactionOutcome {
        let deadline = Instant::now() + self.timeout;
        loop {
            match client.transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    let outcome = TransactionOutcome::from_receipt(receipt);
                    debug!(tx_hash = ?hash, confirmed = outcome.confirmed, "Receipt received");
                    return outcome;
                }
                Ok(None) => {}
                Err(error) => warn!(tx_hash = ?hash, %error, "Receipt lookup failed"),
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(tx_hash = ?hash, timeout = ?self.timeout, "Transaction not confirmed in time");
                return TransactionOutcome::timed_out(hash);
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

impl Default for ConfirmationWaiter {
    fn default() -> Self {
        Self::from_config(&ConfirmationConfig::default())
    }
}
