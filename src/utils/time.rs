//! 时间工具

use std::time::Duration;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use tokio_util::sync::CancellationToken;

/// 获取当前UTC时间戳（秒）
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// 交易截止时间：当前时间 + `secs`
pub fn deadline_from_now(secs: u64) -> U256 {
    U256::from(current_timestamp() + secs)
}

/// 可读的时间字符串
pub fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// 可被取消的等待，返回 `false` 表示被取消
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// 长时间等待，按 `increment` 分片，每片检查一次取消信号
///
/// 返回 `false` 表示等待被取消。
pub async fn wait_in_increments(
    total: Duration,
    increment: Duration,
    cancel: &CancellationToken,
) -> bool {
    let increment = if increment.is_zero() {
        Duration::from_secs(1)
    } else {
        increment
    };

    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = remaining.min(increment);
        if !sleep_or_cancel(slice, cancel).await {
            return false;
        }
        remaining = remaining.saturating_sub(slice);
    }
    !cancel.is_cancelled()
}
