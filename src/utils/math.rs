//! 数值计算工具

use ethers::types::U256;
use ethers::utils::{format_ether, parse_ether};
use rand::Rng;

use crate::core::types::{BotError, Result};

const BPS_DENOMINATOR: u64 = 10_000;

/// 计算滑点后的最小接收量，向下取整
///
/// # 参数
/// * `amount` - 报价数量
/// * `slippage_bps` - 滑点（基点，例如 1100 = 11%）
pub fn calculate_min_amount_out(amount: U256, slippage_bps: u64) -> U256 {
    if slippage_bps >= BPS_DENOMINATOR {
        return U256::zero();
    }

    let multiplier = U256::from(BPS_DENOMINATOR - slippage_bps);
    amount.saturating_mul(multiplier) / U256::from(BPS_DENOMINATOR)
}

/// 按实际余额收缩数量
///
/// 余额充足时使用期望值；余额不足但不低于下限时使用全部余额；
/// 低于下限则返回 `InsufficientBalance`。
pub fn clamp_to_balance(desired: U256, balance: U256, minimum: U256) -> Result<U256> {
    if balance >= desired {
        Ok(desired)
    } else if balance >= minimum {
        Ok(balance)
    } else {
        Err(BotError::InsufficientBalance {
            required: minimum,
            available: balance,
        })
    }
}

/// 在 `[min, max]` 区间内随机取值（以ether为单位），保留6位小数后转换为wei
pub fn random_amount_wei(min: f64, max: f64) -> Result<U256> {
    let value = if max > min {
        rand::thread_rng().gen_range(min..=max)
    } else {
        min
    };
    ether_to_wei(value)
}

/// 将Ether转换为Wei，保留6位小数
pub fn ether_to_wei(ether: f64) -> Result<U256> {
    if !ether.is_finite() || ether < 0.0 {
        return Err(BotError::InvalidOperation(format!("invalid amount: {ether}")));
    }
    parse_ether(format!("{ether:.6}"))
        .map_err(|e| BotError::InvalidOperation(format!("invalid amount {ether}: {e}")))
}

/// 将Wei转换为Ether字符串（用于显示）
pub fn wei_to_ether(wei: U256) -> String {
    format_ether(wei)
}
