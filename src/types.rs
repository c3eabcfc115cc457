use std::fmt;

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::wallet::Wallet;

/// worker 执行计划
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerPlan {
    /// 兑换 → 确认 → 添加流动性 → 确认 → (可选) 清扫
    SwapAndProvide,
    /// 只把所有代币换回原生资产
    SweepOnly,
    /// 领水 → (可选) 转出到主钱包
    FaucetClaim,
}

impl fmt::Display for WorkerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerPlan::SwapAndProvide => write!(f, "swap-and-provide"),
            WorkerPlan::SweepOnly => write!(f, "sweep-only"),
            WorkerPlan::FaucetClaim => write!(f, "faucet-claim"),
        }
    }
}

/// 单个钱包一个周期的结果。只由该钱包的 worker 修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletResult {
    pub index: usize,
    pub label: String,
    pub address: Address,
    pub success: bool,
    pub error: Option<String>,
    /// 按广播顺序
    pub tx_hashes: Vec<H256>,
}

impl WalletResult {
    pub fn new(wallet: &Wallet) -> Self {
        Self {
            index: wallet.index,
            label: wallet.label.clone(),
            address: wallet.address(),
            success: false,
            error: None,
            tx_hashes: Vec::new(),
        }
    }

    pub fn failed(wallet: &Wallet, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(wallet)
        }
    }
}

/// 一个周期的汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub cycle_number: u64,
    pub plan: WorkerPlan,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 按钱包序号排序
    pub wallets: Vec<WalletResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub tx_count: usize,
}

impl CycleSummary {
    pub fn new(
        cycle_id: Uuid,
        cycle_number: u64,
        plan: WorkerPlan,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        mut wallets: Vec<WalletResult>,
    ) -> Self {
        wallets.sort_by_key(|result| result.index);
        let succeeded = wallets.iter().filter(|result| result.success).count();
        let tx_count = wallets.iter().map(|result| result.tx_hashes.len()).sum();
        Self {
            cycle_id,
            cycle_number,
            plan,
            started_at,
            finished_at,
            failed: wallets.len() - succeeded,
            succeeded,
            tx_count,
            wallets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_summary_totals_and_order() {
        let wallet = Wallet::new(0, KEY, 1, None).unwrap();
        let mut second = WalletResult::new(&wallet);
        second.index = 1;
        second.success = true;
        second.tx_hashes = vec![H256::repeat_byte(1), H256::repeat_byte(2)];
        let first = WalletResult::failed(&wallet, "boom");

        let now = Utc::now();
        let summary = CycleSummary::new(
            Uuid::new_v4(),
            1,
            WorkerPlan::SwapAndProvide,
            now,
            now,
            vec![second, first],
        );

        assert_eq!(summary.wallets[0].index, 0);
        assert_eq!(summary.wallets[0].error.as_deref(), Some("boom"));
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.tx_count, 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["plan"], "SwapAndProvide");
        assert_eq!(json["wallets"].as_array().unwrap().len(), 2);
    }
}
