//! 授权管理
//!
//! 授权不足时发送一次最大额度授权并等待确认。同一钱包的操作顺序执行，
//! 因此同一 (钱包, 代币) 不会同时存在两笔授权交易。

use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use tracing::info;

use crate::core::chain::ChainClient;
use crate::core::types::{OperationClass, Result, Token};
use crate::core::wallet::Wallet;
use crate::utils::RetryPolicy;

use super::confirmation::ConfirmationWaiter;
use super::operation::Operation;
use super::submitter::TransactionSubmitter;

pub struct AllowanceManager {
    submitter: Arc<TransactionSubmitter>,
    waiter: ConfirmationWaiter,
    retry: RetryPolicy,
}

impl AllowanceManager {
    pub fn new(submitter: Arc<TransactionSubmitter>, waiter: ConfirmationWaiter, retry: RetryPolicy) -> Self {
        Self {
            submitter,
            waiter,
            retry,
        }
    }

    /// 确保 `spender` 可以动用 `amount` 数量的 `token`
    ///
    /// 返回 `Ok(None)` 表示无需授权（原生资产或额度已足够），
    /// `Ok(Some(hash))` 表示授权交易已确认。gas不足返回 `InsufficientBalance`，
    /// 授权回滚返回 `ApprovalFailure`。
    pub async fn ensure_approved(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        token: &Token,
        spender: Address,
        amount: U256,
    ) -> Result<Option<H256>> {
        let Some(token_address) = token.address else {
            return Ok(None);
        };

        let owner = wallet.address();
        let current = self
            .retry
            .run("allowance", |_| client.allowance(token_address, owner, spender))
            .await?;
        if current >= amount {
            return Ok(None);
        }

        info!(wallet = ?owner, token = %token.symbol, %current, %amount, "Approving token");
        let call = Operation::Approve {
            token: token_address,
            spender,
        }
        .prepare(spender)?;
        let call = &call;
        let submitter = &self.submitter;

        let tx_hash = self
            .retry
            .run("approve", |_| submitter.submit(client, wallet, call))
            .await?;

        let outcome = self.waiter.wait(client, tx_hash).await;
        outcome.into_result(OperationClass::Approval).map(Some)
    }
}
