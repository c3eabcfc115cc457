//! 交易提交器
//!
//! 获取nonce → 余额预检 → 签名 → 广播。nonce每次即时获取，从不缓存。

use ethers::types::H256;
use tracing::{debug, info};

use crate::core::chain::ChainClient;
use crate::core::types::{BotError, PendingTransaction, PreparedCall, Result};
use crate::core::wallet::Wallet;

use super::operation::GasPolicy;

pub struct TransactionSubmitter {
    gas: GasPolicy,
    chain_id: u64,
}

impl TransactionSubmitter {
    pub fn new(gas: GasPolicy, chain_id: u64) -> Self {
        Self { gas, chain_id }
    }

    pub fn gas_policy(&self) -> &GasPolicy {
        &self.gas
    }

    /// 构建、签名并广播，返回交易哈希
    pub async fn submit(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        call: &PreparedCall,
    ) -> Result<H256> {
        let from = wallet.address();
        let nonce = client.nonce(from).await?;
        let pending = PendingTransaction {
            from,
            to: call.to,
            nonce,
            gas_limit: self.gas.gas_limit(call.class),
            gas_price: self.gas.gas_price,
            value: call.value,
            data: call.data.clone(),
        };

        let required = pending.max_cost();
        let balance = client.native_balance(from).await?;
        if balance < required {
            return Err(BotError::InsufficientBalance {
                required,
                available: balance,
            });
        }

        let typed = pending.to_typed(self.chain_id);
        let signature = wallet
            .signer()
            .sign_transaction_sync(&typed)
            .map_err(|e| BotError::Sign(e.to_string()))?;
        let raw = typed.rlp_signed(&signature);

        debug!(wallet = ?from, %nonce, class = %call.class, "Broadcasting transaction");
        let tx_hash = client.send_raw_transaction(raw).await?;
        info!(wallet = ?from, tx_hash = ?tx_hash, %nonce, class = %call.class, "Transaction sent");

        Ok(tx_hash)
    }
}
