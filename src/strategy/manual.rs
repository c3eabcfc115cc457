//! 手动单笔操作
//!
//! 与批量模式不同：报价按重试策略重试，找不到路径直接报错，不换候选代币。

use std::fmt;

use ethers::types::H256;
use tracing::{info, instrument};

use crate::core::chain::ChainClient;
use crate::core::types::Result;
use crate::core::wallet::Wallet;
use crate::strategy::trader::Trader;
use crate::utils::coin::parse_token_amount;

/// 代币以符号指定，数量为人类可读的十进制字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualOperation {
    Swap {
        from: String,
        to: String,
        amount: String,
    },
    /// 以 `amount` ETH 与 `token` 组成流动性
    AddLiquidity { token: String, amount: String },
}

impl fmt::Display for ManualOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualOperation::Swap { from, to, amount } => write!(f, "swap {amount} {from} → {to}"),
            ManualOperation::AddLiquidity { token, amount } => {
                write!(f, "add liquidity {amount} ETH + {token}")
            }
        }
    }
}

impl ManualOperation {
    /// 执行并等待确认，返回按顺序广播的交易哈希
    #[instrument(name = "manual", skip_all, fields(wallet = %wallet.label, op = %self))]
    pub async fn execute(
        &self,
        trader: &Trader,
        client: &dyn ChainClient,
        wallet: &Wallet,
    ) -> Result<Vec<H256>> {
        let tokens = trader.tokens();
        let mut tx_hashes = Vec::new();

        let submitted = match self {
            ManualOperation::Swap { from, to, amount } => {
                let src = tokens.get(from)?;
                let dst = tokens.get(to)?;
                let amount_in = parse_token_amount(amount, src.decimals)?;
                trader
                    .submit_swap(client, wallet, src, dst, amount_in, false, &mut tx_hashes)
                    .await?
            }
            ManualOperation::AddLiquidity { token, amount } => {
                let token = tokens.get(token)?;
                let native_amount = parse_token_amount(amount, tokens.native().decimals)?;
                trader
                    .submit_add_liquidity(client, wallet, token, native_amount, &mut tx_hashes)
                    .await?
            }
        };

        trader.confirm(client, submitted).await?;
        info!(txs = tx_hashes.len(), "Manual operation confirmed");
        Ok(tx_hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::abi::ROUTER;
    use crate::core::executor::ConfirmationWaiter;
    use crate::core::fake_chain::FakeChain;
    use crate::core::types::{BotError, Token, TokenBook};
    use crate::strategy::config::AppConfig;
    use crate::utils::RetryPolicy;
    use ethers::types::{Address, U256};
    use std::sync::Arc;
    use std::time::Duration;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    struct Fixture {
        chain: FakeChain,
        wallet: Wallet,
        trader: Trader,
        weth: Address,
        gte: Address,
    }

    fn fixture() -> Fixture {
        let weth = Address::repeat_byte(0xee);
        let gte = Address::repeat_byte(0x11);
        let mut book = TokenBook::minimal(weth);
        book.insert(Token::erc20("GTE", gte, 18));

        let config = AppConfig::default();
        let trader = Trader::with_policies(
            &config,
            Arc::new(book),
            RetryPolicy::new(3, Duration::from_millis(1)),
            ConfirmationWaiter::new(Duration::from_millis(50), Duration::from_millis(5)),
        );
        let chain = FakeChain::new(config.network.chain_id, weth);
        let wallet = Wallet::new(0, KEY, config.network.chain_id, None).unwrap();
        chain.set_native_balance(wallet.address(), U256::exp10(18));

        Fixture { chain, wallet, trader, weth, gte }
    }

    fn swap(from: &str, to: &str, amount: &str) -> ManualOperation {
        ManualOperation::Swap {
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.to_string(),
        }
    }

    #[tokio::test]
    async fn test_swap_by_symbol() {
        let f = fixture();
        f.chain.set_quote(vec![f.weth, f.gte], U256::from(1000u64));

        let hashes = swap("eth", "gte", "0.01")
            .execute(&f.trader, &f.chain, &f.wallet)
            .await
            .unwrap();

        let sent = f.chain.sent();
        assert_eq!(hashes, vec![sent[0].hash]);
        assert_eq!(sent[0].value, U256::exp10(16));
    }

    #[tokio::test]
    async fn test_missing_route_is_reported_after_retries() {
        let f = fixture();
        f.chain.fail_path(vec![f.gte, f.weth]);
        f.chain.set_token_balance(f.gte, f.wallet.address(), U256::exp10(18));

        let err = swap("GTE", "ETH", "1")
            .execute(&f.trader, &f.chain, &f.wallet)
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::NoRoute { .. }));
        // 唯一的候选路径按重试策略报价3次
        assert_eq!(f.chain.quote_calls(), 3);
        assert_eq!(f.chain.send_attempts(), 0);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let f = fixture();
        let err = swap("ETH", "DOGE", "1")
            .execute(&f.trader, &f.chain, &f.wallet)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::UnknownToken(symbol) if symbol == "DOGE"));
        assert_eq!(f.chain.quote_calls(), 0);
    }

    #[tokio::test]
    async fn test_add_liquidity_approves_then_provides() {
        let f = fixture();
        f.chain.set_quote(vec![f.weth, f.gte], U256::from(500u64));
        f.chain.set_token_balance(f.gte, f.wallet.address(), U256::from(1000u64));

        let op = ManualOperation::AddLiquidity {
            token: "GTE".to_string(),
            amount: "0.002".to_string(),
        };
        let hashes = op.execute(&f.trader, &f.chain, &f.wallet).await.unwrap();

        let sent = f.chain.sent();
        assert_eq!(hashes.len(), 2);
        assert_eq!(sent[0].selector, FakeChain::approve_selector());
        let add_liquidity = ROUTER.abi().function("addLiquidityETH").unwrap().short_signature();
        assert_eq!(sent[1].selector, add_liquidity);
        assert_eq!(sent[1].value, U256::exp10(15) * 2);
    }

    #[tokio::test]
    async fn test_reverted_swap_is_an_error() {
        let f = fixture();
        f.chain.set_quote(vec![f.weth, f.gte], U256::from(1000u64));
        f.chain.revert_sender(f.wallet.address());

        let err = swap("ETH", "GTE", "0.01")
            .execute(&f.trader, &f.chain, &f.wallet)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::SubmissionRevert(_)));
    }

    #[tokio::test]
    async fn test_invalid_amount() {
        let f = fixture();
        let err = swap("ETH", "GTE", "0")
            .execute(&f.trader, &f.chain, &f.wallet)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidOperation(_)));
    }
}
