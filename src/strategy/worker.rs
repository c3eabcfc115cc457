//! 单个钱包的执行状态机
//!
//! `Idle → SwapToIntermediate → AwaitSwapConfirm → AddLiquidity → AwaitLiquidityConfirm
//! → SweepResidual → Done`，任意一步都可以进入 `Failed`。
//! 领水计划走 `Idle → ClaimFaucet → ForwardFunds → AwaitForwardConfirm → Done`。
//! 同一钱包的所有交易严格顺序执行，worker 从不向上抛出错误。

use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, U256};
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::common::faucet::Faucet;
use crate::core::chain::ChainClient;
use crate::core::types::{BotError, OperationClass, Result, Token};
use crate::core::wallet::Wallet;
use crate::strategy::config::{AmountRange, AppConfig};
use crate::strategy::trader::{Submitted, Trader};
use crate::types::{WalletResult, WorkerPlan};
use crate::utils::coin::{format_token_amount, get_token_balance_with_min};
use crate::utils::{ether_to_wei, random_amount_wei, sleep_or_cancel, wei_to_ether};

/// worker 的行为参数，所有钱包共享
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub swap_amount: AmountRange,
    pub liquidity_amount: AmountRange,
    pub add_liquidity: bool,
    pub sweep_residual: bool,
    /// 中间代币白名单 (大写符号)，空表示全部
    pub intermediate_tokens: Vec<String>,
    pub step_delay: Duration,
    pub candidate_delay: Duration,
    /// 领水后转出的目标
    pub forward_to: Option<Address>,
    pub forward_amount: f64,
    pub settle_delay: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            swap_amount: config.trade.swap_amount,
            liquidity_amount: config.trade.liquidity_amount,
            add_liquidity: config.trade.add_liquidity,
            sweep_residual: config.trade.sweep_residual,
            intermediate_tokens: config
                .trade
                .intermediate_tokens
                .iter()
                .map(|symbol| symbol.trim().to_uppercase())
                .collect(),
            step_delay: Duration::from_secs(config.schedule.step_delay_secs),
            candidate_delay: Duration::from_secs(config.schedule.candidate_delay_secs),
            forward_to: config.faucet.forward_to,
            forward_amount: config.faucet.forward_amount,
            settle_delay: Duration::from_secs(config.faucet.settle_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    SwapToIntermediate,
    AwaitSwapConfirm,
    AddLiquidity,
    AwaitLiquidityConfirm,
    SweepResidual,
    ClaimFaucet,
    ForwardFunds,
    AwaitForwardConfirm,
    Done,
    Failed,
}

pub struct WalletWorker {
    wallet: Wallet,
    client: Arc<dyn ChainClient>,
    trader: Arc<Trader>,
    settings: Arc<WorkerSettings>,
    cancel: CancellationToken,
    faucet: Option<Arc<dyn Faucet>>,

    state: WorkerState,
    result: WalletResult,

    swap_amount: U256,
    liquidity_amount: U256,
    candidates: Vec<Token>,
    next_candidate: usize,
    intermediate: Option<Token>,
    pending: Option<Submitted>,
    /// 不终止流程、但使结果记为失败的错误
    soft_error: Option<BotError>,
}

impl WalletWorker {
    pub fn new(
        wallet: Wallet,
        client: Arc<dyn ChainClient>,
        trader: Arc<Trader>,
        settings: Arc<WorkerSettings>,
        cancel: CancellationToken,
    ) -> Self {
        let result = WalletResult::new(&wallet);
        Self {
            wallet,
            client,
            trader,
            settings,
            cancel,
            faucet: None,
            state: WorkerState::Idle,
            result,
            swap_amount: U256::zero(),
            liquidity_amount: U256::zero(),
            candidates: Vec::new(),
            next_candidate: 0,
            intermediate: None,
            pending: None,
            soft_error: None,
        }
    }

    pub fn with_faucet(mut self, faucet: Option<Arc<dyn Faucet>>) -> Self {
        self.faucet = faucet;
        self
    }

    #[instrument(name = "worker", skip_all, fields(wallet = %self.wallet.label, address = ?self.wallet.address(), %plan))]
    pub async fn run(mut self, plan: WorkerPlan) -> WalletResult {
        info!("Worker started");

        while !matches!(self.state, WorkerState::Done | WorkerState::Failed) {
            if self.cancel.is_cancelled() {
                self.fail(BotError::Cancelled);
                break;
            }

            let current = self.state;
            match self.step(plan).await {
                Ok(next) => {
                    debug!(from = ?current, to = ?next, "State transition");
                    self.state = next;
                }
                Err(error) => self.fail(error),
            }
        }

        if self.state == WorkerState::Done {
            match self.soft_error.take() {
                Some(error) => {
                    warn!(%error, "Worker finished with errors");
                    self.result.error = Some(error.to_string());
                }
                None => {
                    info!(txs = self.result.tx_hashes.len(), "Worker finished");
                    self.result.success = true;
                }
            }
        }
        self.result
    }

    fn fail(&mut self, error: BotError) {
        warn!(state = ?self.state, %error, "Worker failed");
        self.state = WorkerState::Failed;
        self.result.success = false;
        self.result.error = Some(error.to_string());
    }

    async fn step(&mut self, plan: WorkerPlan) -> Result<WorkerState> {
        match self.state {
            WorkerState::Idle => match plan {
                WorkerPlan::SweepOnly => Ok(WorkerState::SweepResidual),
                WorkerPlan::SwapAndProvide => self.prepare().await,
                WorkerPlan::FaucetClaim => Ok(WorkerState::ClaimFaucet),
            },
            WorkerState::SwapToIntermediate => self.swap_to_intermediate().await,
            WorkerState::AwaitSwapConfirm => self.await_swap_confirm().await,
            WorkerState::AddLiquidity => self.add_liquidity().await,
            WorkerState::AwaitLiquidityConfirm => self.await_liquidity_confirm().await,
            WorkerState::SweepResidual => {
                self.sweep_residual().await?;
                Ok(WorkerState::Done)
            }
            WorkerState::ClaimFaucet => self.claim_faucet().await,
            WorkerState::ForwardFunds => self.forward_funds().await,
            WorkerState::AwaitForwardConfirm => {
                let submitted = self.take_pending()?;
                self.trader.confirm(self.client.as_ref(), submitted).await?;
                Ok(WorkerState::Done)
            }
            WorkerState::Done | WorkerState::Failed => Ok(self.state),
        }
    }

    /// 随机数量 + 余额预检 + 候选代币
    async fn prepare(&mut self) -> Result<WorkerState> {
        self.swap_amount =
            random_amount_wei(self.settings.swap_amount.min, self.settings.swap_amount.max)?;
        self.liquidity_amount = if self.settings.add_liquidity {
            random_amount_wei(
                self.settings.liquidity_amount.min,
                self.settings.liquidity_amount.max,
            )?
        } else {
            U256::zero()
        };

        let gas_reserve = self
            .trader
            .gas_policy()
            .max_fee(OperationClass::Swap)
            .saturating_mul(U256::from(2u64));
        let required = self
            .swap_amount
            .saturating_add(self.liquidity_amount)
            .saturating_add(gas_reserve);

        let owner = self.wallet.address();
        let available = self.client.native_balance(owner).await?;
        info!(
            balance = %wei_to_ether(available),
            swap = %wei_to_ether(self.swap_amount),
            liquidity = %wei_to_ether(self.liquidity_amount),
            "Preflight"
        );
        if available < required {
            return Err(BotError::InsufficientBalance {
                required,
                available,
            });
        }

        self.candidates = self.shuffled_candidates();
        if self.candidates.is_empty() {
            return Err(BotError::InvalidOperation(
                "no intermediate token available".to_string(),
            ));
        }
        Ok(WorkerState::SwapToIntermediate)
    }

    fn shuffled_candidates(&self) -> Vec<Token> {
        let allow = &self.settings.intermediate_tokens;
        let mut candidates: Vec<Token> = self
            .trader
            .tokens()
            .tradeable()
            .into_iter()
            .filter(|token| allow.is_empty() || allow.contains(&token.symbol))
            .cloned()
            .collect();
        candidates.shuffle(&mut rand::thread_rng());
        candidates
    }

    async fn swap_to_intermediate(&mut self) -> Result<WorkerState> {
        let Some(candidate) = self.candidates.get(self.next_candidate).cloned() else {
            return Err(self.soft_error.take().unwrap_or_else(|| {
                BotError::InvalidOperation("no intermediate token available".to_string())
            }));
        };
        self.next_candidate += 1;

        let native = self.trader.tokens().native().clone();
        info!(token = %candidate.symbol, amount = %wei_to_ether(self.swap_amount), "Swapping into intermediate token");

        let submitted = self
            .trader
            .submit_swap(
                self.client.as_ref(),
                &self.wallet,
                &native,
                &candidate,
                self.swap_amount,
                true,
                &mut self.result.tx_hashes,
            )
            .await;

        match submitted {
            Ok(submitted) => {
                self.pending = Some(submitted);
                self.intermediate = Some(candidate);
                Ok(WorkerState::AwaitSwapConfirm)
            }
            Err(error) => self.next_candidate_after(&candidate, error).await,
        }
    }

    async fn await_swap_confirm(&mut self) -> Result<WorkerState> {
        let submitted = self.take_pending()?;
        match self.trader.confirm(self.client.as_ref(), submitted).await {
            Ok(_) => {
                // 之前候选的失败不影响结果
                self.soft_error = None;
                if self.settings.add_liquidity {
                    if !sleep_or_cancel(self.settings.step_delay, &self.cancel).await {
                        return Err(BotError::Cancelled);
                    }
                    Ok(WorkerState::AddLiquidity)
                } else {
                    Ok(self.after_liquidity())
                }
            }
            Err(error) => {
                let candidate = self.intermediate.take().unwrap_or_else(Token::native);
                self.next_candidate_after(&candidate, error).await
            }
        }
    }

    /// 当前候选失败：余额不足或取消直接终止，否则等待后尝试下一个
    async fn next_candidate_after(&mut self, candidate: &Token, error: BotError) -> Result<WorkerState> {
        if matches!(error, BotError::InsufficientBalance { .. } | BotError::Cancelled) {
            return Err(error);
        }
        warn!(token = %candidate.symbol, %error, "Swap candidate failed");

        if self.next_candidate >= self.candidates.len() {
            return Err(error);
        }
        self.soft_error = Some(error);
        if !sleep_or_cancel(self.settings.candidate_delay, &self.cancel).await {
            return Err(BotError::Cancelled);
        }
        Ok(WorkerState::SwapToIntermediate)
    }

    async fn add_liquidity(&mut self) -> Result<WorkerState> {
        let token = self
            .intermediate
            .clone()
            .ok_or_else(|| BotError::InvalidOperation("no intermediate token".to_string()))?;

        let submitted = self
            .trader
            .submit_add_liquidity(
                self.client.as_ref(),
                &self.wallet,
                &token,
                self.liquidity_amount,
                &mut self.result.tx_hashes,
            )
            .await;

        match submitted {
            Ok(submitted) => {
                self.pending = Some(submitted);
                Ok(WorkerState::AwaitLiquidityConfirm)
            }
            Err(BotError::Cancelled) => Err(BotError::Cancelled),
            Err(error) => {
                warn!(token = %token.symbol, %error, "Add liquidity failed");
                self.soft_error = Some(error);
                Ok(self.after_liquidity())
            }
        }
    }

    async fn await_liquidity_confirm(&mut self) -> Result<WorkerState> {
        let submitted = self.take_pending()?;
        if let Err(error) = self.trader.confirm(self.client.as_ref(), submitted).await {
            warn!(%error, "Add liquidity not confirmed");
            self.soft_error = Some(error);
        }
        Ok(self.after_liquidity())
    }

    fn after_liquidity(&self) -> WorkerState {
        if self.settings.sweep_residual {
            WorkerState::SweepResidual
        } else {
            WorkerState::Done
        }
    }

    fn take_pending(&mut self) -> Result<Submitted> {
        self.pending
            .take()
            .ok_or_else(|| BotError::InvalidOperation("no pending transaction".to_string()))
    }

    async fn claim_faucet(&mut self) -> Result<WorkerState> {
        let faucet = self
            .faucet
            .clone()
            .ok_or_else(|| BotError::InvalidOperation("faucet not configured".to_string()))?;
        let receipt = faucet.claim(&self.wallet).await?;
        info!(claim_tx = ?receipt.tx_hash, "Faucet claimed");

        if self.settings.forward_to.is_none() {
            return Ok(WorkerState::Done);
        }
        // 等待领水交易上链
        if !sleep_or_cancel(self.settings.settle_delay, &self.cancel).await {
            return Err(BotError::Cancelled);
        }
        let balance = self.client.native_balance(self.wallet.address()).await?;
        info!(balance = %wei_to_ether(balance), "Balance after claim");
        Ok(WorkerState::ForwardFunds)
    }

    async fn forward_funds(&mut self) -> Result<WorkerState> {
        let Some(to) = self.settings.forward_to else {
            return Ok(WorkerState::Done);
        };
        if to == self.wallet.address() {
            info!("Wallet is the forward target, nothing to send");
            return Ok(WorkerState::Done);
        }

        let amount = ether_to_wei(self.settings.forward_amount)?;
        let submitted = self
            .trader
            .submit_transfer(
                self.client.as_ref(),
                &self.wallet,
                to,
                amount,
                &mut self.result.tx_hashes,
            )
            .await?;
        self.pending = Some(submitted);
        Ok(WorkerState::AwaitForwardConfirm)
    }

    /// 把所有非零余额的代币换回原生资产，单个代币的失败只记录日志
    async fn sweep_residual(&mut self) -> Result<()> {
        let owner = self.wallet.address();
        let native = self.trader.tokens().native().clone();
        let tokens: Vec<Token> = self.trader.tokens().tradeable().into_iter().cloned().collect();

        for token in tokens {
            if self.cancel.is_cancelled() {
                return Err(BotError::Cancelled);
            }
            let balance =
                match get_token_balance_with_min(self.client.as_ref(), &token, owner, U256::one()).await {
                    Ok(Some(balance)) => balance,
                    Ok(None) => continue,
                    Err(error) => {
                        warn!(token = %token.symbol, %error, "Balance read failed, skipping");
                        continue;
                    }
                };

            info!(
                amount = %format_token_amount(balance, token.decimals, &token.symbol),
                "Sweeping back to native"
            );
            let submitted = self
                .trader
                .submit_swap(
                    self.client.as_ref(),
                    &self.wallet,
                    &token,
                    &native,
                    balance,
                    true,
                    &mut self.result.tx_hashes,
                )
                .await;
            let confirmed = match submitted {
                Ok(submitted) => self.trader.confirm(self.client.as_ref(), submitted).await,
                Err(error) => Err(error),
            };
            if let Err(error) = confirmed {
                warn!(token = %token.symbol, %error, "Sweep failed, skipping");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::faucet::{ClaimReceipt, MockFaucet};
    use crate::core::abi::ROUTER;
    use crate::core::executor::ConfirmationWaiter;
    use crate::core::fake_chain::FakeChain;
    use crate::core::types::TokenBook;
    use crate::utils::RetryPolicy;
    use ethers::types::H256;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    struct Fixture {
        chain: Arc<FakeChain>,
        wallet: Wallet,
        trader: Arc<Trader>,
        weth: Address,
        gte: Address,
        usdc: Address,
    }

    fn fixture() -> Fixture {
        let weth = Address::repeat_byte(0xee);
        let gte = Address::repeat_byte(0x11);
        let usdc = Address::repeat_byte(0x22);
        let mut book = TokenBook::minimal(weth);
        book.insert(Token::erc20("GTE", gte, 18));
        book.insert(Token::erc20("USDC", usdc, 6));

        let config = AppConfig::default();
        let trader = Trader::with_policies(
            &config,
            Arc::new(book),
            RetryPolicy::new(2, Duration::from_millis(1)),
            ConfirmationWaiter::new(Duration::from_millis(50), Duration::from_millis(5)),
        );
        let chain = Arc::new(FakeChain::new(config.network.chain_id, weth));
        let wallet = Wallet::new(0, KEY, config.network.chain_id, None).unwrap();
        chain.set_native_balance(wallet.address(), U256::exp10(18));

        Fixture {
            chain,
            wallet,
            trader: Arc::new(trader),
            weth,
            gte,
            usdc,
        }
    }

    fn settings(allow: &[&str]) -> WorkerSettings {
        WorkerSettings {
            swap_amount: AmountRange::new(0.001, 0.001),
            liquidity_amount: AmountRange::new(0.002, 0.002),
            add_liquidity: true,
            sweep_residual: true,
            intermediate_tokens: allow.iter().map(|s| s.to_string()).collect(),
            step_delay: Duration::from_millis(1),
            candidate_delay: Duration::from_millis(1),
            forward_to: None,
            forward_amount: 0.00499,
            settle_delay: Duration::from_millis(1),
        }
    }

    fn worker(f: &Fixture, settings: WorkerSettings, cancel: CancellationToken) -> WalletWorker {
        WalletWorker::new(
            f.wallet.clone(),
            f.chain.clone(),
            f.trader.clone(),
            Arc::new(settings),
            cancel,
        )
    }

    #[tokio::test]
    async fn test_full_cycle_uses_consecutive_nonces() {
        let f = fixture();
        f.chain.set_quote(vec![f.weth, f.gte], U256::from(1000u64));
        f.chain.set_quote(vec![f.gte, f.weth], U256::from(10u64));
        f.chain.set_token_balance(f.gte, f.wallet.address(), U256::from(1000u64));

        let result = worker(&f, settings(&["GTE"]), CancellationToken::new())
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(result.success, "{:?}", result.error);
        // swap, approve, add liquidity, sweep swap
        let sent = f.chain.sent_by(f.wallet.address());
        assert_eq!(sent.len(), 4);
        for (i, tx) in sent.iter().enumerate() {
            assert_eq!(tx.nonce, U256::from(i));
        }
        assert_eq!(
            result.tx_hashes,
            sent.iter().map(|tx| tx.hash).collect::<Vec<_>>()
        );

        let add_liquidity = ROUTER.abi().function("addLiquidityETH").unwrap().short_signature();
        assert_eq!(sent[1].selector, FakeChain::approve_selector());
        assert_eq!(sent[2].selector, add_liquidity);
        assert_eq!(sent[2].value, U256::exp10(15) * 2);
    }

    #[tokio::test]
    async fn test_confirmation_timeout_fails_without_further_steps() {
        let f = fixture();
        f.chain.set_quote(vec![f.weth, f.gte], U256::from(1000u64));
        f.chain.set_quote(vec![f.gte, f.weth], U256::from(10u64));
        f.chain.set_token_balance(f.gte, f.wallet.address(), U256::from(1000u64));
        f.chain.withhold_receipts();

        let result = worker(&f, settings(&["GTE"]), CancellationToken::new())
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Confirmation timed out"));
        // 只有兑换被广播，没有添加流动性或清扫
        let sent = f.chain.sent_by(f.wallet.address());
        assert_eq!(sent.len(), 1);
        assert_eq!(result.tx_hashes, vec![sent[0].hash]);
        let swap = ROUTER.abi().function("swapExactETHForTokens").unwrap().short_signature();
        assert_eq!(sent[0].selector, swap);
    }

    #[tokio::test]
    async fn test_preflight_failure_broadcasts_nothing() {
        let f = fixture();
        f.chain.set_native_balance(f.wallet.address(), U256::exp10(15));

        let result = worker(&f, settings(&[]), CancellationToken::new())
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Insufficient balance"));
        assert_eq!(f.chain.send_attempts(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_candidate() {
        let f = fixture();
        // 只有一个候选有报价，无论打乱后的顺序如何都应成功
        f.chain.fail_path(vec![f.weth, f.gte]);
        f.chain.set_quote(vec![f.weth, f.usdc], U256::from(500u64));

        let mut settings = settings(&[]);
        settings.add_liquidity = false;
        settings.sweep_residual = false;
        let result = worker(&f, settings, CancellationToken::new())
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.tx_hashes.len(), 1);
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let f = fixture();
        f.chain.fail_path(vec![f.weth, f.gte]);
        f.chain.fail_path(vec![f.weth, f.usdc]);

        let result = worker(&f, settings(&[]), CancellationToken::new())
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("No route"));
        assert!(f.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_liquidity_failure_still_sweeps() {
        let f = fixture();
        f.chain.set_quote(vec![f.weth, f.gte], U256::from(1000u64));
        f.chain.set_quote(vec![f.gte, f.weth], U256::from(10u64));
        // 余额低于流动性下限
        f.chain.set_token_balance(f.gte, f.wallet.address(), U256::from(10u64));

        let result = worker(&f, settings(&["GTE"]), CancellationToken::new())
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Insufficient balance"));
        // swap + sweep (approve + swap back)
        assert_eq!(result.tx_hashes.len(), 3);
    }

    #[tokio::test]
    async fn test_sweep_only_skips_empty_and_failing_tokens() {
        let f = fixture();
        f.chain.set_token_balance(f.gte, f.wallet.address(), U256::from(50u64));
        f.chain.set_quote(vec![f.gte, f.weth], U256::from(5u64));
        f.chain.set_token_balance(f.usdc, f.wallet.address(), U256::from(70u64));
        f.chain.fail_path(vec![f.usdc, f.weth]);

        let result = worker(&f, settings(&[]), CancellationToken::new())
            .run(WorkerPlan::SweepOnly)
            .await;

        assert!(result.success, "{:?}", result.error);
        let sent = f.chain.sent_by(f.wallet.address());
        // GTE: approve + swap；USDC 无路径被跳过
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].selector, FakeChain::approve_selector());
        assert_eq!(sent[0].to, Some(f.gte));
    }

    #[tokio::test]
    async fn test_cancelled_worker_does_nothing() {
        let f = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = worker(&f, settings(&[]), cancel)
            .run(WorkerPlan::SwapAndProvide)
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Cancelled"));
        assert_eq!(f.chain.quote_calls(), 0);
    }

    fn faucet_ok(times: usize) -> MockFaucet {
        let mut faucet = MockFaucet::new();
        faucet
            .expect_claim()
            .times(times)
            .returning(|_| Ok(ClaimReceipt { tx_hash: Some(H256::repeat_byte(0xfa)) }));
        faucet
    }

    #[tokio::test]
    async fn test_faucet_claim_forwards_to_master() {
        let f = fixture();
        let master = Address::repeat_byte(0x77);
        let mut settings = settings(&[]);
        settings.forward_to = Some(master);

        let result = worker(&f, settings, CancellationToken::new())
            .with_faucet(Some(Arc::new(faucet_ok(1))))
            .run(WorkerPlan::FaucetClaim)
            .await;

        assert!(result.success, "{:?}", result.error);
        let sent = f.chain.sent_by(f.wallet.address());
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, Some(master));
        assert_eq!(sent[0].value, U256::from(4_990_000_000_000_000u64));
        assert_eq!(sent[0].gas, U256::from(21_000u64));
        assert!(sent[0].input.is_empty());
        // 领水方的交易不计入
        assert_eq!(result.tx_hashes, vec![sent[0].hash]);
    }

    #[tokio::test]
    async fn test_faucet_claim_without_forward_target() {
        let f = fixture();
        let result = worker(&f, settings(&[]), CancellationToken::new())
            .with_faucet(Some(Arc::new(faucet_ok(1))))
            .run(WorkerPlan::FaucetClaim)
            .await;

        assert!(result.success, "{:?}", result.error);
        assert!(result.tx_hashes.is_empty());
        assert_eq!(f.chain.send_attempts(), 0);
    }

    #[tokio::test]
    async fn test_forward_target_itself_sends_nothing() {
        let f = fixture();
        let mut settings = settings(&[]);
        settings.forward_to = Some(f.wallet.address());

        let result = worker(&f, settings, CancellationToken::new())
            .with_faucet(Some(Arc::new(faucet_ok(1))))
            .run(WorkerPlan::FaucetClaim)
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(f.chain.send_attempts(), 0);
    }

    #[tokio::test]
    async fn test_rejected_claim_fails_without_transfer() {
        let f = fixture();
        let mut faucet = MockFaucet::new();
        faucet
            .expect_claim()
            .returning(|_| Err(BotError::Faucet("already claimed today".into())));
        let mut settings = settings(&[]);
        settings.forward_to = Some(Address::repeat_byte(0x77));

        let result = worker(&f, settings, CancellationToken::new())
            .with_faucet(Some(Arc::new(faucet)))
            .run(WorkerPlan::FaucetClaim)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("already claimed today"));
        assert_eq!(f.chain.send_attempts(), 0);
    }

    #[tokio::test]
    async fn test_faucet_plan_without_faucet_fails() {
        let f = fixture();
        let result = worker(&f, settings(&[]), CancellationToken::new())
            .run(WorkerPlan::FaucetClaim)
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("faucet not configured"));
    }

    #[test]
    fn test_settings_normalise_allow_list() {
        let mut config = AppConfig::default();
        config.trade.intermediate_tokens = vec![" gte ".to_string()];
        let settings = WorkerSettings::from_config(&config);
        assert_eq!(settings.intermediate_tokens, vec!["GTE".to_string()]);
        assert_eq!(settings.step_delay, Duration::from_secs(5));
    }
}
