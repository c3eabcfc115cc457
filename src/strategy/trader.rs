//! 交易组合：路径解析 + 授权 + 提交 + 确认，所有提交都经过重试策略

use std::sync::Arc;

use ethers::types::{Address, H256, U256};
use tracing::{debug, info};

use crate::core::chain::ChainClient;
use crate::core::executor::{
    AllowanceManager, ConfirmationWaiter, GasPolicy, Operation, SwapKind, TransactionSubmitter,
};
use crate::core::types::{BotError, OperationClass, PreparedCall, Result, Token, TokenBook};
use crate::core::wallet::Wallet;
use crate::strategy::config::AppConfig;
use crate::strategy::route::RouteResolver;
use crate::utils::{calculate_min_amount_out, clamp_to_balance, deadline_from_now, RetryPolicy};

/// 已广播、待确认的交易
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub hash: H256,
    pub class: OperationClass,
}

pub struct Trader {
    router: Address,
    tokens: Arc<TokenBook>,
    resolver: RouteResolver,
    allowance: AllowanceManager,
    submitter: Arc<TransactionSubmitter>,
    waiter: ConfirmationWaiter,
    retry: RetryPolicy,
    swap_slippage_bps: u64,
    liquidity_slippage_bps: u64,
    deadline_secs: u64,
}

impl Trader {
    pub fn new(config: &AppConfig, tokens: Arc<TokenBook>) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        let waiter = ConfirmationWaiter::from_config(&config.confirmation);
        Self::with_policies(config, tokens, retry, waiter)
    }

    pub fn with_policies(
        config: &AppConfig,
        tokens: Arc<TokenBook>,
        retry: RetryPolicy,
        waiter: ConfirmationWaiter,
    ) -> Self {
        let router = config.network.router_address;
        let submitter = Arc::new(TransactionSubmitter::new(
            GasPolicy::from_config(&config.gas),
            config.network.chain_id,
        ));
        Self {
            router,
            resolver: RouteResolver::new(
                router,
                tokens.wrapped_native_address(),
                config.trade.route_preference,
                retry,
            ),
            allowance: AllowanceManager::new(submitter.clone(), waiter, retry),
            tokens,
            submitter,
            waiter,
            retry,
            swap_slippage_bps: config.trade.swap_slippage_bps,
            liquidity_slippage_bps: config.trade.liquidity_slippage_bps,
            deadline_secs: config.trade.deadline_secs,
        }
    }

    pub fn tokens(&self) -> &TokenBook {
        &self.tokens
    }

    pub fn gas_policy(&self) -> &GasPolicy {
        self.submitter.gas_policy()
    }

    /// 兑换 `amount_in` 数量的 `src` 为 `dst`
    ///
    /// 原生资产换包装原生资产走 `deposit()`，不经路由。
    /// 每笔广播的交易哈希（包括授权）按顺序写入 `tx_hashes`。
    pub async fn submit_swap(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        src: &Token,
        dst: &Token,
        amount_in: U256,
        mass_mode: bool,
        tx_hashes: &mut Vec<H256>,
    ) -> Result<Submitted> {
        let wrapped = self.tokens.wrapped_native_address();
        if src.is_native() && dst.address == Some(wrapped) {
            return self.submit_wrap(client, wallet, amount_in, tx_hashes).await;
        }

        let route = self
            .resolver
            .resolve(client, &self.tokens, src, dst, amount_in, mass_mode)
            .await?;
        let min_out = calculate_min_amount_out(route.amount_out, self.swap_slippage_bps);

        let kind = match (src.is_native(), dst.is_native()) {
            (true, _) => SwapKind::ExactNativeForTokens,
            (false, true) => SwapKind::ExactTokensForNative,
            (false, false) => SwapKind::ExactTokensForTokens,
        };

        if let Some(hash) = self
            .allowance
            .ensure_approved(client, wallet, src, self.router, amount_in)
            .await?
        {
            tx_hashes.push(hash);
        }

        info!(
            wallet = ?wallet.address(),
            from = %src.symbol,
            to = %dst.symbol,
            %amount_in,
            quoted = %route.amount_out,
            %min_out,
            hops = route.path.len(),
            "Submitting swap"
        );

        let call = Operation::Swap {
            kind,
            amount_in,
            min_out,
            path: route.path,
            recipient: wallet.address(),
            deadline: deadline_from_now(self.deadline_secs),
        }
        .prepare(self.router)?;

        let hash = self.submit_with_retry(client, wallet, &call, "swap").await?;
        tx_hashes.push(hash);
        Ok(Submitted {
            hash,
            class: call.class,
        })
    }

    /// 原生资产包装
    pub async fn submit_wrap(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        amount: U256,
        tx_hashes: &mut Vec<H256>,
    ) -> Result<Submitted> {
        let call = Operation::WrapNative {
            wrapped: self.tokens.wrapped_native_address(),
            amount,
        }
        .prepare(self.router)?;

        info!(wallet = ?wallet.address(), %amount, "Submitting wrap");
        let hash = self.submit_with_retry(client, wallet, &call, "wrap").await?;
        tx_hashes.push(hash);
        Ok(Submitted {
            hash,
            class: call.class,
        })
    }

    /// 原生资产转账
    pub async fn submit_transfer(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        to: Address,
        amount: U256,
        tx_hashes: &mut Vec<H256>,
    ) -> Result<Submitted> {
        let call = Operation::Transfer { to, amount }.prepare(self.router)?;

        info!(wallet = ?wallet.address(), ?to, %amount, "Submitting transfer");
        let hash = self.submit_with_retry(client, wallet, &call, "transfer").await?;
        tx_hashes.push(hash);
        Ok(Submitted {
            hash,
            class: call.class,
        })
    }

    /// 以 `native_amount` 原生资产与 `token` 组成流动性
    ///
    /// 代币数量由 `[WETH, token]` 报价得出；余额不足时收缩到余额，
    /// 但不能低于按流动性滑点计算的下限。
    pub async fn submit_add_liquidity(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        token: &Token,
        native_amount: U256,
        tx_hashes: &mut Vec<H256>,
    ) -> Result<Submitted> {
        let wrapped = self.tokens.wrapped_native_address();
        let token_address = match token.address {
            Some(address) if address != wrapped => address,
            _ => {
                return Err(BotError::InvalidOperation(format!(
                    "cannot provide liquidity for {} against the native asset",
                    token.symbol
                )))
            }
        };

        let desired = self
            .resolver
            .quote(client, native_amount, &[wrapped, token_address], false)
            .await?;

        let owner = wallet.address();
        let balance = self
            .retry
            .run("token balance", |_| client.token_balance(token_address, owner))
            .await?;
        let threshold = calculate_min_amount_out(desired, self.liquidity_slippage_bps);
        let amount_token = clamp_to_balance(desired, balance, threshold)?;

        // 代币数量被收缩时，原生资产按同比例收缩
        let native_used = if amount_token < desired {
            native_amount.saturating_mul(amount_token) / desired
        } else {
            native_amount
        };
        let amount_token_min = calculate_min_amount_out(amount_token, self.liquidity_slippage_bps);
        let amount_native_min = calculate_min_amount_out(native_used, self.liquidity_slippage_bps);

        debug!(
            token = %token.symbol,
            %desired,
            %balance,
            %amount_token,
            %amount_token_min,
            %amount_native_min,
            "Liquidity amounts"
        );

        if let Some(hash) = self
            .allowance
            .ensure_approved(client, wallet, token, self.router, amount_token)
            .await?
        {
            tx_hashes.push(hash);
        }

        info!(
            wallet = ?owner,
            token = %token.symbol,
            %amount_token,
            native_amount = %native_used,
            "Submitting add liquidity"
        );

        let call = Operation::AddLiquidity {
            token: token_address,
            amount_token_desired: amount_token,
            amount_token_min,
            amount_native_min,
            native_value: native_used,
            recipient: owner,
            deadline: deadline_from_now(self.deadline_secs),
        }
        .prepare(self.router)?;

        let hash = self.submit_with_retry(client, wallet, &call, "add liquidity").await?;
        tx_hashes.push(hash);
        Ok(Submitted {
            hash,
            class: call.class,
        })
    }

    /// 等待确认：回滚和超时都作为错误返回
    pub async fn confirm(&self, client: &dyn ChainClient, submitted: Submitted) -> Result<H256> {
        let outcome = self.waiter.wait(client, submitted.hash).await;
        let hash = outcome.into_result(submitted.class)?;
        info!(tx_hash = ?hash, class = %submitted.class, "Transaction confirmed");
        Ok(hash)
    }

    async fn submit_with_retry(
        &self,
        client: &dyn ChainClient,
        wallet: &Wallet,
        call: &PreparedCall,
        label: &str,
    ) -> Result<H256> {
        let submitter = &self.submitter;
        self.retry
            .run(label, |_| submitter.submit(client, wallet, call))
            .await
    }
}
