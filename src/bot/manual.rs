use std::{sync::Arc, time::Duration};

use clap::Parser;
use eyre::{bail, Result};
use tracing::{error, info};

use super::start_bot::{self, load_tokens, startup};
use crate::{
    core::chain::{ChainClientFactory, EthersClientFactory},
    strategy::{manual::ManualOperation, trader::Trader},
};

#[derive(Clone, Debug, Parser)]
pub struct SwapArgs {
    #[command(flatten)]
    pub common: start_bot::Args,

    /// Source token symbol, e.g. `ETH`
    #[arg(long)]
    pub from: String,

    /// Destination token symbol
    #[arg(long)]
    pub to: String,

    /// Amount of the source token, e.g. `0.01`
    #[arg(long)]
    pub amount: String,
}

impl SwapArgs {
    fn operation(&self) -> ManualOperation {
        ManualOperation::Swap {
            from: self.from.clone(),
            to: self.to.clone(),
            amount: self.amount.clone(),
        }
    }
}

#[derive(Clone, Debug, Parser)]
pub struct LiquidityArgs {
    #[command(flatten)]
    pub common: start_bot::Args,

    /// Token paired with ETH
    #[arg(long)]
    pub token: String,

    /// ETH amount to provide
    #[arg(long)]
    pub amount: String,
}

impl LiquidityArgs {
    fn operation(&self) -> ManualOperation {
        ManualOperation::AddLiquidity {
            token: self.token.clone(),
            amount: self.amount.clone(),
        }
    }
}

pub async fn swap(args: SwapArgs) -> Result<()> {
    let operation = args.operation();
    run_manual(args.common, operation).await
}

pub async fn add_liquidity(args: LiquidityArgs) -> Result<()> {
    let operation = args.operation();
    run_manual(args.common, operation).await
}

/// 逐个钱包执行；任何钱包失败都以错误退出
async fn run_manual(args: start_bot::Args, operation: ManualOperation) -> Result<()> {
    let startup = startup(&args).await?;
    let tokens = Arc::new(load_tokens(&startup).await?);
    let config = &startup.config;
    let trader = Trader::new(config, tokens);
    let factory = EthersClientFactory::new(
        config.network.rpc_url.clone(),
        Duration::from_secs(config.network.request_timeout_secs),
    );

    let mut failed = 0;
    for wallet in &startup.wallets {
        let outcome = match factory.connect(wallet.proxy.as_ref()) {
            Ok(client) => operation.execute(&trader, client.as_ref(), wallet).await,
            Err(error) => Err(error),
        };
        match outcome {
            Ok(tx_hashes) => info!(wallet = %wallet.label, ?tx_hashes, "Operation succeeded"),
            Err(error) => {
                error!(wallet = %wallet.label, %error, "Operation failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{operation} failed for {failed} of {} wallets", startup.wallets.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_args() {
        let args = SwapArgs::parse_from([
            "swap", "--from", "eth", "--to", "GTE", "--amount", "0.01", "--wallet", "1",
        ]);
        assert_eq!(args.common.wallet.as_deref(), Some("1"));
        assert_eq!(
            args.operation(),
            ManualOperation::Swap {
                from: "eth".to_string(),
                to: "GTE".to_string(),
                amount: "0.01".to_string(),
            }
        );
        assert!(SwapArgs::try_parse_from(["swap", "--from", "ETH", "--to", "GTE"]).is_err());
    }

    #[test]
    fn test_liquidity_args() {
        let args = LiquidityArgs::parse_from(["add-liquidity", "--token", "GTE", "--amount", "0.002"]);
        assert_eq!(args.common.config, "config.toml");
        assert_eq!(args.operation().to_string(), "add liquidity 0.002 ETH + GTE");
    }
}
