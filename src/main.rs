mod bot;
mod common;
mod core;
mod strategy;
mod types;
mod utils;

use clap::Parser;
use eyre::Result;

#[derive(clap::Parser)]
#[command(version, about = "Multi-wallet swap and liquidity bot")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Swap into a token and provide liquidity with every selected wallet
    StartBot(bot::start_bot::Args),
    /// Swap every token balance back to the native asset
    Sweep(bot::start_bot::Args),
    /// Claim the testnet faucet with every selected wallet and forward the funds
    Faucet(bot::start_bot::Args),
    /// Swap a fixed amount between two tokens
    Swap(bot::manual::SwapArgs),
    /// Provide ETH liquidity for one token
    AddLiquidity(bot::manual::LiquidityArgs),
    /// Print native balances of the selected wallets
    Balances(bot::start_bot::Args),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::StartBot(args) => bot::start_bot::run(args).await,
        Command::Sweep(args) => bot::start_bot::sweep(args).await,
        Command::Faucet(args) => bot::start_bot::faucet(args).await,
        Command::Swap(args) => bot::manual::swap(args).await,
        Command::AddLiquidity(args) => bot::manual::add_liquidity(args).await,
        Command::Balances(args) => bot::start_bot::balances(args).await,
    }
}
