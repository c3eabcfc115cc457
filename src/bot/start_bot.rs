use std::{sync::Arc, time::Duration};

use clap::Parser;
use ethers::types::Address;
use eyre::{Result, WrapErr};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    common::{
        discovery::TokenDiscovery,
        faucet::FaucetClaimer,
        notification::{FanoutReportSink, LogReportSink, ReportSink, TelegramReportSink},
    },
    core::{
        chain::{verify_network, ChainClient, EthersChainClient, EthersClientFactory},
        types::{Token, TokenBook},
        wallet::{Wallet, WalletRegistry, WalletTarget},
    },
    strategy::{
        config::{AppConfig, ConfigManager},
        orchestrator::{Orchestrator, ScheduleSettings},
        trader::Trader,
        worker::WorkerSettings,
    },
    types::WorkerPlan,
    utils::coin::{format_token_amount, get_token_balance},
};

#[derive(Clone, Debug, Parser)]
pub struct Args {
    /// Configuration file (TOML/JSON/YAML)
    #[arg(long, env = "BOT_CONFIG", default_value = "config.toml")]
    pub config: String,

    /// Run a single cycle even if the config asks for a continuous schedule
    #[arg(long, env = "BOT_ONCE", default_value_t = false)]
    pub once: bool,

    /// `all` or a zero-based wallet index
    #[arg(long, env = "BOT_WALLET")]
    pub wallet: Option<String>,

    #[arg(long, env = "BOT_RPC_URL")]
    pub rpc_url: Option<String>,
}

/// 启动时已验证的运行环境
pub(crate) struct Startup {
    pub config: AppConfig,
    pub client: Arc<dyn ChainClient>,
    pub wallets: Vec<Wallet>,
    registry: WalletRegistry,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 测试或重复调用时订阅者可能已存在
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = ConfigManager::load(Some(&args.config)).wrap_err("failed to load configuration")?;
    if let Some(rpc_url) = &args.rpc_url {
        config.network.rpc_url = rpc_url.clone();
    }
    if let Some(wallet) = &args.wallet {
        config.accounts.wallet_target = wallet.clone();
    }
    if args.once {
        config.schedule.continuous = false;
    }
    ConfigManager::validate_config(&config).wrap_err("invalid configuration")?;
    Ok(config)
}

pub(crate) async fn startup(args: &Args) -> Result<Startup> {
    init_tracing();
    let config = load_config(args)?;
    ConfigManager::print_config_summary(&config);

    // 启动检查使用不带代理的直连客户端
    let client: Arc<dyn ChainClient> = Arc::new(
        EthersChainClient::connect(
            &config.network.rpc_url,
            None,
            Duration::from_secs(config.network.request_timeout_secs),
        )
        .wrap_err("failed to create RPC client")?,
    );
    let block = verify_network(client.as_ref(), config.network.chain_id)
        .await
        .wrap_err("network verification failed")?;
    info!(chain_id = config.network.chain_id, block, "Connected");

    let registry = WalletRegistry::load(&config.accounts, config.network.chain_id)
        .wrap_err("no usable wallet credentials")?;
    let target: WalletTarget = config.accounts.target()?;
    let wallets = registry.select(target)?;
    info!(selected = wallets.len(), total = registry.len(), "Wallets selected");

    Ok(Startup {
        config,
        client,
        wallets,
        registry,
    })
}

async fn wrapped_native(startup: &Startup) -> Result<Address> {
    let wrapped = startup
        .client
        .wrapped_native(startup.config.network.router_address)
        .await
        .wrap_err("failed to read WETH() from router")?;
    info!(weth = ?wrapped, "Wrapped native token");
    Ok(wrapped)
}

pub(crate) async fn load_tokens(startup: &Startup) -> Result<TokenBook> {
    let config = &startup.config;
    let wrapped = wrapped_native(startup).await?;

    let proxy = startup.registry.wallets().first().and_then(|wallet| wallet.proxy.as_ref());
    let discovery = TokenDiscovery::new(&config.discovery, proxy)?;
    Ok(discovery.load(wrapped).await)
}

fn build_sink(config: &AppConfig) -> Result<Arc<dyn ReportSink>> {
    let mut sinks: Vec<Arc<dyn ReportSink>> = vec![Arc::new(LogReportSink)];
    if let Some(telegram) = TelegramReportSink::from_config(&config.notification)? {
        sinks.push(Arc::new(telegram));
    }
    Ok(Arc::new(FanoutReportSink::new(sinks)))
}

async fn run_plan(args: Args, plan: WorkerPlan) -> Result<()> {
    let mut startup = startup(&args).await?;
    if plan == WorkerPlan::SweepOnly {
        startup.config.schedule.continuous = false;
    }
    let tokens = match plan {
        // 领水不需要代币列表
        WorkerPlan::FaucetClaim => TokenBook::minimal(wrapped_native(&startup).await?),
        _ => load_tokens(&startup).await?,
    };
    let tokens = Arc::new(tokens);
    let config = &startup.config;

    let trader = Arc::new(Trader::new(config, tokens));
    let factory = Arc::new(EthersClientFactory::new(
        config.network.rpc_url.clone(),
        Duration::from_secs(config.network.request_timeout_secs),
    ));

    let mut orchestrator = Orchestrator::new(
        factory,
        trader,
        WorkerSettings::from_config(config),
        ScheduleSettings::from_config(&config.schedule),
        build_sink(config)?,
        CancellationToken::new(),
    );
    if plan == WorkerPlan::FaucetClaim {
        let claimer = FaucetClaimer::from_config(&config.faucet).wrap_err("faucet is not configured")?;
        orchestrator = orchestrator.with_faucet(Arc::new(claimer));
    }

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after current step");
            cancel.cancel();
        }
    });

    let cycles = orchestrator.run(&startup.wallets, plan).await;
    info!(cycles, %plan, "Bot stopped");
    Ok(())
}

pub async fn run(args: Args) -> Result<()> {
    run_plan(args, WorkerPlan::SwapAndProvide).await
}

pub async fn sweep(args: Args) -> Result<()> {
    run_plan(args, WorkerPlan::SweepOnly).await
}

pub async fn faucet(args: Args) -> Result<()> {
    run_plan(args, WorkerPlan::FaucetClaim).await
}

pub async fn balances(args: Args) -> Result<()> {
    let startup = startup(&args).await?;
    let native = Token::native();
    for wallet in &startup.wallets {
        match get_token_balance(startup.client.as_ref(), &native, wallet.address()).await {
            Ok(balance) => info!(
                wallet = %wallet.label,
                address = ?wallet.address(),
                balance = %format_token_amount(balance, native.decimals, &native.symbol),
                "Native balance"
            ),
            Err(error) => warn!(wallet = %wallet.label, %error, "Balance read failed"),
        }
    }
    Ok(())
}
