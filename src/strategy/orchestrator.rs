//! 多钱包调度
//!
//! 每个钱包一个任务，错开启动；全部结束后汇总。持续模式下按固定间隔重复，
//! 间隔等待分片检查停止信号。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use ethers::types::Address;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::common::faucet::Faucet;
use crate::common::notification::ReportSink;
use crate::core::chain::ChainClientFactory;
use crate::core::wallet::Wallet;
use crate::strategy::config::ScheduleConfig;
use crate::strategy::trader::Trader;
use crate::strategy::worker::{WalletWorker, WorkerSettings};
use crate::types::{CycleSummary, WalletResult, WorkerPlan};
use crate::utils::{sleep_or_cancel, wait_in_increments};

#[derive(Debug, Clone, Copy)]
pub struct ScheduleSettings {
    pub continuous: bool,
    pub interval: Duration,
    pub poll_increment: Duration,
    pub stagger: Duration,
}

impl ScheduleSettings {
    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self {
            continuous: config.continuous,
            interval: config.interval(),
            poll_increment: Duration::from_secs(config.poll_increment_secs),
            stagger: Duration::from_secs(config.stagger_secs),
        }
    }
}

pub struct Orchestrator {
    factory: Arc<dyn ChainClientFactory>,
    trader: Arc<Trader>,
    settings: Arc<WorkerSettings>,
    schedule: ScheduleSettings,
    sink: Arc<dyn ReportSink>,
    cancel: CancellationToken,
    faucet: Option<Arc<dyn Faucet>>,
    cycles: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<dyn ChainClientFactory>,
        trader: Arc<Trader>,
        settings: WorkerSettings,
        schedule: ScheduleSettings,
        sink: Arc<dyn ReportSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            factory,
            trader,
            settings: Arc::new(settings),
            schedule,
            sink,
            cancel,
            faucet: None,
            cycles: AtomicU64::new(0),
        }
    }

    /// 领水计划需要
    pub fn with_faucet(mut self, faucet: Arc<dyn Faucet>) -> Self {
        self.faucet = Some(faucet);
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 运行一个周期，返回汇总。单个钱包的失败不影响其他钱包。
    #[instrument(name = "cycle", skip_all, fields(%plan, wallets = wallets.len()))]
    pub async fn run_cycle(&self, wallets: &[Wallet], plan: WorkerPlan) -> CycleSummary {
        let cycle_id = Uuid::new_v4();
        let cycle_number = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();
        info!(%cycle_id, cycle = cycle_number, "Cycle starting");

        if let Err(error) = self.sink.cycle_started(cycle_number, started_at, wallets.len()).await {
            warn!(sink = self.sink.name(), %error, "Start notice delivery failed");
        }

        let results: Arc<Mutex<HashMap<Address, WalletResult>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut join_set = JoinSet::new();

        for (i, wallet) in wallets.iter().enumerate() {
            if i > 0 && !sleep_or_cancel(self.schedule.stagger, &self.cancel).await {
                warn!("Stop requested, not starting remaining wallets");
                break;
            }

            let wallet = wallet.clone();
            let factory = self.factory.clone();
            let trader = self.trader.clone();
            let settings = self.settings.clone();
            let cancel = self.cancel.clone();
            let faucet = self.faucet.clone();
            let results = results.clone();

            join_set.spawn(async move {
                let result = match factory.connect(wallet.proxy.as_ref()) {
                    Ok(client) => {
                        WalletWorker::new(wallet, client, trader, settings, cancel)
                            .with_faucet(faucet)
                            .run(plan)
                            .await
                    }
                    Err(error) => {
                        error!(wallet = %wallet.label, %error, "Client setup failed");
                        WalletResult::failed(&wallet, error)
                    }
                };
                results.lock().await.insert(result.address, result);
            });
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(error) = joined {
                error!(%error, "Worker task aborted");
            }
        }

        let mut results = std::mem::take(&mut *results.lock().await);
        // 未启动或异常退出的钱包记为失败
        let mut collected = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let result = results.remove(&wallet.address()).unwrap_or_else(|| {
                let reason = if self.cancel.is_cancelled() {
                    "Cancelled"
                } else {
                    "worker task aborted"
                };
                WalletResult::failed(wallet, reason)
            });
            collected.push(result);
        }

        let summary = CycleSummary::new(cycle_id, cycle_number, plan, started_at, Utc::now(), collected);
        info!(
            cycle = cycle_number,
            succeeded = summary.succeeded,
            failed = summary.failed,
            tx_count = summary.tx_count,
            "Cycle complete"
        );
        summary
    }

    /// 单次或持续运行，返回已完成的周期数
    pub async fn run(&self, wallets: &[Wallet], plan: WorkerPlan) -> usize {
        let mut completed = 0;
        loop {
            let started = Instant::now();
            let summary = self.run_cycle(wallets, plan).await;
            completed += 1;

            if let Err(error) = self.sink.deliver(&summary).await {
                warn!(sink = self.sink.name(), %error, "Summary delivery failed");
            }

            if !self.schedule.continuous || self.cancel.is_cancelled() {
                break;
            }

            let wait = self.schedule.interval.saturating_sub(started.elapsed());
            info!(wait_secs = wait.as_secs(), "Waiting for next cycle");
            if !wait_in_increments(wait, self.schedule.poll_increment, &self.cancel).await {
                info!("Stop requested during wait");
                break;
            }
        }
        completed
    }
}
