//! 周期汇总的投递
//!
//! 投递失败只记录日志，不影响周期本身。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::core::types::{BotError, Result};
use crate::strategy::config::NotificationConfig;
use crate::types::CycleSummary;
use crate::utils::link;
use crate::utils::time::format_datetime;

#[async_trait]
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    async fn cycle_started(
        &self,
        cycle_number: u64,
        started_at: DateTime<Utc>,
        wallet_count: usize,
    ) -> Result<()>;

    async fn deliver(&self, summary: &CycleSummary) -> Result<()>;
}

/// 以结构化日志输出汇总
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn cycle_started(
        &self,
        cycle_number: u64,
        started_at: DateTime<Utc>,
        wallet_count: usize,
    ) -> Result<()> {
        info!(cycle = cycle_number, wallets = wallet_count, started_at = %format_datetime(&started_at), "Cycle started");
        Ok(())
    }

    async fn deliver(&self, summary: &CycleSummary) -> Result<()> {
        let json = serde_json::to_string(summary)
            .map_err(|e| BotError::Notification(e.to_string()))?;
        info!(
            cycle = summary.cycle_number,
            succeeded = summary.succeeded,
            failed = summary.failed,
            tx_count = summary.tx_count,
            summary = %json,
            "Cycle finished"
        );
        for wallet in &summary.wallets {
            info!(
                wallet = %wallet.label,
                address = ?wallet.address,
                success = wallet.success,
                error = wallet.error.as_deref().unwrap_or(""),
                txs = wallet.tx_hashes.len(),
                "Wallet result"
            );
        }
        Ok(())
    }
}

/// Telegram `sendMessage`，HTML格式
pub struct TelegramReportSink {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
    explorer_url: Option<String>,
}

impl TelegramReportSink {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| BotError::Notification(e.to_string()))?;
        Ok(Self {
            client,
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            explorer_url: None,
        })
    }

    pub fn with_explorer(mut self, explorer_url: Option<String>) -> Self {
        self.explorer_url = explorer_url.filter(|url| !url.trim().is_empty());
        self
    }

    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>> {
        if !config.telegram_enabled {
            return Ok(None);
        }
        match (&config.telegram_bot_token, &config.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Self::new(token, chat_id)
                .map(|sink| Some(sink.with_explorer(config.explorer_url.clone()))),
            _ => Err(BotError::Config(
                "telegram enabled without bot token or chat id".to_string(),
            )),
        }
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        self.client
            .post(url)
            .json(&payload)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| BotError::Notification(e.without_url().to_string()))?;
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// 汇总消息正文
pub fn render_summary_html(summary: &CycleSummary, explorer: Option<&str>) -> String {
    let mut message = format!(
        "📊 <b>Cycle #{} finished</b>\n\
         🕐 Start: {}\n\
         🕐 End: {}\n\
         ✅ Succeeded: {}\n\
         ❌ Failed: {}\n\
         🔗 Transactions: {}\n",
        summary.cycle_number,
        format_datetime(&summary.started_at),
        format_datetime(&summary.finished_at),
        summary.succeeded,
        summary.failed,
        summary.tx_count,
    );

    for wallet in &summary.wallets {
        let status = if wallet.success { "✅" } else { "❌" };
        let address = match explorer {
            Some(explorer) => link::address(explorer, &wallet.address, None),
            None => format!("<code>{:?}</code>", wallet.address),
        };
        message.push_str(&format!(
            "\n{} <b>{}</b> {}\n",
            status,
            escape_html(&wallet.label),
            address
        ));
        if let Some(error) = &wallet.error {
            message.push_str(&format!("   Error: {}\n", escape_html(error)));
        }
        for hash in &wallet.tx_hashes {
            let hash = match explorer {
                Some(explorer) => link::tx(explorer, hash),
                None => format!("<code>{:?}</code>", hash),
            };
            message.push_str(&format!("   {}\n", hash));
        }
    }
    message
}

#[async_trait]
impl ReportSink for TelegramReportSink {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn cycle_started(
        &self,
        cycle_number: u64,
        started_at: DateTime<Utc>,
        wallet_count: usize,
    ) -> Result<()> {
        let text = format!(
            "🚀 <b>Cycle #{} started</b>\n🕐 {}\n👛 Wallets: {}",
            cycle_number,
            format_datetime(&started_at),
            wallet_count
        );
        self.send_message(&text).await
    }

    async fn deliver(&self, summary: &CycleSummary) -> Result<()> {
        self.send_message(&render_summary_html(summary, self.explorer_url.as_deref()))
            .await
    }
}

/// 同时投递给多个 sink，各自的失败独立记录
pub struct FanoutReportSink {
    sinks: Vec<Arc<dyn ReportSink>>,
}

impl FanoutReportSink {
    pub fn new(sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ReportSink for FanoutReportSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn cycle_started(
        &self,
        cycle_number: u64,
        started_at: DateTime<Utc>,
        wallet_count: usize,
    ) -> Result<()> {
        let results = join_all(
            self.sinks
                .iter()
                .map(|sink| sink.cycle_started(cycle_number, started_at, wallet_count)),
        )
        .await;
        for (sink, result) in self.sinks.iter().zip(results) {
            if let Err(error) = result {
                warn!(sink = sink.name(), %error, "Start notice delivery failed");
            }
        }
        Ok(())
    }

    async fn deliver(&self, summary: &CycleSummary) -> Result<()> {
        let results = join_all(self.sinks.iter().map(|sink| sink.deliver(summary))).await;
        for (sink, result) in self.sinks.iter().zip(results) {
            if let Err(error) = result {
                warn!(sink = sink.name(), %error, "Summary delivery failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{WalletResult, WorkerPlan};
    use ethers::types::{Address, H256};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn summary() -> CycleSummary {
        let now = Utc::now();
        CycleSummary::new(
            Uuid::new_v4(),
            3,
            WorkerPlan::SwapAndProvide,
            now,
            now,
            vec![
                WalletResult {
                    index: 0,
                    label: "Account 1".to_string(),
                    address: Address::repeat_byte(1),
                    success: true,
                    error: None,
                    tx_hashes: vec![H256::repeat_byte(9)],
                },
                WalletResult {
                    index: 1,
                    label: "Account 2".to_string(),
                    address: Address::repeat_byte(2),
                    success: false,
                    error: Some("No route <x>".to_string()),
                    tx_hashes: Vec::new(),
                },
            ],
        )
    }

    #[test]
    fn test_render_summary_html() {
        let html = render_summary_html(&summary(), None);
        assert!(html.contains("Cycle #3 finished"));
        assert!(html.contains("Succeeded: 1"));
        assert!(html.contains("Failed: 1"));
        assert!(html.contains("No route &lt;x&gt;"));
        assert!(html.contains(&format!("<code>{:?}</code>", H256::repeat_byte(9))));

        let html = render_summary_html(&summary(), Some("https://explorer.example"));
        assert!(html.contains(&format!(
            "https://explorer.example/tx/{:#x}",
            H256::repeat_byte(9)
        )));
    }

    struct FailingSink(AtomicUsize);

    #[async_trait]
    impl ReportSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn cycle_started(&self, _: u64, _: DateTime<Utc>, _: usize) -> Result<()> {
            Err(BotError::Notification("down".into()))
        }

        async fn deliver(&self, _: &CycleSummary) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(BotError::Notification("down".into()))
        }
    }

    #[tokio::test]
    async fn test_fanout_isolates_failures() {
        let failing = Arc::new(FailingSink(AtomicUsize::new(0)));
        let fanout = FanoutReportSink::new(vec![failing.clone(), Arc::new(LogReportSink)]);

        assert!(fanout.cycle_started(1, Utc::now(), 2).await.is_ok());
        assert!(fanout.deliver(&summary()).await.is_ok());
        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_telegram_disabled_by_default() {
        let config = NotificationConfig::default();
        assert!(TelegramReportSink::from_config(&config).unwrap().is_none());
    }
}
