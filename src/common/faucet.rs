//! 测试网领水
//!
//! 每个钱包经自己的代理：求解验证码 → 提交领取请求。
//! 转出由 worker 经交易提交器完成。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::H256;
use ethers::utils::to_checksum;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use tracing::{info, instrument};

use super::captcha::{AntiCaptchaSolver, CaptchaRequest, CaptchaSolver};
use crate::core::types::{BotError, Result};
use crate::core::wallet::{ProxyConfig, Wallet};
use crate::strategy::config::FaucetConfig;

/// 领取成功的回执
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// 领水方广播的交易，不计入本钱包的交易数
    pub tx_hash: Option<H256>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Faucet: Send + Sync {
    async fn claim(&self, wallet: &Wallet) -> Result<ClaimReceipt>;
}

#[derive(Debug, Deserialize)]
struct ClaimResponse {
    #[serde(default)]
    success: bool,
    txhash: Option<String>,
    message: Option<String>,
}

impl ClaimResponse {
    fn into_receipt(self) -> Result<ClaimReceipt> {
        if !self.success {
            return Err(BotError::Faucet(
                self.message.unwrap_or_else(|| "claim rejected".to_string()),
            ));
        }
        Ok(ClaimReceipt {
            tx_hash: self.txhash.and_then(|hash| hash.parse().ok()),
        })
    }
}

pub struct FaucetClaimer {
    claim_url: String,
    origin: String,
    request: CaptchaRequest,
    captcha: Arc<dyn CaptchaSolver>,
    timeout: Duration,
}

impl FaucetClaimer {
    pub fn new(config: &FaucetConfig, captcha: Arc<dyn CaptchaSolver>) -> Self {
        Self {
            claim_url: config.claim_url.clone(),
            origin: config.page_url.trim_end_matches('/').to_string(),
            request: CaptchaRequest {
                site_key: config.site_key.clone(),
                page_url: config.page_url.clone(),
            },
            captcha,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// 使用 Anti-Captcha 求解
    pub fn from_config(config: &FaucetConfig) -> Result<Self> {
        let solver = AntiCaptchaSolver::from_config(config)?;
        Ok(Self::new(config, Arc::new(solver)))
    }

    fn http_client(&self, proxy: Option<&ProxyConfig>) -> Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        if let Ok(origin) = HeaderValue::from_str(&self.origin) {
            headers.insert(ORIGIN, origin);
        }
        if let Ok(referer) = HeaderValue::from_str(&self.request.page_url) {
            headers.insert(REFERER, referer);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout);
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }
        builder
            .build()
            .map_err(|e| BotError::Config(format!("failed to build faucet client: {e}")))
    }
}

#[async_trait]
impl Faucet for FaucetClaimer {
    #[instrument(name = "faucet", skip_all, fields(wallet = %wallet.label))]
    async fn claim(&self, wallet: &Wallet) -> Result<ClaimReceipt> {
        let http = self.http_client(wallet.proxy.as_ref())?;
        let token = self.captcha.solve(&http, &self.request).await?;

        let payload = serde_json::json!({
            "addr": to_checksum(&wallet.address(), None),
            "token": token,
        });
        let response = http
            .post(&self.claim_url)
            .header(CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(payload.to_string())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| BotError::Faucet(e.without_url().to_string()))?;
        let receipt = response
            .json::<ClaimResponse>()
            .await
            .map_err(|e| BotError::Faucet(format!("unexpected claim payload: {e}")))?
            .into_receipt()?;

        info!(claim_tx = ?receipt.tx_hash, "Faucet claim accepted");
        Ok(receipt)
    }
}
