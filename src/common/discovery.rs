//! 代币发现
//!
//! 从行情接口拉取市场列表，提取 base/quote 代币。失败时退回只含原生资产和
//! 包装原生资产的最小代币表。

use std::str::FromStr;
use std::time::Duration;

use ethers::types::Address;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::types::{BotError, Result, Token, TokenBook, DEFAULT_DECIMALS};
use crate::core::wallet::ProxyConfig;
use crate::strategy::config::DiscoveryConfig;
use crate::utils::validation::is_valid_address;
use crate::utils::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    #[serde(default)]
    pub base_token: Option<MarketToken>,
    #[serde(default)]
    pub quote_token: Option<MarketToken>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketToken {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl MarketToken {
    fn to_token(&self) -> Option<Token> {
        let symbol = self.symbol.as_deref()?.trim().to_uppercase();
        if symbol.is_empty() {
            return None;
        }
        let raw = self.address.as_deref()?;
        if !is_valid_address(raw) {
            return None;
        }
        let address = Address::from_str(raw).ok()?;
        Some(Token::erc20(symbol, address, self.decimals.unwrap_or(DEFAULT_DECIMALS)))
    }
}

/// 由市场列表构建代币表：同一符号先到先得
pub fn build_token_book(markets: &[Market], wrapped_native: Address) -> TokenBook {
    let mut book = TokenBook::minimal(wrapped_native);
    for market in markets {
        for side in [&market.base_token, &market.quote_token].into_iter().flatten() {
            if let Some(token) = side.to_token() {
                book.insert(token);
            }
        }
    }
    book
}

pub struct TokenDiscovery {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl TokenDiscovery {
    /// 使用第一个代理（如果有）访问行情接口
    pub fn new(config: &DiscoveryConfig, proxy: Option<&ProxyConfig>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://testnet.gte.xyz"));
        headers.insert(REFERER, HeaderValue::from_static("https://testnet.gte.xyz/"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36",
            ),
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs));
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }
        let client = builder
            .build()
            .map_err(|e| BotError::Config(format!("failed to build discovery client: {e}")))?;

        Ok(Self {
            client,
            url: config.markets_url.clone(),
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_secs(config.retry_delay_secs),
            ),
        })
    }

    pub async fn fetch_markets(&self) -> Result<Vec<Market>> {
        self.retry
            .run("token discovery", |_| async {
                let response = self
                    .client
                    .get(&self.url)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|e| BotError::Discovery(e.to_string()))?;
                response
                    .json::<Vec<Market>>()
                    .await
                    .map_err(|e| BotError::Discovery(format!("unexpected market payload: {e}")))
            })
            .await
    }

    /// 失败不致命，退回最小代币表
    pub async fn load(&self, wrapped_native: Address) -> TokenBook {
        match self.fetch_markets().await {
            Ok(markets) => {
                let book = build_token_book(&markets, wrapped_native);
                info!(markets = markets.len(), tokens = book.len(), "Token list loaded");
                book
            }
            Err(error) => {
                warn!(%error, "Token discovery failed, continuing with ETH/WETH only");
                TokenBook::minimal(wrapped_native)
            }
        }
    }
}
