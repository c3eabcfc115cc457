use crate::core::types::{BotError, Result};
use crate::core::wallet::WalletTarget;
use crate::utils::validation::is_valid_http_url;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// 环境变量前缀，如 `BOT__NETWORK__RPC_URL`
pub const ENV_PREFIX: &str = "BOT";

/// 网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// RPC URL
    pub rpc_url: String,
    /// 链ID
    pub chain_id: u64,
    /// 路由合约地址
    pub router_address: Address,
    /// 单次HTTP请求超时 (秒)
    pub request_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://carrot.megaeth.com/rpc".to_string(),
            chain_id: 6342,
            router_address: Address::from_str("0xa6b579684e943f7d00d616a48cf99b5147fc57a5")
                .unwrap_or_default(),
            request_timeout_secs: 30,
        }
    }
}

/// 固定gas策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// gas价格 (wei)，默认 0.001 gwei
    pub gas_price_wei: u64,
    /// 授权交易gas上限
    pub approve_gas_limit: u64,
    /// 兑换/流动性/包装交易gas上限
    pub swap_gas_limit: u64,
    /// 原生资产转账gas上限
    pub transfer_gas_limit: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_price_wei: 1_000_000,
            approve_gas_limit: 200_000,
            swap_gas_limit: 500_000,
            transfer_gas_limit: 21_000,
        }
    }
}

/// 候选路径的优先顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePreference {
    /// 先直连，再经包装原生资产中转
    DirectFirst,
    /// 先中转，再直连
    RoutedFirst,
}

/// 随机数量区间 (ether)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

impl AmountRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min.is_nan() || self.min <= 0.0 || !self.max.is_finite() || self.min > self.max {
            return Err(BotError::Config(format!(
                "{name} range must satisfy 0 < min <= max, got {}..{}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// 交易配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    /// 兑换滑点 (基点，1100 = 11%)
    pub swap_slippage_bps: u64,
    /// 添加流动性滑点 (基点，100 = 1%)
    pub liquidity_slippage_bps: u64,
    pub route_preference: RoutePreference,
    /// 每个钱包每周期兑换的原生资产数量
    pub swap_amount: AmountRange,
    /// 每个钱包每周期添加流动性的原生资产数量
    pub liquidity_amount: AmountRange,
    /// 交易截止时间 (秒)
    pub deadline_secs: u64,
    pub add_liquidity: bool,
    /// 周期结束时把剩余代币换回原生资产
    pub sweep_residual: bool,
    /// 中间代币白名单，空表示全部已发现代币
    pub intermediate_tokens: Vec<String>,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            swap_slippage_bps: 1100,
            liquidity_slippage_bps: 100,
            route_preference: RoutePreference::DirectFirst,
            swap_amount: AmountRange::new(0.0001, 0.002),
            liquidity_amount: AmountRange::new(0.0001, 0.002),
            deadline_secs: 120,
            add_liquidity: true,
            sweep_residual: true,
            intermediate_tokens: Vec::new(),
        }
    }
}

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
        }
    }
}

/// 交易确认配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            poll_interval_ms: 2000,
        }
    }
}

/// 调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 是否按周期持续运行
    pub continuous: bool,
    pub interval_hours: u64,
    /// 长时间等待时检查停止信号的间隔
    pub poll_increment_secs: u64,
    /// 相邻钱包启动间隔
    pub stagger_secs: u64,
    /// 兑换与添加流动性之间的间隔
    pub step_delay_secs: u64,
    /// 候选代币失败后尝试下一个之前的间隔
    pub candidate_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            interval_hours: 24,
            poll_increment_secs: 1,
            stagger_secs: 2,
            step_delay_secs: 5,
            candidate_delay_secs: 2,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }
}

/// 代币发现配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub markets_url: String,
    pub timeout_secs: u64,
    pub max_attempts: usize,
    pub retry_delay_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            markets_url: "https://api-testnet.gte.xyz/v1/markets?sortBy=volume&limit=100".to_string(),
            timeout_secs: 10,
            max_attempts: 3,
            retry_delay_secs: 5,
        }
    }
}

/// 账户配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    pub private_keys_file: String,
    pub proxies_file: String,
    /// `all` 或钱包序号 (从0开始)
    pub wallet_target: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            private_keys_file: "private_keys.txt".to_string(),
            proxies_file: "proxies.txt".to_string(),
            wallet_target: "all".to_string(),
        }
    }
}

impl AccountsConfig {
    pub fn target(&self) -> Result<WalletTarget> {
        self.wallet_target.parse()
    }
}

/// 通知配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// 是否启用Telegram通知
    pub telegram_enabled: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// 区块浏览器地址，设置后交易哈希显示为链接
    pub explorer_url: Option<String>,
}

/// 领水配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// 领取接口
    pub claim_url: String,
    /// 验证码所在页面，同时作为请求的 origin/referer
    pub page_url: String,
    /// Turnstile site key
    pub site_key: String,
    /// 验证码服务地址 (Anti-Captcha 协议)
    pub captcha_api_url: String,
    pub captcha_api_key: Option<String>,
    pub captcha_poll_interval_secs: u64,
    pub captcha_max_polls: usize,
    /// 领取后转出的目标地址，不设置则只领取
    pub forward_to: Option<Address>,
    /// 每个钱包转出的数量 (ether)
    pub forward_amount: f64,
    /// 领取成功到转出之间的等待
    pub settle_delay_secs: u64,
    pub timeout_secs: u64,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            claim_url: "https://carrot.megaeth.com/claim".to_string(),
            page_url: "https://testnet.megaeth.com/".to_string(),
            site_key: "0x4AAAAAABA4JXCaw9E2Py-9".to_string(),
            captcha_api_url: "https://api.anti-captcha.com".to_string(),
            captcha_api_key: None,
            captcha_poll_interval_secs: 3,
            captcha_max_polls: 20,
            forward_to: None,
            forward_amount: 0.00499,
            settle_delay_secs: 10,
            timeout_secs: 30,
        }
    }
}

/// 完整的应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub gas: GasConfig,
    pub trade: TradeConfig,
    pub retry: RetryConfig,
    pub confirmation: ConfirmationConfig,
    pub schedule: ScheduleConfig,
    pub discovery: DiscoveryConfig,
    pub accounts: AccountsConfig,
    pub notification: NotificationConfig,
    pub faucet: FaucetConfig,
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 默认值 → 配置文件(可选) → 环境变量
    ///
    /// 不做校验：调用方叠加命令行参数后再调用 `validate_config`。
    pub fn load(path: Option<&str>) -> Result<AppConfig> {
        dotenv::dotenv().ok(); // 加载.env文件，如果存在的话

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| BotError::Config(e.to_string()))
    }

    /// 验证配置的有效性
    pub fn validate_config(config: &AppConfig) -> Result<()> {
        if !is_valid_http_url(&config.network.rpc_url) {
            return Err(BotError::Config(format!(
                "invalid RPC URL: '{}'",
                config.network.rpc_url
            )));
        }

        if config.network.router_address.is_zero() {
            return Err(BotError::Config("router address cannot be zero".to_string()));
        }

        if config.trade.swap_slippage_bps >= 10000 || config.trade.liquidity_slippage_bps >= 10000 {
            return Err(BotError::Config("slippage must be below 10000 bps".to_string()));
        }

        config.trade.swap_amount.validate("swap_amount")?;
        config.trade.liquidity_amount.validate("liquidity_amount")?;

        if config.retry.max_attempts < 1 || config.discovery.max_attempts < 1 {
            return Err(BotError::Config("max_attempts must be at least 1".to_string()));
        }

        if config.confirmation.poll_interval_ms == 0 {
            return Err(BotError::Config("poll_interval_ms must be positive".to_string()));
        }

        config.accounts.target()?;

        if !is_valid_http_url(&config.faucet.claim_url)
            || !is_valid_http_url(&config.faucet.captcha_api_url)
        {
            return Err(BotError::Config("invalid faucet or captcha URL".to_string()));
        }
        if config.faucet.captcha_max_polls < 1 {
            return Err(BotError::Config("captcha_max_polls must be at least 1".to_string()));
        }
        if config.faucet.forward_to.is_some()
            && !(config.faucet.forward_amount.is_finite() && config.faucet.forward_amount > 0.0)
        {
            return Err(BotError::Config(
                "faucet forward_amount must be positive when forward_to is set".to_string(),
            ));
        }

        if config.notification.telegram_enabled {
            if config.notification.telegram_bot_token.as_deref().unwrap_or("").is_empty() {
                return Err(BotError::Config(
                    "Telegram bot token is required when telegram is enabled".to_string(),
                ));
            }
            if config.notification.telegram_chat_id.as_deref().unwrap_or("").is_empty() {
                return Err(BotError::Config(
                    "Telegram chat ID is required when telegram is enabled".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// 打印配置摘要 (不包含敏感信息)
    pub fn print_config_summary(config: &AppConfig) {
        info!("=== 配置摘要 ===");
        info!("网络: 链ID {}", config.network.chain_id);
        info!("RPC URL: {}", config.network.rpc_url);
        info!("路由合约: {:?}", config.network.router_address);
        info!(
            "Gas: 价格 {} wei, 授权上限 {}, 兑换上限 {}",
            config.gas.gas_price_wei, config.gas.approve_gas_limit, config.gas.swap_gas_limit
        );
        info!(
            "滑点: 兑换 {}%, 流动性 {}%",
            config.trade.swap_slippage_bps as f64 / 100.0,
            config.trade.liquidity_slippage_bps as f64 / 100.0
        );
        info!("路径顺序: {:?}", config.trade.route_preference);
        info!(
            "数量区间: 兑换 {}-{}, 流动性 {}-{}",
            config.trade.swap_amount.min,
            config.trade.swap_amount.max,
            config.trade.liquidity_amount.min,
            config.trade.liquidity_amount.max
        );
        info!(
            "重试: {} 次, 间隔 {}s; 确认超时 {}s",
            config.retry.max_attempts, config.retry.delay_secs, config.confirmation.timeout_secs
        );
        if config.schedule.continuous {
            info!("调度: 每 {} 小时运行一次", config.schedule.interval_hours);
        } else {
            info!("调度: 单次运行");
        }
        info!("钱包: {}", config.accounts.wallet_target);
        match config.faucet.forward_to {
            Some(to) => info!("领水转出: {} ETH → {:?}", config.faucet.forward_amount, to),
            None => info!("领水转出: 未设置"),
        }
        info!(
            "Telegram通知: {}",
            if config.notification.telegram_enabled { "启用" } else { "禁用" }
        );
        info!("==================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());
        assert_eq!(config.network.chain_id, 6342);
        assert_eq!(
            config.network.router_address,
            Address::from_str("0xa6b579684e943f7d00d616a48cf99b5147fc57a5").unwrap()
        );
        assert_eq!(config.trade.swap_slippage_bps, 1100);
        assert_eq!(config.trade.liquidity_slippage_bps, 100);
        assert_eq!(config.trade.route_preference, RoutePreference::DirectFirst);
        assert_eq!(config.confirmation.timeout_secs, 180);
        assert_eq!(config.schedule.interval(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AppConfig::default();
        config.trade.swap_slippage_bps = 10000;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.trade.liquidity_amount = AmountRange::new(0.5, 0.1);
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.network.rpc_url = String::new();
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.accounts.wallet_target = "first".to_string();
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.notification.telegram_enabled = true;
        config.notification.telegram_bot_token = Some("token".to_string());
        assert!(ConfigManager::validate_config(&config).is_err());
        config.notification.telegram_chat_id = Some("-100123".to_string());
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut config = AppConfig::default();
        config.faucet.forward_to = Some(Address::repeat_byte(1));
        config.faucet.forward_amount = 0.0;
        assert!(ConfigManager::validate_config(&config).is_err());
        config.faucet.forward_amount = 0.005;
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [trade]
                route_preference = "routed_first"
                swap_slippage_bps = 500

                [schedule]
                continuous = true
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.trade.route_preference, RoutePreference::RoutedFirst);
        assert_eq!(config.trade.swap_slippage_bps, 500);
        assert_eq!(config.trade.liquidity_slippage_bps, 100);
        assert!(config.schedule.continuous);
        assert_eq!(config.network.chain_id, 6342);
    }
}
