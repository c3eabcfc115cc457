//! 钱包注册表
//!
//! 私钥来自文件或环境变量，代理按钱包序号轮换分配。

use std::{fmt, fs, path::Path, str::FromStr};

use ethers::{
    signers::{LocalWallet, Signer},
    types::Address,
};
use tracing::{info, warn};
use url::Url;

use super::types::{BotError, Result};
use crate::strategy::config::AccountsConfig;
use crate::utils::validation::is_valid_private_key;

/// 钱包代理，形如 `host:port` 或 `user:pass@host:port`
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    url: Url,
}

impl ProxyConfig {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BotError::Config("empty proxy entry".to_string()));
        }

        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{raw}")
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| BotError::Config(format!("invalid proxy {raw}: {e}")))?;
        if url.host_str().is_none() {
            return Err(BotError::Config(format!("proxy without host: {raw}")));
        }

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        reqwest::Proxy::all(self.as_str())
            .map_err(|e| BotError::Config(format!("invalid proxy {self}: {e}")))
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.url.host_str().unwrap_or_default();
        let credentials = if self.url.username().is_empty() { "" } else { "***@" };
        match self.url.port() {
            Some(port) => write!(f, "{}://{}{}:{}", self.url.scheme(), credentials, host, port),
            None => write!(f, "{}://{}{}", self.url.scheme(), credentials, host),
        }
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProxyConfig({self})")
    }
}

/// 单个钱包。加载后不可变，一个周期内只被一个worker持有。
#[derive(Debug, Clone)]
pub struct Wallet {
    pub index: usize,
    pub label: String,
    signer: LocalWallet,
    pub proxy: Option<ProxyConfig>,
}

impl Wallet {
    pub fn new(index: usize, private_key: &str, chain_id: u64, proxy: Option<ProxyConfig>) -> Result<Self> {
        if !is_valid_private_key(private_key) {
            return Err(BotError::Config(format!(
                "private key #{} is not 32-byte hex",
                index + 1
            )));
        }
        let key = private_key.trim().trim_start_matches("0x");
        let bytes = hex::decode(key)
            .map_err(|e| BotError::Config(format!("private key #{} is not hex: {e}", index + 1)))?;

        let signer = LocalWallet::from_bytes(&bytes)
            .map_err(|e| BotError::Config(format!("private key #{} rejected: {e}", index + 1)))?
            .with_chain_id(chain_id);

        Ok(Self {
            index,
            label: format!("Account {}", index + 1),
            signer,
            proxy,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &LocalWallet {
        &self.signer
    }
}

/// 钱包选择：全部或单个序号（从0开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletTarget {
    All,
    Index(usize),
}

impl FromStr for WalletTarget {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(WalletTarget::All);
        }
        s.parse::<usize>()
            .map(WalletTarget::Index)
            .map_err(|_| BotError::Config(format!("wallet target must be 'all' or an index, got '{s}'")))
    }
}

/// 有序钱包列表
#[derive(Debug, Clone)]
pub struct WalletRegistry {
    wallets: Vec<Wallet>,
}

impl WalletRegistry {
    /// 从私钥文件（或环境变量）和代理文件加载
    pub fn load(accounts: &AccountsConfig, chain_id: u64) -> Result<Self> {
        let file_keys = read_lines(&accounts.private_keys_file);
        let keys = collect_private_keys(
            file_keys,
            std::env::var("PRIVATE_KEYS").ok(),
            std::env::var("PRIVATE_KEY").ok(),
        );

        let proxies: Vec<ProxyConfig> = read_lines(&accounts.proxies_file)
            .into_iter()
            .filter_map(|line| match ProxyConfig::parse(&line) {
                Ok(proxy) => Some(proxy),
                Err(e) => {
                    warn!(error = %e, "Skipping proxy entry");
                    None
                }
            })
            .collect();

        let registry = Self::from_parts(&keys, &proxies, chain_id)?;
        info!(
            wallets = registry.len(),
            proxies = proxies.len(),
            "Wallet registry loaded"
        );
        Ok(registry)
    }

    /// 无效私钥跳过并告警；没有任何可用私钥时报错
    pub fn from_parts(keys: &[String], proxies: &[ProxyConfig], chain_id: u64) -> Result<Self> {
        let mut wallets = Vec::with_capacity(keys.len());
        for key in keys {
            let index = wallets.len();
            let proxy = if proxies.is_empty() {
                None
            } else {
                Some(proxies[index % proxies.len()].clone())
            };
            match Wallet::new(index, key, chain_id, proxy) {
                Ok(wallet) => wallets.push(wallet),
                Err(e) => warn!(error = %e, "Skipping private key"),
            }
        }

        if wallets.is_empty() {
            return Err(BotError::Config("no usable private keys found".to_string()));
        }

        Ok(Self { wallets })
    }

    pub fn select(&self, target: WalletTarget) -> Result<Vec<Wallet>> {
        match target {
            WalletTarget::All => Ok(self.wallets.clone()),
            WalletTarget::Index(index) => self
                .wallets
                .get(index)
                .cloned()
                .map(|wallet| vec![wallet])
                .ok_or_else(|| {
                    BotError::Config(format!(
                        "wallet index {index} out of range (have {})",
                        self.wallets.len()
                    ))
                }),
        }
    }

    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }
}

/// 读取非空、非注释行；文件不存在时返回空
fn read_lines(path: impl AsRef<Path>) -> Vec<String> {
    match fs::read_to_string(path.as_ref()) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// 文件优先，其次 `PRIVATE_KEYS`（逗号分隔）和 `PRIVATE_KEY`，去重并保持顺序
fn collect_private_keys(
    file_keys: Vec<String>,
    env_keys: Option<String>,
    env_key: Option<String>,
) -> Vec<String> {
    let candidates: Vec<String> = if !file_keys.is_empty() {
        file_keys
    } else {
        env_keys
            .iter()
            .flat_map(|keys| keys.split(','))
            .chain(env_key.iter().map(String::as_str))
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .collect()
    };

    let mut keys: Vec<String> = Vec::with_capacity(candidates.len());
    for key in candidates {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
