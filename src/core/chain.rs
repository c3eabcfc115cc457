//! 链访问层
//!
//! `ChainClient` 是引擎与RPC之间的唯一接口。每个钱包持有自己的客户端实例，
//! 绑定自己的代理，客户端之间从不共享。

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    contract::Contract,
    providers::{Http, Middleware, Provider},
    types::{Address, BlockNumber, Bytes, TransactionReceipt, H256, U256},
};
use url::Url;

use super::abi::{ERC20_ABI, ROUTER_ABI};
use super::types::{BotError, Result};
use super::wallet::ProxyConfig;

fn rpc_error(err: impl std::fmt::Display) -> BotError {
    BotError::Rpc(err.to_string())
}

/// 链上读写接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    async fn block_number(&self) -> Result<u64>;

    async fn native_balance(&self, owner: Address) -> Result<U256>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// 路由合约的 `getAmountsOut`
    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>>;

    /// 路由合约的 `WETH()`
    async fn wrapped_native(&self, router: Address) -> Result<Address>;

    /// pending状态的nonce
    async fn nonce(&self, owner: Address) -> Result<U256>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;
}

/// 为每个钱包创建独立客户端
pub trait ChainClientFactory: Send + Sync {
    fn connect(&self, proxy: Option<&ProxyConfig>) -> Result<Arc<dyn ChainClient>>;
}

/// 基于 ethers HTTP provider 的实现
pub struct EthersChainClient {
    provider: Arc<Provider<Http>>,
}

impl EthersChainClient {
    pub fn connect(rpc_url: &str, proxy: Option<&ProxyConfig>, timeout: Duration) -> Result<Self> {
        let url = Url::parse(rpc_url)
            .map_err(|e| BotError::Config(format!("invalid rpc url {rpc_url}: {e}")))?;

        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }
        let http_client = builder
            .build()
            .map_err(|e| BotError::Config(format!("failed to build http client: {e}")))?;

        let provider = Provider::new(Http::new_with_client(url, http_client));
        Ok(Self {
            provider: Arc::new(provider),
        })
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self.provider.get_chainid().await.map_err(rpc_error)?;
        Ok(chain_id.as_u64())
    }

    async fn block_number(&self) -> Result<u64> {
        let number = self.provider.get_block_number().await.map_err(rpc_error)?;
        Ok(number.as_u64())
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.provider.get_balance(owner, None).await.map_err(rpc_error)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let contract = Contract::new(token, ERC20_ABI.clone(), self.provider.clone());
        contract
            .method::<_, U256>("balanceOf", owner)
            .map_err(rpc_error)?
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let contract = Contract::new(token, ERC20_ABI.clone(), self.provider.clone());
        contract
            .method::<_, U256>("allowance", (owner, spender))
            .map_err(rpc_error)?
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>> {
        let contract = Contract::new(router, ROUTER_ABI.clone(), self.provider.clone());
        contract
            .method::<_, Vec<U256>>("getAmountsOut", (amount_in, path))
            .map_err(rpc_error)?
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn wrapped_native(&self, router: Address) -> Result<Address> {
        let contract = Contract::new(router, ROUTER_ABI.clone(), self.provider.clone());
        contract
            .method::<_, Address>("WETH", ())
            .map_err(rpc_error)?
            .call()
            .await
            .map_err(rpc_error)
    }

    async fn nonce(&self, owner: Address) -> Result<U256> {
        self.provider
            .get_transaction_count(owner, Some(BlockNumber::Pending.into()))
            .await
            .map_err(rpc_error)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| BotError::Submit(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)
    }
}

/// 按钱包代理创建 `EthersChainClient`
pub struct EthersClientFactory {
    rpc_url: String,
    timeout: Duration,
}

impl EthersClientFactory {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            timeout,
        }
    }
}

impl ChainClientFactory for EthersClientFactory {
    fn connect(&self, proxy: Option<&ProxyConfig>) -> Result<Arc<dyn ChainClient>> {
        let client = EthersChainClient::connect(&self.rpc_url, proxy, self.timeout)?;
        Ok(Arc::new(client))
    }
}

/// 启动检查：RPC连通性和链ID
pub async fn verify_network(client: &dyn ChainClient, expected_chain_id: u64) -> Result<u64> {
    let block = client
        .block_number()
        .await
        .map_err(|e| BotError::Connectivity(e.to_string()))?;

    let actual = client
        .chain_id()
        .await
        .map_err(|e| BotError::Connectivity(e.to_string()))?;

    if actual != expected_chain_id {
        return Err(BotError::ChainIdMismatch {
            expected: expected_chain_id,
            actual,
        });
    }

    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_network_ok() {
        let mut client = MockChainClient::new();
        client.expect_block_number().returning(|| Ok(42));
        client.expect_chain_id().returning(|| Ok(6342));

        assert_eq!(verify_network(&client, 6342).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_verify_network_wrong_chain() {
        let mut client = MockChainClient::new();
        client.expect_block_number().returning(|| Ok(1));
        client.expect_chain_id().returning(|| Ok(1));

        let err = verify_network(&client, 6342).await.unwrap_err();
        assert!(matches!(err, BotError::ChainIdMismatch { expected: 6342, actual: 1 }));
    }

    #[tokio::test]
    async fn test_verify_network_unreachable() {
        let mut client = MockChainClient::new();
        client
            .expect_block_number()
            .returning(|| Err(BotError::Rpc("connection refused".into())));
        client.expect_chain_id().never();

        let err = verify_network(&client, 6342).await.unwrap_err();
        assert!(matches!(err, BotError::Connectivity(_)));
    }

    #[test]
    fn test_factory_rejects_bad_url() {
        let factory = EthersClientFactory::new("not a url", Duration::from_secs(1));
        assert!(matches!(factory.connect(None), Err(BotError::Config(_))));
    }
}
