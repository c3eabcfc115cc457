//! 内存中的链模拟 - 用于测试
//!
//! 按地址维护nonce、余额和授权，解码广播的原始交易并恢复发送方。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::{
    types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256, U64},
    utils::{keccak256, rlp},
};

use super::abi::ERC20;
use super::chain::{ChainClient, ChainClientFactory};
use super::types::{BotError, Result};
use super::wallet::ProxyConfig;

/// 已广播的交易
#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: U256,
    pub value: U256,
    pub gas: U256,
    pub gas_price: Option<U256>,
    pub selector: [u8; 4],
    pub input: Bytes,
}

#[derive(Default)]
struct State {
    native: HashMap<Address, U256>,
    tokens: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    nonces: HashMap<Address, U256>,
    quotes: HashMap<Vec<Address>, U256>,
    failing_paths: HashSet<Vec<Address>>,
    failing_senders: HashSet<Address>,
    reverting_senders: HashSet<Address>,
    withhold_receipts: bool,
    receipts: HashMap<H256, TransactionReceipt>,
    sent: Vec<SentTransaction>,
    quote_calls: usize,
    send_attempts: usize,
}

pub struct FakeChain {
    chain_id: u64,
    wrapped: Address,
    state: Mutex<State>,
}

impl FakeChain {
    pub fn new(chain_id: u64, wrapped: Address) -> Self {
        Self {
            chain_id,
            wrapped,
            state: Mutex::new(State::default()),
        }
    }

    pub fn set_native_balance(&self, owner: Address, amount: U256) {
        self.state.lock().unwrap().native.insert(owner, amount);
    }

    pub fn set_token_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.lock().unwrap().tokens.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
    }

    /// 路径报价：返回的最后一项为 `amount_out`
    pub fn set_quote(&self, path: Vec<Address>, amount_out: U256) {
        self.state.lock().unwrap().quotes.insert(path, amount_out);
    }

    pub fn fail_path(&self, path: Vec<Address>) {
        self.state.lock().unwrap().failing_paths.insert(path);
    }

    /// 该地址的所有广播都以瞬时错误失败
    pub fn fail_sender(&self, sender: Address) {
        self.state.lock().unwrap().failing_senders.insert(sender);
    }

    /// 该地址的交易上链但回滚
    pub fn revert_sender(&self, sender: Address) {
        self.state.lock().unwrap().reverting_senders.insert(sender);
    }

    pub fn withhold_receipts(&self) {
        self.state.lock().unwrap().withhold_receipts = true;
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_by(&self, sender: Address) -> Vec<SentTransaction> {
        self.sent().into_iter().filter(|tx| tx.from == sender).collect()
    }

    pub fn quote_calls(&self) -> usize {
        self.state.lock().unwrap().quote_calls
    }

    pub fn send_attempts(&self) -> usize {
        self.state.lock().unwrap().send_attempts
    }

    pub fn approve_selector() -> [u8; 4] {
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&keccak256("approve(address,uint256)")[..4]);
        selector
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().sent.len() as u64 + 1)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().native.get(&owner).copied().unwrap_or_default())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tokens
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn amounts_out(
        &self,
        _router: Address,
        amount_in: U256,
        path: Vec<Address>,
    ) -> Result<Vec<U256>> {
        let mut state = self.state.lock().unwrap();
        state.quote_calls += 1;
        if state.failing_paths.contains(&path) {
            return Err(BotError::Rpc("execution reverted: INSUFFICIENT_LIQUIDITY".into()));
        }
        let amount_out = state
            .quotes
            .get(&path)
            .copied()
            .ok_or_else(|| BotError::Rpc("execution reverted".into()))?;

        let mut amounts = vec![amount_in; path.len().saturating_sub(1)];
        amounts.push(amount_out);
        Ok(amounts)
    }

    async fn wrapped_native(&self, _router: Address) -> Result<Address> {
        Ok(self.wrapped)
    }

    async fn nonce(&self, owner: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().nonces.get(&owner).copied().unwrap_or_default())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let tx: Transaction =
            rlp::decode(raw.as_ref()).map_err(|e| BotError::Submit(format!("bad rlp: {e}")))?;
        let from = tx
            .recover_from()
            .map_err(|e| BotError::Submit(format!("bad signature: {e}")))?;

        let mut state = self.state.lock().unwrap();
        state.send_attempts += 1;
        if state.failing_senders.contains(&from) {
            return Err(BotError::Submit("connection reset by peer".into()));
        }

        let expected = state.nonces.get(&from).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(BotError::Submit(format!(
                "nonce mismatch: expected {expected}, got {}",
                tx.nonce
            )));
        }
        state.nonces.insert(from, expected + 1);

        let mut selector = [0u8; 4];
        if tx.input.len() >= 4 {
            selector.copy_from_slice(&tx.input[..4]);
        }

        let reverted = state.reverting_senders.contains(&from);
        if !reverted && selector == Self::approve_selector() {
            if let (Some(token), Ok((spender, amount))) =
                (tx.to, ERC20.decode::<(Address, U256), _>("approve", tx.input.as_ref()))
            {
                state.allowances.insert((token, from, spender), amount);
            }
        }

        let hash = H256::from(keccak256(raw.as_ref()));
        state.sent.push(SentTransaction {
            hash,
            from,
            to: tx.to,
            nonce: tx.nonce,
            value: tx.value,
            gas: tx.gas,
            gas_price: tx.gas_price,
            selector,
            input: tx.input.clone(),
        });
        state.receipts.insert(
            hash,
            TransactionReceipt {
                transaction_hash: hash,
                from,
                to: tx.to,
                status: Some(U64::from(if reverted { 0 } else { 1 })),
                ..Default::default()
            },
        );

        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        let state = self.state.lock().unwrap();
        if state.withhold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&hash).cloned())
    }
}

/// 所有钱包共享同一个 `FakeChain`
pub struct FakeChainFactory {
    pub chain: Arc<FakeChain>,
}

impl ChainClientFactory for FakeChainFactory {
    fn connect(&self, _proxy: Option<&ProxyConfig>) -> Result<Arc<dyn ChainClient>> {
        Ok(self.chain.clone())
    }
}
