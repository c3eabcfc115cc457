use ethers::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, TransactionReceipt,
    TransactionRequest, H256, U256,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 原生资产符号
pub const NATIVE_SYMBOL: &str = "ETH";
/// 包装原生资产符号
pub const WRAPPED_NATIVE_SYMBOL: &str = "WETH";
/// 默认精度
pub const DEFAULT_DECIMALS: u8 = 18;

/// 代币信息
///
/// `address == None` 表示链上原生资产
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub address: Option<Address>,
    pub decimals: u8,
}

impl Token {
    pub fn native() -> Self {
        Self {
            symbol: NATIVE_SYMBOL.to_string(),
            address: None,
            decimals: DEFAULT_DECIMALS,
        }
    }

    pub fn erc20(symbol: impl Into<String>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address: Some(address),
            decimals,
        }
    }

    pub fn is_native(&self) -> bool {
        self.address.is_none()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(address) => write!(f, "{} ({:?})", self.symbol, address),
            None => write!(f, "{} (native)", self.symbol),
        }
    }
}

/// 代币表
///
/// 原生资产和包装原生资产总是存在，且不能被发现服务覆盖。
#[derive(Debug, Clone)]
pub struct TokenBook {
    native: Token,
    wrapped: Token,
    discovered: BTreeMap<String, Token>,
}

impl TokenBook {
    /// 最小代币表：只有原生资产和包装原生资产
    pub fn minimal(wrapped_native: Address) -> Self {
        Self {
            native: Token::native(),
            wrapped: Token::erc20(WRAPPED_NATIVE_SYMBOL, wrapped_native, DEFAULT_DECIMALS),
            discovered: BTreeMap::new(),
        }
    }

    /// 插入代币，同一符号先到先得。返回是否插入成功。
    pub fn insert(&mut self, token: Token) -> bool {
        let symbol = token.symbol.trim().to_uppercase();
        if symbol.is_empty()
            || token.is_native()
            || symbol == NATIVE_SYMBOL
            || symbol == WRAPPED_NATIVE_SYMBOL
            || self.discovered.contains_key(&symbol)
        {
            return false;
        }

        self.discovered.insert(symbol.clone(), Token { symbol, ..token });
        true
    }

    pub fn get(&self, symbol: &str) -> Result<&Token> {
        let symbol = symbol.trim().to_uppercase();
        match symbol.as_str() {
            NATIVE_SYMBOL => Ok(&self.native),
            WRAPPED_NATIVE_SYMBOL => Ok(&self.wrapped),
            _ => self
                .discovered
                .get(&symbol)
                .ok_or_else(|| BotError::UnknownToken(symbol.clone())),
        }
    }

    pub fn native(&self) -> &Token {
        &self.native
    }

    pub fn wrapped(&self) -> &Token {
        &self.wrapped
    }

    pub fn wrapped_native_address(&self) -> Address {
        self.wrapped.address.unwrap_or_default()
    }

    /// 可作为中间代币交易的代币（排除原生和包装原生）
    pub fn tradeable(&self) -> Vec<&Token> {
        self.discovered.values().collect()
    }

    /// 路由中使用的地址：原生资产映射为包装原生资产
    pub fn route_address(&self, token: &Token) -> Address {
        token
            .address
            .unwrap_or_else(|| self.wrapped_native_address())
    }

    pub fn len(&self) -> usize {
        self.discovered.len() + 2
    }
}

/// 交易路径及其报价
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: Vec<Address>,
    pub amount_out: U256,
}

/// 操作类别，决定固定的gas预算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationClass {
    Approval,
    Swap,
    Liquidity,
    Wrap,
    Transfer,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Approval => write!(f, "approve"),
            OperationClass::Swap => write!(f, "swap"),
            OperationClass::Liquidity => write!(f, "add-liquidity"),
            OperationClass::Wrap => write!(f, "wrap-native"),
            OperationClass::Transfer => write!(f, "transfer"),
        }
    }
}

/// 已编码、待签名的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub class: OperationClass,
}

/// 待签名交易。每次提交都重新构建，nonce在签名前即时获取。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub from: Address,
    pub to: Address,
    pub nonce: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub value: U256,
    pub data: Bytes,
}

impl PendingTransaction {
    /// 构建legacy交易
    pub fn to_typed(&self, chain_id: u64) -> TypedTransaction {
        TransactionRequest::new()
            .from(self.from)
            .to(self.to)
            .nonce(self.nonce)
            .gas(self.gas_limit)
            .gas_price(self.gas_price)
            .value(self.value)
            .data(self.data.clone())
            .chain_id(chain_id)
            .into()
    }

    /// gas上限 * gas价格 + value
    pub fn max_cost(&self) -> U256 {
        self.gas_limit.saturating_mul(self.gas_price).saturating_add(self.value)
    }
}

/// 交易确认结果
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub hash: H256,
    pub confirmed: bool,
    pub reverted: bool,
    pub receipt: Option<TransactionReceipt>,
}

impl TransactionOutcome {
    pub fn timed_out(hash: H256) -> Self {
        Self {
            hash,
            confirmed: false,
            reverted: false,
            receipt: None,
        }
    }

    pub fn from_receipt(receipt: TransactionReceipt) -> Self {
        let success = receipt.status.map(|status| status.as_u64() == 1).unwrap_or(false);
        Self {
            hash: receipt.transaction_hash,
            confirmed: success,
            reverted: !success,
            receipt: Some(receipt),
        }
    }

    /// 将结果映射为错误：回滚区分授权与普通交易，超时单独报告
    pub fn into_result(self, class: OperationClass) -> Result<H256> {
        if self.confirmed {
            return Ok(self.hash);
        }
        if self.reverted {
            return Err(match class {
                OperationClass::Approval => BotError::ApprovalFailure(self.hash),
                _ => BotError::SubmissionRevert(self.hash),
            });
        }
        Err(BotError::Timeout(self.hash))
    }
}

/// 错误类型
#[derive(Debug, Clone, thiserror::Error)]
pub enum BotError {
    #[error("Connectivity check failed: {0}")]
    Connectivity(String),

    #[error("Chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: u64, actual: u64 },

    #[error("RPC call failed: {0}")]
    Rpc(String),

    #[error("No route from {src:?} to {dst:?}")]
    NoRoute { src: Address, dst: Address },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Approval reverted: {0:?}")]
    ApprovalFailure(H256),

    #[error("Transaction reverted: {0:?}")]
    SubmissionRevert(H256),

    #[error("Confirmation timed out: {0:?}")]
    Timeout(H256),

    #[error("Signing failed: {0}")]
    Sign(String),

    #[error("Broadcast failed: {0}")]
    Submit(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Token discovery failed: {0}")]
    Discovery(String),

    #[error("Captcha solving failed: {0}")]
    Captcha(String),

    #[error("Faucet claim failed: {0}")]
    Faucet(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Cancelled")]
    Cancelled,
}

impl BotError {
    /// 可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Rpc(_) | BotError::Submit(_) | BotError::Discovery(_))
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
