//! 操作定义与调用编码

use ethers::types::{Address, Bytes, U256};

use crate::core::abi::{ERC20, ROUTER, WRAPPED_NATIVE};
use crate::core::types::{BotError, OperationClass, PreparedCall, Result};
use crate::strategy::config::GasConfig;

/// 兑换方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapKind {
    ExactNativeForTokens,
    ExactTokensForNative,
    ExactTokensForTokens,
}

impl SwapKind {
    fn function_name(&self) -> &'static str {
        match self {
            SwapKind::ExactNativeForTokens => "swapExactETHForTokens",
            SwapKind::ExactTokensForNative => "swapExactTokensForETH",
            SwapKind::ExactTokensForTokens => "swapExactTokensForTokens",
        }
    }
}

/// worker请求执行的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Approve {
        token: Address,
        spender: Address,
    },
    Swap {
        kind: SwapKind,
        amount_in: U256,
        min_out: U256,
        path: Vec<Address>,
        recipient: Address,
        deadline: U256,
    },
    AddLiquidity {
        token: Address,
        amount_token_desired: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        native_value: U256,
        recipient: Address,
        deadline: U256,
    },
    WrapNative {
        wrapped: Address,
        amount: U256,
    },
    /// 原生资产转账
    Transfer {
        to: Address,
        amount: U256,
    },
}

impl Operation {
    pub fn class(&self) -> OperationClass {
        match self {
            Operation::Approve { .. } => OperationClass::Approval,
            Operation::Swap { .. } => OperationClass::Swap,
            Operation::AddLiquidity { .. } => OperationClass::Liquidity,
            Operation::WrapNative { .. } => OperationClass::Wrap,
            Operation::Transfer { .. } => OperationClass::Transfer,
        }
    }

    /// 编码为对 `router`（或代币合约）的调用
    pub fn prepare(&self, router: Address) -> Result<PreparedCall> {
        let encode_err = |e: ethers::abi::AbiError| BotError::InvalidOperation(e.to_string());

        let (to, data, value) = match self {
            Operation::Approve { token, spender } => {
                let data = ERC20.encode("approve", (*spender, U256::MAX)).map_err(encode_err)?;
                (*token, data, U256::zero())
            }
            Operation::Swap {
                kind,
                amount_in,
                min_out,
                path,
                recipient,
                deadline,
            } => {
                if path.len() < 2 {
                    return Err(BotError::InvalidOperation(format!(
                        "swap path needs at least two hops, got {}",
                        path.len()
                    )));
                }
                match kind {
                    SwapKind::ExactNativeForTokens => {
                        let data = ROUTER
                            .encode(kind.function_name(), (*min_out, path.clone(), *recipient, *deadline))
                            .map_err(encode_err)?;
                        (router, data, *amount_in)
                    }
                    SwapKind::ExactTokensForNative | SwapKind::ExactTokensForTokens => {
                        let data = ROUTER
                            .encode(
                                kind.function_name(),
                                (*amount_in, *min_out, path.clone(), *recipient, *deadline),
                            )
                            .map_err(encode_err)?;
                        (router, data, U256::zero())
                    }
                }
            }
            Operation::AddLiquidity {
                token,
                amount_token_desired,
                amount_token_min,
                amount_native_min,
                native_value,
                recipient,
                deadline,
            } => {
                let data = ROUTER
                    .encode(
                        "addLiquidityETH",
                        (
                            *token,
                            *amount_token_desired,
                            *amount_token_min,
                            *amount_native_min,
                            *recipient,
                            *deadline,
                        ),
                    )
                    .map_err(encode_err)?;
                (router, data, *native_value)
            }
            Operation::WrapNative { wrapped, amount } => {
                let data = WRAPPED_NATIVE.encode("deposit", ()).map_err(encode_err)?;
                (*wrapped, data, *amount)
            }
            Operation::Transfer { to, amount } => {
                if amount.is_zero() {
                    return Err(BotError::InvalidOperation("transfer amount is zero".to_string()));
                }
                (*to, Bytes::default(), *amount)
            }
        };

        Ok(PreparedCall {
            to,
            data,
            value,
            class: self.class(),
        })
    }
}

/// 固定gas策略：不做动态估算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub gas_price: U256,
    pub approve_gas_limit: U256,
    pub swap_gas_limit: U256,
    pub transfer_gas_limit: U256,
}

impl GasPolicy {
    pub fn from_config(config: &GasConfig) -> Self {
        Self {
            gas_price: U256::from(config.gas_price_wei),
            approve_gas_limit: U256::from(config.approve_gas_limit),
            swap_gas_limit: U256::from(config.swap_gas_limit),
            transfer_gas_limit: U256::from(config.transfer_gas_limit),
        }
    }

    pub fn gas_limit(&self, class: OperationClass) -> U256 {
        match class {
            OperationClass::Approval => self.approve_gas_limit,
            OperationClass::Swap | OperationClass::Liquidity | OperationClass::Wrap => {
                self.swap_gas_limit
            }
            OperationClass::Transfer => self.transfer_gas_limit,
        }
    }

    /// 该类操作最多消耗的gas费用
    pub fn max_fee(&self, class: OperationClass) -> U256 {
        self.gas_limit(class).saturating_mul(self.gas_price)
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::from_config(&GasConfig::default())
    }
}
