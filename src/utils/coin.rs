use ethers::types::{Address, U256};
use ethers::utils::{format_units, parse_units};

use crate::core::chain::ChainClient;
use crate::core::types::{BotError, Result, Token};

/// 查询余额：原生资产查账户余额，其余查ERC20 `balanceOf`
pub async fn get_token_balance(client: &dyn ChainClient, token: &Token, owner: Address) -> Result<U256> {
    match token.address {
        Some(address) => client.token_balance(address, owner).await,
        None => client.native_balance(owner).await,
    }
}

/// 余额不低于 `min_balance` 时返回余额
pub async fn get_token_balance_with_min(
    client: &dyn ChainClient,
    token: &Token,
    owner: Address,
    min_balance: U256,
) -> Result<Option<U256>> {
    let balance = get_token_balance(client, token, owner).await?;
    Ok((balance >= min_balance).then_some(balance))
}

/// 按代币精度解析用户输入的数量，必须为正数
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.starts_with('-') {
        return Err(BotError::InvalidOperation(format!("negative amount: {amount}")));
    }
    let value: U256 = parse_units(amount, decimals as u32)
        .map_err(|e| BotError::InvalidOperation(format!("invalid amount {amount}: {e}")))?
        .into();
    if value.is_zero() {
        return Err(BotError::InvalidOperation("amount is zero".to_string()));
    }
    Ok(value)
}

/// 按精度格式化，保留6位小数
pub fn format_token_amount(value: U256, decimals: u8, symbol: &str) -> String {
    match format_units(value, decimals as u32) {
        Ok(formatted) => {
            let trimmed = match formatted.split_once('.') {
                Some((whole, fraction)) => format!("{whole}.{:0<6.6}", fraction),
                None => format!("{formatted}.000000"),
            };
            format!("{trimmed} {symbol}")
        }
        Err(_) => format!("{value} wei {symbol}"),
    }
}
