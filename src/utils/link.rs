//! 区块浏览器链接，用于 Telegram HTML 消息

use ethers::types::{Address, H256};

fn base(explorer: &str) -> &str {
    explorer.trim_end_matches('/')
}

// {explorer}/tx/0x1234...
pub fn tx(explorer: &str, tx_hash: &H256) -> String {
    format!(
        "<a href=\"{prefix}/tx/{tx_hash:#x}\">{tx_hash:#x}</a>",
        prefix = base(explorer),
        tx_hash = tx_hash,
    )
}

// {explorer}/address/0x1234...
pub fn address(explorer: &str, address: &Address, tag: Option<&str>) -> String {
    let tag = tag.map(str::to_string).unwrap_or_else(|| format!("{:#x}", address));
    format!(
        "<a href=\"{prefix}/address/{address:#x}\">{tag}</a>",
        prefix = base(explorer),
        address = address,
        tag = tag,
    )
}
