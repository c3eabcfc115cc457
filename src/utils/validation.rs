//! 验证工具

/// 验证合约地址格式：`0x` + 40位十六进制
pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// 验证私钥格式（`0x` 前缀可选）
pub fn is_valid_private_key(private_key: &str) -> bool {
    let hex_part = private_key.trim().trim_start_matches("0x");
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// 验证HTTP(S) URL格式
pub fn is_valid_http_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}
