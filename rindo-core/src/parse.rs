//! パース関連のユーティリティ関数

use crate::command::CommandParseError;

/// 16進数トークンをu64にパース
///
/// 0xプレフィックスは付いていてもいなくても構いません。
/// 数値トークンは常に16進数として解釈します。
///
/// # Examples
/// ```
/// use rindo_core::parse::parse_hex;
///
/// assert_eq!(parse_hex("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_hex("ff").unwrap(), 0xff);
/// ```
pub fn parse_hex(token: &str) -> Result<u64, CommandParseError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);

    u64::from_str_radix(digits, 16).map_err(|_| CommandParseError::InvalidNumber {
        token: token.to_string(),
    })
}
