//! デバッガコマンド

use thiserror::Error;

use crate::parse::parse_hex;

/// コマンド解釈のエラー
///
/// 形式の崩れた入力はすべてここで報告し、セッションは継続します。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    /// 入力が空
    #[error("empty command")]
    Empty,

    /// 未知のコマンド
    #[error("unknown command '{command}'")]
    Unknown { command: String },

    /// 未知のサブコマンド
    #[error("unknown subcommand '{token}' (usage: {usage})")]
    UnknownSubcommand { token: String, usage: &'static str },

    /// 必要な引数が足りない
    #[error("missing argument (usage: {usage})")]
    MissingArgument { usage: &'static str },

    /// 16進数として解釈できないトークン
    #[error("invalid hexadecimal value '{token}'")]
    InvalidNumber { token: String },
}

/// デバッガコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 実行継続
    Continue,
    /// ブレークポイントを設定
    Break { address: u64 },
    /// 全レジスタの表示
    RegisterDump,
    /// レジスタの読み取り
    RegisterRead { name: String },
    /// レジスタへの書き込み
    RegisterWrite { name: String, value: u64 },
    /// メモリの読み取り
    MemoryRead { address: u64 },
    /// メモリへの書き込み
    MemoryWrite { address: u64, value: u64 },
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

/// `s`が`of`の前方一致かどうか
fn is_prefix(s: &str, of: &str) -> bool {
    !s.is_empty() && of.starts_with(s)
}

/// `index`番目のトークンを取り出す。足りなければ引数不足
fn arg<'a>(
    tokens: &[&'a str],
    index: usize,
    usage: &'static str,
) -> Result<&'a str, CommandParseError> {
    tokens
        .get(index)
        .copied()
        .ok_or(CommandParseError::MissingArgument { usage })
}

impl Command {
    /// コマンド行をパースする
    ///
    /// 空白区切りのトークン列として読み、先頭トークンは前方一致で
    /// コマンドファミリに解決します（`c`でも`cont`でも`continue`）。
    pub fn parse(input: &str) -> Result<Self, CommandParseError> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let command = match tokens.first() {
            Some(first) => *first,
            None => return Err(CommandParseError::Empty),
        };

        if is_prefix(command, "continue") {
            Ok(Command::Continue)
        } else if is_prefix(command, "break") {
            let address = arg(&tokens, 1, "break <address>")?;
            Ok(Command::Break {
                address: parse_hex(address)?,
            })
        } else if is_prefix(command, "register") {
            Self::parse_register(&tokens)
        } else if is_prefix(command, "memory") {
            Self::parse_memory(&tokens)
        } else if is_prefix(command, "help") {
            Ok(Command::Help)
        } else if is_prefix(command, "quit") {
            Ok(Command::Quit)
        } else {
            Err(CommandParseError::Unknown {
                command: command.to_string(),
            })
        }
    }

    fn parse_register(tokens: &[&str]) -> Result<Self, CommandParseError> {
        const USAGE: &str = "register dump | register read <name> | register write <name> <value>";

        match arg(tokens, 1, USAGE)? {
            "dump" => Ok(Command::RegisterDump),
            "read" => {
                let name = arg(tokens, 2, "register read <name>")?;
                Ok(Command::RegisterRead {
                    name: name.to_string(),
                })
            }
            "write" => {
                let name = arg(tokens, 2, "register write <name> <value>")?;
                let value = arg(tokens, 3, "register write <name> <value>")?;
                Ok(Command::RegisterWrite {
                    name: name.to_string(),
                    value: parse_hex(value)?,
                })
            }
            other => Err(CommandParseError::UnknownSubcommand {
                token: other.to_string(),
                usage: USAGE,
            }),
        }
    }

    fn parse_memory(tokens: &[&str]) -> Result<Self, CommandParseError> {
        const USAGE: &str = "memory read <address> | memory write <address> <value>";

        match arg(tokens, 1, USAGE)? {
            "read" => {
                let address = arg(tokens, 2, "memory read <address>")?;
                Ok(Command::MemoryRead {
                    address: parse_hex(address)?,
                })
            }
            "write" => {
                let address = arg(tokens, 2, "memory write <address> <value>")?;
                let value = arg(tokens, 3, "memory write <address> <value>")?;
                Ok(Command::MemoryWrite {
                    address: parse_hex(address)?,
                    value: parse_hex(value)?,
                })
            }
            other => Err(CommandParseError::UnknownSubcommand {
                token: other.to_string(),
                usage: USAGE,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_continue() {
        assert_eq!(Command::parse("continue"), Ok(Command::Continue));
        assert_eq!(Command::parse("cont"), Ok(Command::Continue));
        assert_eq!(Command::parse("c"), Ok(Command::Continue));
    }

    #[test]
    fn test_parse_break() {
        assert_eq!(
            Command::parse("break 0x400000"),
            Ok(Command::Break { address: 0x40_0000 })
        );
        assert_eq!(
            Command::parse("b 400000"),
            Ok(Command::Break { address: 0x40_0000 })
        );
        assert_eq!(
            Command::parse("break"),
            Err(CommandParseError::MissingArgument {
                usage: "break <address>"
            })
        );
        assert!(matches!(
            Command::parse("break zzz"),
            Err(CommandParseError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_parse_register() {
        assert_eq!(Command::parse("register dump"), Ok(Command::RegisterDump));
        assert_eq!(Command::parse("reg dump"), Ok(Command::RegisterDump));
        assert_eq!(
            Command::parse("register read rax"),
            Ok(Command::RegisterRead {
                name: "rax".to_string()
            })
        );
        assert_eq!(
            Command::parse("register write rax 0x42"),
            Ok(Command::RegisterWrite {
                name: "rax".to_string(),
                value: 0x42
            })
        );
        assert!(matches!(
            Command::parse("register read"),
            Err(CommandParseError::MissingArgument { .. })
        ));
        assert!(matches!(
            Command::parse("register write rax"),
            Err(CommandParseError::MissingArgument { .. })
        ));
        assert!(matches!(
            Command::parse("register frobnicate"),
            Err(CommandParseError::UnknownSubcommand { .. })
        ));
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(
            Command::parse("memory read 0x400000"),
            Ok(Command::MemoryRead { address: 0x40_0000 })
        );
        assert_eq!(
            Command::parse("mem write 0x400000 0xdeadbeef"),
            Ok(Command::MemoryWrite {
                address: 0x40_0000,
                value: 0xdead_beef
            })
        );
        assert!(matches!(
            Command::parse("memory"),
            Err(CommandParseError::MissingArgument { .. })
        ));
        assert!(matches!(
            Command::parse("memory write 0x400000"),
            Err(CommandParseError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_help_and_quit() {
        assert_eq!(Command::parse("help"), Ok(Command::Help));
        assert_eq!(Command::parse("h"), Ok(Command::Help));
        assert_eq!(Command::parse("quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert!(matches!(
            Command::parse("frobnicate"),
            Err(CommandParseError::Unknown { .. })
        ));
        assert_eq!(Command::parse(""), Err(CommandParseError::Empty));
        assert_eq!(Command::parse("   "), Err(CommandParseError::Empty));
    }

    #[test]
    fn test_is_prefix() {
        assert!(is_prefix("c", "continue"));
        assert!(is_prefix("continue", "continue"));
        assert!(!is_prefix("continued", "continue"));
        assert!(!is_prefix("", "continue"));
        assert!(!is_prefix("x", "continue"));
    }
}
