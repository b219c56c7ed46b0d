//! rindo デバッガのコア機能
//!
//! このクレートは、デバッガの中核となるロジックを提供します。
//! ターゲットプロセスの制御、ブレークポイント管理、コマンド解釈を統合します。

pub mod breakpoint;
pub mod command;
pub mod debugger;
pub mod parse;

pub use breakpoint::BreakpointTable;
pub use command::{Command, CommandParseError};
pub use debugger::Debugger;

// 他のクレートから使用するために再エクスポート
pub use rindo_target::{ProcessState, Reg, RegisterDescriptor, StopReason, TargetError};

/// デバッガの結果型
pub type Result<T> = anyhow::Result<T>;
