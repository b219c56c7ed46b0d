//! rindo ターゲットプロセス制御
//!
//! このクレートは、デバッグ対象のプロセスを制御するための低レベル機能を提供します。
//! ptrace、レジスタアクセス、メモリアクセス、ブレークポイント設定などを行います。

pub mod breakpoint;
pub mod errors;
pub mod memory;
pub mod process;
pub mod registers;

pub use breakpoint::SoftwareBreakpoint;
pub use errors::TargetError;
pub use memory::Memory;
pub use process::{Process, ProcessState, StopReason};
pub use registers::{Reg, RegisterDescriptor, Registers, REGISTER_COUNT};

/// ターゲット制御の結果型
pub type Result<T> = std::result::Result<T, TargetError>;
