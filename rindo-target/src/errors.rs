//! ターゲット制御のエラー型

use nix::errno::Errno;
use thiserror::Error;

/// ターゲットプロセス操作のエラー
///
/// 致命的なのは起動系（`Launch` / `Handshake`）のみで、それ以外は
/// コマンド処理の境界で報告してセッションを継続します。
#[derive(Debug, Error)]
pub enum TargetError {
    /// 起動（fork / execv）の失敗
    #[error("failed to launch '{path}': {source}")]
    Launch { path: String, source: Errno },

    /// アタッチハンドシェイクで想定外のwaitイベントを受信した
    #[error("unexpected wait status during attach: {status}")]
    Handshake { status: String },

    /// プロセスが停止状態でない
    #[error("process is not stopped")]
    NotStopped,

    /// プロセスは既に終了している
    #[error("process has terminated")]
    Terminated,

    /// ターゲットのアドレス空間へのワード読み書きの失敗
    #[error("memory access at 0x{addr:x} failed: {source}")]
    MemoryAccess { addr: u64, source: Errno },

    /// 不明なレジスタ名
    #[error("unknown register '{name}'")]
    UnknownRegister { name: String },

    /// DWARFレジスタ番号に対応する記述子がない
    #[error("no register maps to dwarf number {number}")]
    UnknownDwarfNumber { number: u16 },

    /// その他のptrace要求の失敗
    #[error("ptrace request failed: {0}")]
    Ptrace(#[from] Errno),
}
