//! メモリアクセス機能

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::errors::TargetError;
use crate::Result;

/// メモリアクセス
///
/// トレース対象プロセスのアドレス空間に対するワード単位（8バイト）の
/// 読み書きを提供します。アクセス単位は常に1ワードなので、1バイトだけの
/// 書き換えは呼び出し側がread-modify-writeで組み立てます。
pub struct Memory {
    pid: Pid,
}

impl Memory {
    /// メモリアクセスを作成する
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// 指定アドレスから1ワード読み取る
    ///
    /// 範囲チェックは行いません。アクセスできないアドレスはOSのエラーを
    /// そのまま載せて失敗します。
    pub fn read_word(&self, addr: u64) -> Result<u64> {
        let word = ptrace::read(self.pid, addr as ptrace::AddressType)
            .map_err(|source| TargetError::MemoryAccess { addr, source })?;
        Ok(word as u64)
    }

    /// 指定アドレスへ1ワード書き込む
    pub fn write_word(&self, addr: u64, value: u64) -> Result<()> {
        unsafe {
            ptrace::write(self.pid, addr as ptrace::AddressType, value as i64)
                .map_err(|source| TargetError::MemoryAccess { addr, source })
        }
    }
}
