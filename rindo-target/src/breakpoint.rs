//! ブレークポイント機能

use crate::memory::Memory;
use crate::Result;

/// INT3命令のオペコード
const INT3_OPCODE: u8 = 0xCC;

/// ソフトウェアブレークポイント（INT3命令）
///
/// 対象アドレスの先頭1バイトをINT3に置き換え、解除時に元のバイトを
/// 書き戻します。元のバイトは最初の有効化時に一度だけ保存し、以後は
/// 変更しません。
pub struct SoftwareBreakpoint {
    address: u64,
    saved_byte: Option<u8>,
    enabled: bool,
}

impl SoftwareBreakpoint {
    /// ブレークポイントを作成する
    pub fn new(address: u64) -> Self {
        Self {
            address,
            saved_byte: None,
            enabled: false,
        }
    }

    /// ブレークポイントのアドレスを取得する
    pub fn address(&self) -> u64 {
        self.address
    }

    /// ブレークポイントが有効かどうか
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 保存されている元のバイトを取得する
    pub fn saved_byte(&self) -> Option<u8> {
        self.saved_byte
    }

    /// ブレークポイントを有効化する
    ///
    /// 対象ワードを読み取り、最下位バイト（リトルエンディアンなので
    /// 先頭アドレス、つまりプロセッサが最初に実行するバイト）をINT3に
    /// 置き換えて書き戻します。残り7バイトはそのまま保持します。
    pub fn enable(&mut self, memory: &Memory) -> Result<()> {
        if self.enabled {
            return Ok(());
        }

        let word = memory.read_word(self.address)?;
        if self.saved_byte.is_none() {
            self.saved_byte = Some((word & 0xff) as u8);
        }

        let patched = (word & !0xff) | u64::from(INT3_OPCODE);
        memory.write_word(self.address, patched)?;

        self.enabled = true;
        Ok(())
    }

    /// ブレークポイントを無効化する
    ///
    /// 保存していた元のバイトを書き戻します。2回連続で呼んだ場合、
    /// 2回目は復元済みのバイトを観測して同じ値を書き戻すだけです。
    pub fn disable(&mut self, memory: &Memory) -> Result<()> {
        let saved = match self.saved_byte {
            Some(byte) => byte,
            // 一度も有効化されていなければ復元するものがない
            None => return Ok(()),
        };

        let word = memory.read_word(self.address)?;
        let restored = (word & !0xff) | u64::from(saved);
        memory.write_word(self.address, restored)?;

        self.enabled = false;
        Ok(())
    }
}
