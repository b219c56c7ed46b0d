//! ブレークポイント管理

use std::collections::HashMap;

use rindo_target::{Memory, SoftwareBreakpoint};

use crate::Result;

/// アドレスをキーとするブレークポイント表
///
/// アドレスはセッション中安定している（起動時にASLRを無効化している）ので、
/// 生のアドレス値がそのままブレークポイントを一意に識別します。
pub struct BreakpointTable {
    breakpoints: HashMap<u64, SoftwareBreakpoint>,
}

impl BreakpointTable {
    /// 新しいブレークポイント表を作成する
    pub fn new() -> Self {
        Self {
            breakpoints: HashMap::new(),
        }
    }

    /// 指定アドレスにブレークポイントを設定して有効化する
    ///
    /// 既にエントリがある場合は何もしません。パッチ済みのアドレスを
    /// 再度読み取るとINT3を元のバイトとして保存してしまうため、既存の
    /// エントリと保存バイトには一切手を付けない方針です。
    pub fn set(&mut self, address: u64, memory: &Memory) -> Result<()> {
        if self.breakpoints.contains_key(&address) {
            return Ok(());
        }

        let mut breakpoint = SoftwareBreakpoint::new(address);
        breakpoint.enable(memory)?;
        self.breakpoints.insert(address, breakpoint);
        Ok(())
    }

    /// 指定アドレスのブレークポイントを取得する
    pub fn get(&self, address: u64) -> Option<&SoftwareBreakpoint> {
        self.breakpoints.get(&address)
    }

    /// 指定アドレスに有効なブレークポイントがあるか
    pub fn is_enabled_at(&self, address: u64) -> bool {
        self.breakpoints
            .get(&address)
            .map_or(false, SoftwareBreakpoint::is_enabled)
    }

    /// 指定アドレスのブレークポイントを無効化する
    ///
    /// エントリは表に残ります。
    pub fn disable_at(&mut self, address: u64, memory: &Memory) -> Result<()> {
        if let Some(breakpoint) = self.breakpoints.get_mut(&address) {
            breakpoint.disable(memory)?;
        }
        Ok(())
    }

    /// 指定アドレスのブレークポイントを再度有効化する
    pub fn enable_at(&mut self, address: u64, memory: &Memory) -> Result<()> {
        if let Some(breakpoint) = self.breakpoints.get_mut(&address) {
            breakpoint.enable(memory)?;
        }
        Ok(())
    }

    /// 登録されているブレークポイントの数を取得する
    pub fn count(&self) -> usize {
        self.breakpoints.len()
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::new()
    }
}
