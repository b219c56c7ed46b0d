//! デバッガのメインロジック

use std::path::Path;

use tracing::debug;

use rindo_target::registers::{self, RegisterDescriptor};
use rindo_target::{Memory, Process, ProcessState, Registers, StopReason, TargetError};

use crate::breakpoint::BreakpointTable;
use crate::Result;

/// デバッガ
///
/// トレース対象プロセスと、それに対するレジスタ・メモリ・ブレークポイント
/// 操作を1つのセッションとして束ねます。制御要求はこのセッションだけが
/// 1つずつ直列に発行します。コマンド入力を並行化する場合でも、同一の
/// トレース対象への制御要求の直列化は崩せません。
pub struct Debugger {
    /// デバッグ対象プロセス
    process: Process,
    /// メモリアクセス
    memory: Memory,
    /// レジスタアクセス
    registers: Registers,
    /// ブレークポイント表
    breakpoints: BreakpointTable,
}

impl Debugger {
    /// 実行可能ファイルを起動してデバッグセッションを開始する
    ///
    /// プロセスはexecv直後の停止状態で返ります。ユーザーはブレークポイントを
    /// 設定してからcontinueで実行を開始できます。
    pub fn launch<P: AsRef<Path>>(program: P, args: &[String]) -> Result<Self> {
        let process = Process::spawn(program, args)?;
        let pid = process.pid();
        debug!("launched process {}", pid);

        Ok(Self {
            process,
            memory: Memory::new(pid),
            registers: Registers::new(pid),
            breakpoints: BreakpointTable::new(),
        })
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.process.pid()
    }

    /// 現在のプロセス状態を取得する
    pub fn state(&self) -> ProcessState {
        self.process.state()
    }

    /// ブレークポイント表への参照を取得する
    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// プロセスが終了していれば以降の操作を拒否する
    ///
    /// 終了したプロセスにはレジスタもメモリも存在しないため、新しい
    /// セッションを開始するまですべての操作を受け付けません。
    fn ensure_alive(&self) -> Result<()> {
        if self.process.is_terminated() {
            return Err(TargetError::Terminated.into());
        }
        Ok(())
    }

    /// ブレークポイントを設定する
    pub fn set_breakpoint(&mut self, address: u64) -> Result<()> {
        self.ensure_alive()?;
        self.breakpoints.set(address, &self.memory)
    }

    /// 名前で指定したレジスタの値を読み取る
    pub fn read_register(&self, name: &str) -> Result<u64> {
        self.ensure_alive()?;
        let descriptor = registers::lookup_by_name(name)?;
        Ok(self.registers.get(descriptor.reg)?)
    }

    /// 名前で指定したレジスタへ値を書き込む
    pub fn write_register(&self, name: &str, value: u64) -> Result<()> {
        self.ensure_alive()?;
        let descriptor = registers::lookup_by_name(name)?;
        self.registers.set(descriptor.reg, value)?;
        Ok(())
    }

    /// 全レジスタを記述子テーブル順の(記述子, 値)の組で取得する
    pub fn dump_registers(&self) -> Result<Vec<(&'static RegisterDescriptor, u64)>> {
        self.ensure_alive()?;
        let regs = self.registers.read_all()?;
        Ok(registers::snapshot_values(&regs))
    }

    /// プログラムカウンタを取得する
    pub fn get_pc(&self) -> Result<u64> {
        self.ensure_alive()?;
        Ok(self.registers.get_pc()?)
    }

    /// メモリから1ワード読み取る
    pub fn read_memory(&self, address: u64) -> Result<u64> {
        self.ensure_alive()?;
        Ok(self.memory.read_word(address)?)
    }

    /// メモリへ1ワード書き込む
    pub fn write_memory(&self, address: u64, value: u64) -> Result<()> {
        self.ensure_alive()?;
        self.memory.write_word(address, value)?;
        Ok(())
    }

    /// プロセスを実行継続して次の停止イベントを待機する
    ///
    /// プログラムカウンタの直前にパッチ済みブレークポイントがあれば、
    /// まず元の命令を1命令だけ実行（ステップオーバー）してから全体の
    /// 実行を再開します。ブレークポイントがなければそのまま再開します。
    pub fn continue_execution(&mut self) -> Result<StopReason> {
        self.ensure_alive()?;

        if let Some(reason) = self.step_over_breakpoint()? {
            // ステップ中にプロセスが終了した
            return Ok(reason);
        }

        let reason = self.process.resume_and_wait()?;
        debug!("continue stopped: {:?}", reason);
        Ok(reason)
    }

    /// プログラムカウンタ直前のブレークポイントをステップオーバーする
    ///
    /// INT3の実行でトラップした直後、プログラムカウンタはブレークポイント
    /// アドレスの1バイト先を指しています。その位置に有効なブレークポイントが
    /// あればプログラムカウンタを巻き戻し、元のバイトを復元して1命令だけ
    /// 実行し、トラップを再設置します。
    ///
    /// ステップ中にプロセスが終了した場合はその停止理由を返します。
    /// 終了後はレジスタにもメモリにもアクセスできないため、トラップの
    /// 再設置は行いません。
    fn step_over_breakpoint(&mut self) -> Result<Option<StopReason>> {
        let pc = self.registers.get_pc()?;
        let candidate = pc.wrapping_sub(1);
        if !self.breakpoints.is_enabled_at(candidate) {
            return Ok(None);
        }

        debug!("stepping over breakpoint at 0x{:x}", candidate);

        self.registers.set_pc(candidate)?;
        self.breakpoints.disable_at(candidate, &self.memory)?;

        let reason = self.process.step_and_wait()?;
        if self.process.is_terminated() {
            debug!("process terminated during step-over: {:?}", reason);
            return Ok(Some(reason));
        }

        self.breakpoints.enable_at(candidate, &self.memory)?;
        Ok(None)
    }
}
