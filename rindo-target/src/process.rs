//! プロセス制御機能

use std::ffi::CString;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::personality::{self, Persona};
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execv, fork, ForkResult, Pid};

use crate::errors::TargetError;
use crate::Result;

/// 停止イベントの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// ブレークポイントヒット（SIGTRAP）
    Breakpoint,
    /// ステップ実行完了（SIGTRAP）
    Step,
    /// シグナル受信による停止
    Signal(Signal),
    /// 正常終了
    Exited(i32),
    /// シグナルによる強制終了
    Signaled(Signal),
    /// その他の停止
    Other,
}

/// トレーサ側から見たプロセスの状態
///
/// 再開要求からwaitイベントまでの間だけ`Running`になり、waitイベントごとに
/// 遷移します。終了後の状態から戻ることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// waitイベントで停止中
    Stopped,
    /// 再開済みで次のwaitイベント待ち
    Running,
    /// 正常終了した
    Exited(i32),
    /// シグナルで終了した
    Signaled(Signal),
}

/// デバッグ対象のプロセス
///
/// 1つのデバッグセッションが排他的に所有し、制御要求は常に1つずつ発行して
/// 対応するwaitイベントまでブロックします。
pub struct Process {
    pid: Pid,
    state: ProcessState,
}

impl Process {
    /// 実行可能ファイルを起動してデバッグ対象プロセスを開始する
    ///
    /// 新しいプロセスをforkし、子プロセス側でPTRACE_TRACEMEとASLR無効化を
    /// 設定してからexecvでイメージを置き換えます。ASLRを無効にするのは、
    /// 観測したアドレスを実行をまたいで安定させるためです。
    /// 親プロセスは最初のwaitイベント（execv直後のSIGTRAP停止）まで待機
    /// してから返るので、返った時点でコマンドを受け付けられます。
    pub fn spawn<P: AsRef<Path>>(program: P, args: &[String]) -> Result<Self> {
        let path = program.as_ref().display().to_string();
        let launch = |source: Errno| TargetError::Launch {
            path: path.clone(),
            source,
        };

        let program_cstring =
            CString::new(path.as_str()).map_err(|_| launch(Errno::EINVAL))?;
        let mut cstring_args = vec![program_cstring.clone()];
        for arg in args {
            cstring_args.push(CString::new(arg.as_str()).map_err(|_| launch(Errno::EINVAL))?);
        }

        match unsafe { fork() }.map_err(launch)? {
            ForkResult::Parent { child } => {
                // 子プロセスがexecv後に停止するまで待機
                match waitpid(child, None).map_err(launch)? {
                    WaitStatus::Stopped(_, _) => Ok(Self {
                        pid: child,
                        state: ProcessState::Stopped,
                    }),
                    status => Err(TargetError::Handshake {
                        status: format!("{:?}", status),
                    }),
                }
            }
            ForkResult::Child => {
                // 子プロセス: トレース許可とASLR無効化を設定してからexecv。
                // 失敗してもトレーサ側のコードには戻れないので、そのまま
                // 終了する。親はハンドシェイクで終了イベントを観測する。
                if ptrace::traceme().is_err() {
                    std::process::exit(127);
                }
                let _ = personality::set(Persona::ADDR_NO_RANDOMIZE);
                let _ = execv(&program_cstring, &cstring_args);
                std::process::exit(127);
            }
        }
    }

    /// プロセスIDを取得する
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// 現在のプロセス状態を取得する
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// プロセスが停止中かどうか
    pub fn is_stopped(&self) -> bool {
        self.state == ProcessState::Stopped
    }

    /// プロセスが終了済みかどうか
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.state,
            ProcessState::Exited(_) | ProcessState::Signaled(_)
        )
    }

    /// 制御要求を受け付けられる状態であることを確認する
    pub fn ensure_stopped(&self) -> Result<()> {
        match self.state {
            ProcessState::Stopped => Ok(()),
            ProcessState::Running => Err(TargetError::NotStopped),
            ProcessState::Exited(_) | ProcessState::Signaled(_) => Err(TargetError::Terminated),
        }
    }

    /// プロセスを実行継続して次の停止イベントを待機する
    pub fn resume_and_wait(&mut self) -> Result<StopReason> {
        self.ensure_stopped()?;
        ptrace::cont(self.pid, None)?;
        self.state = ProcessState::Running;
        self.wait_event(false)
    }

    /// 1命令だけ実行して次の停止イベントを待機する
    ///
    /// 対応するwaitイベントが届くまでブロックします。タイムアウトや
    /// キャンセルはありません。
    pub fn step_and_wait(&mut self) -> Result<StopReason> {
        self.ensure_stopped()?;
        ptrace::step(self.pid, None)?;
        self.state = ProcessState::Running;
        self.wait_event(true)
    }

    /// waitイベントを待機して状態を更新する
    fn wait_event(&mut self, stepping: bool) -> Result<StopReason> {
        let status = waitpid(self.pid, None)?;

        let reason = match status {
            WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                if stepping {
                    StopReason::Step
                } else {
                    StopReason::Breakpoint
                }
            }
            WaitStatus::Stopped(_, signal) => StopReason::Signal(signal),
            WaitStatus::Exited(_, code) => StopReason::Exited(code),
            WaitStatus::Signaled(_, signal, _) => StopReason::Signaled(signal),
            _ => StopReason::Other,
        };

        self.state = match reason {
            StopReason::Exited(code) => ProcessState::Exited(code),
            StopReason::Signaled(signal) => ProcessState::Signaled(signal),
            _ => ProcessState::Stopped,
        };

        Ok(reason)
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // 生きているトレース対象を残さない。パッチ済みのINT3は復元しない
        // 方針なので、デタッチではなく終了させる。
        if !self.is_terminated() {
            let _ = nix::sys::signal::kill(self.pid, Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
        }
    }
}
