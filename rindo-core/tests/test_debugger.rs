//! デバッガセッションの統合テスト
//!
//! 実際の子プロセス（/bin/true）に対して、ブレークポイントの設置と
//! ステップオーバーを含むcontinueの一連の流れを検証します。

use rindo_core::{Debugger, ProcessState, StopReason, TargetError};

const TARGET: &str = "/bin/true";

fn launch_target() -> Debugger {
    Debugger::launch(TARGET, &[]).expect("failed to launch /bin/true")
}

#[test]
fn test_launch_stops_before_first_instruction() {
    let debugger = launch_target();
    assert!(debugger.pid() > 0);
    assert_eq!(debugger.state(), ProcessState::Stopped);

    let pc = debugger.get_pc().expect("get_pc");
    assert_ne!(pc, 0);
}

#[test]
fn test_continue_without_breakpoints_runs_to_exit() {
    let mut debugger = launch_target();

    let reason = debugger.continue_execution().expect("continue");
    assert_eq!(reason, StopReason::Exited(0));
    assert_eq!(debugger.state(), ProcessState::Exited(0));
}

#[test]
fn test_operations_rejected_after_termination() {
    let mut debugger = launch_target();
    debugger.continue_execution().expect("continue to exit");

    let err = debugger.read_register("rax").expect_err("read after exit");
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::Terminated)
    ));

    let err = debugger.read_memory(0x40_0000).expect_err("read after exit");
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::Terminated)
    ));

    let err = debugger.set_breakpoint(0x40_0000).expect_err("set after exit");
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::Terminated)
    ));

    let err = debugger.continue_execution().expect_err("continue after exit");
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::Terminated)
    ));
}

#[test]
fn test_breakpoint_traps_then_steps_over_to_exit() {
    let mut debugger = launch_target();

    let entry = debugger.get_pc().expect("get_pc");
    debugger.set_breakpoint(entry).expect("set breakpoint");

    // 1回目のcontinue: パッチしたINT3を踏んでトラップする。
    // プログラムカウンタはブレークポイントの1バイト先を指す。
    let reason = debugger.continue_execution().expect("first continue");
    assert_eq!(reason, StopReason::Breakpoint);
    assert_eq!(debugger.get_pc().expect("pc after trap"), entry + 1);

    // 2回目のcontinue: 巻き戻して元の命令をステップ実行し、
    // トラップを再設置してから完走する。
    let reason = debugger.continue_execution().expect("second continue");
    assert_eq!(reason, StopReason::Exited(0));
    assert_eq!(debugger.state(), ProcessState::Exited(0));
}

#[test]
fn test_breakpoint_defers_output_until_resumed() {
    // /bin/echo はエントリポイント到達後に出力する。エントリ到達前の
    // 停止位置にブレークポイントを置くと、出力前にトラップし、
    // もう一度continueすると完走する。
    let mut debugger =
        Debugger::launch("/bin/echo", &["hello".to_string()]).expect("failed to launch /bin/echo");

    let entry = debugger.get_pc().expect("get_pc");
    debugger.set_breakpoint(entry).expect("set breakpoint");

    let reason = debugger.continue_execution().expect("first continue");
    assert_eq!(reason, StopReason::Breakpoint);
    assert_eq!(debugger.state(), ProcessState::Stopped);

    let reason = debugger.continue_execution().expect("second continue");
    assert_eq!(reason, StopReason::Exited(0));
}

#[test]
fn test_breakpoint_set_twice_is_noop() {
    let mut debugger = launch_target();

    let entry = debugger.get_pc().expect("get_pc");
    let original = debugger.read_memory(entry).expect("read original word");

    debugger.set_breakpoint(entry).expect("first set");
    debugger.set_breakpoint(entry).expect("second set");

    assert_eq!(debugger.breakpoints().count(), 1);

    // 保存バイトは1回目の呼び出しで取得した値のまま
    let breakpoint = debugger.breakpoints().get(entry).expect("entry registered");
    assert_eq!(breakpoint.saved_byte(), Some((original & 0xff) as u8));
    assert!(breakpoint.is_enabled());

    // メモリ上はトラップが入ったまま
    let patched = debugger.read_memory(entry).expect("read patched word");
    assert_eq!(patched & 0xff, 0xcc);
}

#[test]
fn test_register_write_then_read() {
    let debugger = launch_target();

    debugger.write_register("rax", 0x42).expect("write rax");
    assert_eq!(debugger.read_register("rax").expect("read rax"), 0x42);
}

#[test]
fn test_register_dump_covers_all_descriptors() {
    let debugger = launch_target();

    let dump = debugger.dump_registers().expect("dump");
    assert_eq!(dump.len(), 27);

    let rip = dump
        .iter()
        .find(|(descriptor, _)| descriptor.name == "rip")
        .expect("rip in dump");
    assert_eq!(rip.1, debugger.get_pc().expect("get_pc"));
}

#[test]
fn test_unknown_register_is_reported_and_session_continues() {
    let debugger = launch_target();

    let err = debugger.read_register("xyz").expect_err("unknown register");
    assert!(matches!(
        err.downcast_ref::<TargetError>(),
        Some(TargetError::UnknownRegister { .. })
    ));

    // セッションは生きたまま
    assert!(debugger.read_register("rax").is_ok());
}

#[test]
fn test_memory_round_trip_via_debugger() {
    let debugger = launch_target();

    let entry = debugger.get_pc().expect("get_pc");
    let original = debugger.read_memory(entry).expect("read original");

    debugger
        .write_memory(entry, 0xfeed_face_cafe_beef)
        .expect("write");
    assert_eq!(
        debugger.read_memory(entry).expect("read back"),
        0xfeed_face_cafe_beef
    );

    debugger.write_memory(entry, original).expect("restore");
    assert_eq!(debugger.read_memory(entry).expect("read restored"), original);
}
