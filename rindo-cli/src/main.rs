//! rindo CLI - コマンドラインインターフェース
//!
//! 対話的プロセスデバッガ rindo のREPLインターフェース

use anyhow::Result;
use clap::Parser;
use rindo_core::{Command, Debugger, StopReason};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// rindo - minimal interactive process debugger
#[derive(Parser)]
#[command(name = "rindo")]
#[command(version = "0.1.0")]
#[command(about = "Minimal interactive debugger for Linux processes", long_about = None)]
struct Cli {
    /// Path to the executable binary
    binary: String,

    /// Arguments to pass to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut debugger = Debugger::launch(&cli.binary, &cli.args)?;
    println!("Started debugging process {}", debugger.pid());
    println!("Type 'help' for available commands, 'quit' to exit.");

    run_repl(&mut debugger)?;

    Ok(())
}

/// REPLループを実行する
fn run_repl(debugger: &mut Debugger) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("rindo> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match Command::parse(line) {
                    Ok(command) => match handle_command(debugger, &command) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => eprintln!("Error: {}", e),
                    },
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// コマンドを実行する。falseを返したらREPLを終了する
fn handle_command(debugger: &mut Debugger, command: &Command) -> Result<bool> {
    match command {
        Command::Continue => handle_continue(debugger)?,
        Command::Break { address } => {
            debugger.set_breakpoint(*address)?;
            println!("Breakpoint set at 0x{:x}", address);
        }
        Command::RegisterDump => {
            // ワード幅に合わせた16桁のゼロ埋め16進数で表示する
            for (descriptor, value) in debugger.dump_registers()? {
                println!("{:<8} 0x{:016x}", descriptor.name, value);
            }
        }
        Command::RegisterRead { name } => {
            let value = debugger.read_register(name)?;
            println!("0x{:x}", value);
        }
        Command::RegisterWrite { name, value } => {
            debugger.write_register(name, *value)?;
        }
        Command::MemoryRead { address } => {
            let value = debugger.read_memory(*address)?;
            println!("0x{:x}", value);
        }
        Command::MemoryWrite { address, value } => {
            debugger.write_memory(*address, *value)?;
        }
        Command::Help => print_help(),
        Command::Quit => return Ok(false),
    }

    Ok(true)
}

/// Continueコマンドを処理する
fn handle_continue(debugger: &mut Debugger) -> Result<()> {
    let reason = debugger.continue_execution()?;

    match reason {
        StopReason::Breakpoint | StopReason::Step => {
            let pc = debugger.get_pc()?;
            println!("Stopped at 0x{:x}", pc);
        }
        StopReason::Signal(signal) => {
            println!("Received signal: {:?}", signal);
        }
        StopReason::Exited(code) => {
            println!("Process exited with code {}", code);
        }
        StopReason::Signaled(signal) => {
            println!("Process killed by signal: {:?}", signal);
        }
        StopReason::Other => {
            println!("Process stopped (unknown reason)");
        }
    }

    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!();
    println!("  continue                        - Continue execution");
    println!("  break <address>                 - Set breakpoint at address (hex)");
    println!("  register dump                   - Print all registers");
    println!("  register read <name>            - Print the value of a register");
    println!("  register write <name> <value>   - Set a register (hex)");
    println!("  memory read <address>           - Print the word at address (hex)");
    println!("  memory write <address> <value>  - Write a word at address (hex)");
    println!("  help                            - Show this help message");
    println!("  quit                            - Exit the debugger");
    println!();
    println!("Commands may be abbreviated to any prefix (e.g. 'c' for 'continue').");
    println!("Numeric arguments are always hexadecimal, with or without '0x'.");
}
