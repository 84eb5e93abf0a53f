// pausa - Run, suspend and resume pausa scripts
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use pausa_embed::{Engine, Error, RunState, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pausa", version, about = "Run, suspend and resume pausa scripts")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script. With `--snapshot`, the first suspension saves the VM
    /// there and exits; otherwise suspensions resume with `None`.
    Run {
        file: PathBuf,
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Resume a saved VM, optionally providing the suspension's value.
    Resume {
        snapshot: PathBuf,
        /// Parsed as an int, then a float, otherwise passed as a string.
        #[arg(long)]
        value: Option<String>,
    },
    /// Print a script's compiled bytecode.
    Disasm { file: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Command::Run {
            file,
            snapshot,
            max_depth,
        } => cmd_run(&file, snapshot.as_deref(), max_depth),
        Command::Resume { snapshot, value } => cmd_resume(&snapshot, value.as_deref()),
        Command::Disasm { file } => cmd_disasm(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn read_source(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("reading '{}': {}", path.display(), e))
}

fn cmd_run(file: &Path, snapshot: Option<&Path>, max_depth: Option<usize>) -> Result<(), String> {
    let source = read_source(file)?;
    let mut engine = Engine::new();
    if let Some(depth) = max_depth {
        engine.set_max_depth(depth);
    }
    engine
        .load(&source)
        .map_err(|e| format!("in '{}': {}", file.display(), e))?;
    drive(&mut engine, snapshot)
}

fn cmd_resume(snapshot: &Path, value: Option<&str>) -> Result<(), String> {
    let bytes =
        fs::read(snapshot).map_err(|e| format!("reading '{}': {}", snapshot.display(), e))?;
    let mut engine = Engine::new();
    engine.restore(&bytes).map_err(|e| e.to_string())?;
    for name in engine.missing_natives() {
        eprintln!("warning: native '{}' is not available", name);
    }
    if let Some(text) = value {
        engine
            .provide(parse_value(text))
            .map_err(|e| e.to_string())?;
    }
    info!(path = %snapshot.display(), "resuming");
    drive(&mut engine, Some(snapshot))
}

fn cmd_disasm(file: &Path) -> Result<(), String> {
    let source = read_source(file)?;
    let function = Engine::new_bare()
        .compile(&source)
        .map_err(|e| format!("in '{}': {}", file.display(), e))?;
    print!("{}", function.disassemble());
    Ok(())
}

/// Run until the script finishes, or until it suspends when a snapshot
/// path is given.
fn drive(engine: &mut Engine, snapshot: Option<&Path>) -> Result<(), String> {
    loop {
        let state = engine.run_until_suspend();
        flush_output(engine);
        match state {
            Ok(RunState::Finished(value)) => {
                if value != Value::Nil {
                    println!("{}", value.repr());
                }
                return Ok(());
            }
            Ok(RunState::Suspended) => match snapshot {
                Some(path) => {
                    let bytes = engine.snapshot().map_err(|e| e.to_string())?;
                    fs::write(path, bytes)
                        .map_err(|e| format!("writing '{}': {}", path.display(), e))?;
                    println!("suspended; saved to {}", path.display());
                    return Ok(());
                }
                None => debug!("suspended; resuming with None"),
            },
            Err(Error::Runtime(e)) => {
                return Err(format!("line {}: {}", engine.vm().current_line(), e));
            }
            Err(e) => return Err(e.to_string()),
        }
    }
}

fn flush_output(engine: &mut Engine) {
    for line in engine.take_output() {
        println!("{}", line);
    }
}

fn parse_value(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = text.parse::<f64>() {
        Value::Float(f)
    } else {
        Value::Str(text.into())
    }
}
