use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

use avm::diagnostic::{ansi::AnsiRenderer, json, registry, Diagnostic};
use avm::loader::ConstantPool;
use avm::stack::DEFAULT_STACK_SIZE;
use avm::vm::{MissingKeyPolicy, Vm, VmConfig};

#[derive(Parser)]
#[command(name = "avm", version, about = "Run a compiled AVM program")]
struct Cli {
    /// Program file produced by the compiler
    #[arg(required_unless_present = "explain")]
    program: Option<PathBuf>,

    /// Print fatal diagnostics as one-line JSON (and --dump output as JSON)
    #[arg(long)]
    json: bool,

    /// Print the loaded constants and instructions before running
    #[arg(long)]
    dump: bool,

    /// Number of cells in the execution stack
    #[arg(long, default_value_t = DEFAULT_STACK_SIZE)]
    stack_size: usize,

    /// Read missing table keys as nil instead of aborting
    #[arg(long)]
    lenient_keys: bool,

    /// Log every executed instruction (overridden by AVM_LOG)
    #[arg(long)]
    trace: bool,

    /// Explain an error code, e.g. AVM-R003
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    init_tracing(cli.trace);

    if let Some(code) = &cli.explain {
        return explain(code);
    }

    let Some(path) = &cli.program else {
        return report(&cli, Diagnostic::error("missing program file"));
    };

    let pool = match ConstantPool::load_file(path) {
        Ok(pool) => pool,
        Err(e) => return report(&cli, Diagnostic::from(&e)),
    };

    if cli.dump {
        if cli.json {
            match serde_json::to_string_pretty(&pool) {
                Ok(json) => println!("{json}"),
                Err(e) => return report(&cli, Diagnostic::error(format!("cannot serialize program: {e}"))),
            }
        } else {
            println!("{pool}");
        }
    }

    let config = VmConfig {
        stack_size: cli.stack_size,
        missing_key: if cli.lenient_keys { MissingKeyPolicy::Nil } else { MissingKeyPolicy::Fatal },
    };
    let mut vm = match Vm::new(&pool, config) {
        Ok(vm) => vm,
        Err(e) => return report(&cli, Diagnostic::from(&e)),
    };

    match vm.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&cli, Diagnostic::from(&e)),
    }
}

fn init_tracing(trace: bool) {
    let default = if trace { "avm=trace" } else { "warn" };
    let filter = EnvFilter::try_from_env("AVM_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn explain(code: &str) -> ExitCode {
    match registry::lookup(code) {
        Some(entry) => {
            print!("{}", entry.long);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("unknown error code '{code}'; known codes:");
            for entry in registry::REGISTRY {
                eprintln!("  {:<10}{}", entry.code, entry.short);
            }
            ExitCode::FAILURE
        }
    }
}

fn report(cli: &Cli, d: Diagnostic) -> ExitCode {
    if cli.json {
        eprintln!("{}", json::render(&d));
    } else {
        let renderer = AnsiRenderer { use_color: std::io::stderr().is_terminal() };
        eprint!("{}", renderer.render(&d));
    }
    ExitCode::FAILURE
}
