//! Process entrypoint (§6): parse CLI flags, load configuration, install
//! logging, assemble the component graph, and run the Connection Host
//! until shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use ulsp_daemon::config::Config;
use ulsp_daemon::{logging, net, Daemon};

const HELP: &str = "\
ulsp-daemon: a long-lived local multiplexing LSP host.

USAGE:
    ulsp-daemon [OPTIONS]

OPTIONS:
    --config <dir>   Prepend <dir> to the ULSP_CONFIG_DIR search path
    --version        Print the daemon's version and exit
    --help           Print this message and exit
";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(code) = apply_cli_args(&args) {
        return code;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> ExitCode {
    let (daemon, shutdown_rx) = match Daemon::new(config) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "failed to assemble daemon component graph");
            return ExitCode::FAILURE;
        }
    };

    match net::serve(Arc::new(daemon), shutdown_rx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "connection host exited with an error");
            ExitCode::FAILURE
        }
    }
}

/// Apply recognized flags by setting process environment variables
/// `Config::load` already knows how to read. Returns `Err(code)` for flags
/// that should end the process immediately (`--help`, `--version`, or a
/// parse error).
fn apply_cli_args(args: &[String]) -> Result<(), ExitCode> {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print!("{HELP}");
                return Err(ExitCode::SUCCESS);
            }
            "--version" => {
                println!("ulsp-daemon {}", env!("CARGO_PKG_VERSION"));
                return Err(ExitCode::SUCCESS);
            }
            "--config" => {
                let Some(dir) = args.get(i + 1) else {
                    eprintln!("--config requires a directory argument");
                    return Err(ExitCode::FAILURE);
                };
                let search_path = match std::env::var("ULSP_CONFIG_DIR") {
                    Ok(existing) => format!("{dir}:{existing}"),
                    Err(_) => dir.clone(),
                };
                std::env::set_var("ULSP_CONFIG_DIR", search_path);
                i += 2;
            }
            other => {
                eprintln!("unrecognized argument: {other}");
                return Err(ExitCode::FAILURE);
            }
        }
    }
    Ok(())
}
