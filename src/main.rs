//! modelsh entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI arguments
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Build the shell, install built-ins, initialize services
//!   7. Run `-e` lines, a script, or the interactive console

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;

use modelsh::engine::{Console, Shell};
use modelsh::error::AppError;
use modelsh::{commands, config, logger, repl};

const USAGE: &str = "\
Usage: modelsh [OPTIONS] [SCRIPT]

Arguments:
  [SCRIPT]                   Run commands from a file, then exit

Options:
  -h, --help                 Print help
  -f, --config <PATH>        Path to configuration file (default: config/default.toml)
  -e, --execute <LINE>       Run a command line and exit (repeatable)
  -v, -vv, -vvv, -vvvv       Increase logging verbosity";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    execute: Vec<String>,
    script: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Help,
    Run(CliArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present. The file is optional.
    let _ = dotenvy::dotenv();

    let args = match parse_cli_args(std::env::args().skip(1)) {
        Ok(Cli::Run(args)) => args,
        Ok(Cli::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("error: {msg}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        name = %config.name,
        source = ?config.source,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        llm_provider = %config.llm.provider,
        "config loaded"
    );

    let shell = Shell::from_defaults(config.engine);
    commands::install(&shell, Console::stdout(), &config.llm.provider)?;
    shell.initialize()?;

    if !args.execute.is_empty() {
        for line in &args.execute {
            shell.run_line(line)?;
        }
        return Ok(());
    }

    if let Some(path) = &args.script {
        let source = std::fs::read_to_string(path)?;
        let executed = repl::run_script(&shell, &source)?;
        info!(script = %path.display(), executed, "script complete");
        return Ok(());
    }

    // Ctrl-C cancels the token; the console watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            ctrlc_token.cancel();
        }
    });

    let exit = repl::run_interactive(&shell, &config.prompt, shutdown).await?;
    info!(?exit, "console closed");
    println!();
    Ok(())
}

fn parse_cli_args<I>(args: I) -> Result<Cli, String>
where
    I: IntoIterator<Item = String>,
{
    let mut verbosity = 0u8;
    let mut parsed = CliArgs::default();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Cli::Help),
            "-f" | "--config" => {
                let path = iter.next().ok_or("-f/--config requires a path argument")?;
                parsed.config_path = Some(path);
            }
            "-e" | "--execute" => {
                let line = iter.next().ok_or("-e/--execute requires a command line")?;
                parsed.execute.push(line);
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            a if a.starts_with('-') && a.len() > 1 => {
                return Err(format!("unknown option: {a}"));
            }
            _ => {
                if parsed.script.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                parsed.script = Some(PathBuf::from(arg));
            }
        }
    }

    // Each -v raises verbosity one tier:
    //   -v      → warn
    //   -vv     → info
    //   -vvv    → debug
    //   -vvvv+  → trace
    parsed.log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    Ok(Cli::Run(parsed))
}
