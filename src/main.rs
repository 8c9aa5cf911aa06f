//! `honeypotd` — high-interaction honeypot dispatcher CLI entry point.
//!
//! Exit-code contract (spec.md §6) diverges from clap's defaults, so
//! argument parsing is driven through `try_parse()` with explicit
//! handling of each `ErrorKind` rather than `Cli::parse()`.

use std::net::Ipv4Addr;
use std::process::ExitCode;

use anyhow::Context;
use clap::{error::ErrorKind, Parser, Subcommand};
use tracing::error;

use honeypotd::cmd::{diagnostics, root};
use honeypotd::logging;

#[derive(Parser)]
#[command(name = "honeypotd", about = "High-interaction honeypot dispatcher", version, disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print version and exit
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: (),

    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,

    /// Path to the JSON configuration file
    #[arg(short = 'c', long, default_value = "config.json")]
    config: String,

    /// Override the global bind IPv4 address
    #[arg(long)]
    bind: Option<Ipv4Addr>,

    /// Override the global connection budget (must be >= 1)
    #[arg(long = "max-connections", value_parser = clap::value_parser!(u32).range(1..))]
    max_connections: Option<u32>,

    /// Pull every configured image even if locally present
    #[arg(long)]
    force_pull: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved config and check container-engine connectivity
    Diagnostics,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap exits 0 for --help/--version by default; spec.md §6
            // requires help -> exit 1, version -> exit 0, and any other
            // parse error (including an unknown argument) -> print help
            // and exit 1.
            return match e.kind() {
                ErrorKind::DisplayHelp => {
                    print!("{e}");
                    ExitCode::from(1)
                }
                ErrorKind::DisplayVersion => {
                    print!("{e}");
                    ExitCode::from(0)
                }
                // Unknown arguments, invalid IPv4 literals, non-positive
                // --max-connections, etc. all land here; clap's own error
                // already carries a usage line, so a plain eprint matches
                // both "unknown argument -> help" and "bad value -> error"
                // from spec.md §6 without re-deriving clap's formatting.
                _ => {
                    eprint!("{e}");
                    ExitCode::from(1)
                }
            };
        }
    };

    let runtime = match tokio::runtime::Runtime::new().context("failed to start async runtime") {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("honeypotd: {e:#}");
            return ExitCode::from(1);
        }
    };

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> ExitCode {
    logging::init(cli.debug);

    let result = match cli.command {
        Some(Commands::Diagnostics) => {
            diagnostics::run(diagnostics::DiagnosticsOptions {
                config_path: cli.config,
                bind: cli.bind,
                max_connections: cli.max_connections,
            })
            .await
        }
        None => {
            root::run(root::RunOptions {
                config_path: cli.config,
                bind: cli.bind,
                max_connections: cli.max_connections,
                force_pull: cli.force_pull,
            })
            .await
        }
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!(error = %e, "startup failure");
            ExitCode::from(1)
        }
    }
}
