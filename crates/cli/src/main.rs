//! `flowforge` - supervise long-running AI and automation jobs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flowforge", version, about = "Local-first execution control plane")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Supervise a command until it completes or policy intervenes
    Run {
        /// The command to supervise (everything after `--`)
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Run a self-contained runaway/recovery demo
    Demo,
    /// Manage a background daemon instance
    Daemon(commands::daemon::DaemonArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run { command } => commands::run::run(command).await,
        Command::Demo => commands::demo::demo().await,
        Command::Daemon(args) => match commands::daemon::daemon(args).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },
    };
    std::process::exit(code);
}
