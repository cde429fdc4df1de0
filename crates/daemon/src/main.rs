//! FlowForge daemon (flowforged)
//!
//! Background process that owns the supervisor, monitor and HTTP control
//! plane. Typically started by the `flowforge` CLI.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use flowforge_daemon::app::App;
use flowforge_daemon::config::{Config, ConfigError};
use flowforge_daemon::lifecycle::{CommandCtx, RunSpec};
use fs2::FileExt;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("flowforged {}", flowforge_daemon::env::VERSION);
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("flowforged {}", flowforge_daemon::env::VERSION);
                println!("FlowForge daemon - supervises a workload and serves the control plane");
                println!();
                println!("USAGE:");
                println!("    flowforged");
                println!();
                println!("The daemon is typically started by the `flowforge` CLI and should");
                println!("not be invoked directly. It binds the HTTP control plane on");
                println!("127.0.0.1 and reads its configuration from FLOWFORGE_* variables.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: flowforged [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    std::fs::create_dir_all(&config.state_dir)?;

    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    // Single-instance guard: an advisory lock on the lock file.
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        let pid = std::fs::read_to_string(&config.pid_path).unwrap_or_default();
        eprintln!("flowforged is already running");
        if !pid.trim().is_empty() {
            eprintln!("  pid: {}", pid.trim());
        }
        std::process::exit(1);
    }
    std::fs::write(&config.pid_path, std::process::id().to_string())?;

    info!(version = flowforge_daemon::env::VERSION, "starting daemon");

    let spec = run_spec_from_env();
    let autostart = !spec.command.is_empty();
    let bind_addr = config.bind_addr();
    let app = match App::build(config.clone(), spec) {
        Ok(app) => app,
        Err(e) => {
            write_startup_error(&config, &e.to_string());
            error!(error = %e, "failed to build control plane");
            return Err(e.into());
        }
    };

    if autostart {
        let decision = app
            .lifecycle
            .request_start(CommandCtx::internal("daemon autostart"))
            .await;
        info!(?decision, "autostart requested");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "control plane listening");

    // Signal ready for the CLI waiting on startup.
    println!("READY");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let router = app
        .router()
        .into_make_service_with_connect_info::<std::net::SocketAddr>();
    let server = axum::serve(listener, router);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    app.shutdown().await;
    let _ = std::fs::remove_file(&config.pid_path);
    info!("daemon stopped");
    Ok(())
}

/// The supervised command, from `FLOWFORGE_RUN_COMMAND` (whitespace-split).
fn run_spec_from_env() -> RunSpec {
    let raw = std::env::var("FLOWFORGE_RUN_COMMAND").unwrap_or_default();
    let mut parts = raw.split_whitespace().map(|s| s.to_string());
    let command = parts.next().unwrap_or_default();
    RunSpec {
        command,
        args: parts.collect(),
        working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Shift `daemon.log` → `.1` → `.2` → `.3`, deleting the oldest.
/// Best-effort: rotation failures do not block startup.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }
    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix; the CLI scans for it to find the current attempt.
const STARTUP_MARKER_PREFIX: &str = "--- flowforged: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), ConfigError> {
    use std::io::Write;
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup error synchronously so the CLI can surface it even if the
/// process exits before the async appender flushes.
fn write_startup_error(config: &Config, error: &str) {
    use std::io::Write;
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, ConfigError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(ConfigError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(ConfigError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();
    Ok(guard)
}
