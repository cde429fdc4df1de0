//! `flowforge daemon` - background daemon management.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use flowforge_daemon::config::Config;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start,
    /// Stop the daemon
    Stop,
    /// Check daemon status
    Status {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },
    /// View daemon logs
    Logs {
        /// Number of recent lines to show (default: 200)
        #[arg(short = 'n', long, default_value = "200")]
        limit: usize,
    },
}

pub async fn daemon(args: DaemonArgs) -> Result<i32> {
    super::default_plaintext_policy();
    let config = Config::load()?;
    match args.command {
        DaemonCommand::Start => start(&config).await,
        DaemonCommand::Stop => stop(&config),
        DaemonCommand::Status { json } => status(&config, json).await,
        DaemonCommand::Logs { limit } => logs(&config, limit),
    }
}

fn read_pid(config: &Config) -> Option<u32> {
    std::fs::read_to_string(&config.pid_path)
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn pid_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

async fn api_healthy(config: &Config) -> bool {
    let url = format!("http://{}/healthz", config.bind_addr());
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build();
    match client {
        Ok(client) => matches!(client.get(&url).send().await, Ok(r) if r.status().is_success()),
        Err(_) => false,
    }
}

async fn start(config: &Config) -> Result<i32> {
    if let Some(pid) = read_pid(config) {
        if pid_alive(pid) {
            println!("Daemon already running (pid {pid})");
            return Ok(0);
        }
    }
    std::fs::create_dir_all(&config.state_dir)?;

    let binary = find_daemon_binary()?;
    Command::new(&binary)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| anyhow!("failed to spawn {}: {e}", binary.display()))?;

    // Wait for the control plane to come up.
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if api_healthy(config).await {
            println!("Daemon started");
            return Ok(0);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(anyhow!(
        "daemon did not become healthy; check {}",
        config.log_path.display()
    ))
}

fn stop(config: &Config) -> Result<i32> {
    let Some(pid) = read_pid(config) else {
        println!("Daemon not running");
        return Ok(0);
    };
    if !pid_alive(pid) {
        println!("Daemon not running (stale pid file)");
        let _ = std::fs::remove_file(&config.pid_path);
        return Ok(0);
    }

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGTERM,
    )
    .map_err(|e| anyhow!("failed to signal pid {pid}: {e}"))?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            println!("Daemon stopped");
            return Ok(0);
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Err(anyhow!("daemon (pid {pid}) did not exit within 10s"))
}

async fn status(config: &Config, json: bool) -> Result<i32> {
    let pid = read_pid(config);
    let running = pid.is_some_and(pid_alive);
    let healthy = running && api_healthy(config).await;
    let state_present = config.db_path.exists();
    let started_at = started_at_from_log(&config.log_path);

    let obj = serde_json::json!({
        "status": if running { "running" } else { "stopped" },
        "pid": pid,
        "api_healthy": healthy,
        "port": config.port,
        "runtime_dir": config.state_dir.display().to_string(),
        "pid_file": config.pid_path.display().to_string(),
        "log_file": config.log_path.display().to_string(),
        "state_present": state_present,
        "started_at": started_at,
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&obj)?);
    } else if running {
        println!("Status: running");
        if let Some(pid) = pid {
            println!("Pid: {pid}");
        }
        println!("API healthy: {healthy}");
        println!("Port: {}", config.port);
        println!("Runtime dir: {}", config.state_dir.display());
    } else {
        println!("Daemon not running");
    }

    // non-zero when the daemon is up but failing health
    if running && !healthy {
        return Ok(super::run::EXIT_UNHEALTHY);
    }
    Ok(0)
}

fn logs(config: &Config, limit: usize) -> Result<i32> {
    if !config.log_path.exists() {
        println!("No log file found at {}", config.log_path.display());
        return Ok(0);
    }
    let content = read_last_lines(&config.log_path, limit)?;
    println!("{content}");
    Ok(0)
}

/// Most recent startup marker timestamp in the log, if any.
fn started_at_from_log(log_path: &std::path::Path) -> Option<String> {
    let content = std::fs::read_to_string(log_path).ok()?;
    // tracing lines start with an RFC 3339 timestamp; take the first line
    // after the last startup marker
    let marker_pos = content.rfind("--- flowforged: starting")?;
    content[marker_pos..]
        .lines()
        .filter(|l| !l.starts_with("---") && !l.is_empty())
        .find_map(|l| l.split_whitespace().next())
        .filter(|ts| ts.contains('T'))
        .map(|ts| ts.to_string())
}

fn read_last_lines(path: &std::path::Path, n: usize) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let lines: Vec<String> = BufReader::new(file).lines().collect::<std::io::Result<_>>()?;
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}

fn find_daemon_binary() -> Result<PathBuf> {
    // Prefer a sibling of the current executable (release installs and
    // cargo target dirs both lay binaries out side by side).
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("flowforged");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    // Fall back to PATH lookup
    Ok(PathBuf::from("flowforged"))
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
