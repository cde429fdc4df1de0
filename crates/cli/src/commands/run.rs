//! `flowforge run -- <cmd> [args…]`: supervise a command with the full
//! control plane embedded in-process.

use flowforge_core::WorkerStatus;
use flowforge_daemon::app::App;
use flowforge_daemon::config::Config;
use flowforge_daemon::lifecycle::{CommandCtx, RunSpec};
use flowforge_supervisor::SignalTrap;
use std::path::PathBuf;

/// Exit code when policy killed the run.
pub const EXIT_POLICY_KILL: i32 = 10;
/// Exit code when a safety limit ended the run.
pub const EXIT_SAFETY_LIMIT: i32 = 11;
/// Exit code when the control plane failed to come up healthy.
pub const EXIT_UNHEALTHY: i32 = 12;

pub async fn run(command: Vec<String>) -> i32 {
    super::setup_logging();
    super::default_plaintext_policy();

    let Some((program, args)) = command.split_first() else {
        eprintln!("error: no command given; usage: flowforge run -- <cmd> [args…]");
        return 2;
    };
    let spec = RunSpec {
        command: program.clone(),
        args: args.to_vec(),
        working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_UNHEALTHY;
        }
    };
    if std::fs::create_dir_all(&config.state_dir).is_err() {
        eprintln!("error: cannot create state dir {}", config.state_dir.display());
        return EXIT_UNHEALTHY;
    }

    let bind_addr = config.bind_addr();
    let stop_timeout = config.stop_timeout;
    let app = match App::build(config, spec) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return EXIT_UNHEALTHY;
        }
    };

    // Control plane rides along on the loopback port.
    let router = app.router();
    match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => {
            tracing::info!(addr = %bind_addr, "control plane listening");
            tokio::spawn(async move {
                let _ = axum::serve(listener, router).await;
            });
        }
        Err(e) => {
            tracing::warn!(addr = %bind_addr, error = %e, "control plane port unavailable, continuing without API");
        }
    }

    let decision = app
        .lifecycle
        .request_start(CommandCtx::internal("flowforge run"))
        .await;
    if decision.is_rejected() {
        eprintln!("error: could not start command: {decision:?}");
        app.shutdown().await;
        return EXIT_UNHEALTHY;
    }
    tracing::info!(pid = ?decision.pid, "supervising");

    // Cleanup on Ctrl-C / TERM is the trap's job; it tears the tree down
    // before the process unwinds.
    let trap = match SignalTrap::install(app.supervisor.clone(), stop_timeout, &[]) {
        Ok(trap) => Some(trap),
        Err(e) => {
            tracing::warn!(error = %e, "signal trap unavailable");
            None
        }
    };

    // Wait for the run to reach a terminal phase.
    let exit_code = wait_for_terminal(&app).await;

    if let Some(trap) = trap {
        trap.untrap();
    }
    app.shutdown().await;
    exit_code
}

async fn wait_for_terminal(app: &App) -> i32 {
    let mut exit_rx = app.supervisor.exit_receiver();
    loop {
        let state = app.state.process_state.lock().snapshot();
        if state.lifecycle.is_terminal() {
            return exit_code_for(&state.status, exit_rx.as_mut());
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if exit_rx.is_none() {
            exit_rx = app.supervisor.exit_receiver();
        }
    }
}

fn exit_code_for(
    status: &WorkerStatus,
    exit_rx: Option<&mut tokio::sync::watch::Receiver<Option<flowforge_supervisor::ChildExit>>>,
) -> i32 {
    match status {
        WorkerStatus::LoopDetected | WorkerStatus::WatchdogAlert => EXIT_POLICY_KILL,
        WorkerStatus::SafetyLimitExceeded => EXIT_SAFETY_LIMIT,
        WorkerStatus::UserTerminated => 130,
        WorkerStatus::CommandFailure | WorkerStatus::Failed => exit_rx
            .and_then(|rx| *rx.borrow())
            .and_then(|exit| exit.code)
            .filter(|code| *code != 0)
            .unwrap_or(1),
        _ => 0,
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
