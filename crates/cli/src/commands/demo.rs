//! `flowforge demo`: self-contained runaway/recovery demo. Spawn a tight
//! loop, watch policy kill it, show the incident and verify its decision
//! trace.

use flowforge_daemon::app::App;
use flowforge_daemon::config::Config;
use flowforge_daemon::lifecycle::{CommandCtx, RunSpec};
use flowforge_ledger::TraceFilter;
use std::time::{Duration, Instant};

/// How long the demo waits for the policy engine to act.
const DEMO_DEADLINE: Duration = Duration::from_secs(60);

pub async fn demo() -> i32 {
    super::setup_logging();
    super::default_plaintext_policy();

    // Demo state is disposable and isolated from any real installation.
    let state_dir = std::env::temp_dir().join(format!("flowforge-demo-{}", std::process::id()));
    if std::fs::create_dir_all(&state_dir).is_err() {
        eprintln!("error: cannot create demo state dir");
        return 1;
    }
    std::env::set_var("FLOWFORGE_STATE_DIR", &state_dir);
    // Aggressive thresholds so the runaway is caught within seconds.
    std::env::set_var("FLOWFORGE_MAX_CPU_PERCENT", "5");
    std::env::set_var("FLOWFORGE_CPU_WINDOW_SECS", "2");
    std::env::set_var("FLOWFORGE_MONITOR_INTERVAL_MS", "250");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    println!("flowforge demo: supervising a runaway loop");
    println!("  the child prints the same line forever while burning CPU;");
    println!("  the policy engine should KILL it within a few seconds.\n");

    let spec = RunSpec {
        command: "sh".into(),
        args: vec![
            "-c".into(),
            "while true; do echo 'processing request 4242 failed, retrying endlessly'; done"
                .into(),
        ],
        working_dir: std::env::temp_dir(),
    };
    let app = match App::build(config, spec) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let decision = app
        .lifecycle
        .request_start(CommandCtx::internal("demo"))
        .await;
    println!("child started (pid {:?})", decision.pid);

    let deadline = Instant::now() + DEMO_DEADLINE;
    let incident = loop {
        if Instant::now() > deadline {
            eprintln!("demo timed out waiting for the policy engine");
            app.shutdown().await;
            return 1;
        }
        match app.state.ledger.list_incidents(Some(1), 0) {
            Ok(mut page) if !page.items.is_empty() => break page.items.remove(0),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    };

    println!("\nincident recorded:");
    println!("  incident_id: {}", incident.incident_id);
    println!("  exit_reason: {}", incident.exit_reason);
    println!("  reason:      {}", incident.reason);
    println!("  cpu_score:   {:.1}", incident.cpu_score);
    println!("  confidence:  {:.1}", incident.confidence_score);

    match app
        .state
        .ledger
        .recent_decision_traces(1, &TraceFilter::default())
    {
        Ok(traces) if !traces.is_empty() => {
            let verdict = flowforge_policy::verify(&traces[0]);
            println!("\ndecision trace {}:", traces[0].id);
            println!("  decision:      {}", traces[0].decision);
            println!("  replay digest: {}…", flowforge_core::short(&traces[0].replay_digest, 16));
            println!("  verification:  {}", verdict.as_str());
        }
        _ => println!("\nno decision trace recorded"),
    }

    app.shutdown().await;
    let _ = std::fs::remove_dir_all(&state_dir);
    println!("\ndemo complete: runaway detected, killed, and audited.");
    0
}
