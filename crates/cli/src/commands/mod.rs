//! CLI subcommands.

pub mod daemon;
pub mod demo;
pub mod run;

/// Stderr logging for foreground commands.
pub(crate) fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Opt into the plaintext ledger policy when no master key is configured.
/// The choice is explicit here and logged, so `run`/`demo` work out of the
/// box while the daemon still refuses an implicit downgrade.
pub(crate) fn default_plaintext_policy() {
    if std::env::var("FLOWFORGE_MASTER_KEY").is_err()
        && std::env::var("FLOWFORGE_ALLOW_PLAINTEXT").is_err()
    {
        tracing::warn!(
            "no FLOWFORGE_MASTER_KEY configured; ledger columns stored plaintext \
             (set the key to enable encryption at rest)"
        );
        std::env::set_var("FLOWFORGE_ALLOW_PLAINTEXT", "1");
    }
}
