//! Scoped signal trap: on interrupt/terminate (or extra user-defined
//! signals) tear the supervised tree down, then hand control back.

use crate::supervisor::Supervisor;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Installed trap. Dropping it (or calling [`SignalTrap::untrap`]) releases
/// the handler task; the underlying OS signal registration lives for the
/// process lifetime, which is how tokio's signal streams behave.
pub struct SignalTrap {
    cancel: CancellationToken,
    triggered_rx: watch::Receiver<bool>,
}

impl SignalTrap {
    /// Install a trap for SIGINT/SIGTERM plus any `extra` signals. On the
    /// first signal received, the supervised tree is stopped with `timeout`
    /// and the trap marks itself triggered.
    pub fn install(
        supervisor: Supervisor,
        timeout: Duration,
        extra: &[SignalKind],
    ) -> std::io::Result<Self> {
        let mut streams = vec![
            signal(SignalKind::interrupt())?,
            signal(SignalKind::terminate())?,
        ];
        for kind in extra {
            streams.push(signal(*kind)?);
        }

        let cancel = CancellationToken::new();
        let (triggered_tx, triggered_rx) = watch::channel(false);

        let token = cancel.clone();
        tokio::spawn(async move {
            let mut recvs: Vec<_> = streams
                .iter_mut()
                .map(|s| Box::pin(s.recv()))
                .collect();
            let any_signal = futures_select_all(&mut recvs);
            tokio::select! {
                _ = any_signal => {
                    tracing::info!("trap caught termination signal, stopping child tree");
                    if let Err(e) = supervisor.stop(timeout).await {
                        tracing::error!(error = %e, "trap teardown failed");
                    }
                    let _ = triggered_tx.send(true);
                }
                _ = token.cancelled() => {}
            }
        });

        Ok(Self { cancel, triggered_rx })
    }

    /// Whether a trapped signal has fired.
    pub fn triggered(&self) -> bool {
        *self.triggered_rx.borrow()
    }

    /// Wait until a trapped signal has fired and teardown completed.
    pub async fn wait_triggered(&mut self) {
        // Error means the sender task ended (untrap); treat as never-fires.
        let _ = self.triggered_rx.wait_for(|t| *t).await;
    }

    /// Release the trap without waiting for a signal.
    pub fn untrap(self) {
        self.cancel.cancel();
    }
}

impl Drop for SignalTrap {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Resolve when any of the signal futures resolves.
async fn futures_select_all<F>(futures: &mut [F])
where
    F: std::future::Future + Unpin,
{
    use std::future::Future;
    std::future::poll_fn(|cx| {
        for fut in futures.iter_mut() {
            if std::pin::Pin::new(&mut *fut).poll(cx).is_ready() {
                return std::task::Poll::Ready(());
            }
        }
        std::task::Poll::Pending
    })
    .await
}

#[cfg(test)]
#[path = "trap_tests.rs"]
mod tests;
