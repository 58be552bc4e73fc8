//! Generic mutation-driven probe: re-run a check whenever the observed
//! subtree changes, stop on first success.
//!
//! Both the identifier scanner and the question watcher are instances of
//! this primitive; they differ only in their probe.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{document::MutationBatch, Result};

/// A check to run against the document after changes.
///
/// `Ok(true)` means success: the watcher unsubscribes and never probes
/// again. `Err` is logged and treated as "no match this round", so one
/// malformed node cannot stop detection for the rest of the session.
#[async_trait]
pub trait Probe: Send {
    async fn probe(&mut self) -> Result<bool>;
}

/// Adapter for plain synchronous closures, mostly used in tests.
pub struct FnProbe<F>(pub F);

#[async_trait]
impl<F> Probe for FnProbe<F>
where
    F: FnMut() -> Result<bool> + Send,
{
    async fn probe(&mut self) -> Result<bool> {
        (self.0)()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WatchOptions {
    /// Wait this long after a batch arrives before probing, so the document
    /// can finish rendering. Batches queued during the wait are coalesced
    /// into the same probe.
    pub settle: Option<Duration>,
}

/// Handle to a running watcher. Dropping it does not cancel; the watcher is
/// detached and runs until success, cancellation, or its source closing.
pub struct WatchHandle {
    cancel: CancellationToken,
    done: CancellationToken,
}

impl WatchHandle {
    /// Stop the watcher without side effects. Idempotent; a no-op after
    /// success.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the watcher has stopped (success, cancel, or source gone).
    pub async fn done(&self) {
        self.done.cancelled().await;
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }
}

/// Spawn a watcher over a stream of mutation batches.
///
/// The probe runs once up front, covering content already present at
/// subscription time, then at most once per delivered (and drained) group of
/// batches.
pub fn spawn<P>(mut rx: mpsc::Receiver<MutationBatch>, mut probe: P, options: WatchOptions) -> WatchHandle
where
    P: Probe + 'static,
{
    let cancel = CancellationToken::new();
    let done = CancellationToken::new();

    let tok = cancel.clone();
    let fin = done.clone();
    tokio::spawn(async move {
        if run_probe(&mut probe).await {
            fin.cancel();
            return;
        }

        'watch: loop {
            tokio::select! {
                _ = tok.cancelled() => break 'watch,
                batch = rx.recv() => {
                    if batch.is_none() {
                        // Source closed; nothing further can match.
                        break 'watch;
                    }
                    if let Some(delay) = options.settle {
                        tokio::select! {
                            _ = tok.cancelled() => break 'watch,
                            _ = sleep(delay) => {}
                        }
                    }
                    // Coalesce whatever queued while we settled.
                    while rx.try_recv().is_ok() {}
                    if run_probe(&mut probe).await {
                        break 'watch;
                    }
                }
            }
        }
        fin.cancel();
    });

    WatchHandle { cancel, done }
}

async fn run_probe(probe: &mut dyn Probe) -> bool {
    match probe.probe().await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!("probe failed, treating as no match: {e}");
            false
        }
    }
}
