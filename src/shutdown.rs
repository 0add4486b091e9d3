//! Cooperative cancellation and the ordered teardown run on SIGINT.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::protocol::{FORCED_STOP_MS, GRACEFUL_STOP_MS};

// ── Shutdown token ────────────────────────────────────────────────────────────

/// Process-wide cancellation flag, passed explicitly to everything that waits.
///
/// Set at most once and never reset.  Clones share the same flag.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Only touches the atomic and wakes waiters.
    pub fn trigger(&self) {
        if !self.inner.flag.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolve once [`Shutdown::trigger`] has been called.
    pub async fn triggered(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before re-checking the flag so a concurrent trigger is not lost.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration` unless shutdown arrives first.
    ///
    /// Returns `true` when the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.triggered() => false,
        }
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

/// Teardown steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    CloseSinks,
    DisconnectSessions,
    StopScan,
}

/// How the worker task ended.
pub enum WorkerExit {
    /// Returned on its own; carries the pipeline for teardown.
    Finished(Result<Pipeline>),
    /// Had to be aborted; its resources were dropped without teardown.
    Aborted,
}

/// Turns SIGINT into a [`Shutdown`] trigger and tears the pipeline down.
pub struct ShutdownCoordinator {
    shutdown: Shutdown,
    graceful: Duration,
    forced: Duration,
}

impl ShutdownCoordinator {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            graceful: Duration::from_millis(GRACEFUL_STOP_MS),
            forced: Duration::from_millis(FORCED_STOP_MS),
        }
    }

    /// Override the graceful and forced wait windows.
    pub fn with_waits(mut self, graceful: Duration, forced: Duration) -> Self {
        self.graceful = graceful;
        self.forced = forced;
        self
    }

    /// Spawn the SIGINT listener.  Its only action is to set the flag.
    pub fn listen_for_interrupt(&self) -> JoinHandle<()> {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => shutdown.trigger(),
                Err(e) => error!("Could not listen for SIGINT: {e}"),
            }
        })
    }

    /// Ask the worker to stop and wait for it, escalating to an abort when it
    /// does not return within the graceful window.
    pub async fn stop_worker(&self, mut worker: JoinHandle<Result<Pipeline>>) -> WorkerExit {
        self.shutdown.trigger();

        match tokio::time::timeout(self.graceful, &mut worker).await {
            Ok(Ok(result)) => return WorkerExit::Finished(result),
            Ok(Err(e)) => {
                error!("Worker task failed: {e}");
                return WorkerExit::Aborted;
            }
            Err(_) => warn!("Worker did not stop gracefully, forcing stop..."),
        }

        worker.abort();
        match tokio::time::timeout(self.forced, &mut worker).await {
            Ok(Ok(result)) => WorkerExit::Finished(result),
            Ok(Err(e)) if e.is_cancelled() => WorkerExit::Aborted,
            Ok(Err(e)) => {
                error!("Worker task failed: {e}");
                WorkerExit::Aborted
            }
            Err(_) => {
                warn!("Worker still running after forced stop; exiting anyway");
                WorkerExit::Aborted
            }
        }
    }

    /// Close sinks, disconnect sessions, then stop any scan on the first
    /// adapter.  A failing step is logged and never prevents the next one.
    pub async fn teardown(&self, pipeline: &mut Pipeline) -> Vec<TeardownStep> {
        let mut ran = Vec::with_capacity(3);

        pipeline.sinks.close_all().await;
        ran.push(TeardownStep::CloseSinks);

        for session in pipeline.sessions.iter_mut().flatten() {
            if session.is_marked_connected() {
                session.disconnect().await;
            }
        }
        ran.push(TeardownStep::DisconnectSessions);

        if let Some(adapter) = &pipeline.adapter {
            if let Err(e) = adapter.stop_scan().await {
                error!("Error during shutdown: could not stop scan: {e}");
            }
        }
        ran.push(TeardownStep::StopScan);

        info!("Teardown complete.");
        ran
    }
}
