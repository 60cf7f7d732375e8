//! Main-thread marshalling
//!
//! The editor state is only valid to touch from one thread. Session tasks
//! hand closures to `MainThread::run`, which queues them for the `MainLoop`
//! and awaits the result with a timeout. A task that outlives its timeout
//! still runs to completion on the main thread; its result is dropped and
//! counted instead of being delivered.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::editor::HostState;

type Task = Box<dyn FnOnce(&mut HostState) + Send + 'static>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("main thread did not finish within {0:?}")]
    Timeout(Duration),

    #[error("main thread is not running")]
    Unavailable,

    #[error("task panicked on main thread: {0}")]
    Panicked(String),
}

#[derive(Debug, Default)]
pub struct MarshalStats {
    executed: AtomicU64,
    timed_out: AtomicU64,
    late_discarded: AtomicU64,
    panicked: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarshalStatsSnapshot {
    pub executed: u64,
    pub timed_out: u64,
    pub late_discarded: u64,
    pub panicked: u64,
}

impl MarshalStats {
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    pub fn late_discarded(&self) -> u64 {
        self.late_discarded.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MarshalStatsSnapshot {
        MarshalStatsSnapshot {
            executed: self.executed(),
            timed_out: self.timed_out(),
            late_discarded: self.late_discarded(),
            panicked: self.panicked(),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Cloneable handle for queueing work onto the main thread.
#[derive(Clone)]
pub struct MainThread {
    tx: mpsc::UnboundedSender<Task>,
    timeout: Duration,
    stats: Arc<MarshalStats>,
}

impl MainThread {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> &Arc<MarshalStats> {
        &self.stats
    }

    /// Run `f` on the main thread and wait for its result.
    ///
    /// Tasks from one caller execute in the order they were queued.
    pub async fn run<R, F>(&self, f: F) -> Result<R, MarshalError>
    where
        F: FnOnce(&mut HostState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let stats = Arc::clone(&self.stats);

        let task: Task = Box::new(move |host| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(host)));
            stats.executed.fetch_add(1, Ordering::Relaxed);
            let outcome = outcome.map_err(|payload| {
                stats.panicked.fetch_add(1, Ordering::Relaxed);
                let message = panic_message(payload);
                error!(%message, "main-thread task panicked");
                message
            });
            if result_tx.send(outcome).is_err() {
                stats.late_discarded.fetch_add(1, Ordering::Relaxed);
                warn!("discarding result of a main-thread task whose caller gave up");
            }
        });

        self.tx.send(task).map_err(|_| MarshalError::Unavailable)?;

        match tokio::time::timeout(self.timeout, result_rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(MarshalError::Panicked(message)),
            Ok(Err(_)) => Err(MarshalError::Unavailable),
            Err(_) => {
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(timeout = ?self.timeout, "main-thread task timed out");
                Err(MarshalError::Timeout(self.timeout))
            }
        }
    }
}

/// Owner of the host state; drains queued tasks in FIFO order.
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Task>,
    host: HostState,
    stats: Arc<MarshalStats>,
}

/// Create a connected handle/loop pair around `host`.
pub fn channel(host: HostState, timeout: Duration) -> (MainThread, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = Arc::new(MarshalStats::default());
    (
        MainThread {
            tx,
            timeout,
            stats: Arc::clone(&stats),
        },
        MainLoop { rx, host, stats },
    )
}

impl MainLoop {
    /// Block this thread running tasks until every `MainThread` handle is
    /// dropped. Returns the host state. Must not be called from async code.
    pub fn run(mut self) -> HostState {
        debug!("main loop running");
        while let Some(task) = self.rx.blocking_recv() {
            task(&mut self.host);
        }
        debug!(executed = self.stats.executed(), "main loop stopped");
        self.host
    }

    /// Run whatever is queued right now without blocking. For hosts that
    /// tick the loop from their own frame callback.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task(&mut self.host);
            ran += 1;
        }
        ran
    }

    pub fn host(&self) -> &HostState {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostState {
        &mut self.host
    }

    /// Run the loop on a dedicated OS thread.
    pub fn spawn(self) -> std::io::Result<thread::JoinHandle<HostState>> {
        thread::Builder::new()
            .name("tinkerbench-main".to_string())
            .spawn(move || self.run())
    }
}
