//! The process-wide shared I/O worker and wheel-timer.
//!
//! A single current-thread [`tokio::runtime::Runtime`] is lazily created behind a
//! [`OnceLock`] and driven on its own daemonized background OS thread; every
//! [`crate::AdsClient`] connection's socket, codec, and handler state lives on this
//! worker. There is exactly one such worker and one [`tokio_util::time::DelayQueue`]-backed
//! wheel-timer per process; both are released together via [`release_shared_resources`].

use std::future::Future;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};

struct SharedWorker {
    handle: Handle,
    // Kept alive for the lifetime of the process; dropped (and the thread joined) only by
    // `release_shared_resources`.
    join_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
}

static WORKER: OnceLock<SharedWorker> = OnceLock::new();

fn worker() -> &'static SharedWorker {
    WORKER.get_or_init(|| {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join_handle = std::thread::Builder::new()
            .name("tcads-io-worker".into())
            .spawn(move || {
                let runtime = Runtime::new().expect("failed to start tcads I/O worker runtime");
                handle_tx.send(runtime.handle().clone()).ok();
                // Park the runtime on this thread until told to shut down; all actual work
                // is submitted via `runtime.spawn` from other threads through the Handle.
                runtime.block_on(async move {
                    let _ = shutdown_rx.recv();
                });
            })
            .expect("failed to spawn tcads I/O worker thread");

        let handle = handle_rx.recv().expect("I/O worker runtime failed to start");

        SharedWorker {
            handle,
            join_handle: Mutex::new(Some(join_handle)),
            shutdown: Mutex::new(Some(shutdown_tx)),
        }
    })
}

/// Spawns `future` onto the shared I/O worker and returns a [`tokio::task::JoinHandle`]
/// for it. Callers await this from whatever thread or runtime they're on; the worker
/// itself never blocks on a caller.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    worker().handle.spawn(future)
}

/// A handle suitable for constructing runtime-owned primitives (e.g. `DelayQueue`-backed
/// timers) from code that is itself running on the shared worker.
pub fn handle() -> Handle {
    worker().handle.clone()
}

/// Drains and joins the shared I/O worker, if one was ever started. Per the shutdown
/// ordering documented for the session layer, callers must have already failed every
/// pending request on every live connection before calling this; it does not do so
/// itself; it only tears down the runtime thread.
///
/// `timeout` bounds how long the join is allowed to take; on expiry the thread is
/// abandoned (its runtime continues draining in the background for at most `timeout`).
pub fn release_shared_resources(timeout: Duration) {
    let Some(worker) = WORKER.get() else { return };

    if let Some(shutdown) = worker.shutdown.lock().unwrap().take() {
        let _ = shutdown.send(());
    }

    if let Some(join_handle) = worker.join_handle.lock().unwrap().take() {
        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = join_handle.join();
            let _ = done_tx.send(());
        });
        let _ = done_rx.recv_timeout(timeout);
    }
}
