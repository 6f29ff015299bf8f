//! Background task execution
//!
//! One dedicated thread runs a tokio event loop for the lifetime of the
//! process. The main loop hands futures over with [`TaskManager::run`] and
//! results are marshaled back to it over channels, never by direct mutation
//! of shell state.

use std::future::Future;
use std::sync::mpsc::{self, Receiver};
use std::sync::Mutex;
use std::thread;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum TaskError {
    /// The background loop is shutting down or has stopped.
    #[error("task loop is not running")]
    NotRunning,

    /// The task panicked or was cancelled before producing a result.
    #[error("task failed before completion")]
    Failed,
}

/// Lifecycle of the background loop. Construction moves straight from
/// not-started to `Running`; there is no way back once `Stopped`.
enum LoopState {
    Running {
        handle: tokio::runtime::Handle,
        stop: oneshot::Sender<()>,
        thread: thread::JoinHandle<()>,
    },
    ShuttingDown,
    Stopped,
}

/// Handle to a unit of work scheduled on the background loop.
///
/// Dropping the handle detaches the task: a failure in a detached task is
/// not observed anywhere. Callers that care must either `join` or go
/// through [`TaskManager::spawn_logged`].
pub struct TaskHandle<T> {
    rx: Receiver<T>,
    abort: tokio::task::AbortHandle,
}

impl<T> TaskHandle<T> {
    /// Block until the task completes, re-raising its failure.
    ///
    /// A task that panicked, was cancelled, or was dropped at shutdown
    /// yields [`TaskError::Failed`] rather than hanging.
    pub fn join(self) -> Result<T, TaskError> {
        self.rx.recv().map_err(|_| TaskError::Failed)
    }

    /// Cancel the task if it has not completed yet.
    pub fn abort(&self) {
        self.abort.abort();
    }
}

/// Owns the background event loop.
///
/// Explicitly constructed and passed to whoever needs it; there is no
/// process-wide instance.
pub struct TaskManager {
    state: Mutex<LoopState>,
}

impl TaskManager {
    /// Spawn the background loop thread.
    pub fn new() -> anyhow::Result<Self> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("goblin-tasks".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        let _ = handle_tx.send(Err(err));
                        return;
                    }
                };
                let _ = handle_tx.send(Ok(rt.handle().clone()));

                // Drives every spawned task until shutdown is requested.
                rt.block_on(async {
                    let _ = stop_rx.await;
                });
                debug!("task loop stopping");
                // Dropping the runtime cancels all outstanding work.
                drop(rt);
            })?;

        let handle = handle_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("task loop thread died during startup"))??;

        info!("task loop started");
        Ok(Self {
            state: Mutex::new(LoopState::Running {
                handle,
                stop: stop_tx,
                thread,
            }),
        })
    }

    /// Schedule a future on the background loop.
    ///
    /// Fails fast with [`TaskError::NotRunning`] once `shutdown` has begun;
    /// work is never silently dropped.
    pub fn run<F>(&self, fut: F) -> Result<TaskHandle<F::Output>, TaskError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let state = self.state.lock().expect("task manager state poisoned");
        match &*state {
            LoopState::Running { handle, .. } => {
                let (tx, rx) = mpsc::channel();
                let join = handle.spawn(async move {
                    let out = fut.await;
                    // Receiver may be gone already; the task was detached.
                    let _ = tx.send(out);
                });
                Ok(TaskHandle {
                    rx,
                    abort: join.abort_handle(),
                })
            }
            _ => Err(TaskError::NotRunning),
        }
    }

    /// Schedule a fallible future whose only observer is the log.
    ///
    /// This is the supervised path for fire-and-forget work; failures are
    /// recorded instead of vanishing with a dropped handle.
    pub fn spawn_logged<F>(&self, label: &'static str, fut: F) -> Result<(), TaskError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let state = self.state.lock().expect("task manager state poisoned");
        match &*state {
            LoopState::Running { handle, .. } => {
                handle.spawn(async move {
                    if let Err(err) = fut.await {
                        error!("task '{label}' failed: {err:#}");
                    }
                });
                Ok(())
            }
            _ => Err(TaskError::NotRunning),
        }
    }

    /// Cancel all outstanding work, stop the loop, and join the thread.
    ///
    /// Idempotent; safe to call from the main thread at exit. Once this
    /// returns the loop never runs again.
    pub fn shutdown(&self) {
        let (stop, thread) = {
            let mut state = self.state.lock().expect("task manager state poisoned");
            match std::mem::replace(&mut *state, LoopState::ShuttingDown) {
                LoopState::Running { stop, thread, .. } => (stop, thread),
                // Already stopped, or another caller is mid-shutdown.
                prev => {
                    *state = prev;
                    return;
                }
            }
        };

        let _ = stop.send(());
        let _ = thread.join();

        *self.state.lock().expect("task manager state poisoned") = LoopState::Stopped;
        info!("task loop stopped");
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn run_returns_task_output() {
        let tm = TaskManager::new().unwrap();
        let handle = tm.run(async { 6 * 7 }).unwrap();
        assert_eq!(handle.join().unwrap(), 42);
        tm.shutdown();
    }

    #[test]
    fn run_after_shutdown_fails_fast() {
        let tm = TaskManager::new().unwrap();
        tm.shutdown();
        let err = tm.run(async { () }).err().unwrap();
        assert!(matches!(err, TaskError::NotRunning));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let tm = TaskManager::new().unwrap();
        tm.shutdown();
        tm.shutdown();
        assert!(matches!(
            tm.run(async { () }),
            Err(TaskError::NotRunning)
        ));
    }

    #[test]
    fn shutdown_cancels_outstanding_work() {
        let tm = TaskManager::new().unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = tm
            .run(async move {
                tokio::time::sleep(Duration::from_secs(600)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        tm.shutdown();
        assert!(matches!(handle.join(), Err(TaskError::Failed)));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[test]
    fn task_error_is_reraised_on_join() {
        let tm = TaskManager::new().unwrap();
        let handle = tm
            .run(async { Err::<(), _>(anyhow::anyhow!("sensor went away")) })
            .unwrap();
        assert!(handle.join().unwrap().is_err());
        tm.shutdown();
    }

    #[test]
    fn panicking_task_does_not_take_down_the_loop() {
        let tm = TaskManager::new().unwrap();
        let bad = tm
            .run(async {
                panic!("boom");
            })
            .unwrap();
        assert!(matches!(bad.join(), Err(TaskError::Failed)));
        // Loop still accepts and runs work afterwards.
        let ok = tm.run(async { 1 }).unwrap();
        assert_eq!(ok.join().unwrap(), 1);
        tm.shutdown();
    }
}
