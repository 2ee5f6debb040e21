use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

type PollCallback = Box<dyn FnMut() + Send>;

/// Fixed-cadence timer that fires the most recently registered callback.
///
/// The callback runs on the timer task and should only hand work off (e.g.
/// queue a command); the cadence does not wait for whatever it starts. After
/// [`PollScheduler::stop`] returns, or the scheduler is dropped, the callback
/// is never invoked again.
pub struct PollScheduler {
    callback: Arc<Mutex<PollCallback>>,
    stopped: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    /// Start ticking every `interval`. The first call happens one interval
    /// after start. Must be called inside a tokio runtime.
    pub fn start(interval: Duration, callback: impl FnMut() + Send + 'static) -> Self {
        let callback: Arc<Mutex<PollCallback>> = Arc::new(Mutex::new(Box::new(callback)));
        let stopped = Arc::new(AtomicBool::new(false));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task_callback = Arc::clone(&callback);
        let task_stopped = Arc::clone(&stopped);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let mut callback = lock(&task_callback);
                        if task_stopped.load(Ordering::Acquire) {
                            break;
                        }
                        (*callback)();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!("Poll scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            callback,
            stopped,
            shutdown,
            task: Some(task),
        }
    }

    /// Replace the callback. The next tick fires the new one.
    pub fn set_callback(&self, callback: impl FnMut() + Send + 'static) {
        *lock(&self.callback) = Box::new(callback);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop ticking. Waits for an invocation already in progress to return.
    pub fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // Taking the lock orders us after any invocation in progress.
        drop(lock(&self.callback));
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(callback: &Mutex<PollCallback>) -> MutexGuard<'_, PollCallback> {
    callback.lock().unwrap_or_else(PoisonError::into_inner)
}
