//! Debounced save scheduler.
//!
//! Collapses bursts of save requests into a single commit. Every
//! [`SaveScheduler::schedule`] call replaces the pending snapshot and pushes
//! the deadline out by the quiet period; when the deadline passes without a
//! new request, a dedicated worker thread hands the latest snapshot to the
//! commit callback.
//!
//! Each pending save carries the branch that was active when it was
//! requested, so the callback can refuse a save that would land on a
//! different branch after navigation.

use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// A save request waiting for its quiet period to elapse.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    /// Document snapshot to commit.
    pub content: Value,
    /// Branch active when the save was requested.
    pub branch_id: String,
    /// When the most recent request arrived.
    pub requested_at: Instant,
}

type CommitFn = dyn Fn(PendingSave) + Send + Sync;

#[derive(Default)]
struct State {
    pending: Option<PendingSave>,
    deadline: Option<Instant>,
    in_flight: usize,
    shutdown: bool,
}

impl State {
    fn is_idle(&self) -> bool {
        self.pending.is_none() && self.in_flight == 0
    }
}

struct SchedulerInner {
    state: Mutex<State>,
    wake: Condvar,
    idle: Condvar,
    quiet: Duration,
    commit: Box<CommitFn>,
}

impl SchedulerInner {
    /// Run the commit callback outside the lock, then mark the save done.
    fn fire(&self, save: PendingSave) {
        let branch = save.branch_id.clone();
        debug!(target: "verso::scheduler", branch = %branch, "Firing deferred save");

        // A panicking callback must not take the worker down with it.
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (self.commit)(save)
        })) {
            error!(
                target: "verso::scheduler",
                branch = %branch,
                "save callback panicked: {:?}",
                e.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
            );
        }

        let mut state = self.state.lock();
        state.in_flight -= 1;
        if state.is_idle() {
            self.idle.notify_all();
        }
    }
}

/// Debounces save requests onto a worker thread.
///
/// Dropping the scheduler flushes any pending save and joins the worker.
pub struct SaveScheduler {
    inner: Arc<SchedulerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SaveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveScheduler")
            .field("quiet", &self.inner.quiet)
            .field("has_pending", &self.has_pending())
            .finish()
    }
}

impl SaveScheduler {
    /// Create a scheduler committing through `commit` after `quiet` of
    /// inactivity.
    ///
    /// The worker thread is named `verso-save`.
    pub fn new(
        quiet: Duration,
        commit: impl Fn(PendingSave) + Send + Sync + 'static,
    ) -> std::io::Result<Self> {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(State::default()),
            wake: Condvar::new(),
            idle: Condvar::new(),
            quiet,
            commit: Box::new(commit),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("verso-save".to_string())
            .spawn(move || worker_loop(&inner_clone))?;

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Quiet period a request must survive before it is committed.
    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet
    }

    /// Replace the pending snapshot and restart the quiet period.
    pub fn schedule(&self, content: Value, branch_id: impl Into<String>) {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        if state.shutdown {
            debug!(target: "verso::scheduler", "Save requested after shutdown, ignoring");
            return;
        }
        state.pending = Some(PendingSave {
            content,
            branch_id: branch_id.into(),
            requested_at: now,
        });
        state.deadline = Some(now + self.inner.quiet);
        self.inner.wake.notify_one();
    }

    /// Drop the pending save, if any. Returns whether one was dropped.
    ///
    /// A save already handed to the callback is not affected.
    pub fn cancel(&self) -> bool {
        let mut state = self.inner.state.lock();
        state.deadline = None;
        let dropped = state.pending.take();
        if let Some(save) = &dropped {
            debug!(target: "verso::scheduler", branch = %save.branch_id, "Cancelled pending save");
        }
        if state.is_idle() {
            self.inner.idle.notify_all();
        }
        dropped.is_some()
    }

    /// Commit the pending save now, on the calling thread.
    ///
    /// Returns whether there was anything to commit.
    pub fn flush(&self) -> bool {
        let save = {
            let mut state = self.inner.state.lock();
            state.deadline = None;
            match state.pending.take() {
                Some(save) => {
                    state.in_flight += 1;
                    save
                }
                None => return false,
            }
        };
        self.inner.fire(save);
        true
    }

    /// Whether a save is waiting or being committed.
    pub fn has_pending(&self) -> bool {
        !self.inner.state.lock().is_idle()
    }

    /// Block until nothing is pending or in flight.
    ///
    /// Returns `false` if the timeout elapsed first.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while !state.is_idle() {
            if self.inner.idle.wait_until(&mut state, deadline).timed_out() {
                return state.is_idle();
            }
        }
        true
    }

    /// Flush any pending save, stop the worker and join it.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.flush();
        {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            self.inner.wake.notify_all();
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(inner: &SchedulerInner) {
    loop {
        let save = {
            let mut state = inner.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                let deadline = state.deadline;
                match deadline {
                    None => inner.wake.wait(&mut state),
                    Some(deadline) if Instant::now() >= deadline => {
                        state.deadline = None;
                        if let Some(save) = state.pending.take() {
                            state.in_flight += 1;
                            break save;
                        }
                    }
                    Some(deadline) => {
                        inner.wake.wait_until(&mut state, deadline);
                    }
                }
            }
        };

        inner.fire(save);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<PendingSave>>>, impl Fn(PendingSave) + Send + Sync) {
        let saves = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saves);
        (saves, move |save| sink.lock().push(save))
    }

    #[test]
    fn test_rapid_requests_coalesce() {
        let (saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_millis(200), commit).unwrap();

        for i in 0..5 {
            scheduler.schedule(json!({"text": i}), "main");
        }
        assert!(scheduler.has_pending());
        assert!(scheduler.wait_for_idle(Duration::from_secs(5)));

        let saves = saves.lock();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].content, json!({"text": 4}));
        assert_eq!(saves[0].branch_id, "main");
    }

    #[test]
    fn test_separate_bursts_commit_separately() {
        let (saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_millis(20), commit).unwrap();

        scheduler.schedule(json!(1), "main");
        assert!(scheduler.wait_for_idle(Duration::from_secs(5)));
        scheduler.schedule(json!(2), "main");
        assert!(scheduler.wait_for_idle(Duration::from_secs(5)));

        assert_eq!(saves.lock().len(), 2);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let (saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_millis(50), commit).unwrap();

        scheduler.schedule(json!("draft"), "main");
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert!(!scheduler.has_pending());

        std::thread::sleep(Duration::from_millis(150));
        assert!(saves.lock().is_empty());
    }

    #[test]
    fn test_flush_commits_immediately() {
        let (saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_secs(60), commit).unwrap();

        assert!(!scheduler.flush());
        scheduler.schedule(json!("now"), "b-1");
        assert!(scheduler.flush());

        let saves = saves.lock();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].branch_id, "b-1");
    }

    #[test]
    fn test_shutdown_flushes_pending() {
        let (saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_secs(60), commit).unwrap();

        scheduler.schedule(json!("last words"), "main");
        drop(scheduler);

        assert_eq!(saves.lock().len(), 1);
    }

    #[test]
    fn test_schedule_after_shutdown_is_ignored() {
        let (saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_millis(10), commit).unwrap();
        scheduler.shutdown();

        scheduler.schedule(json!("late"), "main");
        assert!(!scheduler.has_pending());
        assert!(saves.lock().is_empty());
    }

    #[test]
    fn test_panicking_callback_keeps_worker_alive() {
        let saves = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saves);
        let scheduler = SaveScheduler::new(Duration::from_millis(10), move |save: PendingSave| {
            if save.content == json!("boom") {
                panic!("commit failed");
            }
            sink.lock().push(save);
        })
        .unwrap();

        scheduler.schedule(json!("boom"), "main");
        assert!(scheduler.wait_for_idle(Duration::from_secs(5)));
        scheduler.schedule(json!("fine"), "main");
        assert!(scheduler.wait_for_idle(Duration::from_secs(5)));

        assert_eq!(saves.lock().len(), 1);
    }

    #[test]
    fn test_wait_for_idle_times_out() {
        let (_saves, commit) = recorder();
        let scheduler = SaveScheduler::new(Duration::from_secs(60), commit).unwrap();

        scheduler.schedule(json!("slow"), "main");
        assert!(!scheduler.wait_for_idle(Duration::from_millis(20)));
        assert!(scheduler.cancel());
        assert!(scheduler.wait_for_idle(Duration::from_millis(20)));
    }
}
