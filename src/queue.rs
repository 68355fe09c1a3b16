//! Admission scheduling: a FIFO task queue with a fixed concurrency ceiling.
//!
//! ## Why a single mutex?
//!
//! The one invariant everything else depends on is that the pair
//! `(pending queue, running count)` is only ever read and mutated together.
//! Two completions racing a submission must not both observe `running < limit`
//! and admit two jobs into one free slot, and a pending job must never be
//! skipped or started twice. One `std::sync::Mutex` around exactly that pair
//! makes the admission check atomic; the critical section never awaits and
//! never does I/O, so contention is negligible next to the seconds-long jobs
//! it schedules.
//!
//! Everything per-job lives outside the lock: the job future owns its own
//! state, and its outcome travels over a dedicated oneshot channel that is
//! written exactly once. Admission is strictly first-in first-out; there is
//! no priority, no preemption, and no cancellation of a submitted job. A
//! job future that panics is contained on its own task: the slot is still
//! released and the handle reports [`JobState::Failed`].

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Concurrency ceiling used by [`TaskQueue::default`].
pub const DEFAULT_CONCURRENCY: usize = 2;

// ── Job identity ─────────────────────────────────────────────────────────

/// Correlation id for one submitted job, unique per submission.
///
/// Appears in every log line the job produces. [`JobId::new`] generates a
/// UUID v4; transports that already carry a request id can convert it with
/// `From<String>` / `From<&str>` instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ── Job lifecycle ────────────────────────────────────────────────────────

/// Lifecycle of a submitted job.
///
/// Transitions are one-way: `Queued → Running → Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobState {
    /// Waiting for a free slot.
    Queued = 0,
    /// Admitted; its future is executing.
    Running = 1,
    /// Terminal: completed with `Ok`.
    Succeeded = 2,
    /// Terminal: completed with `Err`.
    Failed = 3,
}

impl JobState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobState::Queued,
            1 => JobState::Running,
            2 => JobState::Succeeded,
            _ => JobState::Failed,
        }
    }

    /// Whether the job has finished, either way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

// ── Queue internals ──────────────────────────────────────────────────────

struct QueuedJob<O, E> {
    id: JobId,
    task: BoxFuture<'static, Result<O, E>>,
    state: Arc<AtomicU8>,
    tx: oneshot::Sender<Result<O, E>>,
}

struct Inner<O, E> {
    pending: VecDeque<QueuedJob<O, E>>,
    running: usize,
}

struct Shared<O, E> {
    limit: usize,
    inner: Mutex<Inner<O, E>>,
}

impl<O, E> Shared<O, E> {
    fn lock(&self) -> MutexGuard<'_, Inner<O, E>> {
        // The critical sections below cannot panic, so a poisoned lock can
        // only come from an unrelated panic elsewhere; the bookkeeping is
        // still consistent.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// FIFO admission scheduler bounded by a concurrency ceiling.
///
/// Generic over the job output and error types so it can schedule any
/// future-shaped work; the export engine instantiates it as
/// `TaskQueue<ExportArtifact, ExportError>`.
///
/// The queue is unbounded: every submission is accepted and waits its turn.
/// Cloning is cheap and all clones feed the same queue.
pub struct TaskQueue<O, E> {
    shared: Arc<Shared<O, E>>,
}

impl<O, E> Clone for TaskQueue<O, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<O, E> fmt::Debug for TaskQueue<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("TaskQueue")
            .field("limit", &self.shared.limit)
            .field("running", &inner.running)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl<O, E> Default for TaskQueue<O, E>
where
    O: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl<O, E> TaskQueue<O, E>
where
    O: Send + 'static,
    E: Send + 'static,
{
    /// Create a queue admitting at most `limit` jobs at once.
    ///
    /// A limit of zero would admit nothing forever, so it is clamped to 1.
    pub fn new(limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                limit: limit.max(1),
                inner: Mutex::new(Inner {
                    pending: VecDeque::new(),
                    running: 0,
                }),
            }),
        }
    }

    /// Append a job to the queue tail and run the admission check.
    ///
    /// Returns immediately with a handle; the job starts as soon as a slot
    /// is free and every earlier submission has started. Must be called
    /// from within a tokio runtime.
    pub fn submit<F>(&self, id: JobId, task: F) -> JobHandle<O, E>
    where
        F: Future<Output = Result<O, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(AtomicU8::new(JobState::Queued as u8));
        let handle = JobHandle {
            id: id.clone(),
            state: Arc::clone(&state),
            rx,
        };

        let mut inner = self.shared.lock();
        inner.pending.push_back(QueuedJob {
            id,
            task: Box::pin(task),
            state,
            tx,
        });
        debug!(
            "[{}] job queued ({} pending, {} running)",
            handle.id,
            inner.pending.len(),
            inner.running
        );
        Self::admit_locked(&self.shared, &mut inner);

        handle
    }

    /// Admission ceiling this queue was created with.
    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Snapshot of jobs waiting for a slot.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Snapshot of jobs currently running.
    pub fn running(&self) -> usize {
        self.shared.lock().running
    }

    /// Admit head jobs while slots are free. Caller holds the lock, so the
    /// check and the `(pending, running)` mutation are one atomic unit.
    fn admit_locked(shared: &Arc<Shared<O, E>>, inner: &mut Inner<O, E>) {
        while inner.running < shared.limit {
            let Some(job) = inner.pending.pop_front() else {
                break;
            };
            inner.running += 1;
            job.state.store(JobState::Running as u8, Ordering::SeqCst);
            info!(
                "[{}] job started ({}/{} slots busy)",
                job.id, inner.running, shared.limit
            );
            tokio::spawn(Self::run_job(Arc::clone(shared), job));
        }
    }

    /// Drive one admitted job to its terminal state, free its slot, and
    /// re-run the admission check so the head of the queue is considered
    /// immediately.
    ///
    /// The job future runs on its own task: a panic unwinds there and comes
    /// back as a join error, so the slot release and re-admission below run
    /// on every exit path. A leaked slot would wedge the queue permanently.
    async fn run_job(shared: Arc<Shared<O, E>>, job: QueuedJob<O, E>) {
        let QueuedJob {
            id, task, state, tx, ..
        } = job;

        let result = match tokio::spawn(task).await {
            Ok(result) => {
                if result.is_ok() {
                    info!("[{}] job completed", id);
                } else {
                    warn!("[{}] job failed", id);
                }
                Some(result)
            }
            Err(join_error) if join_error.is_panic() => {
                warn!("[{}] job panicked: {}", id, join_error);
                None
            }
            Err(_) => {
                // Runtime shutdown cancelled the task mid-flight.
                warn!("[{}] job cancelled before completing", id);
                None
            }
        };

        let terminal = match &result {
            Some(Ok(_)) => JobState::Succeeded,
            _ => JobState::Failed,
        };
        state.store(terminal as u8, Ordering::SeqCst);

        {
            let mut inner = shared.lock();
            inner.running -= 1;
            debug!(
                "[{}] slot released ({} pending, {} running)",
                id,
                inner.pending.len(),
                inner.running
            );
            Self::admit_locked(&shared, &mut inner);
        }

        // Exactly-once delivery. A caller that dropped its handle simply
        // never sees the outcome; a panicked job has no outcome at all, so
        // its sender is dropped and the handle observes a closed channel.
        if let Some(result) = result {
            let _ = tx.send(result);
        }
    }
}

// ── Caller-side handle ───────────────────────────────────────────────────

/// The caller's view of one submitted job.
///
/// Holds the receiving end of the job's single-resolution result channel
/// plus a lifecycle probe. Dropping the handle does not cancel the job.
pub struct JobHandle<O, E> {
    id: JobId,
    state: Arc<AtomicU8>,
    rx: oneshot::Receiver<Result<O, E>>,
}

impl<O, E> JobHandle<O, E> {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Current lifecycle state, observable without consuming the handle.
    pub fn state(&self) -> JobState {
        JobState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Wait for the job's outcome.
    ///
    /// Returns `None` if the job's future panicked or the runtime shut
    /// down before the job reached a terminal state; otherwise exactly one
    /// `Some(result)`. A panicked job still reads [`JobState::Failed`]
    /// through [`state`](Self::state).
    pub async fn wait(self) -> Option<Result<O, E>> {
        self.rx.await.ok()
    }
}

impl<O, E> fmt::Debug for JobHandle<O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio_test::assert_pending;

    /// Tracks how many jobs run at once and the highest value ever seen.
    #[derive(Default)]
    struct ConcurrencyProbe {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }

        fn max_seen(&self) -> usize {
            self.max.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn running_jobs_never_exceed_limit() {
        let queue: TaskQueue<usize, String> = TaskQueue::new(2);
        let probe = Arc::new(ConcurrencyProbe::default());

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let probe = Arc::clone(&probe);
                queue.submit(JobId::from(format!("job-{i}")), async move {
                    probe.enter();
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    probe.exit();
                    Ok(i)
                })
            })
            .collect();

        let results = join_all(handles.into_iter().map(JobHandle::wait)).await;

        assert!(probe.max_seen() <= 2, "saw {} concurrent", probe.max_seen());
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().unwrap(), i);
        }
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn width_one_admits_in_submission_order() {
        let queue: TaskQueue<(), String> = TaskQueue::new(1);
        let starts = Arc::new(Mutex::new(Vec::new()));

        // Later jobs are faster than earlier ones; order must not change.
        let durations = [40u64, 10, 25, 5, 15];
        let handles: Vec<_> = durations
            .iter()
            .enumerate()
            .map(|(i, &ms)| {
                let starts = Arc::clone(&starts);
                queue.submit(JobId::from(format!("job-{i}")), async move {
                    starts.lock().unwrap().push(i);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(())
                })
            })
            .collect();

        join_all(handles.into_iter().map(JobHandle::wait)).await;

        assert_eq!(*starts.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    /// A slow job submitted first must start (and finish) before a fast job
    /// submitted second when only one slot exists.
    #[tokio::test]
    async fn fast_later_job_cannot_overtake_slow_earlier_job() {
        let queue: TaskQueue<(), String> = TaskQueue::new(1);
        let events = Arc::new(Mutex::new(Vec::new()));

        let ev = Arc::clone(&events);
        let slow = queue.submit(JobId::from("slow"), async move {
            ev.lock().unwrap().push("slow-start");
            tokio::time::sleep(Duration::from_millis(100)).await;
            ev.lock().unwrap().push("slow-end");
            Ok(())
        });

        let ev = Arc::clone(&events);
        let fast = queue.submit(JobId::from("fast"), async move {
            ev.lock().unwrap().push("fast-start");
            tokio::time::sleep(Duration::from_millis(10)).await;
            ev.lock().unwrap().push("fast-end");
            Ok(())
        });

        slow.wait().await.unwrap().unwrap();
        fast.wait().await.unwrap().unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["slow-start", "slow-end", "fast-start", "fast-end"]
        );
    }

    #[tokio::test]
    async fn jobs_queue_when_all_slots_busy() {
        let queue: TaskQueue<u32, String> = TaskQueue::new(2);

        let (gate_a, wait_a) = oneshot::channel::<()>();
        let (gate_b, wait_b) = oneshot::channel::<()>();

        let a = queue.submit(JobId::from("a"), async move {
            wait_a.await.ok();
            Ok(1)
        });
        let b = queue.submit(JobId::from("b"), async move {
            wait_b.await.ok();
            Ok(2)
        });

        // Both slots taken synchronously on submit.
        assert_eq!(queue.running(), 2);
        assert_eq!(queue.pending(), 0);
        assert_eq!(a.state(), JobState::Running);
        assert_eq!(b.state(), JobState::Running);

        let c = queue.submit(JobId::from("c"), async move { Ok(3) });
        assert_eq!(queue.pending(), 1);
        assert_eq!(c.state(), JobState::Queued);

        let mut c_wait = tokio_test::task::spawn(c.wait());
        assert_pending!(c_wait.poll());

        // Freeing one slot admits the queued job.
        gate_a.send(()).unwrap();
        assert_eq!(a.wait().await.unwrap().unwrap(), 1);
        assert_eq!(queue.pending(), 0);

        assert_eq!(c_wait.await.unwrap().unwrap(), 3);

        gate_b.send(()).unwrap();
        assert_eq!(b.wait().await.unwrap().unwrap(), 2);
        assert_eq!(queue.running(), 0);
    }

    #[tokio::test]
    async fn failing_job_resolves_only_its_own_caller() {
        let queue: TaskQueue<&'static str, String> = TaskQueue::new(2);

        let failing = queue.submit(JobId::from("failing"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err("boom".to_string())
        });
        let healthy = queue.submit(JobId::from("healthy"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok("fine")
        });

        let failed = failing.wait().await.unwrap();
        assert_eq!(failed.unwrap_err(), "boom");

        let ok = healthy.wait().await.unwrap();
        assert_eq!(ok.unwrap(), "fine");

        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    /// A panicking job must not leak its slot: on a width-1 queue the
    /// follower still gets admitted, and the panicked job's handle reads
    /// `Failed` with a closed result channel.
    #[tokio::test]
    async fn panicking_job_releases_its_slot() {
        let queue: TaskQueue<u32, String> = TaskQueue::new(1);

        let doomed = queue.submit(JobId::from("doomed"), async {
            panic!("converter blew up")
        });
        let follower = queue.submit(JobId::from("follower"), async { Ok(7) });

        // The follower can only run once the panicked job's slot is freed;
        // the timeout turns a leaked slot into a failure instead of a hang.
        let result = tokio::time::timeout(Duration::from_secs(2), follower.wait())
            .await
            .unwrap();
        assert_eq!(result.unwrap().unwrap(), 7);

        assert_eq!(doomed.state(), JobState::Failed);
        assert!(doomed.wait().await.is_none());
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn terminal_states_reflect_outcome() {
        let queue: TaskQueue<(), String> = TaskQueue::new(2);

        let ok = queue.submit(JobId::from("ok"), async { Ok(()) });
        let err = queue.submit(JobId::from("err"), async { Err("nope".to_string()) });

        while !ok.state().is_terminal() || !err.state().is_terminal() {
            tokio::task::yield_now().await;
        }
        assert_eq!(ok.state(), JobState::Succeeded);
        assert_eq!(err.state(), JobState::Failed);

        ok.wait().await.unwrap().unwrap();
        err.wait().await.unwrap().unwrap_err();
    }

    #[tokio::test]
    async fn dropped_handle_does_not_stall_the_queue() {
        let queue: TaskQueue<u32, String> = TaskQueue::new(1);

        let abandoned = queue.submit(JobId::from("abandoned"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(1)
        });
        drop(abandoned);

        let follower = queue.submit(JobId::from("follower"), async { Ok(2) });
        assert_eq!(follower.wait().await.unwrap().unwrap(), 2);
        assert_eq!(queue.running(), 0);
    }

    #[tokio::test]
    async fn many_jobs_with_uneven_durations_all_complete() {
        let queue: TaskQueue<usize, String> = TaskQueue::new(3);
        let probe = Arc::new(ConcurrencyProbe::default());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let probe = Arc::clone(&probe);
                let ms = (i * 7) % 23 + 1;
                queue.submit(JobId::new(), async move {
                    probe.enter();
                    tokio::time::sleep(Duration::from_millis(ms as u64)).await;
                    probe.exit();
                    Ok(i)
                })
            })
            .collect();

        let results = join_all(handles.into_iter().map(JobHandle::wait)).await;

        assert!(probe.max_seen() <= 3, "saw {} concurrent", probe.max_seen());
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().unwrap(), i);
        }
    }

    #[tokio::test]
    async fn zero_limit_is_clamped_to_one() {
        let queue: TaskQueue<(), String> = TaskQueue::new(0);
        assert_eq!(queue.limit(), 1);

        // One job must still be admitted.
        let handle = queue.submit(JobId::from("only"), async { Ok(()) });
        handle.wait().await.unwrap().unwrap();
    }

    #[test]
    fn default_limit_is_two() {
        // Constructing the queue takes no runtime; only submit() spawns.
        let queue: TaskQueue<(), String> = TaskQueue::default();
        assert_eq!(queue.limit(), DEFAULT_CONCURRENCY);
    }

    #[test]
    fn job_id_display_and_conversions() {
        let id = JobId::from("req-42");
        assert_eq!(id.to_string(), "req-42");
        assert_eq!(id.as_str(), "req-42");

        let generated = JobId::new();
        assert_eq!(generated.as_str().len(), 36);
        assert_ne!(generated, JobId::new());
    }
}
