//! Task Scheduler
//!
//! Drives a FIFO queue of `(input_hash, seed, step)` tasks to completion
//! against a shared [`RecordStore`]. Each poll re-derives the task's state
//! from the store:
//!
//! ```text
//! result exists ─────────────────────────────► done, drop
//! step > 0 and previous result missing ──────► blocked, requeue at back
//! claim exists ──────────────────────────────► claimed elsewhere, drop
//! otherwise ─────────────────────────────────► claim, sample, persist, release
//! ```
//!
//! Many processes may run a scheduler over the same store directory; the
//! atomic claim is the only mutual exclusion between them. A claim left
//! behind by a crashed worker is never expired: its task and every later step
//! of its chain stay blocked until someone removes it
//! (see [`RecordStore::stale_claims`]).

mod backoff;
mod task;

pub use task::{Execution, Task, TaskState};

use crate::config::SchedulerConfig;
use crate::kv::KvStore;
use crate::model::ModelRegistry;
use crate::store::{Category, Claim, Filter, ModelSnapshot, ParameterSet, RecordStore, ResultRecord};
use crate::{Error, Result};
use backoff::Backoff;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Why [`Scheduler::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The queue emptied.
    #[default]
    Drained,
    /// The cancellation token fired.
    Cancelled,
    /// The configured deadline passed.
    DeadlineExceeded,
}

/// Counters from one [`Scheduler::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks in the initial queue.
    pub queued: usize,
    /// Tasks this worker executed.
    pub executed: usize,
    /// Tasks found already finished.
    pub already_done: usize,
    /// Tasks dropped because another worker held them.
    pub claimed_elsewhere: usize,
    /// Requeues caused by unfinished dependencies.
    pub requeued: usize,
    /// Tasks still queued when the run stopped.
    pub remaining: usize,
    /// Why the run stopped.
    pub stop: StopReason,
}

/// Single-threaded cooperative scheduler; run one per worker process.
#[derive(Debug)]
pub struct Scheduler<S> {
    store: RecordStore<S>,
    registry: Arc<ModelRegistry>,
    config: SchedulerConfig,
    worker_id: String,
    cancel: CancellationToken,
}

impl<S: KvStore> Scheduler<S> {
    /// Create a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `config` fails validation.
    pub fn new(
        store: RecordStore<S>,
        registry: impl Into<Arc<ModelRegistry>>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let worker_id = config
            .worker_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        Ok(Self {
            store,
            registry: registry.into(),
            config,
            worker_id,
            cancel: CancellationToken::new(),
        })
    }

    /// Underlying record store.
    #[must_use]
    pub const fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    /// Id written into this worker's claims.
    #[must_use]
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Token that stops [`Scheduler::run`] at the next task boundary.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Every parameter set crossed with steps `0..=max_step` and the
    /// configured seeds, step-major.
    ///
    /// # Errors
    ///
    /// Returns error if the inputs cannot be loaded.
    pub async fn build_queue(&self, max_step: u32) -> Result<VecDeque<Task>> {
        let inputs: Vec<ParameterSet> = self.store.load(Category::Inputs, &Filter::new()).await?;
        let hashes: Vec<&str> = inputs
            .iter()
            .filter_map(|input| {
                let hash = input.hash();
                if hash.is_none() {
                    warn!(model = input.spin_model(), "skipping parameter set without hash");
                }
                hash
            })
            .collect();

        let mut queue = VecDeque::new();
        for step in 0..=max_step {
            for &seed in &self.config.seeds {
                for hash in &hashes {
                    queue.push_back(Task::new(*hash, seed, step));
                }
            }
        }
        Ok(queue)
    }

    /// Derive the task's state from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] if the previous result points at a
    /// missing snapshot, or any store error.
    pub async fn poll(&self, task: &Task) -> Result<TaskState> {
        let key = task.key();
        if self.store.contains(Category::Results, &key).await? {
            return Ok(TaskState::Done);
        }

        let previous = match task.previous() {
            None => None,
            Some(prev) => {
                let Some(prior) = self
                    .store
                    .load_result(&prev.input_hash, prev.step, prev.seed)
                    .await?
                else {
                    return Ok(TaskState::Blocked);
                };
                let snapshot = self
                    .store
                    .load_model(&prior.model)
                    .await?
                    .ok_or_else(|| Error::ModelNotFound { hash: prior.model.clone() })?;
                Some(snapshot)
            }
        };

        if self.store.contains(Category::Runs, &key).await? {
            return Ok(TaskState::ClaimedElsewhere);
        }
        Ok(TaskState::Ready { previous })
    }

    /// Run one task whose dependency is satisfied.
    ///
    /// Any failure after the claim is taken leaves the claim in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputNotFound`] for an unknown parameter set,
    /// [`Error::Model`] if the model fails, or any store error.
    pub async fn execute(&self, task: &Task, previous: Option<ModelSnapshot>) -> Result<Execution> {
        let key = task.key();
        let input = self
            .store
            .load_input(&task.input_hash)
            .await?
            .ok_or_else(|| Error::InputNotFound { hash: task.input_hash.clone() })?;

        let mut model = self.registry.build(&input)?;
        model.seed_rng(task.seed);
        if let Some(snapshot) = &previous {
            model.load_json(&snapshot.state())?;
        }

        let claim = Claim::new(task.input_hash.clone(), task.step, task.seed, self.worker_id.clone());
        if !self.store.create(Category::Runs, &claim).await? {
            debug!(%task, "lost claim race");
            return Ok(Execution::ClaimedElsewhere);
        }
        if self.store.contains(Category::Results, &key).await? {
            debug!(%task, "finished elsewhere while claiming");
            self.store.remove(Category::Runs, &key).await?;
            return Ok(Execution::AlreadyDone);
        }

        info!(%task, sweeps = task.sweeps(), worker = %self.worker_id, "running task");
        model.reset_observables();
        let sweep_stats = model.sample(task.sweeps()).map_err(|e| {
            error!(%task, error = %e, "sampling failed, claim left in place");
            Error::Model(e)
        })?;
        let observables = model.observable_summaries();
        let spins = model.spins();

        let snapshot = ModelSnapshot::from_state(model.to_json())?;
        if !self.store.create(Category::Models, &snapshot).await? {
            trace!(hash = snapshot.hash(), "snapshot already stored");
        }

        let result = ResultRecord {
            hash: task.input_hash.clone(),
            seed: task.seed,
            step: task.step,
            sweep_stats,
            spins,
            observables,
            model: snapshot.hash().to_string(),
            previous_model: previous.as_ref().map(|prev| prev.hash().to_string()),
        };
        if !self.store.create(Category::Results, &result).await? {
            warn!(%task, "result already written by another worker, keeping it");
        }

        self.store.remove(Category::Runs, &key).await?;
        Ok(Execution::Completed(result))
    }

    /// Drive every task for steps `0..=max_step` until the queue drains,
    /// the token is cancelled or the deadline passes.
    ///
    /// When a whole rotation of the queue is blocked on dependencies the
    /// scheduler sleeps, doubling the delay up to the configured cap.
    ///
    /// # Errors
    ///
    /// Returns the first store or model error; no task is retried.
    pub async fn run(&self, max_step: u32) -> Result<RunReport> {
        let deadline = self.config.deadline_duration().map(|d| Instant::now() + d);
        let mut queue = self.build_queue(max_step).await?;
        let mut report = RunReport {
            queued: queue.len(),
            ..RunReport::default()
        };
        let mut backoff = Backoff::new(
            self.config.poll_interval_duration(),
            self.config.max_backoff_duration(),
        );
        let mut blocked_streak = 0usize;
        info!(worker = %self.worker_id, max_step, tasks = queue.len(), "scheduler started");

        while let Some(task) = queue.pop_front() {
            if let Some(stop) = self.stop_reason(deadline) {
                queue.push_front(task);
                report.stop = stop;
                break;
            }

            match self.poll(&task).await? {
                TaskState::Done => {
                    trace!(%task, "already done");
                    report.already_done += 1;
                }
                TaskState::ClaimedElsewhere => {
                    debug!(%task, "claimed elsewhere, dropping");
                    report.claimed_elsewhere += 1;
                }
                TaskState::Blocked => {
                    trace!(%task, "dependency not ready, requeueing");
                    queue.push_back(task);
                    report.requeued += 1;
                    blocked_streak += 1;
                    if blocked_streak >= queue.len() {
                        self.wait(backoff.next_delay(), deadline).await;
                        blocked_streak = 0;
                    }
                    continue;
                }
                TaskState::Ready { previous } => match self.execute(&task, previous).await? {
                    Execution::Completed(_) => report.executed += 1,
                    Execution::ClaimedElsewhere => report.claimed_elsewhere += 1,
                    Execution::AlreadyDone => report.already_done += 1,
                },
            }
            blocked_streak = 0;
            backoff.reset();
        }

        report.remaining = queue.len();
        info!(
            worker = %self.worker_id,
            executed = report.executed,
            remaining = report.remaining,
            stop = ?report.stop,
            "scheduler stopped"
        );
        Ok(report)
    }

    /// Every stored result.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn results(&self) -> Result<Vec<ResultRecord>> {
        self.store.load(Category::Results, &Filter::new()).await
    }

    fn stop_reason(&self, deadline: Option<Instant>) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        deadline
            .filter(|deadline| Instant::now() >= *deadline)
            .map(|_| StopReason::DeadlineExceeded)
    }

    async fn wait(&self, delay: Duration, deadline: Option<Instant>) {
        let delay = deadline.map_or(delay, |deadline| {
            delay.min(deadline.saturating_duration_since(Instant::now()))
        });
        trace!(?delay, "all queued tasks blocked, backing off");
        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::kv::MemoryKvStore;
    use crate::model::IsingChain;
    use serde_json::json;

    async fn scheduler_with_input() -> (Scheduler<MemoryKvStore>, String) {
        let store = RecordStore::new(MemoryKvStore::new(), StoreConfig::default());
        let input = ParameterSet::new(IsingChain::NAME, json!({"length": 4}), json!([1.0, -1.0, 1.0, 0.5]), 1.5);
        store.save(Category::Inputs, &input).await.unwrap();
        let hash = input.content_hash().unwrap();
        let config = SchedulerConfig::default()
            .poll_interval(Duration::from_millis(1))
            .max_backoff(Duration::from_millis(5))
            .worker_id("unit");
        let scheduler = Scheduler::new(store, ModelRegistry::with_builtin(), config).unwrap();
        (scheduler, hash)
    }

    #[tokio::test]
    async fn test_queue_is_step_major() {
        let (scheduler, hash) = scheduler_with_input().await;
        let queue = scheduler.build_queue(2).await.unwrap();

        let steps: Vec<u32> = queue.iter().map(|task| task.step).collect();
        assert_eq!(steps, vec![0, 1, 2]);
        assert!(queue.iter().all(|task| task.input_hash == hash && task.seed == 0));
    }

    #[tokio::test]
    async fn test_poll_states() {
        let (scheduler, hash) = scheduler_with_input().await;
        let first = Task::new(hash.clone(), 0, 0);
        let second = Task::new(hash.clone(), 0, 1);

        assert_eq!(scheduler.poll(&first).await.unwrap(), TaskState::Ready { previous: None });
        assert_eq!(scheduler.poll(&second).await.unwrap(), TaskState::Blocked);

        scheduler
            .store()
            .save(Category::Runs, &Claim::new(hash.clone(), 0, 0, "other"))
            .await
            .unwrap();
        assert_eq!(scheduler.poll(&first).await.unwrap(), TaskState::ClaimedElsewhere);
    }

    #[tokio::test]
    async fn test_execute_releases_claim_and_links_snapshot() {
        let (scheduler, hash) = scheduler_with_input().await;
        let first = Task::new(hash.clone(), 0, 0);

        let Execution::Completed(result) = scheduler.execute(&first, None).await.unwrap() else {
            panic!("expected completion");
        };
        assert!(scheduler.store().is_empty(Category::Runs).await.unwrap());
        assert!(result.previous_model.is_none());
        assert_eq!(scheduler.poll(&first).await.unwrap(), TaskState::Done);

        let second = Task::new(hash, 0, 1);
        let TaskState::Ready { previous: Some(snapshot) } = scheduler.poll(&second).await.unwrap() else {
            panic!("expected step 1 to be ready with a snapshot");
        };
        assert_eq!(snapshot.hash(), result.model);
    }

    #[tokio::test]
    async fn test_execute_loses_claim_race() {
        let (scheduler, hash) = scheduler_with_input().await;
        let task = Task::new(hash.clone(), 0, 0);
        scheduler
            .store()
            .save(Category::Runs, &Claim::new(hash, 0, 0, "other"))
            .await
            .unwrap();

        assert_eq!(
            scheduler.execute(&task, None).await.unwrap(),
            Execution::ClaimedElsewhere
        );
        assert!(scheduler.store().is_empty(Category::Results).await.unwrap());
    }

    #[tokio::test]
    async fn test_execute_unknown_input() {
        let (scheduler, _) = scheduler_with_input().await;
        let err = scheduler
            .execute(&Task::new("abcdef", 0, 0), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InputNotFound { hash } if hash == "abcdef"));
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_queue() {
        let (scheduler, _) = scheduler_with_input().await;
        scheduler.cancellation_token().cancel();

        let report = scheduler.run(1).await.unwrap();

        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.executed, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = RecordStore::new(MemoryKvStore::new(), StoreConfig::default());
        let result = Scheduler::new(
            store,
            ModelRegistry::new(),
            SchedulerConfig::default().seeds(vec![]),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_worker_ids_are_unique() {
        let a = Scheduler::new(
            RecordStore::new(MemoryKvStore::new(), StoreConfig::default()),
            ModelRegistry::new(),
            SchedulerConfig::default(),
        )
        .unwrap();
        let b = Scheduler::new(
            RecordStore::new(MemoryKvStore::new(), StoreConfig::default()),
            ModelRegistry::new(),
            SchedulerConfig::default(),
        )
        .unwrap();

        assert_ne!(a.worker_id(), b.worker_id());
        assert_eq!(a.worker_id().len(), 32);
    }
}
