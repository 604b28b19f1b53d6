//! Work units and their scheduling states.

use crate::store::{Filter, ModelSnapshot, ResultRecord};
use std::fmt;

/// One unit of work: `2^step` sweeps of one parameter set under one seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    /// Parameter set hash.
    pub input_hash: String,
    /// Random seed.
    pub seed: u64,
    /// Step exponent.
    pub step: u32,
}

impl Task {
    /// Create a task.
    #[must_use]
    pub fn new(input_hash: impl Into<String>, seed: u64, step: u32) -> Self {
        Self {
            input_hash: input_hash.into(),
            seed,
            step,
        }
    }

    /// Sweeps this task performs.
    #[must_use]
    pub const fn sweeps(&self) -> u64 {
        2u64.saturating_pow(self.step)
    }

    /// Task this one depends on, `None` at step 0.
    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        let step = self.step.checked_sub(1)?;
        Some(Self::new(self.input_hash.clone(), self.seed, step))
    }

    /// Store key of the task's result and claim.
    #[must_use]
    pub fn key(&self) -> Filter {
        Filter::key(self.input_hash.clone(), self.step, self.seed)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tau{}/{}/seed{}", self.step, self.input_hash, self.seed)
    }
}

/// Where a task stands, derived from the store on every poll.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// A result exists.
    Done,
    /// The previous step has no result yet.
    Blocked,
    /// Another worker holds the claim.
    ClaimedElsewhere,
    /// Runnable, starting from `previous` when the step is above zero.
    Ready {
        /// Snapshot written by the previous step.
        previous: Option<ModelSnapshot>,
    },
}

/// What happened when a ready task was handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// Ran to completion and wrote this result.
    Completed(ResultRecord),
    /// Lost the claim race to another worker.
    ClaimedElsewhere,
    /// Another worker finished it between the poll and the claim.
    AlreadyDone,
}
