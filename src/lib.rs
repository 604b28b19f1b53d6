//! # mcmc-chains: Filesystem-Coordinated Monte-Carlo Chain Scheduler
//!
//! Long Monte-Carlo chains are split into tasks `(input_hash, seed, step)`,
//! each running `2^step` sweeps from where `step - 1` left off. Any number of
//! uncoordinated worker processes execute them, with a shared directory as the
//! only coordination substrate.
//!
//! ## Components
//!
//! - [`store`]: JSON records in `inputs/`, `results/`, `models/` and `runs/`,
//!   named after their primary keys
//! - [`scheduler`]: FIFO task queue with dependency polling and atomic claims
//! - [`model`]: the spin model contract the scheduler drives
//! - [`kv`]: in-memory and file-backed byte storage under the record store
//!
//! ## Example
//!
//! ```rust,no_run
//! use mcmc_chains::kv::FileKvStore;
//! use mcmc_chains::model::ModelRegistry;
//! use mcmc_chains::scheduler::Scheduler;
//! use mcmc_chains::store::RecordStore;
//! use mcmc_chains::{SchedulerConfig, StoreConfig};
//!
//! # async fn example() -> mcmc_chains::Result<()> {
//! let kv = FileKvStore::open("data/chains")?;
//! let store = RecordStore::new(kv, StoreConfig::default());
//! let scheduler = Scheduler::new(store, ModelRegistry::with_builtin(), SchedulerConfig::default())?;
//!
//! let report = scheduler.run(10).await?;
//! println!("executed {} tasks", report.executed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod kv;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use config::{RunsNaming, SchedulerConfig, StoreConfig};
pub use error::{Error, Result};
