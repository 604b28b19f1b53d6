//! Shared fixtures for integration tests.

#![allow(dead_code)]

use mcmc_chains::kv::KvStore;
use mcmc_chains::model::{IsingChain, ModelRegistry, Observable, SpinModel};
use mcmc_chains::store::{Category, ParameterSet, RecordStore};
use mcmc_chains::{Result, SchedulerConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Ising chain parameter set of the given length and temperature.
pub fn ising_input(length: usize, temperature: f64) -> ParameterSet {
    let couplings: Vec<f64> = (0..length)
        .map(|i| if i % 3 == 0 { -1.0 } else { 1.0 })
        .collect();
    ParameterSet::new(IsingChain::NAME, json!({"length": length}), json!(couplings), temperature)
}

/// Save parameter sets and return their hashes in the same order.
pub async fn register_inputs<S: KvStore>(
    store: &RecordStore<S>,
    inputs: &[ParameterSet],
) -> Vec<String> {
    let mut hashes = Vec::new();
    for input in inputs {
        store.save(Category::Inputs, input).await.unwrap();
        hashes.push(input.content_hash().unwrap());
    }
    hashes
}

/// Scheduler config with fast polling for tests.
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig::default()
        .poll_interval(Duration::from_millis(2))
        .max_backoff(Duration::from_millis(20))
}

/// Model whose sampler always fails.
#[derive(Debug, Default)]
pub struct FailingModel {
    temperature: f64,
}

impl FailingModel {
    pub const NAME: &'static str = "Failing";
}

impl SpinModel for FailingModel {
    fn init_disorder(&mut self, _disorder: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    fn seed_rng(&mut self, _seed: u64) {}

    fn sample(&mut self, _n_sweeps: u64) -> anyhow::Result<Value> {
        anyhow::bail!("sampler diverged")
    }

    fn observables(&self) -> Vec<&dyn Observable> {
        Vec::new()
    }

    fn observables_mut(&mut self) -> Vec<&mut dyn Observable> {
        Vec::new()
    }

    fn spins(&self) -> Value {
        json!([])
    }

    fn to_json(&self) -> Value {
        json!({})
    }

    fn load_json(&mut self, _snapshot: &Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Model whose snapshot carries its own `seed` and `tau` bookkeeping.
#[derive(Debug, Default)]
pub struct SeedTaggedModel {
    temperature: f64,
    seed: u64,
    sweeps: u64,
}

impl SeedTaggedModel {
    pub const NAME: &'static str = "SeedTagged";
}

impl SpinModel for SeedTaggedModel {
    fn init_disorder(&mut self, _disorder: &Value) -> anyhow::Result<()> {
        Ok(())
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    fn seed_rng(&mut self, seed: u64) {
        self.seed = seed;
    }

    fn sample(&mut self, n_sweeps: u64) -> anyhow::Result<Value> {
        self.sweeps += n_sweeps;
        Ok(json!({"n_sweeps": n_sweeps}))
    }

    fn observables(&self) -> Vec<&dyn Observable> {
        Vec::new()
    }

    fn observables_mut(&mut self) -> Vec<&mut dyn Observable> {
        Vec::new()
    }

    fn spins(&self) -> Value {
        json!([1])
    }

    fn to_json(&self) -> Value {
        json!({"spins": [1], "seed": self.seed, "tau": self.sweeps, "sweeps": self.sweeps})
    }

    fn load_json(&mut self, snapshot: &Value) -> anyhow::Result<()> {
        self.sweeps = snapshot["sweeps"].as_u64().unwrap_or_default();
        Ok(())
    }
}

/// Built-in models plus [`FailingModel`] and [`SeedTaggedModel`].
pub fn registry_with_failing() -> ModelRegistry {
    ModelRegistry::with_builtin()
        .with(FailingModel::NAME, |_| {
            Ok(Box::new(FailingModel::default()) as Box<dyn SpinModel>)
        })
        .with(SeedTaggedModel::NAME, |_| {
            Ok(Box::new(SeedTaggedModel::default()) as Box<dyn SpinModel>)
        })
}

/// KV wrapper counting mutating calls.
#[derive(Debug, Default)]
pub struct CountingKvStore<S> {
    inner: S,
    writes: AtomicUsize,
}

impl<S> CountingKvStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl<S: KvStore> KvStore for CountingKvStore<S> {
    async fn get(&self, table: &str, name: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(table, name).await
    }

    async fn put(&self, table: &str, name: &str, value: Vec<u8>) -> Result<()> {
        self.bump();
        self.inner.put(table, name, value).await
    }

    async fn put_if_absent(&self, table: &str, name: &str, value: Vec<u8>) -> Result<bool> {
        self.bump();
        self.inner.put_if_absent(table, name, value).await
    }

    async fn delete(&self, table: &str, name: &str) -> Result<bool> {
        self.bump();
        self.inner.delete(table, name).await
    }

    async fn list(&self, table: &str) -> Result<Vec<String>> {
        self.inner.list(table).await
    }

    async fn exists(&self, table: &str, name: &str) -> Result<bool> {
        self.inner.exists(table, name).await
    }
}
