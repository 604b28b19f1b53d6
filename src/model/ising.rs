//! Random-bond Ising chain with single-spin Metropolis updates.
//!
//! Periodic 1-D chain, `H = -Σ J_i s_i s_{i+1}`. The disorder is the list of
//! couplings `J_i`, one per bond.

use super::{Observable, SpinModel};
use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::{json, Value};

/// Running sum and sum of squares of a scalar series.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningStats {
    label: String,
    count: u64,
    total: f64,
    total_2: f64,
}

impl RunningStats {
    /// Empty collector.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
            total: 0.0,
            total_2: 0.0,
        }
    }

    /// Add one sample.
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.total_2 += value * value;
    }

    /// Number of samples since the last reset.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Sample mean, `None` before the first sample.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

impl Observable for RunningStats {
    fn label(&self) -> &str {
        &self.label
    }

    fn reset(&mut self) {
        self.count = 0;
        self.total = 0.0;
        self.total_2 = 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    fn summary(&self) -> Value {
        let variance = self.mean().map(|mean| self.total_2 / self.count as f64 - mean * mean);
        json!({
            "count": self.count,
            "total": self.total,
            "total_2": self.total_2,
            "mean": self.mean(),
            "variance": variance,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChainState {
    spin_model: String,
    couplings: Vec<f64>,
    spins: Vec<i8>,
    temperature: f64,
    sweeps: u64,
}

/// Periodic random-bond Ising chain.
#[derive(Debug, Clone)]
pub struct IsingChain {
    couplings: Vec<f64>,
    spins: Vec<i8>,
    temperature: f64,
    sweeps: u64,
    rng: StdRng,
    energy: RunningStats,
    magnetization: RunningStats,
}

impl IsingChain {
    /// Registry name.
    pub const NAME: &'static str = "IsingChain";

    /// Ferromagnetic chain of `length` spins, all up.
    ///
    /// # Errors
    ///
    /// Returns error if `length < 2`.
    pub fn new(length: usize) -> anyhow::Result<Self> {
        if length < 2 {
            bail!("IsingChain needs at least 2 spins, got {length}");
        }
        Ok(Self {
            couplings: vec![1.0; length],
            spins: vec![1; length],
            temperature: 1.0,
            sweeps: 0,
            rng: StdRng::seed_from_u64(0),
            energy: RunningStats::new("Energy"),
            magnetization: RunningStats::new("Magnetization"),
        })
    }

    /// Build from `{"length": n}` or `[n]`.
    ///
    /// # Errors
    ///
    /// Returns error if the length is missing or invalid.
    pub fn from_params(params: &Value) -> anyhow::Result<Self> {
        let length = match params {
            Value::Object(named) => named.get("length"),
            Value::Array(positional) => positional.first(),
            _ => None,
        }
        .and_then(Value::as_u64)
        .context("IsingChain params need a `length`")?;
        Self::new(usize::try_from(length)?)
    }

    /// Number of spins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spins.len()
    }

    /// Always false; a chain has at least two spins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }

    /// Total sweeps performed over the chain's lifetime.
    #[must_use]
    pub const fn total_sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Total energy of the current configuration.
    #[must_use]
    pub fn energy(&self) -> f64 {
        let n = self.len();
        (0..n)
            .map(|i| -self.couplings[i] * f64::from(self.spins[i]) * f64::from(self.spins[(i + 1) % n]))
            .sum()
    }

    /// Mean spin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn magnetization(&self) -> f64 {
        self.spins.iter().map(|&s| f64::from(s)).sum::<f64>() / self.len() as f64
    }

    fn flip_cost(&self, i: usize) -> f64 {
        let n = self.len();
        let left = (i + n - 1) % n;
        let right = (i + 1) % n;
        let field = self.couplings[left] * f64::from(self.spins[left])
            + self.couplings[i] * f64::from(self.spins[right]);
        2.0 * f64::from(self.spins[i]) * field
    }

    fn sweep(&mut self) -> u64 {
        let mut accepted = 0;
        for i in 0..self.len() {
            let cost = self.flip_cost(i);
            let accept = cost <= 0.0
                || (self.temperature > 0.0 && self.rng.gen::<f64>() < (-cost / self.temperature).exp());
            if accept {
                self.spins[i] = -self.spins[i];
                accepted += 1;
            }
        }
        self.sweeps += 1;
        accepted
    }
}

impl SpinModel for IsingChain {
    fn init_disorder(&mut self, disorder: &Value) -> anyhow::Result<()> {
        let couplings: Vec<f64> =
            serde_json::from_value(disorder.clone()).context("disorder must be a list of couplings")?;
        if couplings.len() != self.len() {
            bail!(
                "disorder has {} couplings for a chain of {} spins",
                couplings.len(),
                self.len()
            );
        }
        self.couplings = couplings;
        Ok(())
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn sample(&mut self, n_sweeps: u64) -> anyhow::Result<Value> {
        let mut accepted = 0u64;
        for _ in 0..n_sweeps {
            accepted = accepted.saturating_add(self.sweep());
            let (energy, magnetization) = (self.energy(), self.magnetization());
            self.energy.record(energy);
            self.magnetization.record(magnetization);
        }
        Ok(json!({
            "n_sweeps": n_sweeps,
            "accepted": accepted,
            "acceptance": acceptance_rate(accepted, n_sweeps, self.len()),
            "total_sweeps": self.sweeps,
        }))
    }

    fn observables(&self) -> Vec<&dyn Observable> {
        vec![&self.energy as &dyn Observable, &self.magnetization]
    }

    fn observables_mut(&mut self) -> Vec<&mut dyn Observable> {
        vec![&mut self.energy as &mut dyn Observable, &mut self.magnetization]
    }

    fn spins(&self) -> Value {
        json!(self.spins)
    }

    fn to_json(&self) -> Value {
        json!({
            "spin_model": Self::NAME,
            "couplings": self.couplings,
            "spins": self.spins,
            "temperature": self.temperature,
            "sweeps": self.sweeps,
        })
    }

    fn load_json(&mut self, snapshot: &Value) -> anyhow::Result<()> {
        let state: ChainState =
            serde_json::from_value(snapshot.clone()).context("not an IsingChain snapshot")?;
        if state.spin_model != Self::NAME {
            bail!("snapshot is for `{}`, not {}", state.spin_model, Self::NAME);
        }
        let same_bonds = state.couplings.len() == self.couplings.len()
            && state
                .couplings
                .iter()
                .zip(&self.couplings)
                .all(|(a, b)| (a - b).abs() <= 1e-12 * a.abs().max(1.0));
        if state.spins.len() != self.len() || !same_bonds {
            bail!("snapshot was taken from a different chain");
        }
        if state.spins.iter().any(|&s| s != 1 && s != -1) {
            bail!("snapshot spins must be +1 or -1");
        }
        self.spins = state.spins;
        self.sweeps = state.sweeps;
        Ok(())
    }
}

/// Accepted flips per proposal; `n_sweeps` may be saturated.
#[allow(clippy::cast_precision_loss)]
fn acceptance_rate(accepted: u64, n_sweeps: u64, len: usize) -> f64 {
    let proposals = n_sweeps.saturating_mul(len as u64);
    if proposals == 0 {
        0.0
    } else {
        accepted as f64 / proposals as f64
    }
}
