//! Spin model collaborator contract.
//!
//! The scheduler never looks inside a model. It builds one from a
//! [`ParameterSet`] through a [`ModelRegistry`], drives it through
//! [`SpinModel`], and persists whatever the model reports.

mod ising;

pub use ising::{IsingChain, RunningStats};

use crate::store::ParameterSet;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Statistic collector attached to a model.
pub trait Observable: Send {
    /// Label the summary is stored under.
    fn label(&self) -> &str;

    /// Forget everything collected so far.
    fn reset(&mut self);

    /// Summary of what was collected since the last reset.
    fn summary(&self) -> Value;
}

/// A simulated model that can be sampled and snapshotted.
pub trait SpinModel: Send {
    /// Apply the disorder configuration from the parameter set.
    ///
    /// # Errors
    ///
    /// Returns error if the disorder does not fit the model.
    fn init_disorder(&mut self, disorder: &Value) -> anyhow::Result<()>;

    /// Current sampling temperature.
    fn temperature(&self) -> f64;

    /// Set the sampling temperature.
    fn set_temperature(&mut self, temperature: f64);

    /// Reseed the model's random stream.
    fn seed_rng(&mut self, seed: u64);

    /// Run `n_sweeps` sweeps; returns sweep statistics.
    ///
    /// # Errors
    ///
    /// Returns error if sampling fails.
    fn sample(&mut self, n_sweeps: u64) -> anyhow::Result<Value>;

    /// Observables in a stable order.
    fn observables(&self) -> Vec<&dyn Observable>;

    /// Mutable access to the observables, same order.
    fn observables_mut(&mut self) -> Vec<&mut dyn Observable>;

    /// Current spin configuration.
    fn spins(&self) -> Value;

    /// Serialize the full model state.
    fn to_json(&self) -> Value;

    /// Restore state produced by [`SpinModel::to_json`].
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot does not belong to this model.
    fn load_json(&mut self, snapshot: &Value) -> anyhow::Result<()>;

    /// Reset every observable.
    fn reset_observables(&mut self) {
        for observable in self.observables_mut() {
            observable.reset();
        }
    }

    /// Observable summaries keyed by label.
    fn observable_summaries(&self) -> BTreeMap<String, Value> {
        self.observables()
            .into_iter()
            .map(|observable| (observable.label().to_string(), observable.summary()))
            .collect()
    }
}

/// Builds a model from `spin_model_params`.
pub type ModelConstructor =
    Box<dyn Fn(&Value) -> anyhow::Result<Box<dyn SpinModel>> + Send + Sync>;

/// Names to model constructors, owned by one scheduler.
#[derive(Default)]
pub struct ModelRegistry {
    constructors: HashMap<String, ModelConstructor>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

impl ModelRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the models shipped in this crate.
    #[must_use]
    pub fn with_builtin() -> Self {
        Self::new().with(IsingChain::NAME, |params| {
            Ok(Box::new(IsingChain::from_params(params)?) as Box<dyn SpinModel>)
        })
    }

    /// Register a constructor, replacing any under the same name.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Box<dyn SpinModel>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
        self
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct the model described by `input`, with disorder and
    /// temperature applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unregistered model name and
    /// [`Error::Model`] if construction fails.
    pub fn build(&self, input: &ParameterSet) -> Result<Box<dyn SpinModel>> {
        let constructor = self.constructors.get(input.spin_model()).ok_or_else(|| {
            Error::Configuration(format!("unknown spin model `{}`", input.spin_model()))
        })?;
        let mut model = constructor(input.spin_model_params())?;
        model.init_disorder(input.disorder())?;
        model.set_temperature(input.temperature());
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_registry_builds_ising_chain() {
        let registry = ModelRegistry::with_builtin();
        let input = ParameterSet::new(IsingChain::NAME, json!({"length": 3}), json!([1.0, -1.0, 0.5]), 2.5);

        let model = registry.build(&input).unwrap();

        assert!((model.temperature() - 2.5).abs() < f64::EPSILON);
        assert_eq!(model.spins(), json!([1, 1, 1]));
        assert_eq!(registry.names(), vec![IsingChain::NAME]);
    }

    #[test]
    fn test_unknown_model_is_configuration_error() {
        let registry = ModelRegistry::with_builtin();
        let input = ParameterSet::new("Toric3D", json!({}), json!([]), 1.0);

        let err = registry.build(&input).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_bad_disorder_is_model_error() {
        let registry = ModelRegistry::with_builtin();
        let input = ParameterSet::new(IsingChain::NAME, json!([4]), json!([1.0]), 1.0);

        assert!(matches!(registry.build(&input), Err(Error::Model(_))));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = ModelRegistry::with_builtin();
        let b = ModelRegistry::new();

        assert!(a.contains(IsingChain::NAME));
        assert!(!b.contains(IsingChain::NAME));
    }
}
