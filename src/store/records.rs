//! Typed records for each category.
//!
//! ```text
//! ParameterSet (inputs) ──< ResultRecord (results, one per step/seed)
//!                                │
//!                                └── ModelSnapshot (models, by content hash)
//! Claim (runs): ephemeral, one per task being executed
//! ```
//!
//! On disk the step is stored under `tau`.

use super::hash::content_hash;
use super::naming::Filter;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parameter set describing one model to run.
///
/// Keyed by the content hash of its remaining fields. Fields this crate does
/// not know about are kept so they still take part in the hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    spin_model: String,
    spin_model_params: Value,
    disorder: Value,
    temperature: f64,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl ParameterSet {
    /// Create an unhashed parameter set.
    ///
    /// # Arguments
    ///
    /// * `spin_model` - Registry name of the model
    /// * `spin_model_params` - Object of named or array of positional arguments
    /// * `disorder` - Disorder configuration handed to `init_disorder`
    /// * `temperature` - Sampling temperature
    #[must_use]
    pub fn new(
        spin_model: impl Into<String>,
        spin_model_params: Value,
        disorder: Value,
        temperature: f64,
    ) -> Self {
        Self {
            hash: None,
            spin_model: spin_model.into(),
            spin_model_params,
            disorder,
            temperature,
            extra: BTreeMap::new(),
        }
    }

    /// Attach an extra descriptive field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Stored hash, present once the set has been saved.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Hash over every field except `hash` itself.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be encoded as JSON.
    pub fn content_hash(&self) -> Result<String> {
        let mut body = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut body {
            fields.remove("hash");
        }
        Ok(content_hash(&body))
    }

    /// Registry name of the model.
    #[must_use]
    pub fn spin_model(&self) -> &str {
        &self.spin_model
    }

    /// Model construction arguments.
    #[must_use]
    pub const fn spin_model_params(&self) -> &Value {
        &self.spin_model_params
    }

    /// Disorder configuration.
    #[must_use]
    pub const fn disorder(&self) -> &Value {
        &self.disorder
    }

    /// Sampling temperature.
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }
}

/// Output of one completed task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    /// Parameter set hash.
    pub hash: String,
    /// Random seed.
    pub seed: u64,
    /// Step exponent.
    #[serde(rename = "tau")]
    pub step: u32,
    /// Statistics returned by the sampler.
    pub sweep_stats: Value,
    /// Spin configuration at the end of the task.
    pub spins: Value,
    /// Observable summaries keyed by label.
    pub observables: BTreeMap<String, Value>,
    /// Hash of the snapshot written by this task.
    pub model: String,
    /// Hash of the snapshot the task started from (absent at step 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_model: Option<String>,
}

impl ResultRecord {
    /// Full key of the result.
    #[must_use]
    pub fn key(&self) -> Filter {
        Filter::key(self.hash.clone(), self.step, self.seed)
    }
}

/// Serialized model state, addressed by the hash of its content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelSnapshot {
    hash: String,
    #[serde(flatten)]
    state: Map<String, Value>,
}

impl ModelSnapshot {
    /// Wrap a model's `to_json` output and hash it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if the state is not a JSON object.
    pub fn from_state(state: Value) -> Result<Self> {
        let Value::Object(mut state) = state else {
            return Err(Error::Model(anyhow::anyhow!(
                "model state must serialize to a JSON object"
            )));
        };
        state.remove("hash");
        let hash = content_hash(&Value::Object(state.clone()));
        Ok(Self { hash, state })
    }

    /// Content hash.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// State without the hash, as handed back to `load_json`.
    #[must_use]
    pub fn state(&self) -> Value {
        Value::Object(self.state.clone())
    }
}

/// Marker that a worker is executing a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    /// Parameter set hash.
    pub hash: String,
    /// Random seed.
    pub seed: u64,
    /// Step exponent.
    #[serde(rename = "tau")]
    pub step: u32,
    /// Worker id of the owner.
    pub controller: String,
    /// Process id of the owner.
    pub pid: u32,
    /// When the claim was taken.
    pub start: DateTime<Utc>,
}

impl Claim {
    /// Claim for the current process, timestamped now.
    #[must_use]
    pub fn new(hash: impl Into<String>, step: u32, seed: u64, controller: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            seed,
            step,
            controller: controller.into(),
            pid: std::process::id(),
            start: Utc::now(),
        }
    }

    /// Full key of the claimed task.
    #[must_use]
    pub fn key(&self) -> Filter {
        Filter::key(self.hash.clone(), self.step, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameter_set_hash_excludes_hash_field() {
        let set = ParameterSet::new("IsingChain", json!({"length": 4}), json!([1, 1, 1, 1]), 1.0);
        let mut saved = set.clone();
        saved.hash = Some("deadbeef".into());

        assert_eq!(set.content_hash().unwrap(), saved.content_hash().unwrap());
    }

    #[test]
    fn test_parameter_set_extra_fields_roundtrip() {
        let set = ParameterSet::new("IsingChain", json!([4]), json!([]), 0.5)
            .with_field("label", json!("run-a"));
        let encoded = serde_json::to_value(&set).unwrap();

        assert_eq!(encoded["label"], json!("run-a"));
        assert!(encoded.get("hash").is_none());
        let decoded: ParameterSet = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_snapshot_hash_ignores_embedded_hash() {
        let a = ModelSnapshot::from_state(json!({"spins": [1, -1]})).unwrap();
        let b = ModelSnapshot::from_state(json!({"spins": [1, -1], "hash": "zz"})).unwrap();

        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.state(), json!({"spins": [1, -1]}));
    }

    #[test]
    fn test_snapshot_rejects_non_object_state() {
        assert!(matches!(
            ModelSnapshot::from_state(json!([1, 2])),
            Err(Error::Model(_))
        ));
    }

    #[test]
    fn test_step_is_stored_as_tau() {
        let claim = Claim::new("ab", 3, 0, "worker");
        let encoded = serde_json::to_value(&claim).unwrap();

        assert_eq!(encoded["tau"], json!(3));
        assert_eq!(encoded["pid"], json!(std::process::id()));
        assert_eq!(claim.key(), Filter::key("ab", 3, 0));
    }
}
