//! File naming grammar: key fields to file name and back.
//!
//! | category | template | key fields |
//! |---|---|---|
//! | inputs | `input_<hash>.json` | hash |
//! | results | `results_tau<step>_<hash>_seed<seed>.json` | step, hash, seed |
//! | models | `model_<hash>.json` | hash |
//! | runs | `run_tau<step>_<hash>_seed<seed>.json` | step, hash, seed |
//!
//! Data directories written by the legacy tooling name claims with the
//! `results_tau…` template while still parsing them with the `run_tau…`
//! pattern; [`RunsNaming::Legacy`] reproduces that.

use super::category::{Category, KeyField};
use crate::config::RunsNaming;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Partial mapping of key fields to values.
///
/// Used both as a query (`None` = unconstrained) and as the set of key
/// fields parsed back out of a file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Filter {
    /// Content hash.
    pub hash: Option<String>,
    /// Step exponent.
    pub step: Option<u32>,
    /// Random seed.
    pub seed: Option<u64>,
}

impl Filter {
    /// Empty filter, matching every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full `(hash, step, seed)` key of a result or claim.
    #[must_use]
    pub fn key(hash: impl Into<String>, step: u32, seed: u64) -> Self {
        Self::new().hash(hash).step(step).seed(seed)
    }

    /// Constrain the hash.
    #[must_use]
    pub fn hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Constrain the step.
    #[must_use]
    pub const fn step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    /// Constrain the seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// True when no field is constrained.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hash.is_none() && self.step.is_none() && self.seed.is_none()
    }

    /// Drop every constraint on a field not in `fields`.
    #[must_use]
    pub fn only(&self, fields: &[KeyField]) -> Self {
        Self {
            hash: self.hash.clone().filter(|_| fields.contains(&KeyField::Hash)),
            step: self.step.filter(|_| fields.contains(&KeyField::Step)),
            seed: self.seed.filter(|_| fields.contains(&KeyField::Seed)),
        }
    }

    const fn has(&self, field: KeyField) -> bool {
        match field {
            KeyField::Hash => self.hash.is_some(),
            KeyField::Step => self.step.is_some(),
            KeyField::Seed => self.seed.is_some(),
        }
    }

    /// True when every constrained field of `self` is present and equal in
    /// `fields`.
    #[must_use]
    pub fn matches(&self, fields: &Self) -> bool {
        fn field_ok<T: PartialEq>(want: Option<&T>, got: Option<&T>) -> bool {
            want.map_or(true, |want| got == Some(want))
        }
        field_ok(self.hash.as_ref(), fields.hash.as_ref())
            && field_ok(self.step.as_ref(), fields.step.as_ref())
            && field_ok(self.seed.as_ref(), fields.seed.as_ref())
    }

    /// Key fields carried by a JSON record body.
    #[must_use]
    pub fn from_record(record: &Map<String, Value>) -> Self {
        Self {
            hash: record
                .get(KeyField::Hash.as_str())
                .and_then(Value::as_str)
                .map(str::to_string),
            step: record
                .get(KeyField::Step.as_str())
                .and_then(Value::as_u64)
                .and_then(|step| u32::try_from(step).ok()),
            seed: record.get(KeyField::Seed.as_str()).and_then(Value::as_u64),
        }
    }
}

fn inputs_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^input_([0-9a-f]+)\.json$").expect("valid regex literal"))
}

fn results_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^results_tau(\d+)_([0-9a-f]+)_seed(\d+)\.json$").expect("valid regex literal")
    })
}

fn models_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^model_([0-9a-f]+)\.json$").expect("valid regex literal"))
}

fn runs_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^run_tau(\d+)_([0-9a-f]+)_seed(\d+)\.json$").expect("valid regex literal")
    })
}

/// Per-store naming grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingGrammar {
    runs: RunsNaming,
}

impl NamingGrammar {
    /// Grammar with the given claim naming.
    #[must_use]
    pub const fn new(runs: RunsNaming) -> Self {
        Self { runs }
    }

    /// Claim naming in use.
    #[must_use]
    pub const fn runs_naming(&self) -> RunsNaming {
        self.runs
    }

    /// File name for the given key fields.
    ///
    /// Returns `None` when a field the template needs is missing.
    #[must_use]
    pub fn name(&self, category: Category, fields: &Filter) -> Option<String> {
        if !category.key_fields().iter().all(|field| fields.has(*field)) {
            return None;
        }
        let hash = fields.hash.as_deref()?;
        let name = match category {
            Category::Inputs => format!("input_{hash}.json"),
            Category::Models => format!("model_{hash}.json"),
            Category::Results => {
                format!("results_tau{}_{hash}_seed{}.json", fields.step?, fields.seed?)
            }
            Category::Runs => {
                let prefix = match self.runs {
                    RunsNaming::Unified => "run",
                    RunsNaming::Legacy => "results",
                };
                format!("{prefix}_tau{}_{hash}_seed{}.json", fields.step?, fields.seed?)
            }
        };
        Some(name)
    }

    /// Key fields parsed back out of a file name.
    ///
    /// Returns `None` for names the category's pattern does not recognise.
    #[must_use]
    pub fn parse(&self, category: Category, name: &str) -> Option<Filter> {
        match category {
            Category::Inputs => parse_hash_only(inputs_pattern(), name),
            Category::Models => parse_hash_only(models_pattern(), name),
            Category::Results => parse_task_key(results_pattern(), name),
            Category::Runs => parse_task_key(runs_pattern(), name),
        }
    }
}

fn parse_hash_only(pattern: &Regex, name: &str) -> Option<Filter> {
    let caps = pattern.captures(name)?;
    Some(Filter::new().hash(&caps[1]))
}

fn parse_task_key(pattern: &Regex, name: &str) -> Option<Filter> {
    let caps = pattern.captures(name)?;
    Some(Filter::key(
        &caps[2],
        caps[1].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}
