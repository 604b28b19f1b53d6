//! Record categories and their key fields.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Key fields a category's file name can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    /// Content hash (parameter set hash for results/runs).
    Hash,
    /// Step exponent, `tau` on disk.
    Step,
    /// Random seed.
    Seed,
}

impl KeyField {
    /// Field name as stored inside records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Step => "tau",
            Self::Seed => "seed",
        }
    }
}

/// Named partitions of the record store, one directory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Parameter sets, produced outside the scheduler.
    Inputs,
    /// Completed task outputs.
    Results,
    /// Content-addressed model snapshots.
    Models,
    /// Claims held by running workers.
    Runs,
}

impl Category {
    /// Every registered category.
    pub const ALL: [Self; 4] = [Self::Inputs, Self::Results, Self::Models, Self::Runs];

    /// Directory name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Results => "results",
            Self::Models => "models",
            Self::Runs => "runs",
        }
    }

    /// Fields the category's naming template needs.
    #[must_use]
    pub const fn key_fields(self) -> &'static [KeyField] {
        match self {
            Self::Inputs | Self::Models => &[KeyField::Hash],
            Self::Results | Self::Runs => &[KeyField::Step, KeyField::Hash, KeyField::Seed],
        }
    }

    /// Whether records may be deleted once written.
    #[must_use]
    pub const fn is_ephemeral(self) -> bool {
        matches!(self, Self::Runs)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == name)
            .ok_or_else(|| Error::Configuration(format!("unknown record category `{name}`")))
    }
}
