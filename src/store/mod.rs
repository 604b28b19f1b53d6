//! Record Store
//!
//! A small schema-aware database without a query engine: JSON records in
//! named categories, one file per record, with the file name encoding the
//! category's primary key (see [`naming`]).
//!
//! ## Lookup paths
//!
//! `load` first tries the single deterministically named record when the
//! filter supplies every key field; on a miss, or for partial filters, it
//! scans the category and matches the key fields parsed from each name.
//! Both paths return the same records for any filter.
//!
//! ## Usage
//!
//! ```rust
//! use mcmc_chains::kv::MemoryKvStore;
//! use mcmc_chains::store::{Category, Filter, ParameterSet, RecordStore};
//! use mcmc_chains::StoreConfig;
//! use serde_json::json;
//!
//! # async fn example() -> mcmc_chains::Result<()> {
//! let store = RecordStore::new(MemoryKvStore::new(), StoreConfig::default());
//!
//! let input = ParameterSet::new("IsingChain", json!({"length": 8}), json!(vec![1.0; 8]), 1.0);
//! let name = store.save(Category::Inputs, &input).await?;
//! assert!(name.starts_with("input_"));
//!
//! let inputs: Vec<ParameterSet> = store.load(Category::Inputs, &Filter::new()).await?;
//! assert_eq!(inputs.len(), 1);
//! # Ok(())
//! # }
//! ```

mod category;
mod hash;
pub mod naming;
mod records;

pub use category::{Category, KeyField};
pub use hash::content_hash;
pub use naming::{Filter, NamingGrammar};
pub use records::{Claim, ModelSnapshot, ParameterSet, ResultRecord};

use crate::config::StoreConfig;
use crate::kv::KvStore;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const RECORD_SUFFIX: &str = ".json";

/// Category-partitioned JSON record store over any [`KvStore`] backend.
#[derive(Debug)]
pub struct RecordStore<S> {
    kv: S,
    grammar: NamingGrammar,
}

impl<S: KvStore> RecordStore<S> {
    /// Create a record store over `kv`.
    #[must_use]
    pub fn new(kv: S, config: StoreConfig) -> Self {
        Self {
            kv,
            grammar: NamingGrammar::new(config.runs_naming),
        }
    }

    /// Backend in use.
    #[must_use]
    pub const fn backend(&self) -> &S {
        &self.kv
    }

    /// Naming grammar in use.
    #[must_use]
    pub const fn grammar(&self) -> &NamingGrammar {
        &self.grammar
    }

    /// Encode `record` and compute its file name.
    ///
    /// Parameter sets without a hash get one injected.
    fn encode<T: Serialize>(&self, category: Category, record: &T) -> Result<(String, Vec<u8>)> {
        let Value::Object(mut body) = serde_json::to_value(record)? else {
            return Err(Error::Configuration(format!(
                "{category} records must be JSON objects"
            )));
        };

        if category == Category::Inputs && !body.contains_key("hash") {
            let hash = content_hash(&Value::Object(body.clone()));
            body.insert("hash".to_string(), Value::String(hash));
        }

        let name = self.record_name(category, &body)?;
        let bytes = serde_json::to_vec_pretty(&Value::Object(body))?;
        Ok((name, bytes))
    }

    fn record_name(&self, category: Category, body: &Map<String, Value>) -> Result<String> {
        let fields = Filter::from_record(body).only(category.key_fields());
        let name = self.grammar.name(category, &fields).ok_or_else(|| {
            let missing: Vec<_> = category
                .key_fields()
                .iter()
                .map(|field| field.as_str())
                .filter(|field| !body.contains_key(*field))
                .collect();
            Error::Configuration(format!(
                "{category} record is missing or has malformed key fields {missing:?}"
            ))
        })?;

        // Records must stay findable by the scan path.
        let round_trips = self.grammar.parse(category, &name).as_ref() == Some(&fields)
            || (category == Category::Runs
                && self.grammar.runs_naming() == crate::config::RunsNaming::Legacy);
        if !round_trips {
            return Err(Error::Configuration(format!(
                "{category} key fields {fields:?} do not fit the naming grammar"
            )));
        }
        Ok(name)
    }

    /// Save a record, replacing any record with the same key.
    ///
    /// Returns the file name it was stored under.
    ///
    /// # Errors
    ///
    /// Returns error if the record lacks its key fields or the write fails.
    pub async fn save<T: Serialize>(&self, category: Category, record: &T) -> Result<String> {
        let (name, bytes) = self.encode(category, record)?;
        self.kv.put(category.as_str(), &name, bytes).await?;
        debug!(%category, %name, "saved record");
        Ok(name)
    }

    /// Save a record only if its key is free.
    ///
    /// Returns `false` and leaves the stored record untouched when the key is
    /// taken. Atomic with respect to concurrent writers.
    ///
    /// # Errors
    ///
    /// Returns error if the record lacks its key fields or the write fails.
    pub async fn create<T: Serialize>(&self, category: Category, record: &T) -> Result<bool> {
        let (name, bytes) = self.encode(category, record)?;
        let created = self.kv.put_if_absent(category.as_str(), &name, bytes).await?;
        debug!(%category, %name, created, "create record");
        Ok(created)
    }

    /// Names of the records matching `filter`, via the direct or scan path.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    pub async fn matching_names(&self, category: Category, filter: &Filter) -> Result<Vec<String>> {
        // A constraint outside the template can never match a parsed name.
        let keyed_only = filter.only(category.key_fields()) == *filter;
        if let Some(expected) = self.grammar.name(category, filter).filter(|_| keyed_only) {
            if self.kv.exists(category.as_str(), &expected).await? {
                trace!(%category, name = %expected, "direct lookup hit");
                return Ok(vec![expected]);
            }
        }

        let names = self.kv.list(category.as_str()).await?;
        trace!(%category, candidates = names.len(), ?filter, "scanning category");
        Ok(names
            .into_iter()
            .filter(|name| name.ends_with(RECORD_SUFFIX))
            .filter(|name| {
                filter.is_empty()
                    || self
                        .grammar
                        .parse(category, name)
                        .is_some_and(|fields| filter.matches(&fields))
            })
            .collect())
    }

    async fn read<T: DeserializeOwned>(&self, category: Category, name: &str) -> Result<Option<T>> {
        let Some(bytes) = self.kv.get(category.as_str(), name).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Error::corrupt(category.as_str(), name, e))
    }

    /// Load every record matching `filter`, sorted by file name.
    ///
    /// A record deleted between listing and reading is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptRecord`] if a matching file fails to parse as
    /// `T`.
    pub async fn load<T: DeserializeOwned>(&self, category: Category, filter: &Filter) -> Result<Vec<T>> {
        let names = self.matching_names(category, filter).await?;
        let mut records = Vec::with_capacity(names.len());
        for name in &names {
            if let Some(record) = self.read(category, name).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Load the first record matching `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn load_one<T: DeserializeOwned>(
        &self,
        category: Category,
        filter: &Filter,
    ) -> Result<Option<T>> {
        for name in self.matching_names(category, filter).await? {
            if let Some(record) = self.read(category, &name).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Whether any record matches `filter`, without parsing bodies.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    pub async fn contains(&self, category: Category, filter: &Filter) -> Result<bool> {
        Ok(!self.matching_names(category, filter).await?.is_empty())
    }

    /// Number of records in the category.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    pub async fn count(&self, category: Category) -> Result<usize> {
        Ok(self.matching_names(category, &Filter::new()).await?.len())
    }

    /// Whether the category holds no records.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    pub async fn is_empty(&self, category: Category) -> Result<bool> {
        Ok(self.count(category).await? == 0)
    }

    /// Delete every record matching `filter`; returns how many went.
    ///
    /// Only claims are deletable, every other category is append-only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for non-ephemeral categories.
    pub async fn remove(&self, category: Category, filter: &Filter) -> Result<usize> {
        if !category.is_ephemeral() {
            return Err(Error::Configuration(format!(
                "{category} records are append-only and cannot be removed"
            )));
        }
        let mut removed = 0;
        for name in self.matching_names(category, filter).await? {
            if self.kv.delete(category.as_str(), &name).await? {
                removed += 1;
            }
        }
        debug!(%category, ?filter, removed, "removed records");
        Ok(removed)
    }

    /// Parameter set with the given hash.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn load_input(&self, hash: &str) -> Result<Option<ParameterSet>> {
        self.load_one(Category::Inputs, &Filter::new().hash(hash)).await
    }

    /// Model snapshot with the given hash.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn load_model(&self, hash: &str) -> Result<Option<ModelSnapshot>> {
        self.load_one(Category::Models, &Filter::new().hash(hash)).await
    }

    /// Result for an exact task key.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn load_result(&self, hash: &str, step: u32, seed: u64) -> Result<Option<ResultRecord>> {
        self.load_one(Category::Results, &Filter::key(hash, step, seed))
            .await
    }

    /// Claim held on an exact task key.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn load_claim(&self, hash: &str, step: u32, seed: u64) -> Result<Option<Claim>> {
        self.load_one(Category::Runs, &Filter::key(hash, step, seed)).await
    }

    /// Claims that have no matching result.
    ///
    /// A claim outliving its worker blocks every later step of its chain; the
    /// scheduler never expires one on its own, so this is the hook for an
    /// outside health check.
    ///
    /// # Errors
    ///
    /// Same as [`RecordStore::load`].
    pub async fn stale_claims(&self) -> Result<Vec<Claim>> {
        let mut stale = Vec::new();
        for claim in self.load::<Claim>(Category::Runs, &Filter::new()).await? {
            if !self.contains(Category::Results, &claim.key()).await? {
                stale.push(claim);
            }
        }
        Ok(stale)
    }
}
