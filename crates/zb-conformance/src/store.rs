#![forbid(unsafe_code)]

//! Shared property store: the single namespace of string key/value pairs
//! that early cases write (captured identifiers) and later cases read.
//!
//! Keys are write-once. A second writer for the same key is a harness
//! authoring error, surfaced as [`StoreError::DuplicateKey`] rather than a
//! silent overwrite. Ordering safety between writer and reader comes from
//! the scheduler, not from the store.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateKey(String),
    MissingKey(String),
}

impl StoreError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::DuplicateKey(_) => "store_duplicate_key",
            Self::MissingKey(_) => "store_missing_key",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey(key) => write!(f, "property `{key}` was already written"),
            Self::MissingKey(key) => write!(f, "property `{key}` is not in the store"),
        }
    }
}

impl std::error::Error for StoreError {}

#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    values: BTreeMap<String, String>,
}

impl PropertyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds configuration-supplied properties. Each entry goes through the
    /// same write-once check as runtime captures.
    pub fn seed<I>(&mut self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in entries {
            self.put(&key, &value)?;
        }
        Ok(())
    }

    pub fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.values.contains_key(key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&str, StoreError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StoreError::MissingKey(key.to_string()))
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
