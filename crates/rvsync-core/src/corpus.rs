//! Ordered, keyed collection of the records of one file

use crate::error::{Error, Result};
use crate::record::Record;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// All records of one file, in file order, indexed by key
#[derive(Debug, Clone)]
pub struct Corpus {
    records: Vec<Record>,
    index: HashMap<String, usize>,
    origin: PathBuf,
}

impl Corpus {
    /// Build a corpus from records in file order.
    ///
    /// A repeated key is an error; neither occurrence is preferred.
    pub fn build(records: Vec<Record>, origin: impl Into<PathBuf>) -> Result<Self> {
        let origin = origin.into();
        let mut index = HashMap::with_capacity(records.len());

        for (pos, record) in records.iter().enumerate() {
            if let Some(&first) = index.get(record.key.as_str()) {
                let first: &Record = &records[first];
                return Err(Error::DuplicateKey {
                    key: record.key.clone(),
                    path: origin,
                    first_line: first.line,
                    second_line: record.line,
                });
            }
            index.insert(record.key.clone(), pos);
        }

        Ok(Self {
            records,
            index,
            origin,
        })
    }

    /// Look up a record by key
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.index.get(key).map(|&pos| &self.records[pos])
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Records in file order
    pub fn in_order(&self) -> &[Record] {
        &self.records
    }

    /// Keys in file order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the corpus has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// File the records came from
    pub fn origin(&self) -> &Path {
        &self.origin
    }
}
