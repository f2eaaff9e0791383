//! Hierarchical typed configuration for analyses.
//!
//! A [`ParameterSet`] maps names to typed values and nests arbitrarily deep;
//! entries are addressed by slash-separated paths (`"geometry/alpha"`).
//! A [`ParameterValue::DoubleRange`] entry carries the ordered candidate set
//! of a sweep parameter; expanding a study replaces it in place with a fixed
//! `Double`, which is the one spot where an entry legitimately changes its
//! concrete type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ParameterError;

/// A single typed configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Double(f64),
    Int(i64),
    Bool(bool),
    Text(String),
    /// Ordered, finite candidate set of a sweep parameter
    DoubleRange(Vec<f64>),
    /// Nested parameter subset
    Subset(ParameterSet),
}

impl ParameterValue {
    /// Type tag used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Double(_) => "double",
            ParameterValue::Int(_) => "int",
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Text(_) => "text",
            ParameterValue::DoubleRange(_) => "double range",
            ParameterValue::Subset(_) => "subset",
        }
    }
}

/// Hierarchical name -> typed-value mapping with deterministic iteration order.
///
/// `Clone` performs the deep copy a sweep needs to resolve each instance's
/// configuration independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    entries: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry at a slash-separated path.
    pub fn get(&self, path: &str) -> Result<&ParameterValue, ParameterError> {
        let mut set = self;
        let mut rest = path;
        loop {
            match rest.split_once('/') {
                Some((head, tail)) => match set.entries.get(head) {
                    Some(ParameterValue::Subset(sub)) => {
                        set = sub;
                        rest = tail;
                    }
                    Some(_) => return Err(ParameterError::NotASubset(head.to_string())),
                    None => return Err(ParameterError::NotFound(path.to_string())),
                },
                None => {
                    return set
                        .entries
                        .get(rest)
                        .ok_or_else(|| ParameterError::NotFound(path.to_string()));
                }
            }
        }
    }

    /// Insert or replace the entry at a path, creating intermediate subsets.
    ///
    /// Replacing an existing entry with a value of a different concrete type
    /// is allowed.
    pub fn insert(&mut self, path: &str, value: ParameterValue) -> Result<(), ParameterError> {
        match path.split_once('/') {
            Some((head, tail)) => {
                let entry = self
                    .entries
                    .entry(head.to_string())
                    .or_insert_with(|| ParameterValue::Subset(ParameterSet::new()));
                match entry {
                    ParameterValue::Subset(sub) => sub.insert(tail, value),
                    _ => Err(ParameterError::NotASubset(head.to_string())),
                }
            }
            None => {
                self.entries.insert(path.to_string(), value);
                Ok(())
            }
        }
    }

    pub fn get_double(&self, path: &str) -> Result<f64, ParameterError> {
        match self.get(path)? {
            ParameterValue::Double(v) => Ok(*v),
            other => Err(wrong_type(path, "double", other)),
        }
    }

    pub fn get_int(&self, path: &str) -> Result<i64, ParameterError> {
        match self.get(path)? {
            ParameterValue::Int(v) => Ok(*v),
            other => Err(wrong_type(path, "int", other)),
        }
    }

    pub fn get_bool(&self, path: &str) -> Result<bool, ParameterError> {
        match self.get(path)? {
            ParameterValue::Bool(v) => Ok(*v),
            other => Err(wrong_type(path, "bool", other)),
        }
    }

    pub fn get_text(&self, path: &str) -> Result<&str, ParameterError> {
        match self.get(path)? {
            ParameterValue::Text(v) => Ok(v),
            other => Err(wrong_type(path, "text", other)),
        }
    }

    /// Look up a sweep candidate set.
    pub fn get_range(&self, path: &str) -> Result<&[f64], ParameterError> {
        match self.get(path)? {
            ParameterValue::DoubleRange(v) => Ok(v),
            other => Err(wrong_type(path, "double range", other)),
        }
    }

    /// Look up a nested subset.
    pub fn get_subset(&self, path: &str) -> Result<&ParameterSet, ParameterError> {
        match self.get(path)? {
            ParameterValue::Subset(v) => Ok(v),
            other => Err(wrong_type(path, "subset", other)),
        }
    }

    /// Iterate over top-level entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn wrong_type(path: &str, expected: &'static str, found: &ParameterValue) -> ParameterError {
    ParameterError::WrongType {
        path: path.to_string(),
        expected,
        found: found.type_name(),
    }
}
