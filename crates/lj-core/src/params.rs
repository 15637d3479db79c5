//! Ordered, named parameter sets.
//!
//! A [`ParameterSet`] fixes the identity and ordering of the scalar parameters
//! a sample table or density model is defined over. All column matching in the
//! crate goes through these names; positional access is derived from them.

use crate::{Error, Result};

/// An ordered list of uniquely named scalar parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    names: Vec<String>,
}

impl ParameterSet {
    /// Create a parameter set from ordered names.
    ///
    /// Names must be non-empty and unique.
    pub fn new(names: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Validation("parameter set must not be empty".into()));
        }
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::Validation(format!("parameter name at position {i} is empty")));
            }
            if names[..i].contains(name) {
                return Err(Error::Validation(format!("duplicate parameter name '{name}'")));
            }
        }
        Ok(Self { names })
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the set is empty (never true for a constructed set).
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Ordered parameter names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name at position `i`.
    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    /// Position of `name`, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Whether `name` is a member.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Whether every member of `self` is also a member of `other`.
    pub fn is_subset_of(&self, other: &ParameterSet) -> bool {
        self.names.iter().all(|n| other.contains(n))
    }

    /// Comma-joined names, used in error messages.
    pub fn joined(&self) -> String {
        self.names.join(", ")
    }
}
