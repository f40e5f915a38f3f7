//! Build State
//!
//! Record of the identifier name and declaration form generated for every
//! canonical key in a run. It is the only data that outlives a run: the caller
//! loads the previous copy, passes it in, and persists the new one.
//!
//! Persistence format:
//!
//! ```json
//! {
//!   "schemas":   { "pkg.Foo": { "generatedIdentifierName": "Foo", "structuralKind": "record" } },
//!   "functions": { "pkg.getFoo": { "generatedIdentifierName": "getFoo", "structuralKind": "function" } }
//! }
//! ```

pub mod diff;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::checksum::Checksum;
use crate::error::{RegenError, Result};
use crate::graph::Diagnostics;

pub use diff::{diff, RenameOp, RenamePlan};

/// Declaration form of a generated construct
///
/// Renames are only proposed between entries of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StructuralKind {
    Record,
    Interface,
    Enumeration,
    Alias,
    Function,
    /// Renderer-specific tag, compared verbatim
    #[serde(untagged)]
    Other(String),
}

impl StructuralKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Record => "record",
            Self::Interface => "interface",
            Self::Enumeration => "enumeration",
            Self::Alias => "alias",
            Self::Function => "function",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for StructuralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What was generated for one canonical key (the key is the map key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStateEntry {
    pub generated_identifier_name: String,
    pub structural_kind: StructuralKind,
}

impl BuildStateEntry {
    pub fn new(name: impl Into<String>, kind: StructuralKind) -> Self {
        Self {
            generated_identifier_name: name.into(),
            structural_kind: kind,
        }
    }
}

/// Which map of the build state an entry lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Schemas,
    Functions,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Schemas => write!(f, "schemas"),
            Section::Functions => write!(f, "functions"),
        }
    }
}

/// Snapshot of one run's generated identifiers
///
/// Maps are ordered by canonical key so that serialization is byte-stable
/// across runs over an unchanged source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    #[serde(default)]
    pub schemas: BTreeMap<String, BuildStateEntry>,
    #[serde(default)]
    pub functions: BTreeMap<String, BuildStateEntry>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_schema(&mut self, key: impl Into<String>, name: impl Into<String>, kind: StructuralKind) {
        self.schemas.insert(key.into(), BuildStateEntry::new(name, kind));
    }

    pub fn insert_function(&mut self, key: impl Into<String>, name: impl Into<String>) {
        self.functions
            .insert(key.into(), BuildStateEntry::new(name, StructuralKind::Function));
    }

    pub fn schema(&self, key: &str) -> Option<&BuildStateEntry> {
        self.schemas.get(key)
    }

    pub fn function(&self, key: &str) -> Option<&BuildStateEntry> {
        self.functions.get(key)
    }

    pub fn remove_schema(&mut self, key: &str) -> Option<BuildStateEntry> {
        self.schemas.remove(key)
    }

    pub fn section(&self, section: Section) -> &BTreeMap<String, BuildStateEntry> {
        match section {
            Section::Schemas => &self.schemas,
            Section::Functions => &self.functions,
        }
    }

    pub fn len(&self) -> usize {
        self.schemas.len() + self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.functions.is_empty()
    }

    /// Parse a persisted build state
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(RegenError::BuildStateParse)
    }

    /// Serialize to the persisted form (pretty, trailing newline)
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// SHA-256 of the persisted form
    pub fn fingerprint(&self) -> Result<Checksum> {
        Ok(Checksum::of_str(&self.to_json()?))
    }

    /// Interpret the previous run's persisted copy
    ///
    /// A missing file means no prior state. A malformed one is reported and
    /// likewise treated as absent, so the run proceeds without diff or codemod.
    pub fn load_previous(raw: Option<&str>, diagnostics: &mut Diagnostics) -> Option<Self> {
        let raw = raw?;
        match Self::from_json(raw) {
            Ok(state) => {
                tracing::debug!(entries = state.len(), "previous build state loaded");
                Some(state)
            }
            Err(err) => {
                diagnostics.build_state_unreadable(&err);
                None
            }
        }
    }
}
