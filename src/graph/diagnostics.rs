//! Diagnostics
//!
//! Collects non-fatal problems found during a run so that one bad schema
//! never stops the rest of the source from being processed.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Ref target not found in the registry; the schema or property was dropped
    UnresolvedReference,
    /// Same canonical key changed declaration form between runs
    StructuralKindChanged,
    /// Distinct canonical keys propose renaming the same old identifier
    AmbiguousRenameCollision,
    /// Persisted build state could not be parsed; treated as absent
    BuildStateParseError,
    /// Generated declaration had no remaining references and was removed
    OrphanRemoved,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnresolvedReference => "W001",
            Self::StructuralKindChanged => "W002",
            Self::AmbiguousRenameCollision => "W003",
            Self::BuildStateParseError => "W004",
            Self::OrphanRemoved => "I001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::UnresolvedReference
            | Self::StructuralKindChanged
            | Self::AmbiguousRenameCollision
            | Self::BuildStateParseError => Severity::Warning,

            Self::OrphanRemoved => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Canonical key (schema, method or file) the diagnostic is about
    pub subject: String,
    pub code: DiagnosticCode,
    pub message: String,
    /// Additional context (related keys, property paths)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(subject: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.subject
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Batch of diagnostics returned to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item, logging it at its severity
    pub fn push(&mut self, item: DiagnosticItem) {
        match item.severity() {
            Severity::Warning => tracing::warn!(code = %item.code, subject = %item.subject, "{}", item.message),
            Severity::Info => tracing::info!(code = %item.code, subject = %item.subject, "{}", item.message),
        }
        self.items.push(item);
    }

    pub fn unresolved_reference(&mut self, owner: impl Into<String>, target: &str, path: &str) {
        self.push(
            DiagnosticItem::new(
                owner,
                DiagnosticCode::UnresolvedReference,
                format!("reference target '{}' not found in registry", target),
            )
            .with_context(format!("dropped: {}", path)),
        );
    }

    pub fn structural_kind_changed(
        &mut self,
        key: impl Into<String>,
        old: impl fmt::Display,
        new: impl fmt::Display,
    ) {
        self.push(DiagnosticItem::new(
            key,
            DiagnosticCode::StructuralKindChanged,
            format!("declaration changed from {} to {}; not treated as a rename", old, new),
        ));
    }

    pub fn rename_collision(&mut self, old_name: &str, keys: &[&str]) {
        let mut item = DiagnosticItem::new(
            old_name,
            DiagnosticCode::AmbiguousRenameCollision,
            format!(
                "{} canonical keys rename identifier '{}'; every occurrence gets the first rename",
                keys.len(),
                old_name
            ),
        );
        for key in keys {
            item = item.with_context(key.to_string());
        }
        self.push(item);
    }

    pub fn build_state_unreadable(&mut self, reason: impl fmt::Display) {
        self.push(DiagnosticItem::new(
            "build-state",
            DiagnosticCode::BuildStateParseError,
            format!("previous build state ignored: {}", reason),
        ));
    }

    pub fn orphan_removed(&mut self, key: impl Into<String>, identifier: &str) {
        self.push(DiagnosticItem::new(
            key,
            DiagnosticCode::OrphanRemoved,
            format!("'{}' has no remaining references; declaration removed", identifier),
        ));
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Warning)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items carrying a specific code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Merge another batch into this one without logging it twice
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} warning(s), {} note(s)\n",
                self.warning_count(),
                self.len() - self.warning_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::UnresolvedReference.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::OrphanRemoved.severity(), Severity::Info);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.unresolved_reference("pkg.A", "pkg.Missing", "pkg.A.b");
        diags.orphan_removed("pkg.Old", "Old");

        assert_eq!(diags.len(), 2);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_warnings());
        assert_eq!(diags.with_code(DiagnosticCode::OrphanRemoved).count(), 1);
    }

    #[test]
    fn test_collision_lists_every_key() {
        let mut diags = Diagnostics::new();
        diags.rename_collision("Foo", &["a.Foo", "b.Foo"]);

        let item = &diags.all()[0];
        assert_eq!(item.subject, "Foo");
        assert_eq!(item.context, vec!["a.Foo", "b.Foo"]);
        assert!(item.to_string().contains("[W003] warning"));
    }
}
