//! Rename Diff
//!
//! Compares two build states and derives the identifier renames consumer code
//! needs to stay in sync with a regeneration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{BuildState, Section, StructuralKind};
use crate::graph::Diagnostics;

/// Replace every occurrence of one generated identifier with another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOp {
    pub canonical_key: String,
    pub section: Section,
    pub old_name: String,
    pub new_name: String,
    pub structural_kind: StructuralKind,
}

/// Renames derived from a pair of build states, plus what could not be renamed
#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    /// Schemas first, then functions; each in canonical-key order
    pub ops: Vec<RenameOp>,
    pub diagnostics: Diagnostics,
}

impl RenamePlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Diff `old` against `new`
///
/// A key present in both states with a different identifier and the same
/// structural kind yields one rename. A changed structural kind is a breaking
/// change for the renderer to surface, never a rename.
pub fn diff(old: &BuildState, new: &BuildState) -> RenamePlan {
    let mut plan = RenamePlan::default();

    for section in [Section::Schemas, Section::Functions] {
        let previous = old.section(section);

        for (key, entry) in new.section(section) {
            let Some(before) = previous.get(key) else {
                continue;
            };

            if before.structural_kind != entry.structural_kind {
                plan.diagnostics
                    .structural_kind_changed(key.as_str(), &before.structural_kind, &entry.structural_kind);
                continue;
            }

            if before.generated_identifier_name != entry.generated_identifier_name {
                tracing::debug!(
                    key = %key,
                    from = %before.generated_identifier_name,
                    to = %entry.generated_identifier_name,
                    "rename detected"
                );
                plan.ops.push(RenameOp {
                    canonical_key: key.clone(),
                    section,
                    old_name: before.generated_identifier_name.clone(),
                    new_name: entry.generated_identifier_name.clone(),
                    structural_kind: entry.structural_kind.clone(),
                });
            }
        }
    }

    let mut by_old_name: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for op in &plan.ops {
        by_old_name
            .entry(op.old_name.as_str())
            .or_default()
            .push(op.canonical_key.as_str());
    }
    let collisions: Vec<(String, Vec<String>)> = by_old_name
        .into_iter()
        .filter(|(_, keys)| keys.len() > 1)
        .map(|(name, keys)| (name.to_string(), keys.into_iter().map(str::to_string).collect()))
        .collect();
    for (name, keys) in collisions {
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        plan.diagnostics.rename_collision(&name, &keys);
    }

    tracing::info!(
        renames = plan.ops.len(),
        warnings = plan.diagnostics.warning_count(),
        "build state diff complete"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DiagnosticCode;

    fn state(schemas: &[(&str, &str, StructuralKind)]) -> BuildState {
        let mut state = BuildState::new();
        for (key, name, kind) in schemas {
            state.insert_schema(*key, *name, kind.clone());
        }
        state
    }

    #[test]
    fn test_single_rename() {
        let old = state(&[("pkg.Foo", "Foo", StructuralKind::Record)]);
        let new = state(&[("pkg.Foo", "FooV2", StructuralKind::Record)]);

        let plan = diff(&old, &new);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.ops[0].old_name, "Foo");
        assert_eq!(plan.ops[0].new_name, "FooV2");
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn test_kind_change_is_not_a_rename() {
        let old = state(&[("pkg.Foo", "Foo", StructuralKind::Record)]);
        let new = state(&[("pkg.Foo", "FooV2", StructuralKind::Enumeration)]);

        let plan = diff(&old, &new);
        assert!(plan.is_empty());
        assert_eq!(plan.diagnostics.with_code(DiagnosticCode::StructuralKindChanged).count(), 1);
    }

    #[test]
    fn test_added_and_removed_keys_are_ignored() {
        let old = state(&[("pkg.Gone", "Gone", StructuralKind::Record)]);
        let new = state(&[("pkg.New", "New", StructuralKind::Record)]);
        let plan = diff(&old, &new);
        assert!(plan.is_empty());
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn test_functions_follow_schemas() {
        let mut old = state(&[("pkg.Foo", "Foo", StructuralKind::Alias)]);
        old.insert_function("pkg.getFoo", "getFoo");
        let mut new = state(&[("pkg.Foo", "FooAlias", StructuralKind::Alias)]);
        new.insert_function("pkg.getFoo", "fetchFoo");

        let plan = diff(&old, &new);
        let sections: Vec<Section> = plan.ops.iter().map(|op| op.section).collect();
        assert_eq!(sections, vec![Section::Schemas, Section::Functions]);
        assert_eq!(plan.ops[1].new_name, "fetchFoo");
    }

    #[test]
    fn test_shared_old_name_is_flagged() {
        let old = state(&[
            ("a.Status", "Status", StructuralKind::Enumeration),
            ("b.Status", "Status", StructuralKind::Enumeration),
        ]);
        let new = state(&[
            ("a.Status", "AStatus", StructuralKind::Enumeration),
            ("b.Status", "BStatus", StructuralKind::Enumeration),
        ]);

        let plan = diff(&old, &new);
        assert_eq!(plan.len(), 2);
        let collisions: Vec<_> = plan
            .diagnostics
            .with_code(DiagnosticCode::AmbiguousRenameCollision)
            .collect();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].context, vec!["a.Status", "b.Status"]);
    }
}
