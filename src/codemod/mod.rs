//! Codemod Engine
//!
//! Keeps hand-written consumer code in step with regenerated identifiers.
//!
//! Renames match whole tokens only: an identifier equal to the old name, or a
//! quoted literal whose entire contents equal it. `FooBar` and `"Foo bar"`
//! are never touched by a `Foo` rename. The orphan pass then deletes
//! generated declarations nothing refers to any more, along with their
//! build state entries.

pub mod lexer;
pub mod tree;

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::graph::Diagnostics;
use crate::state::{BuildState, RenameOp};

pub use lexer::{Declaration, Token, TokenKind};
pub use tree::{ConsumerTree, Edit, TextTree, UnitId};

/// Occurrences rewritten by a rename pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
    /// Rewritten occurrences per unit, in tree order
    pub units: IndexMap<UnitId, usize>,
    /// Rewritten occurrences per canonical key
    pub by_key: IndexMap<String, usize>,
}

impl RenameReport {
    pub fn total(&self) -> usize {
        self.units.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// A generated construct dropped by the orphan pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedOrphan {
    pub canonical_key: String,
    pub identifier: String,
    /// Units the declaration was removed from
    pub units: Vec<UnitId>,
}

#[derive(Debug, Clone, Default)]
pub struct OrphanReport {
    /// In removal order
    pub removed: Vec<RemovedOrphan>,
    /// Passes run before reaching a fixpoint
    pub passes: usize,
    pub diagnostics: Diagnostics,
}

impl OrphanReport {
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Source rewriting over a [`ConsumerTree`]
pub struct Codemod;

impl Codemod {
    /// Apply every rename to every unit of `tree`
    ///
    /// Each unit is rewritten in a single pass against its original tokens,
    /// so a chain such as `A -> B` and `B -> C` never compounds. When two ops
    /// share an old name the first one wins.
    pub fn apply_renames<T: ConsumerTree + ?Sized>(ops: &[RenameOp], tree: &mut T) -> RenameReport {
        let mut report = RenameReport::default();
        if ops.is_empty() {
            return report;
        }

        let mut table: HashMap<&str, &RenameOp> = HashMap::new();
        for op in ops {
            table.entry(op.old_name.as_str()).or_insert(op);
        }

        for unit in tree.unit_ids() {
            let mut edits = Vec::new();

            for token in tree.tokens(&unit) {
                let replacement = match token.kind {
                    TokenKind::Identifier => table
                        .get(token.text.as_str())
                        .map(|op| (op, op.new_name.clone())),
                    TokenKind::StringLiteral { quote } => token
                        .unquoted()
                        .and_then(|inner| table.get(inner))
                        .map(|op| (op, format!("{quote}{}{quote}", op.new_name))),
                    _ => None,
                };

                if let Some((op, text)) = replacement {
                    *report.by_key.entry(op.canonical_key.clone()).or_default() += 1;
                    edits.push(Edit::replace(token.span, text));
                }
            }

            if !edits.is_empty() {
                tracing::debug!(unit = %unit.display(), occurrences = edits.len(), "rewriting unit");
                report.units.insert(unit.clone(), edits.len());
                tree.apply_edits(&unit, edits);
            }
        }

        tracing::info!(
            renames = ops.len(),
            occurrences = report.total(),
            units = report.units.len(),
            "renames applied"
        );
        report
    }

    /// Remove generated schema declarations with no remaining references
    ///
    /// A schema entry is a candidate when its identifier is declared somewhere
    /// in `tree`. It is an orphan when no identifier or whole-literal token
    /// outside its own declarations names it. Removing one declaration drops
    /// the references it made, so passes repeat until nothing changes.
    pub fn remove_unused<T: ConsumerTree + ?Sized>(tree: &mut T, state: &mut BuildState) -> OrphanReport {
        let mut report = OrphanReport::default();

        loop {
            report.passes += 1;
            let orphans = find_orphans(tree, state);
            if orphans.is_empty() {
                break;
            }

            // Spans of one pass all refer to the same text, so apply per unit once
            let mut edits: IndexMap<UnitId, Vec<Edit>> = IndexMap::new();
            for (_, _, declared_in) in &orphans {
                for (unit, spans) in declared_in {
                    edits
                        .entry(unit.clone())
                        .or_default()
                        .extend(spans.iter().cloned().map(Edit::remove));
                }
            }
            for (unit, unit_edits) in edits {
                tree.apply_edits(&unit, unit_edits);
            }

            for (key, identifier, declared_in) in orphans {
                state.remove_schema(&key);
                report.diagnostics.orphan_removed(key.as_str(), &identifier);
                report.removed.push(RemovedOrphan {
                    canonical_key: key,
                    identifier,
                    units: declared_in.into_keys().collect(),
                });
            }
        }

        tracing::info!(removed = report.len(), passes = report.passes, "orphan pass complete");
        report
    }
}

type Orphan = (String, String, IndexMap<UnitId, Vec<Range<usize>>>);

fn find_orphans<T: ConsumerTree + ?Sized>(tree: &T, state: &BuildState) -> Vec<Orphan> {
    let generated: HashSet<&str> = state
        .schemas
        .values()
        .map(|e| e.generated_identifier_name.as_str())
        .collect();

    let mut declared: HashMap<&str, IndexMap<UnitId, Vec<Range<usize>>>> = HashMap::new();
    let mut referenced: HashSet<String> = HashSet::new();

    for unit in tree.unit_ids() {
        let decls: Vec<Declaration> = tree
            .declarations(&unit)
            .into_iter()
            .filter(|d| generated.contains(d.name.as_str()))
            .collect();

        for token in tree.tokens(&unit) {
            let Some(name) = token.reference_name() else {
                continue;
            };
            if !generated.contains(name) || referenced.contains(name) {
                continue;
            }
            let inside_own = decls
                .iter()
                .any(|d| d.name == name && within(&token.span, &d.span));
            if !inside_own {
                referenced.insert(name.to_string());
            }
        }

        for decl in decls {
            if let Some(name) = generated.get(decl.name.as_str()) {
                declared
                    .entry(*name)
                    .or_default()
                    .entry(unit.clone())
                    .or_default()
                    .push(decl.span);
            }
        }
    }

    // Keys sharing an identifier are all dropped; the first carries the spans
    let mut orphans = Vec::new();
    for (key, entry) in &state.schemas {
        let name = entry.generated_identifier_name.as_str();
        if referenced.contains(name) {
            continue;
        }
        if let Some(units) = declared.get_mut(name) {
            orphans.push((key.clone(), name.to_string(), std::mem::take(units)));
        }
    }
    orphans
}

fn within(inner: &Range<usize>, outer: &Range<usize>) -> bool {
    inner.start >= outer.start && inner.end <= outer.end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DiagnosticCode;
    use crate::state::{Section, StructuralKind};
    use std::path::Path;

    fn op(key: &str, old: &str, new: &str) -> RenameOp {
        RenameOp {
            canonical_key: key.to_string(),
            section: Section::Schemas,
            old_name: old.to_string(),
            new_name: new.to_string(),
            structural_kind: StructuralKind::Record,
        }
    }

    fn single(text: &str) -> TextTree {
        let mut tree = TextTree::new();
        tree.insert("src/app.ts", text);
        tree
    }

    fn text(tree: &TextTree) -> &str {
        tree.get(Path::new("src/app.ts")).unwrap()
    }

    #[test]
    fn test_rename_respects_token_boundaries() {
        let mut tree = single("const a: Foo = make<FooBar>(\"Foo\", 'Foo', `Foo`, \"Foo bar\");\n");
        let report = Codemod::apply_renames(&[op("pkg.Foo", "Foo", "Baz")], &mut tree);

        assert_eq!(
            text(&tree),
            "const a: Baz = make<FooBar>(\"Baz\", 'Baz', `Baz`, \"Foo bar\");\n"
        );
        assert_eq!(report.total(), 4);
        assert_eq!(report.by_key["pkg.Foo"], 4);
    }

    #[test]
    fn test_comments_are_left_alone() {
        let mut tree = single("// uses Foo\nlet x: Foo;\n");
        Codemod::apply_renames(&[op("pkg.Foo", "Foo", "Baz")], &mut tree);
        assert_eq!(text(&tree), "// uses Foo\nlet x: Baz;\n");
    }

    #[test]
    fn test_rename_reaches_template_interpolations() {
        let mut tree = single("const s = `Foo ${Foo.name} ${count}`;\n");
        let report = Codemod::apply_renames(&[op("pkg.Foo", "Foo", "Baz")], &mut tree);

        assert_eq!(text(&tree), "const s = `Foo ${Baz.name} ${count}`;\n");
        assert_eq!(report.total(), 1);
    }

    #[test]
    fn test_chained_renames_do_not_compound() {
        let mut tree = single("type X = A | B;\n");
        Codemod::apply_renames(&[op("k.A", "A", "B"), op("k.B", "B", "C")], &mut tree);
        assert_eq!(text(&tree), "type X = B | C;\n");
    }

    #[test]
    fn test_first_rename_wins_on_shared_old_name() {
        let mut tree = single("let s: Status;\n");
        let report = Codemod::apply_renames(
            &[op("a.Status", "Status", "AStatus"), op("b.Status", "Status", "BStatus")],
            &mut tree,
        );
        assert_eq!(text(&tree), "let s: AStatus;\n");
        assert!(!report.by_key.contains_key("b.Status"));
    }

    #[test]
    fn test_orphan_removal_reaches_fixpoint() {
        let mut tree = TextTree::new();
        tree.insert(
            "src/generated.ts",
            "export interface Outer {\n  inner: Inner;\n}\nexport interface Inner {\n  next?: Inner;\n}\nexport interface Used {\n  id: string;\n}\n",
        );
        tree.insert("src/app.ts", "import { Used } from './generated';\nconst u: Used = { id: 'x' };\n");

        let mut state = BuildState::new();
        state.insert_schema("pkg.Outer", "Outer", StructuralKind::Interface);
        state.insert_schema("pkg.Inner", "Inner", StructuralKind::Interface);
        state.insert_schema("pkg.Used", "Used", StructuralKind::Interface);
        state.insert_schema("pkg.Elsewhere", "Elsewhere", StructuralKind::Interface);

        let report = Codemod::remove_unused(&mut tree, &mut state);

        let removed: Vec<&str> = report.removed.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(removed, vec!["Outer", "Inner"]);
        assert_eq!(report.passes, 3);
        assert_eq!(
            tree.get(Path::new("src/generated.ts")),
            Some("export interface Used {\n  id: string;\n}\n")
        );
        assert!(state.schema("pkg.Outer").is_none());
        assert!(state.schema("pkg.Inner").is_none());
        assert!(state.schema("pkg.Used").is_some());
        // Not declared in the tree, so not a candidate
        assert!(state.schema("pkg.Elsewhere").is_some());
        assert_eq!(report.diagnostics.with_code(DiagnosticCode::OrphanRemoved).count(), 2);
    }

    #[test]
    fn test_template_interpolation_reference_keeps_declaration() {
        let mut tree = TextTree::new();
        tree.insert("src/gen.ts", "export interface Foo {\n  name: string;\n}\n");
        tree.insert("src/app.ts", "export const s = `${Foo.name}`;\n");
        let mut state = BuildState::new();
        state.insert_schema("pkg.Foo", "Foo", StructuralKind::Interface);

        let report = Codemod::remove_unused(&mut tree, &mut state);

        assert!(report.is_empty());
        assert_eq!(tree.get(Path::new("src/gen.ts")), Some("export interface Foo {\n  name: string;\n}\n"));
        assert!(state.schema("pkg.Foo").is_some());
    }

    #[test]
    fn test_string_literal_reference_keeps_declaration() {
        let mut tree = single("export enum Color { Red }\nregister(\"Color\");\n");
        let mut state = BuildState::new();
        state.insert_schema("pkg.Color", "Color", StructuralKind::Enumeration);

        let report = Codemod::remove_unused(&mut tree, &mut state);
        assert!(report.is_empty());
        assert_eq!(report.passes, 1);
    }
}
