//! Regeneration pipeline
//!
//! One run, start to finish:
//!
//! ```text
//! registry ──► resolution ──► generic propagation ──► Renderer ──► new BuildState
//!                                                                       │
//!               previous BuildState (raw) ──► load ──► diff ◄───────────┘
//!                                                       │
//!                                        consumer tree ◄┴► renames ──► orphan pass
//! ```
//!
//! Resolution runs over the whole registry first so that dangling Refs are
//! reported once, as warnings, before anything is generated from them.
//!
//! The caller supplies the renderer, the previous state's raw text and the
//! consumer tree, and persists whatever comes back.

use crate::codemod::{Codemod, ConsumerTree, OrphanReport, RenameReport};
use crate::config::RegenConfig;
use crate::error::Result;
use crate::graph::{recursive_groups, Diagnostics, GenericOverrideMap, GenericPropagator, RefResolver};
use crate::registry::SchemaRegistry;
use crate::state::{diff, BuildState, RenameOp};

/// Emits generated artifacts and reports the identifiers it chose
pub trait Renderer {
    fn render(&mut self, registry: &SchemaRegistry, overrides: &GenericOverrideMap) -> Result<BuildState>;
}

#[derive(Debug, Clone)]
pub struct RegenOptions {
    /// Read the previous state and rewrite consumer code
    pub codemod: bool,
    /// Run the orphan pass after renames
    pub remove_unused: bool,
    /// Nothing is persisted
    pub dry_run: bool,
}

impl Default for RegenOptions {
    fn default() -> Self {
        Self {
            codemod: true,
            remove_unused: true,
            dry_run: false,
        }
    }
}

impl From<&RegenConfig> for RegenOptions {
    fn from(config: &RegenConfig) -> Self {
        Self {
            codemod: config.build_state.enabled,
            remove_unused: config.codemod.remove_unused,
            dry_run: config.codemod.dry_run,
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RegenOutcome {
    /// State to persist, already pruned of orphans
    pub state: BuildState,
    pub overrides: GenericOverrideMap,
    pub renames: Vec<RenameOp>,
    pub rename_report: RenameReport,
    pub orphan_report: OrphanReport,
    pub diagnostics: Diagnostics,
    /// Whether the caller should write the state and the tree back
    pub persist: bool,
}

pub struct Regenerator {
    registry: SchemaRegistry,
    options: RegenOptions,
}

impl Regenerator {
    pub fn new(registry: SchemaRegistry, options: RegenOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn options(&self) -> &RegenOptions {
        &self.options
    }

    /// Run one regeneration
    ///
    /// `previous` is the raw text of the last persisted state, if any. An
    /// unreadable state is reported and the run continues without diff or
    /// codemod.
    pub fn run<R, T>(&self, renderer: &mut R, previous: Option<&str>, tree: &mut T) -> Result<RegenOutcome>
    where
        R: Renderer + ?Sized,
        T: ConsumerTree + ?Sized,
    {
        let groups = recursive_groups(&self.registry);
        tracing::info!(
            schemas = self.registry.len(),
            recursive_groups = groups.len(),
            "starting regeneration"
        );

        let mut resolver = RefResolver::new(&self.registry);
        resolver.dereference_all();
        let mut diagnostics = resolver.into_diagnostics();

        let overrides = GenericPropagator::new(&self.registry).populate_all();
        let mut state = renderer.render(&self.registry, &overrides)?;
        tracing::info!(entries = state.len(), "render complete");

        let mut renames = Vec::new();
        let mut rename_report = RenameReport::default();
        let mut orphan_report = OrphanReport::default();

        let previous = if self.options.codemod {
            BuildState::load_previous(previous, &mut diagnostics)
        } else {
            None
        };

        if let Some(previous) = previous {
            let plan = diff(&previous, &state);
            diagnostics.merge(plan.diagnostics);
            rename_report = Codemod::apply_renames(&plan.ops, tree);
            renames = plan.ops;

            if self.options.remove_unused {
                orphan_report = Codemod::remove_unused(tree, &mut state);
                diagnostics.merge(std::mem::take(&mut orphan_report.diagnostics));
            }
        }

        Ok(RegenOutcome {
            state,
            overrides,
            renames,
            rename_report,
            orphan_report,
            diagnostics,
            persist: !self.options.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::TextTree;
    use crate::error::RegenError;
    use crate::graph::DiagnosticCode;
    use crate::state::StructuralKind;
    use std::path::Path;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_json(
            r#"{
                "schemas": {
                    "pkg.Foo": {
                        "kind": "object",
                        "qualifiedName": "pkg.Foo",
                        "displayName": "Foo",
                        "properties": { "id": { "schema": { "kind": "string" }, "required": true } }
                    }
                },
                "packages": []
            }"#,
        )
        .unwrap()
    }

    /// Names every schema `<display><suffix>`
    struct Suffixing(&'static str);

    impl Renderer for Suffixing {
        fn render(&mut self, registry: &SchemaRegistry, _: &GenericOverrideMap) -> Result<BuildState> {
            let mut state = BuildState::new();
            for (name, node) in registry.iter() {
                let display = node.display_name().unwrap_or(name);
                state.insert_schema(name.clone(), format!("{}{}", display, self.0), StructuralKind::Interface);
            }
            Ok(state)
        }
    }

    struct Failing;

    impl Renderer for Failing {
        fn render(&mut self, _: &SchemaRegistry, _: &GenericOverrideMap) -> Result<BuildState> {
            Err(RegenError::Render("template missing".to_string()))
        }
    }

    fn previous() -> String {
        let mut state = BuildState::new();
        state.insert_schema("pkg.Foo", "Foo", StructuralKind::Interface);
        state.to_json().unwrap()
    }

    #[test]
    fn test_run_renames_consumer_code() {
        let mut tree = TextTree::new();
        tree.insert("src/use.ts", "const f: Foo = load();\n");

        let regen = Regenerator::new(registry(), RegenOptions::default());
        let outcome = regen.run(&mut Suffixing("V2"), Some(&previous()), &mut tree).unwrap();

        assert_eq!(outcome.renames.len(), 1);
        assert_eq!(outcome.rename_report.total(), 1);
        assert_eq!(tree.get(Path::new("src/use.ts")), Some("const f: FooV2 = load();\n"));
        assert_eq!(outcome.state.schema("pkg.Foo").unwrap().generated_identifier_name, "FooV2");
        assert!(outcome.persist);
    }

    #[test]
    fn test_unreadable_previous_state_skips_codemod() {
        let mut tree = TextTree::new();
        tree.insert("src/use.ts", "const f: Foo = load();\n");

        let regen = Regenerator::new(registry(), RegenOptions::default());
        let outcome = regen.run(&mut Suffixing("V2"), Some("not json"), &mut tree).unwrap();

        assert!(outcome.renames.is_empty());
        assert_eq!(tree.get(Path::new("src/use.ts")), Some("const f: Foo = load();\n"));
        assert_eq!(outcome.diagnostics.with_code(DiagnosticCode::BuildStateParseError).count(), 1);
        assert_eq!(outcome.state.len(), 1);
    }

    #[test]
    fn test_disabled_codemod_ignores_previous_state() {
        let mut tree = TextTree::new();
        let options = RegenOptions {
            codemod: false,
            dry_run: true,
            ..RegenOptions::default()
        };
        let outcome = Regenerator::new(registry(), options)
            .run(&mut Suffixing("V2"), Some(&previous()), &mut tree)
            .unwrap();
        assert!(outcome.renames.is_empty());
        assert!(outcome.diagnostics.is_empty());
        assert!(!outcome.persist);
    }

    #[test]
    fn test_dangling_property_ref_is_reported() {
        let registry = SchemaRegistry::from_json(
            r#"{
                "schemas": {
                    "pkg.A": {
                        "kind": "object",
                        "qualifiedName": "pkg.A",
                        "displayName": "A",
                        "properties": {
                            "id": { "schema": { "kind": "string" }, "required": true },
                            "gone": { "schema": { "kind": "ref", "target": "pkg.Missing" } }
                        }
                    }
                },
                "packages": []
            }"#,
        )
        .unwrap();
        let mut tree = TextTree::new();

        let outcome = Regenerator::new(registry, RegenOptions::default())
            .run(&mut Suffixing(""), None, &mut tree)
            .unwrap();

        let unresolved: Vec<_> = outcome.diagnostics.with_code(DiagnosticCode::UnresolvedReference).collect();
        assert_eq!(unresolved.len(), 1);
        assert!(unresolved[0].message.contains("pkg.Missing"));
        assert!(outcome.overrides.is_empty());
        assert_eq!(outcome.state.len(), 1);
    }

    #[test]
    fn test_renderer_failure_is_fatal() {
        let mut tree = TextTree::new();
        let regen = Regenerator::new(registry(), RegenOptions::default());
        let err = regen.run(&mut Failing, None, &mut tree).unwrap_err();
        assert!(matches!(err, RegenError::Render(_)));
    }
}
