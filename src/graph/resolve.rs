//! Ref Resolution
//!
//! Dereferences Ref nodes into their registry targets, producing
//! self-contained trees. Cycles are expected: a qualified name is marked in
//! the visited map before its target is entered, so a second encounter in the
//! same pass returns the node seen on first entry instead of recursing.

use indexmap::IndexMap;
use std::collections::HashMap;

use super::Diagnostics;
use crate::error::{RegenError, Result};
use crate::registry::SchemaRegistry;
use crate::schema::{ArraySchema, MapSchema, ObjectProperty, ObjectSchema, QualifiedName, SchemaNode};

/// Cycle-protection map for one resolution pass: qualified name -> node
///
/// Holds the unresolved target while its subtree is being resolved and the
/// resolved node afterwards.
pub type Visited = HashMap<QualifiedName, SchemaNode>;

/// Resolve `node` against `registry`, sharing `visited` with the caller
///
/// Properties whose schema fails to resolve are dropped from their parent and
/// logged; only an unresolvable top-level Ref fails the call.
pub fn resolve(node: &SchemaNode, registry: &SchemaRegistry, visited: &mut Visited) -> Result<SchemaNode> {
    let mut diagnostics = Diagnostics::new();
    Resolution {
        registry,
        visited,
        diagnostics: &mut diagnostics,
    }
    .node(node, "<root>")
}

/// A resolution pass over one registry
///
/// Nested calls share one visited map, so repeated references to a qualified
/// name within the pass resolve to the same node. Use a new resolver (or
/// [`RefResolver::dereference_all`], which starts fresh) for an unrelated pass.
pub struct RefResolver<'r> {
    registry: &'r SchemaRegistry,
    visited: Visited,
    diagnostics: Diagnostics,
}

impl<'r> RefResolver<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            visited: Visited::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Resolve any node, inlining every Ref beneath it
    pub fn resolve(&mut self, node: &SchemaNode) -> Result<SchemaNode> {
        Resolution {
            registry: self.registry,
            visited: &mut self.visited,
            diagnostics: &mut self.diagnostics,
        }
        .node(node, "<root>")
    }

    /// Resolve a registered schema by qualified name
    pub fn dereference(&mut self, name: &str) -> Result<SchemaNode> {
        self.resolve(&SchemaNode::reference(name))
    }

    /// Dereference every registered schema in one pass
    ///
    /// Schemas that fail to resolve are skipped and reported.
    pub fn dereference_all(&mut self) -> IndexMap<QualifiedName, SchemaNode> {
        self.visited.clear();

        let registry = self.registry;
        let mut resolved = IndexMap::with_capacity(registry.len());
        for name in registry.names() {
            match self.dereference(name) {
                Ok(node) => {
                    resolved.insert(name.clone(), node);
                }
                Err(RegenError::UnresolvedReference { target }) => {
                    self.diagnostics.unresolved_reference(name.as_str(), &target, name);
                }
                Err(other) => {
                    tracing::warn!(schema = %name, error = %other, "schema skipped");
                }
            }
        }

        tracing::info!(
            resolved = resolved.len(),
            skipped = registry.len() - resolved.len(),
            "dereferenced registry"
        );
        resolved
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}

struct Resolution<'a> {
    registry: &'a SchemaRegistry,
    visited: &'a mut Visited,
    diagnostics: &'a mut Diagnostics,
}

impl Resolution<'_> {
    fn node(&mut self, node: &SchemaNode, path: &str) -> Result<SchemaNode> {
        match node {
            SchemaNode::Ref(r) => self.reference(&r.target),
            SchemaNode::Array(a) => {
                let item = self.node(&a.item, &format!("{}[]", path))?;
                Ok(SchemaNode::Array(ArraySchema {
                    qualified_name: a.qualified_name.clone(),
                    display_name: a.display_name.clone(),
                    item: Box::new(item),
                }))
            }
            SchemaNode::Map(m) => {
                let key = self.node(&m.key, &format!("{}{{key}}", path))?;
                let value = self.node(&m.value, &format!("{}{{value}}", path))?;
                Ok(SchemaNode::Map(MapSchema {
                    qualified_name: m.qualified_name.clone(),
                    display_name: m.display_name.clone(),
                    key: Box::new(key),
                    value: Box::new(value),
                }))
            }
            SchemaNode::Object(o) => Ok(SchemaNode::Object(self.object(o)?)),
            SchemaNode::OneOf(o) => Ok(SchemaNode::OneOf(self.object(o)?)),
            SchemaNode::Polymorph(o) => Ok(SchemaNode::Polymorph(self.object(o)?)),
            SchemaNode::Enum(_)
            | SchemaNode::Bool
            | SchemaNode::Integer
            | SchemaNode::Float
            | SchemaNode::String
            | SchemaNode::Date
            | SchemaNode::Timestamp
            | SchemaNode::Decimal
            | SchemaNode::Bytes
            | SchemaNode::Key
            | SchemaNode::Any => Ok(node.clone()),
        }
    }

    fn reference(&mut self, target: &str) -> Result<SchemaNode> {
        if let Some(seen) = self.visited.get(target) {
            tracing::debug!(target, "reference already visited in this pass");
            return Ok(seen.clone());
        }

        let registry = self.registry;
        let Some(found) = registry.get(target) else {
            return Err(RegenError::unresolved(target));
        };

        self.visited.insert(target.to_string(), found.clone());
        match self.node(found, target) {
            Ok(resolved) => {
                self.visited.insert(target.to_string(), resolved.clone());
                Ok(resolved)
            }
            Err(err) => {
                self.visited.remove(target);
                Err(err)
            }
        }
    }

    fn object(&mut self, object: &ObjectSchema) -> Result<ObjectSchema> {
        let mut properties = IndexMap::with_capacity(object.properties.len());

        for (name, prop) in &object.properties {
            let path = format!("{}.{}", object.qualified_name, name);
            match self.node(&prop.schema, &path) {
                Ok(schema) => {
                    properties.insert(name.clone(), with_schema(prop, schema));
                }
                Err(RegenError::UnresolvedReference { target }) => {
                    self.diagnostics
                        .unresolved_reference(object.qualified_name.as_str(), &target, &path);
                }
                Err(other) => return Err(other),
            }
        }

        Ok(ObjectSchema {
            qualified_name: object.qualified_name.clone(),
            display_name: object.display_name.clone(),
            properties,
            discriminator: object.discriminator.clone(),
        })
    }
}

fn with_schema(prop: &ObjectProperty, schema: SchemaNode) -> ObjectProperty {
    ObjectProperty {
        name: prop.name.clone(),
        schema,
        required: prop.required,
        read_only: prop.read_only,
        write_only: prop.write_only,
        entity_key: prop.entity_key.clone(),
        generic: prop.generic.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DiagnosticCode;
    use crate::schema::ParsedSource;

    fn registry(nodes: Vec<SchemaNode>) -> SchemaRegistry {
        let schemas = nodes
            .into_iter()
            .map(|n| (n.qualified_name().unwrap().to_string(), n))
            .collect();
        SchemaRegistry::from_source(ParsedSource { schemas, packages: Vec::new() }).unwrap()
    }

    fn object(name: &str, props: Vec<(&str, SchemaNode)>) -> SchemaNode {
        let mut obj = ObjectSchema::new(name, name.rsplit('.').next().unwrap());
        for (prop, schema) in props {
            obj = obj.with_property(ObjectProperty::new(prop, schema));
        }
        SchemaNode::Object(obj)
    }

    #[test]
    fn test_self_reference_terminates() {
        let reg = registry(vec![object("pkg.A", vec![("next", SchemaNode::reference("pkg.A"))])]);
        let mut resolver = RefResolver::new(&reg);

        let resolved = resolver.dereference("pkg.A").unwrap();
        let next = &resolved.properties().unwrap()["next"].schema;
        assert_eq!(next.qualified_name(), Some("pkg.A"));
        assert!(resolver.diagnostics().is_empty());
    }

    #[test]
    fn test_inline_children_are_resolved() {
        let list = SchemaNode::Array(ArraySchema {
            qualified_name: "pkg.Order.items".to_string(),
            display_name: "OrderItems".to_string(),
            item: Box::new(SchemaNode::reference("pkg.Item")),
        });
        let reg = registry(vec![
            object("pkg.Order", vec![("items", list)]),
            object("pkg.Item", vec![("sku", SchemaNode::String)]),
        ]);

        let resolved = RefResolver::new(&reg).dereference("pkg.Order").unwrap();
        let SchemaNode::Array(items) = &resolved.properties().unwrap()["items"].schema else {
            panic!("expected array");
        };
        assert_eq!(items.item.qualified_name(), Some("pkg.Item"));
        assert!(items.item.properties().unwrap().contains_key("sku"));
    }

    #[test]
    fn test_unresolved_property_is_dropped() {
        let reg = registry(vec![object(
            "pkg.A",
            vec![
                ("ok", SchemaNode::Integer),
                ("broken", SchemaNode::reference("pkg.Missing")),
            ],
        )]);
        let mut resolver = RefResolver::new(&reg);

        let resolved = resolver.dereference("pkg.A").unwrap();
        let props = resolved.properties().unwrap();
        assert!(props.contains_key("ok"));
        assert!(!props.contains_key("broken"));

        let diags = resolver.into_diagnostics();
        assert_eq!(diags.with_code(DiagnosticCode::UnresolvedReference).count(), 1);
    }

    #[test]
    fn test_unresolved_top_level_ref_fails() {
        let reg = registry(vec![object("pkg.A", vec![])]);
        let err = resolve(&SchemaNode::reference("pkg.Nope"), &reg, &mut Visited::new()).unwrap_err();
        assert!(matches!(err, RegenError::UnresolvedReference { target } if target == "pkg.Nope"));
    }

    #[test]
    fn test_repeated_reference_reuses_visited_entry() {
        let reg = registry(vec![
            object(
                "pkg.Pair",
                vec![
                    ("left", SchemaNode::reference("pkg.Leaf")),
                    ("right", SchemaNode::reference("pkg.Leaf")),
                ],
            ),
            object("pkg.Leaf", vec![("v", SchemaNode::Float)]),
        ]);
        let mut visited = Visited::new();

        let resolved = resolve(&SchemaNode::reference("pkg.Pair"), &reg, &mut visited).unwrap();
        let props = resolved.properties().unwrap();
        assert_eq!(props["left"].schema, props["right"].schema);
        assert_eq!(visited.get("pkg.Leaf"), Some(&props["left"].schema));
    }

    #[test]
    fn test_dereference_all_reports_failures() {
        let mut source = ParsedSource::default();
        source
            .schemas
            .insert("pkg.Alias".to_string(), SchemaNode::reference("pkg.Gone"));
        source
            .schemas
            .insert("pkg.A".to_string(), object("pkg.A", vec![("b", SchemaNode::Bool)]));
        let reg = SchemaRegistry::from_source(source).unwrap();

        let mut resolver = RefResolver::new(&reg);
        let all = resolver.dereference_all();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("pkg.A"));
        assert_eq!(resolver.diagnostics().warning_count(), 1);
    }
}
