//! Schema Registry
//!
//! Immutable-per-run store of canonical schema nodes keyed by qualified name.
//! The graph may be cyclic through Ref edges; the naming space never is.

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::error::{RegenError, Result};
use crate::schema::{Method, Package, ParsedSource, QualifiedName, SchemaNode};

/// The canonical schema store for one generation run
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: IndexMap<QualifiedName, SchemaNode>,
    packages: Vec<Package>,
}

impl SchemaRegistry {
    /// Populate the registry from the normalizer's output
    ///
    /// Fails only when the source is unusable as a whole: no schemas at all,
    /// or a key that disagrees with its node's own qualified name.
    pub fn from_source(source: ParsedSource) -> Result<Self> {
        if source.schemas.is_empty() {
            return Err(RegenError::EmptyRegistry);
        }

        let ParsedSource { mut schemas, mut packages } = source;

        for (key, node) in schemas.iter_mut() {
            if let Some(name) = node.qualified_name() {
                if name != key {
                    return Err(RegenError::InvalidSource(format!(
                        "schema registered as '{}' declares qualified name '{}'",
                        key, name
                    )));
                }
            }
            node.normalize_property_names();
        }

        for method in packages.iter_mut().flat_map(|p| p.methods.iter_mut()) {
            if let Some(request) = method.request.as_mut() {
                request.normalize_property_names();
            }
            if let Some(response) = method.response.as_mut() {
                response.normalize_property_names();
            }
        }

        tracing::info!(
            schemas = schemas.len(),
            packages = packages.len(),
            "schema registry populated"
        );

        Ok(Self { schemas, packages })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Self::from_source(ParsedSource::from_json(content)?)
    }

    /// Get a schema by qualified name
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// All schemas in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&QualifiedName, &SchemaNode)> {
        self.schemas.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.schemas.keys()
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Every method across all packages
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.packages.iter().flat_map(|p| p.methods.iter())
    }

    /// Look up a method by qualified name
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods().find(|m| m.qualified_name == name)
    }

    /// Directed graph of Ref edges between registered schemas
    ///
    /// Edges to unknown targets are left out; resolution reports those.
    pub fn dependency_graph(&self) -> (DiGraph<QualifiedName, ()>, HashMap<QualifiedName, NodeIndex>) {
        let mut graph = DiGraph::with_capacity(self.schemas.len(), self.schemas.len() * 2);
        let mut indices = HashMap::with_capacity(self.schemas.len());

        for name in self.schemas.keys() {
            indices.insert(name.clone(), graph.add_node(name.clone()));
        }

        for (name, node) in &self.schemas {
            let from = indices[name];
            for target in node.ref_targets() {
                if let Some(&to) = indices.get(target) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        (graph, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectProperty, ObjectSchema};

    fn source_with(nodes: Vec<(&str, SchemaNode)>) -> ParsedSource {
        ParsedSource {
            schemas: nodes.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            packages: Vec::new(),
        }
    }

    #[test]
    fn test_empty_source_is_fatal() {
        let err = SchemaRegistry::from_source(ParsedSource::default()).unwrap_err();
        assert!(matches!(err, RegenError::EmptyRegistry));
    }

    #[test]
    fn test_mismatched_key_is_rejected() {
        let source = source_with(vec![(
            "pkg.A",
            SchemaNode::Object(ObjectSchema::new("pkg.B", "B")),
        )]);
        let err = SchemaRegistry::from_source(source).unwrap_err();
        assert!(matches!(err, RegenError::InvalidSource(_)));
    }

    #[test]
    fn test_scalar_alias_keys_are_accepted() {
        let source = source_with(vec![("pkg.UserId", SchemaNode::Key)]);
        let registry = SchemaRegistry::from_source(source).unwrap();
        assert_eq!(registry.get("pkg.UserId"), Some(&SchemaNode::Key));
    }

    #[test]
    fn test_dependency_graph_skips_missing_targets() {
        let a = ObjectSchema::new("pkg.A", "A")
            .with_property(ObjectProperty::new("b", SchemaNode::reference("pkg.B")))
            .with_property(ObjectProperty::new("gone", SchemaNode::reference("pkg.Missing")));
        let b = ObjectSchema::new("pkg.B", "B");
        let registry = SchemaRegistry::from_source(source_with(vec![
            ("pkg.A", SchemaNode::Object(a)),
            ("pkg.B", SchemaNode::Object(b)),
        ]))
        .unwrap();

        let (graph, indices) = registry.dependency_graph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains_edge(indices["pkg.A"], indices["pkg.B"]));
    }
}
