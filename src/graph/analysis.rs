//! Schema Graph Analysis
//!
//! Reports recursive schema groups (strongly connected components over Ref
//! edges). Resolution and propagation handle cycles on their own; this is
//! informational output for operators and renderers that want to box or
//! forward-declare recursive types.

use petgraph::algo::kosaraju_scc;
use serde::{Deserialize, Serialize};

use crate::registry::SchemaRegistry;
use crate::schema::QualifiedName;

/// A group of schemas that reach each other through Ref edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecursiveGroup {
    /// Members in registry order
    pub members: Vec<QualifiedName>,
    /// Single schema referencing itself
    pub is_self_referential: bool,
}

/// Compute every recursive group in the registry
pub fn recursive_groups(registry: &SchemaRegistry) -> Vec<RecursiveGroup> {
    let (graph, indices) = registry.dependency_graph();

    let mut groups: Vec<RecursiveGroup> = kosaraju_scc(&graph)
        .into_iter()
        .filter_map(|scc| {
            let is_self_referential = scc.len() == 1 && graph.contains_edge(scc[0], scc[0]);
            if scc.len() < 2 && !is_self_referential {
                return None;
            }

            let mut members: Vec<QualifiedName> = scc
                .into_iter()
                .filter_map(|idx| graph.node_weight(idx).cloned())
                .collect();
            members.sort_by_key(|name| indices[name].index());

            Some(RecursiveGroup {
                members,
                is_self_referential,
            })
        })
        .collect();

    groups.sort_by_key(|g| indices[&g.members[0]].index());
    tracing::info!(groups = groups.len(), "recursive schema groups computed");
    groups
}
