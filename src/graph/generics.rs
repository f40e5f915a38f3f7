//! Generic Propagation
//!
//! Computes which generic parameters every schema must thread through so that
//! generated constructs stay reusable instead of being duplicated per call
//! site. Requirements originate on properties typed by an open parameter and
//! flow up to every schema that reaches them:
//!
//! ```text
//! Page  { items: Ref -> Item }          Page  -> items -> { sort: SortFields }
//! Item  { sort: <SortFields> }   ==>    Item  -> sort  -> SortFields
//! ```
//!
//! Type-argument resolution then decides, per use site, whether each parameter
//! gets a concrete value, collapses to its default, or stays open.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::registry::SchemaRegistry;
use crate::schema::{Capability, GenericRequirement, Method, QualifiedName, SchemaNode};

// =============================================================================
// Override Map
// =============================================================================

/// Requirement attached to one property: either the parameter itself or the
/// property map of the schema the property points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenericSlot {
    Requirement(GenericRequirement),
    Nested(PropertyGenerics),
}

/// Property name -> slot, in property declaration order
pub type PropertyGenerics = IndexMap<String, GenericSlot>;

/// Schema -> property -> requirement-or-nested-map
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GenericOverrideMap {
    schemas: IndexMap<QualifiedName, PropertyGenerics>,
}

impl GenericOverrideMap {
    pub fn get(&self, name: &str) -> Option<&PropertyGenerics> {
        self.schemas.get(name)
    }

    /// Whether `name` requires any generic parameter
    pub fn requires_generics(&self, name: &str) -> bool {
        self.schemas.get(name).is_some_and(|p| !p.is_empty())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QualifiedName, &PropertyGenerics)> {
        self.schemas.iter()
    }

    /// Distinct requirements of a schema, in first-seen order
    ///
    /// Deduplication is by identity: same-named requirements with a different
    /// origin, bound or default are kept as separate entries.
    pub fn distinct_requirements(&self, name: &str) -> Vec<&GenericRequirement> {
        let mut out = Vec::new();
        if let Some(props) = self.schemas.get(name) {
            let mut seen = HashSet::new();
            flatten(props, &mut seen, &mut out);
        }
        out
    }

    /// Slotted properties and distinct requirements of every schema
    fn marks(&self) -> Vec<(QualifiedName, Mark)> {
        let mut out = Vec::new();
        for (name, props) in &self.schemas {
            out.extend(props.keys().map(|p| (name.clone(), Mark::Slot(p.clone()))));
            out.extend(
                self.distinct_requirements(name)
                    .into_iter()
                    .map(|r| (name.clone(), Mark::Requirement(r.clone()))),
            );
        }
        out
    }

    fn record(&mut self, name: &str, props: PropertyGenerics) {
        let entry = self.schemas.entry(name.to_string()).or_default();
        for (prop, slot) in props {
            entry.insert(prop, slot);
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum Mark {
    Slot(String),
    Requirement(GenericRequirement),
}

fn flatten<'a>(
    props: &'a PropertyGenerics,
    seen: &mut HashSet<&'a GenericRequirement>,
    out: &mut Vec<&'a GenericRequirement>,
) {
    for slot in props.values() {
        match slot {
            GenericSlot::Requirement(req) => {
                if seen.insert(req) {
                    out.push(req);
                }
            }
            GenericSlot::Nested(nested) => flatten(nested, seen, out),
        }
    }
}

// =============================================================================
// Propagator
// =============================================================================

/// Compute the override map for everything reachable from `root`
pub fn populate_generics(root: &SchemaNode, registry: &SchemaRegistry) -> GenericOverrideMap {
    let mut propagator = GenericPropagator::new(registry);
    propagator.populate(root);
    propagator.into_overrides()
}

/// Accumulates generic requirements across walks over one registry
///
/// Each [`populate`](Self::populate) call uses its own visit set; the override
/// map is shared, so requirements discovered by an earlier walk are honoured
/// when a later walk is cut short by a cycle.
pub struct GenericPropagator<'r> {
    registry: &'r SchemaRegistry,
    overrides: GenericOverrideMap,
}

impl<'r> GenericPropagator<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            overrides: GenericOverrideMap::default(),
        }
    }

    /// Walk every schema reachable from `root`
    pub fn populate(&mut self, root: &SchemaNode) -> PropertyGenerics {
        let mut visited = HashSet::new();
        self.node(root, &mut visited)
    }

    /// Walk every registered schema and every method request/response
    ///
    /// A walk cut short by a cycle only sees what earlier walks recorded, so
    /// passes repeat until one adds no new property slot or requirement to any
    /// schema. Nested maps along a cycle get one level deeper per pass and
    /// are not compared.
    pub fn populate_all(mut self) -> GenericOverrideMap {
        let registry = self.registry;
        let mut seen = HashSet::new();
        let mut passes = 0;

        loop {
            passes += 1;

            for (name, node) in registry.iter() {
                tracing::debug!(schema = %name, pass = passes, "propagating generics");
                self.populate(node);
            }
            for method in registry.methods() {
                for root in method.request.iter().chain(method.response.iter()) {
                    self.populate(root);
                }
            }

            let before = seen.len();
            seen.extend(self.overrides.marks());
            if seen.len() == before {
                break;
            }
        }

        tracing::info!(generic_schemas = self.overrides.len(), passes, "generic propagation complete");
        self.overrides
    }

    pub fn overrides(&self) -> &GenericOverrideMap {
        &self.overrides
    }

    pub fn into_overrides(self) -> GenericOverrideMap {
        self.overrides
    }

    /// Requirements contributed by `node` when used as a property type
    fn node(&mut self, node: &SchemaNode, visited: &mut HashSet<QualifiedName>) -> PropertyGenerics {
        match node {
            SchemaNode::Ref(r) => {
                let registry = self.registry;
                match registry.get(&r.target) {
                    Some(target) => self.named(&r.target, target, visited),
                    None => PropertyGenerics::new(),
                }
            }
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                self.named(&o.qualified_name, node, visited)
            }
            SchemaNode::Array(a) => self.named(&a.qualified_name, node, visited),
            SchemaNode::Map(m) => self.named(&m.qualified_name, node, visited),
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
            | SchemaNode::Any => PropertyGenerics::new(),
        }
    }

    fn named(
        &mut self,
        name: &str,
        node: &SchemaNode,
        visited: &mut HashSet<QualifiedName>,
    ) -> PropertyGenerics {
        if !visited.insert(name.to_string()) {
            return self.overrides.get(name).cloned().unwrap_or_default();
        }

        let props = match node {
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                let mut props = PropertyGenerics::new();
                for (prop_name, prop) in &o.properties {
                    if let Some(req) = &prop.generic {
                        props.insert(prop_name.clone(), GenericSlot::Requirement(req.clone()));
                        continue;
                    }
                    let nested = self.node(&prop.schema, visited);
                    if !nested.is_empty() {
                        props.insert(prop_name.clone(), GenericSlot::Nested(nested));
                    }
                }
                props
            }
            // Containers are transparent: they carry what their elements carry
            SchemaNode::Array(a) => self.node(&a.item, visited),
            SchemaNode::Map(m) => {
                let mut props = self.node(&m.key, visited);
                for (prop, slot) in self.node(&m.value, visited) {
                    props.entry(prop).or_insert(slot);
                }
                props
            }
            SchemaNode::Ref(_) => self.node(node, visited),
            _ => PropertyGenerics::new(),
        };

        if !props.is_empty() {
            self.overrides.record(name, props.clone());
        }
        props
    }
}

// =============================================================================
// Type Argument Resolution
// =============================================================================

/// Concrete value bound to a generic parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum GenericValue {
    /// A generated schema, e.g. a per-method field enumeration
    Reference(QualifiedName),
    /// A literal type expression
    Type(String),
}

impl GenericValue {
    fn is_default_of(&self, requirement: &GenericRequirement) -> bool {
        match (self, &requirement.default_value) {
            (GenericValue::Type(value), Some(default)) => value == default,
            _ => false,
        }
    }
}

/// Outcome of resolving one parameter at a use site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedArgument {
    Concrete(GenericValue),
    /// Resolved to the declared default; omitted from emitted arguments
    Default,
    /// No value known; emitted as a parameter
    Open,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeArgument {
    pub requirement: GenericRequirement,
    pub resolved: ResolvedArgument,
}

/// Resolved arguments of one schema use, in declared order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeArguments {
    pub arguments: Vec<TypeArgument>,
}

impl TypeArguments {
    /// The whole argument list is omitted iff every argument equals its default
    pub fn is_omitted(&self) -> bool {
        self.arguments.iter().all(|a| a.resolved == ResolvedArgument::Default)
    }

    /// Arguments to emit, in declared order, or None when the list is omitted
    pub fn emitted(&self) -> Option<Vec<&TypeArgument>> {
        if self.is_omitted() {
            return None;
        }
        Some(
            self.arguments
                .iter()
                .filter(|a| a.resolved != ResolvedArgument::Default)
                .collect(),
        )
    }
}

/// Schemas constructed for one method's request and response
///
/// Capability requirements are only made concrete inside this scope.
pub struct MethodScope<'m> {
    method: &'m Method,
    descendants: HashSet<QualifiedName>,
}

impl<'m> MethodScope<'m> {
    pub fn new(method: &'m Method, registry: &SchemaRegistry) -> Self {
        let mut descendants = HashSet::new();
        for root in method.request.iter().chain(method.response.iter()) {
            collect_descendants(root, registry, &mut descendants);
        }
        tracing::debug!(method = %method.qualified_name, schemas = descendants.len(), "method scope built");
        Self { method, descendants }
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descendants.contains(name)
    }

    fn capability_value(&self, owner: &str, capability: Capability) -> Option<GenericValue> {
        if !self.contains(owner) {
            return None;
        }
        self.method
            .capabilities
            .enumeration_for(capability)
            .map(|name| GenericValue::Reference(name.clone()))
    }
}

fn collect_descendants(node: &SchemaNode, registry: &SchemaRegistry, out: &mut HashSet<QualifiedName>) {
    if let Some(target) = node.ref_target() {
        if out.insert(target.to_string()) {
            if let Some(found) = registry.get(target) {
                collect_descendants(found, registry, out);
            }
        }
        return;
    }
    if let Some(name) = node.qualified_name() {
        out.insert(name.to_string());
    }
    for child in node.children() {
        collect_descendants(child, registry, out);
    }
}

/// Resolve the arguments `owner` passes for `requirements`
///
/// Capability requirements resolve to the method's generated enumeration when
/// `owner` descends from that method's request/response. Otherwise a value
/// comes from `bindings` (keyed by parameter name); a bound value equal to the
/// declared default collapses to [`ResolvedArgument::Default`]; no value leaves
/// the parameter open.
pub fn resolve_type_arguments(
    owner: &str,
    requirements: &[&GenericRequirement],
    bindings: &HashMap<String, GenericValue>,
    scope: Option<&MethodScope<'_>>,
) -> TypeArguments {
    let arguments = requirements
        .iter()
        .map(|req| {
            let capability_value = req
                .capability
                .zip(scope)
                .and_then(|(capability, scope)| scope.capability_value(owner, capability));

            let resolved = match capability_value.or_else(|| bindings.get(&req.name).cloned()) {
                Some(value) if value.is_default_of(req) => ResolvedArgument::Default,
                Some(value) => ResolvedArgument::Concrete(value),
                None => ResolvedArgument::Open,
            };

            TypeArgument {
                requirement: (*req).clone(),
                resolved,
            }
        })
        .collect();

    TypeArguments { arguments }
}
