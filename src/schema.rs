//! Canonical schema model
//!
//! The normalization step hands the two source dialects over in this shape.
//! Every named node carries a globally unique qualified name; [`SchemaNode::Ref`]
//! is a placeholder resolved by qualified-name lookup against the registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique key of a schema or method
pub type QualifiedName = String;

/// Ordered property map of an object-like schema
pub type Properties = IndexMap<String, ObjectProperty>;

/// A node in the schema graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaNode {
    Enum(EnumSchema),
    Bool,
    Integer,
    Float,
    String,
    Date,
    Timestamp,
    Decimal,
    Bytes,
    Key,
    Any,
    Map(MapSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    OneOf(ObjectSchema),
    Polymorph(ObjectSchema),
    Ref(RefSchema),
}

impl SchemaNode {
    /// Build a reference to another schema
    pub fn reference(target: impl Into<QualifiedName>) -> Self {
        SchemaNode::Ref(RefSchema { target: target.into() })
    }

    /// Short tag for this node kind (matches the serialized `kind`)
    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaNode::Enum(_) => "enum",
            SchemaNode::Bool => "bool",
            SchemaNode::Integer => "integer",
            SchemaNode::Float => "float",
            SchemaNode::String => "string",
            SchemaNode::Date => "date",
            SchemaNode::Timestamp => "timestamp",
            SchemaNode::Decimal => "decimal",
            SchemaNode::Bytes => "bytes",
            SchemaNode::Key => "key",
            SchemaNode::Any => "any",
            SchemaNode::Map(_) => "map",
            SchemaNode::Array(_) => "array",
            SchemaNode::Object(_) => "object",
            SchemaNode::OneOf(_) => "oneOf",
            SchemaNode::Polymorph(_) => "polymorph",
            SchemaNode::Ref(_) => "ref",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            SchemaNode::Bool
                | SchemaNode::Integer
                | SchemaNode::Float
                | SchemaNode::String
                | SchemaNode::Date
                | SchemaNode::Timestamp
                | SchemaNode::Decimal
                | SchemaNode::Bytes
                | SchemaNode::Key
                | SchemaNode::Any
        )
    }

    pub fn ref_target(&self) -> Option<&str> {
        match self {
            SchemaNode::Ref(r) => Some(&r.target),
            _ => None,
        }
    }

    /// Qualified name of a named node (scalars and refs carry none)
    pub fn qualified_name(&self) -> Option<&str> {
        match self {
            SchemaNode::Enum(e) => Some(&e.qualified_name),
            SchemaNode::Map(m) => Some(&m.qualified_name),
            SchemaNode::Array(a) => Some(&a.qualified_name),
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                Some(&o.qualified_name)
            }
            _ => None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            SchemaNode::Enum(e) => Some(&e.display_name),
            SchemaNode::Map(m) => Some(&m.display_name),
            SchemaNode::Array(a) => Some(&a.display_name),
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                Some(&o.display_name)
            }
            _ => None,
        }
    }

    /// Properties of an object, oneOf or polymorph
    pub fn properties(&self) -> Option<&Properties> {
        match self {
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                Some(&o.properties)
            }
            _ => None,
        }
    }

    pub fn properties_mut(&mut self) -> Option<&mut Properties> {
        match self {
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                Some(&mut o.properties)
            }
            _ => None,
        }
    }

    /// Immediate child nodes, in declaration order
    pub fn children(&self) -> Vec<&SchemaNode> {
        match self {
            SchemaNode::Array(a) => vec![a.item.as_ref()],
            SchemaNode::Map(m) => vec![m.key.as_ref(), m.value.as_ref()],
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                o.properties.values().map(|p| &p.schema).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Every Ref target reachable without crossing a Ref edge
    pub fn ref_targets(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_ref_targets(self, &mut out);
        out
    }

    /// Fill in property names left empty by the normalizer from their map keys
    pub(crate) fn normalize_property_names(&mut self) {
        match self {
            SchemaNode::Array(a) => a.item.normalize_property_names(),
            SchemaNode::Map(m) => {
                m.key.normalize_property_names();
                m.value.normalize_property_names();
            }
            SchemaNode::Object(o) | SchemaNode::OneOf(o) | SchemaNode::Polymorph(o) => {
                for (key, prop) in o.properties.iter_mut() {
                    if prop.name.is_empty() {
                        prop.name = key.clone();
                    }
                    prop.schema.normalize_property_names();
                }
            }
            _ => {}
        }
    }
}

fn collect_ref_targets<'a>(node: &'a SchemaNode, out: &mut Vec<&'a str>) {
    if let SchemaNode::Ref(r) = node {
        out.push(&r.target);
        return;
    }
    for child in node.children() {
        collect_ref_targets(child, out);
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.qualified_name(), self.ref_target()) {
            (Some(name), _) => write!(f, "{}({})", self.kind_name(), name),
            (None, Some(target)) => write!(f, "ref({})", target),
            _ => write!(f, "{}", self.kind_name()),
        }
    }
}

/// Placeholder standing for another schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSchema {
    pub target: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumSchema {
    pub qualified_name: QualifiedName,
    pub display_name: String,
    #[serde(default)]
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArraySchema {
    pub qualified_name: QualifiedName,
    pub display_name: String,
    pub item: Box<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSchema {
    pub qualified_name: QualifiedName,
    pub display_name: String,
    pub key: Box<SchemaNode>,
    pub value: Box<SchemaNode>,
}

/// Shared payload of object, oneOf and polymorph nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSchema {
    pub qualified_name: QualifiedName,
    pub display_name: String,
    #[serde(default)]
    pub properties: Properties,
    /// Discriminator property of a polymorph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
}

impl ObjectSchema {
    pub fn new(qualified_name: impl Into<QualifiedName>, display_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            display_name: display_name.into(),
            properties: Properties::new(),
            discriminator: None,
        }
    }

    /// Append a property, keyed by its name
    pub fn with_property(mut self, property: ObjectProperty) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }
}

/// Entity-aware markers consumed by downstream renderers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKey {
    Primary,
    Shard,
    Tenant,
    Foreign { target: QualifiedName },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProperty {
    #[serde(default)]
    pub name: String,
    pub schema: SchemaNode,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_key: Option<EntityKey>,
    /// The property's type is this open generic parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<GenericRequirement>,
}

impl ObjectProperty {
    pub fn new(name: impl Into<String>, schema: SchemaNode) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            read_only: false,
            write_only: false,
            entity_key: None,
            generic: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_generic(mut self, generic: GenericRequirement) -> Self {
        self.generic = Some(generic);
        self
    }
}

/// List-helper capability a method may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Filter,
    Search,
    Sort,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Filter, Capability::Search, Capability::Sort];

    /// Name of the built-in generic parameter for this capability
    pub fn generic_name(&self) -> &'static str {
        match self {
            Capability::Filter => "FilterFields",
            Capability::Search => "SearchFields",
            Capability::Sort => "SortFields",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Filter => write!(f, "filter"),
            Capability::Search => write!(f, "search"),
            Capability::Sort => write!(f, "sort"),
        }
    }
}

/// A named, boundable, defaultable type parameter
///
/// Identity is the full value: two requirements sharing a name but declared on
/// different schemas, or with a different bound or default, are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericRequirement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends_bound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Schema that declares this parameter
    pub origin: QualifiedName,
    /// Set only for the built-in list-helper parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
}

impl GenericRequirement {
    pub fn new(name: impl Into<String>, origin: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            extends_bound: None,
            default_value: None,
            origin: origin.into(),
            capability: None,
        }
    }

    /// The built-in requirement backing a list-helper field
    pub fn for_capability(capability: Capability, origin: impl Into<QualifiedName>) -> Self {
        Self {
            name: capability.generic_name().to_string(),
            extends_bound: Some("string".to_string()),
            default_value: Some("string".to_string()),
            origin: origin.into(),
            capability: Some(capability),
        }
    }

    pub fn with_bound(mut self, bound: impl Into<String>) -> Self {
        self.extends_bound = Some(bound.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }
}

impl fmt::Display for GenericRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(bound) = &self.extends_bound {
            write!(f, " extends {}", bound)?;
        }
        if let Some(default) = &self.default_value {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

/// Per-method generated enumerations backing list-helper capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<QualifiedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<QualifiedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<QualifiedName>,
}

impl MethodCapabilities {
    /// The enumeration generated for `capability`, if the method has it
    pub fn enumeration_for(&self, capability: Capability) -> Option<&QualifiedName> {
        match capability {
            Capability::Filter => self.filter.as_ref(),
            Capability::Search => self.search.as_ref(),
            Capability::Sort => self.sort.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && self.search.is_none() && self.sort.is_none()
    }
}

/// A service method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub qualified_name: QualifiedName,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<SchemaNode>,
    #[serde(default, skip_serializing_if = "MethodCapabilities::is_empty")]
    pub capabilities: MethodCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<Method>,
}

/// Output contract of the normalization step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSource {
    pub schemas: IndexMap<QualifiedName, SchemaNode>,
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl ParsedSource {
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}
