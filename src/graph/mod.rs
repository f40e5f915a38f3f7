//! Schema Graph
//!
//! Reference resolution and generic propagation over the registry's
//! name-addressed graph. Nodes are looked up by qualified name rather than
//! followed by pointer, so cycle detection is a set-membership check.
//!
//! Ordering within a run: resolution of a schema completes before its
//! generic requirements are computed, and both finish before any renderer
//! assigns identifier names.

pub mod analysis;
pub mod diagnostics;
pub mod generics;
pub mod resolve;

pub use analysis::{recursive_groups, RecursiveGroup};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use generics::{
    populate_generics, resolve_type_arguments, GenericOverrideMap, GenericPropagator, GenericSlot,
    GenericValue, MethodScope, PropertyGenerics, ResolvedArgument, TypeArgument, TypeArguments,
};
pub use resolve::{resolve, RefResolver, Visited};
