//! Schema Regen
//!
//! Schema graph resolution and stable-identity regeneration for generated
//! API clients.
//!
//! ## Features
//!
//! - **Cycle-safe Resolution**: Recursive schemas dereference without unbounded expansion
//! - **Generic Propagation**: Open type parameters bubble up to every schema that embeds them
//! - **Stable Identities**: Build states record the identifier chosen for each canonical key
//! - **Rename Codemods**: Consumer code follows renamed identifiers, token-exact
//! - **Orphan Pruning**: Generated declarations nothing references are removed
//!
//! ## Architecture
//!
//! ```text
//! ParsedSource ──► SchemaRegistry ──► RefResolver ──► GenericPropagator ──► Renderer ──► BuildState
//!                                     (warnings)                                           │
//!                        previous BuildState ──► diff ──► Codemod ◄────────────────────────┘
//! ```

pub mod checksum;
pub mod codemod;
pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod registry;
pub mod schema;
pub mod state;

pub use checksum::Checksum;
pub use codemod::{Codemod, ConsumerTree, OrphanReport, RenameReport, TextTree};
pub use config::RegenConfig;
pub use error::{RegenError, Result};
pub use graph::{Diagnostics, GenericOverrideMap, GenericPropagator, RefResolver};
pub use pipeline::{RegenOptions, RegenOutcome, Regenerator, Renderer};
pub use registry::SchemaRegistry;
pub use schema::{GenericRequirement, ObjectProperty, ParsedSource, SchemaNode};
pub use state::{diff, BuildState, BuildStateEntry, RenameOp, StructuralKind};
