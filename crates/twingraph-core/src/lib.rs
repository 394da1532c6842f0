//! TwinGraph Core - In-process digital-twin graph cache
//!
//! This crate provides a concurrently accessed cache over a digital-twin graph:
//! - Ontology models with inheritance and computed descendant sets
//! - Unit annotations derived from model contents
//! - Twins and relationships with by-model and per-twin relationship indices
//! - Per-twin relationship hydration markers for lazy loading
//! - Source-of-truth integration (bulk load, change events, lazy readers)
//!
//! # Architecture
//!
//! ```text
//! GraphCache
//! ├── ModelIndex (models, descendants, unit annotations)
//! └── TwinIndex
//!     ├── twins / twins-by-model
//!     ├── relationships / outgoing / incoming
//!     └── RelationshipLoadTracker
//!
//! CacheLoader / LazyRelationshipReader ──> dyn TwinSource (provider, snapshot)
//! ```

pub mod cache;
pub mod load_tracker;
pub mod model;
pub mod model_index;
pub mod snapshot;
pub mod source;
pub mod twin_index;
pub mod units;

// Re-exports for convenience
pub use cache::{CacheOptions, CacheStats, GraphCache};
pub use load_tracker::RelationshipLoadTracker;
pub use model::{
    ContentKind, ModelContent, ModelDefinition, ModelParseError, Properties, Relationship, Twin,
    UnitAnnotation,
};
pub use model_index::{BatchReport, FailureStage, ItemFailure, ModelIndex};
pub use twin_index::{IndexError, SecondaryIndex, TwinIndex};
pub use units::{extract_unit_annotations, DerivationError};

// Source integration re-exports
pub use snapshot::{Snapshot, SnapshotError, SnapshotSource};
pub use source::{
    CacheLoader, ChangeEvent, ChangeOutcome, LazyRelationshipReader, LoadOptions, LoadReport,
    SourceError, TwinSource,
};
