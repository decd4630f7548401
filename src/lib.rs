//! # refgraph
//!
//! An incremental code-relationship index engine. Records relationships
//! between program elements (references, invocations, overrides, ...)
//! discovered by an external analyzer, and answers "find references" style
//! queries without re-analyzing the codebase.
//!
//! ## Design
//!
//! - **Message passing, not locking**: all mutation funnels through an
//!   unbounded FIFO operation queue into a single processor thread. A query
//!   is itself a queued operation, so it observes exactly the mutations
//!   enqueued before it.
//! - **Incremental**: records are tagged with the `(context, source)` that
//!   contributed them; re-indexing a source retracts its old records first,
//!   and sources, source sets, or whole contexts can be removed atomically.
//! - **Fault-isolated**: a panicking operation is logged and skipped; it
//!   never takes down the processor loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use refgraph::{CompiledUnit, ContextId, Index, RelationshipKind, Source};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let index = Arc::new(Index::new());
//!
//! // Dedicate one thread to the processor's event loop.
//! let engine = Arc::clone(&index);
//! let worker = thread::spawn(move || engine.run());
//!
//! // Feed analyzer output; query from any thread.
//! let context = ContextId::new("my_app");
//! # let unit = CompiledUnit::unresolved(Source::new("lib/main.dart"));
//! # let element = Arc::new(refgraph::Element::top_level(
//! #     refgraph::ElementKind::Function, "main", Source::new("lib/main.dart"), 0));
//! index.index_unit(&context, unit);
//! index.get_relationships(&element, RelationshipKind::ReferencedBy, |result| {
//!     println!("{} locations", result.locations.len());
//! });
//!
//! index.stop();
//! worker.join().unwrap().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod operation;
pub mod processor;
pub mod queue;
pub mod store;

// Re-exports for convenience
pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use index::Index;
pub use model::{
    CompiledUnit, ContextId, DiscoveredRelationship, Element, ElementKind, Location,
    RelationshipKind, Source, SourceFilter,
};
pub use operation::{Operation, QueryResult, RelationshipCallback};
pub use processor::ProcessorState;
pub use queue::{DequeueError, OperationQueue};
pub use store::{IndexStatistics, RelationshipStore};
