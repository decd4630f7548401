//! Queued index operations.
//!
//! Every caller request becomes one `Operation` value capturing its inputs
//! at enqueue time. The processor executes operations strictly in queue
//! order by dispatching on the variant.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::model::{CompiledUnit, ContextId, Element, Location, RelationshipKind, Source, SourceFilter};
use crate::store::RelationshipStore;

/// Result delivered to a `GetRelationships` callback.
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// The queried element.
    pub element: Arc<Element>,
    /// The queried relationship kind.
    pub kind: RelationshipKind,
    /// Every location at which the relationship holds, as of the moment
    /// the query executed.
    pub locations: Vec<Location>,
}

/// Consumer for a relationship query.
///
/// Invoked on the processor thread, never the caller's. Callback bodies
/// must be short and non-blocking or they starve the whole index.
pub type RelationshipCallback = Box<dyn FnOnce(QueryResult) + Send>;

/// One index mutation or query, queued for the processor.
pub enum Operation {
    /// Index a compiled unit: retract the unit source's prior records,
    /// then record every discovered relationship.
    IndexUnit {
        context: ContextId,
        unit: CompiledUnit,
    },
    /// Retract everything contributed by one source.
    RemoveSource {
        context: ContextId,
        source: Source,
    },
    /// Retract everything contributed by sources the filter accepts.
    RemoveSources {
        context: ContextId,
        filter: SourceFilter,
    },
    /// Retract everything contributed by any source in the context.
    RemoveContext { context: ContextId },
    /// Read relationships and fire the callback with the result.
    GetRelationships {
        element: Arc<Element>,
        kind: RelationshipKind,
        callback: RelationshipCallback,
    },
    /// Empty the store. Also executed directly, outside the queue, by
    /// `Index::clear`.
    Clear,
}

impl Operation {
    /// Execute this operation against the store.
    pub fn execute(self, store: &mut RelationshipStore) {
        match self {
            Operation::IndexUnit { context, unit } => index_unit(store, &context, unit),
            Operation::RemoveSource { context, source } => {
                store.retract_source(&context, &source);
            }
            Operation::RemoveSources { context, filter } => {
                store.retract_sources(&context, &filter);
            }
            Operation::RemoveContext { context } => {
                store.retract_context(&context);
            }
            Operation::GetRelationships {
                element,
                kind,
                callback,
            } => {
                let locations = store.relationships_of(&element, kind);
                callback(QueryResult {
                    element,
                    kind,
                    locations,
                });
            }
            Operation::Clear => {
                store.clear();
            }
        }
    }

    /// Whether this operation mutates the store (queries do not).
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::GetRelationships { .. })
    }
}

fn index_unit(store: &mut RelationshipStore, context: &ContextId, unit: CompiledUnit) {
    if unit.root.is_none() {
        debug!(source = %unit.source, "skipping unresolved unit");
        return;
    }

    // Re-indexing is idempotent: prior records for this source go first.
    store.retract_source(context, &unit.source);

    let source = unit.source;
    debug!(
        context = %context,
        source = %source,
        relationships = unit.relationships.len(),
        "indexing unit"
    );
    for discovered in unit.relationships {
        store.record_relationship(
            &discovered.subject,
            discovered.kind,
            discovered.location,
            context,
            &source,
        );
    }
}

// Callbacks and predicates are not Debug; describe operations by variant
// and key inputs so the processor can log failures.
impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::IndexUnit { context, unit } => f
                .debug_struct("IndexUnit")
                .field("context", context)
                .field("source", &unit.source)
                .field("relationships", &unit.relationships.len())
                .finish(),
            Operation::RemoveSource { context, source } => f
                .debug_struct("RemoveSource")
                .field("context", context)
                .field("source", source)
                .finish(),
            Operation::RemoveSources { context, filter } => f
                .debug_struct("RemoveSources")
                .field("context", context)
                .field("filter", filter)
                .finish(),
            Operation::RemoveContext { context } => f
                .debug_struct("RemoveContext")
                .field("context", context)
                .finish(),
            Operation::GetRelationships { element, kind, .. } => f
                .debug_struct("GetRelationships")
                .field("element", &element.qualified_name())
                .field("kind", kind)
                .finish(),
            Operation::Clear => f.write_str("Clear"),
        }
    }
}
