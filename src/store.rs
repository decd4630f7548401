//! The in-memory relationship store.
//!
//! Maps elements to the locations that relate to them and sources to the
//! records they contributed. Pure data structure: it carries no locking of
//! its own and must only be touched by one thread at a time — the operation
//! processor routes every mutation through itself to enforce that.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::model::{ContextId, Element, Location, RelationshipKind, Source, SourceFilter};

/// The store as shared between the processor thread and `Index::clear`.
///
/// The mutex exists to satisfy aliasing rules, not to arbitrate access:
/// ordering comes from the operation queue, so the lock is uncontended
/// during normal operation.
pub(crate) type SharedStore = Arc<Mutex<RelationshipStore>>;

/// Lock the shared store, recovering from poisoning. A panicking
/// operation must not wedge the processor loop, so a poisoned lock is
/// taken as-is; no rollback of partially executed operations is promised.
pub(crate) fn lock_store(store: &SharedStore) -> MutexGuard<'_, RelationshipStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Retraction key: every record is tagged with the context and source it
/// was contributed under.
type SourceKey = (ContextId, Source);

/// A location together with the key that contributed it.
#[derive(Debug, Clone)]
struct TaggedLocation {
    location: Location,
    contributed_by: SourceKey,
}

/// Back-reference from the source bucket into the element bucket.
#[derive(Debug, Clone)]
struct RecordRef {
    element: Arc<Element>,
    kind: RelationshipKind,
    location: Location,
}

/// The relationship store.
///
/// Every record lives in exactly one element bucket and exactly one source
/// bucket; every mutating method keeps the two consistent.
#[derive(Debug, Default)]
pub struct RelationshipStore {
    /// element -> kind -> locations (with their contributing source).
    by_element: HashMap<Arc<Element>, HashMap<RelationshipKind, Vec<TaggedLocation>>>,
    /// (context, source) -> records contributed while indexing that source.
    by_source: HashMap<SourceKey, Vec<RecordRef>>,
}

impl RelationshipStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Mutation ───────────────────────────────────────────────

    /// Record that `subject` has a relationship of `kind` at `location`,
    /// contributed while indexing `source` within `context`.
    ///
    /// Fire-and-forget: never fails, observable later through queries.
    pub fn record_relationship(
        &mut self,
        subject: &Arc<Element>,
        kind: RelationshipKind,
        location: Location,
        context: &ContextId,
        source: &Source,
    ) {
        let key: SourceKey = (context.clone(), source.clone());

        self.by_element
            .entry(Arc::clone(subject))
            .or_default()
            .entry(kind)
            .or_default()
            .push(TaggedLocation {
                location: location.clone(),
                contributed_by: key.clone(),
            });

        self.by_source.entry(key).or_default().push(RecordRef {
            element: Arc::clone(subject),
            kind,
            location,
        });
    }

    /// Remove every record contributed by `source` within `context`.
    pub fn retract_source(&mut self, context: &ContextId, source: &Source) {
        let key: SourceKey = (context.clone(), source.clone());
        let Some(records) = self.by_source.remove(&key) else {
            return;
        };
        debug!(
            context = %context,
            source = %source,
            records = records.len(),
            "retracting source"
        );
        for record in records {
            self.remove_from_element_bucket(&record, &key);
        }
    }

    /// Remove every record contributed by a source within `context` that
    /// the filter accepts.
    pub fn retract_sources(&mut self, context: &ContextId, filter: &SourceFilter) {
        let matching: Vec<Source> = self
            .by_source
            .keys()
            .filter(|(ctx, source)| ctx == context && filter.matches(source))
            .map(|(_, source)| source.clone())
            .collect();
        for source in matching {
            self.retract_source(context, &source);
        }
    }

    /// Remove every record contributed by any source within `context`.
    pub fn retract_context(&mut self, context: &ContextId) {
        let sources: Vec<Source> = self
            .by_source
            .keys()
            .filter(|(ctx, _)| ctx == context)
            .map(|(_, source)| source.clone())
            .collect();
        debug!(context = %context, sources = sources.len(), "retracting context");
        for source in sources {
            self.retract_source(context, &source);
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.by_element.clear();
        self.by_source.clear();
    }

    // ─── Queries ────────────────────────────────────────────────

    /// All locations at which `element` has a relationship of `kind`.
    pub fn relationships_of(&self, element: &Element, kind: RelationshipKind) -> Vec<Location> {
        self.by_element
            .get(element)
            .and_then(|kinds| kinds.get(&kind))
            .map(|tagged| tagged.iter().map(|t| t.location.clone()).collect())
            .unwrap_or_default()
    }

    /// Diagnostic counts. Only meaningful when read from the processor
    /// thread or after the processor has stopped.
    pub fn statistics(&self) -> IndexStatistics {
        IndexStatistics {
            relationship_count: self.by_source.values().map(Vec::len).sum(),
            element_count: self.by_element.len(),
            source_count: self.by_source.len(),
        }
    }

    // ─── Internal ───────────────────────────────────────────────

    /// Remove one record occurrence from the element bucket, dropping
    /// empty kind and element buckets so counts shrink with retraction.
    fn remove_from_element_bucket(&mut self, record: &RecordRef, key: &SourceKey) {
        let Some(kinds) = self.by_element.get_mut(&record.element) else {
            return;
        };
        if let Some(tagged) = kinds.get_mut(&record.kind) {
            if let Some(pos) = tagged
                .iter()
                .position(|t| t.contributed_by == *key && t.location == record.location)
            {
                tagged.swap_remove(pos);
            }
            if tagged.is_empty() {
                kinds.remove(&record.kind);
            }
        }
        if kinds.is_empty() {
            self.by_element.remove(&record.element);
        }
    }
}

/// Relationship, element, and source counts for diagnostic display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatistics {
    /// Total relationship records in the store.
    pub relationship_count: usize,
    /// Distinct elements with at least one record.
    pub element_count: usize,
    /// Distinct (context, source) pairs with at least one record.
    pub source_count: usize,
}

impl fmt::Display for IndexStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} relationships in {} elements in {} sources",
            self.relationship_count, self.element_count, self.source_count
        )
    }
}
