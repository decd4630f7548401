//! The index façade.
//!
//! Public entry point of the engine: translates caller requests into
//! queued operations and owns the processor's lifecycle. Every method is
//! callable from any thread; mutations and queries return immediately and
//! take effect in enqueue order on the processor thread.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::Result;
use crate::model::{CompiledUnit, ContextId, Element, RelationshipKind, Source, SourceFilter};
use crate::operation::{Operation, QueryResult};
use crate::processor::{OperationProcessor, ProcessorState};
use crate::queue::OperationQueue;
use crate::store::{lock_store, IndexStatistics, RelationshipStore, SharedStore};

/// The code-relationship index.
///
/// Callers on arbitrary threads enqueue work; one dedicated thread hosts
/// the event loop via [`Index::run`]. A query observes the effect of every
/// operation enqueued strictly before it — nothing stronger is promised.
///
/// ```rust,no_run
/// use refgraph::Index;
/// use std::sync::Arc;
/// use std::thread;
///
/// let index = Arc::new(Index::new());
/// let engine = Arc::clone(&index);
/// let worker = thread::spawn(move || engine.run());
/// // ... index units, query relationships ...
/// index.stop();
/// worker.join().unwrap().unwrap();
/// ```
pub struct Index {
    store: SharedStore,
    queue: OperationQueue,
    processor: OperationProcessor,
    /// Serializes `clear()` against itself; only one clear may drain the
    /// queue at a time.
    clear_gate: Mutex<()>,
}

impl Index {
    /// Create an index with default configuration.
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    pub fn with_config(config: IndexConfig) -> Self {
        let queue = OperationQueue::new();
        Self {
            store: Arc::new(Mutex::new(RelationshipStore::new())),
            processor: OperationProcessor::new(queue.clone(), config),
            queue,
            clear_gate: Mutex::new(()),
        }
    }

    // ─── Mutations ──────────────────────────────────────────────

    /// Enqueue indexing of a compiled unit. Returns immediately; the index
    /// reflects the unit once all previously enqueued operations complete.
    ///
    /// Units that failed resolution (`root == None`) are skipped outright.
    pub fn index_unit(&self, context: &ContextId, unit: CompiledUnit) {
        if unit.root.is_none() {
            debug!(source = %unit.source, "not indexing unresolved unit");
            return;
        }
        self.queue.enqueue(Operation::IndexUnit {
            context: context.clone(),
            unit,
        });
    }

    /// Enqueue retraction of everything contributed by one source.
    pub fn remove_source(&self, context: &ContextId, source: &Source) {
        self.queue.enqueue(Operation::RemoveSource {
            context: context.clone(),
            source: source.clone(),
        });
    }

    /// Enqueue retraction of everything contributed by sources the filter
    /// accepts.
    pub fn remove_sources(&self, context: &ContextId, filter: SourceFilter) {
        self.queue.enqueue(Operation::RemoveSources {
            context: context.clone(),
            filter,
        });
    }

    /// Enqueue retraction of everything contributed under a context.
    pub fn remove_context(&self, context: &ContextId) {
        self.queue.enqueue(Operation::RemoveContext {
            context: context.clone(),
        });
    }

    // ─── Queries ────────────────────────────────────────────────

    /// Enqueue a relationship query. The callback fires on the processor
    /// thread, never the caller's, and is ordered after every previously
    /// enqueued mutation. Keep callback bodies short and non-blocking.
    pub fn get_relationships(
        &self,
        element: &Arc<Element>,
        kind: RelationshipKind,
        callback: impl FnOnce(QueryResult) + Send + 'static,
    ) {
        self.queue.enqueue(Operation::GetRelationships {
            element: Arc::clone(element),
            kind,
            callback: Box::new(callback),
        });
    }

    /// Diagnostic counts. Only meaningful when read from the processor
    /// thread (e.g. inside a query callback) or after [`Index::stop`].
    pub fn statistics(&self) -> IndexStatistics {
        lock_store(&self.store).statistics()
    }

    // ─── Clear ──────────────────────────────────────────────────

    /// Empty the index now, bypassing the queue: drain pending operations,
    /// then clear the store directly.
    ///
    /// Known consistency gap, kept deliberately: operations enqueued by
    /// other threads *during* the drain may be dropped with it or may
    /// execute after the clear. Clearing is eventual, not atomic, with
    /// respect to concurrent producers.
    pub fn clear(&self) {
        let _gate = self
            .clear_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut dropped = 0usize;
        while let Some(operation) = self.queue.try_dequeue() {
            drop(operation);
            dropped += 1;
        }
        Operation::Clear.execute(&mut lock_store(&self.store));
        info!(dropped_operations = dropped, "index cleared");
    }

    // ─── Lifecycle ──────────────────────────────────────────────

    /// The engine's event loop. Blocks the calling thread until the
    /// processor stops; callers dedicate one thread to it.
    pub fn run(&self) -> Result<()> {
        self.processor.run(&self.store)
    }

    /// Cooperative stop: the in-flight operation finishes and, by default,
    /// the remaining queue is drained before the loop exits.
    pub fn stop(&self) {
        self.processor.stop(false);
    }

    /// Forced stop: the loop exits at the next dequeue boundary, discarding
    /// queued operations.
    pub fn stop_now(&self) {
        self.processor.stop(true);
    }

    /// Lifecycle state of the underlying processor.
    pub fn state(&self) -> ProcessorState {
        self.processor.state()
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscoveredRelationship, ElementKind, Location};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn fast_index() -> Arc<Index> {
        Arc::new(Index::with_config(IndexConfig {
            dequeue_timeout_ms: 10,
            drain_on_stop: true,
        }))
    }

    fn context() -> ContextId {
        ContextId::new("app")
    }

    fn element(name: &str) -> Arc<Element> {
        Arc::new(Element::top_level(
            ElementKind::Function,
            name,
            Source::new("lib/defs.dart"),
            0,
        ))
    }

    fn unit_with(source: &str, subject: &Arc<Element>, offset: u32) -> CompiledUnit {
        let src = Source::new(source);
        CompiledUnit::new(
            src.clone(),
            Some(Arc::new(Element::top_level(
                ElementKind::Library,
                source,
                src.clone(),
                0,
            ))),
            vec![DiscoveredRelationship {
                subject: Arc::clone(subject),
                kind: RelationshipKind::ReferencedBy,
                location: Location::new(src, offset, 5),
            }],
        )
    }

    fn spawn_run(index: &Arc<Index>) -> thread::JoinHandle<Result<()>> {
        let engine = Arc::clone(index);
        thread::spawn(move || engine.run())
    }

    /// Enqueue a query and block until its callback has fired, returning
    /// the locations it saw. Doubles as a barrier: everything enqueued
    /// before it has executed once this returns.
    fn query_sync(index: &Index, elem: &Arc<Element>, kind: RelationshipKind) -> Vec<Location> {
        let (tx, rx) = mpsc::channel();
        index.get_relationships(elem, kind, move |result| {
            tx.send(result.locations).expect("result channel");
        });
        rx.recv_timeout(Duration::from_secs(5)).expect("query answered")
    }

    #[test]
    fn test_unresolved_unit_is_not_enqueued() {
        let index = fast_index();
        index.index_unit(&context(), CompiledUnit::unresolved(Source::new("bad.dart")));
        assert!(index.queue.is_empty(), "unresolved units never hit the queue");
    }

    #[test]
    fn test_clear_without_processor_drops_pending_and_empties_store() {
        let index = fast_index();
        let elem = element("login");

        // Seed the store directly, then pile unexecuted work on the queue.
        Operation::IndexUnit {
            context: context(),
            unit: unit_with("lib/seeded.dart", &elem, 1),
        }
        .execute(&mut lock_store(&index.store));
        index.index_unit(&context(), unit_with("lib/pending.dart", &elem, 2));
        assert_eq!(index.queue.len(), 1);

        index.clear();

        assert!(index.queue.is_empty(), "pending operations were drained");
        let stats = index.statistics();
        assert_eq!(stats.relationship_count, 0);
        assert_eq!(stats.element_count, 0);
        assert_eq!(stats.source_count, 0);
    }

    #[test]
    fn test_clear_with_running_processor() {
        let index = fast_index();
        let worker = spawn_run(&index);
        let elem = element("login");

        index.index_unit(&context(), unit_with("lib/a.dart", &elem, 1));
        // Barrier: make sure the mutation has executed before clearing.
        assert_eq!(
            query_sync(&index, &elem, RelationshipKind::ReferencedBy).len(),
            1
        );

        index.clear();

        assert!(query_sync(&index, &elem, RelationshipKind::ReferencedBy).is_empty());
        let stats = index.statistics();
        assert_eq!(stats.relationship_count, 0);

        index.stop();
        worker.join().expect("worker thread").expect("run ok");
    }

    #[test]
    fn test_statistics_after_stop() {
        let index = fast_index();
        let worker = spawn_run(&index);
        let elem = element("login");

        index.index_unit(&context(), unit_with("lib/a.dart", &elem, 1));
        index.index_unit(&context(), unit_with("lib/b.dart", &elem, 2));

        index.stop(); // cooperative stop drains the queue
        worker.join().expect("worker thread").expect("run ok");

        let stats = index.statistics();
        assert_eq!(stats.relationship_count, 2);
        assert_eq!(stats.element_count, 1);
        assert_eq!(stats.source_count, 2);
        assert_eq!(index.state(), ProcessorState::Stopped);
    }

    #[test]
    fn test_remove_sources_by_prefix() {
        let index = fast_index();
        let worker = spawn_run(&index);
        let elem = element("login");

        index.index_unit(&context(), unit_with("lib/a.dart", &elem, 1));
        index.index_unit(&context(), unit_with("test/b.dart", &elem, 2));
        index.remove_sources(&context(), SourceFilter::path_prefix("lib/"));

        let locations = query_sync(&index, &elem, RelationshipKind::ReferencedBy);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].source.path, "test/b.dart");

        index.stop();
        worker.join().expect("worker thread").expect("run ok");
    }

    #[test]
    fn test_remove_context_retracts_all_its_sources() {
        let index = fast_index();
        let worker = spawn_run(&index);
        let elem = element("login");
        let app = ContextId::new("app");
        let other = ContextId::new("other");

        index.index_unit(&app, unit_with("lib/a.dart", &elem, 1));
        index.index_unit(&app, unit_with("lib/b.dart", &elem, 2));
        index.index_unit(&other, unit_with("lib/c.dart", &elem, 3));
        index.remove_context(&app);

        let locations = query_sync(&index, &elem, RelationshipKind::ReferencedBy);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].source.path, "lib/c.dart");

        index.stop();
        worker.join().expect("worker thread").expect("run ok");
    }
}
