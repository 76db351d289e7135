//! Node data store: the per-node `table` and `execution_state` record keyed by
//! node id.
//!
//! Every node writes only its own entry. Reads are always a fresh lookup.
//! Observers are notified synchronously after the write lock is released so
//! that an observer may read the store (or the graph) without deadlocking.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use signal_types::{ExecutionState, SignalTable};

use crate::sync::{read, write};

// ---------------------------------------------------------------------------
// NodeData
// ---------------------------------------------------------------------------

/// The mutable record held for each node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeData {
    /// Last computed output, `None` until executed or after invalidation.
    pub table: Option<SignalTable>,
    pub execution_state: ExecutionState,
    /// Advanced on insert, invalidation, reconfiguration and execute. Values
    /// come from a store-wide counter, so they are never reused, not even by a
    /// later node with the same id. A gateway response is only committed when
    /// the generation it was issued under is still current.
    pub generation: u64,
}

impl NodeData {
    pub fn with_table(table: SignalTable) -> Self {
        Self {
            table: Some(table),
            execution_state: ExecutionState::Executed,
            generation: 0,
        }
    }
}

/// Called after any entry changes.
pub trait StoreObserver: Send + Sync {
    fn node_changed(&self, node_id: &str);
}

// ---------------------------------------------------------------------------
// NodeStore
// ---------------------------------------------------------------------------

/// Shared, cheaply clonable handle to the node data store.
#[derive(Clone, Default)]
pub struct NodeStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    entries: RwLock<HashMap<String, NodeData>>,
    observers: RwLock<Vec<(u64, Arc<dyn StoreObserver>)>>,
    next_observer: AtomicU64,
    generations: AtomicU64,
}

/// Removes its observer from the store when dropped.
pub struct ObserverGuard {
    store: Weak<StoreInner>,
    id: u64,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            write(&inner.observers).retain(|(id, _)| *id != self.id);
        }
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. The entry starts at a fresh generation.
    pub fn insert(&self, node_id: impl Into<String>, mut data: NodeData) {
        let node_id = node_id.into();
        data.generation = self.next_generation();
        write(&self.inner.entries).insert(node_id.clone(), data);
        self.notify(&node_id);
    }

    pub fn remove(&self, node_id: &str) -> Option<NodeData> {
        let removed = write(&self.inner.entries).remove(node_id);
        if removed.is_some() {
            self.notify(node_id);
        }
        removed
    }

    /// Drop every entry whose id does not satisfy `keep`.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) {
        let removed: Vec<String> = {
            let mut entries = write(&self.inner.entries);
            let removed = entries
                .keys()
                .filter(|id| !keep(id))
                .cloned()
                .collect::<Vec<_>>();
            for id in &removed {
                entries.remove(id);
            }
            removed
        };
        for id in &removed {
            self.notify(id);
        }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        read(&self.inner.entries).contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<NodeData> {
        read(&self.inner.entries).get(node_id).cloned()
    }

    pub fn table(&self, node_id: &str) -> Option<SignalTable> {
        read(&self.inner.entries)
            .get(node_id)
            .and_then(|d| d.table.clone())
    }

    pub fn execution_state(&self, node_id: &str) -> Option<ExecutionState> {
        read(&self.inner.entries)
            .get(node_id)
            .map(|d| d.execution_state)
    }

    pub fn generation(&self, node_id: &str) -> Option<u64> {
        read(&self.inner.entries).get(node_id).map(|d| d.generation)
    }

    /// Mutate an entry in place. Returns `None` if the node has no entry.
    pub fn update<R>(&self, node_id: &str, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        let result = {
            let mut entries = write(&self.inner.entries);
            entries.get_mut(node_id).map(f)
        };
        if result.is_some() {
            self.notify(node_id);
        }
        result
    }

    /// Move an entry to a fresh generation, then mutate it. Any response
    /// issued under an earlier generation becomes stale.
    pub fn advance<R>(&self, node_id: &str, f: impl FnOnce(&mut NodeData) -> R) -> Option<R> {
        self.update(node_id, |d| {
            d.generation = self.next_generation();
            f(d)
        })
    }

    /// Like [`update`](Self::update), but only applies `f` while the entry's
    /// generation still equals `generation`. `None` means the write was stale
    /// (or the node is gone) and nothing changed.
    pub fn update_if_generation<R>(
        &self,
        node_id: &str,
        generation: u64,
        f: impl FnOnce(&mut NodeData) -> R,
    ) -> Option<R> {
        let result = {
            let mut entries = write(&self.inner.entries);
            match entries.get_mut(node_id) {
                Some(data) if data.generation == generation => Some(f(data)),
                _ => None,
            }
        };
        if result.is_some() {
            self.notify(node_id);
        }
        result
    }

    pub fn any_running(&self) -> bool {
        read(&self.inner.entries)
            .values()
            .any(|d| d.execution_state == ExecutionState::Running)
    }

    /// Snapshot of every node's execution state, ordered by id.
    pub fn states(&self) -> BTreeMap<String, ExecutionState> {
        read(&self.inner.entries)
            .iter()
            .map(|(id, d)| (id.clone(), d.execution_state))
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.inner.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register an observer. It stays registered until the guard is dropped.
    #[must_use = "the observer is removed when the guard is dropped"]
    pub fn observe(&self, observer: Arc<dyn StoreObserver>) -> ObserverGuard {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        write(&self.inner.observers).push((id, observer));
        ObserverGuard {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    fn next_generation(&self) -> u64 {
        self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn notify(&self, node_id: &str) {
        let observers: Vec<Arc<dyn StoreObserver>> = read(&self.inner.observers)
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer.node_changed(node_id);
        }
    }
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("entries", &*read(&self.inner.entries))
            .finish()
    }
}
