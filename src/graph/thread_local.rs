use std::cell::Cell;

use super::Graph;

thread_local! {
    static ACTIVE_GRAPH: Cell<*mut Graph> = const { Cell::new(std::ptr::null_mut()) };
}

/// Access the active graph for the current thread.
/// Panics if no graph is active.
#[inline]
pub(crate) fn with_active_graph<R>(f: impl FnOnce(&mut Graph) -> R) -> R {
    ACTIVE_GRAPH.with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "No active graph. Build operator expressions inside Graph::scope()."
        );
        // SAFETY: GraphGuard guarantees validity for the duration of the
        // scope, and the scope holds the only `&mut Graph`. Single-threaded
        // via thread-local.
        let graph = unsafe { &mut *ptr };
        f(graph)
    })
}

/// RAII guard that makes a graph the thread-local active graph and restores
/// the previous one on drop.
pub(crate) struct GraphGuard {
    prev: *mut Graph,
}

impl GraphGuard {
    /// Activate `graph` on the current thread.
    pub(crate) fn new(graph: &mut Graph) -> Self {
        let prev = ACTIVE_GRAPH.with(|cell| {
            let prev = cell.get();
            cell.set(graph as *mut Graph);
            prev
        });
        GraphGuard { prev }
    }
}

impl Drop for GraphGuard {
    fn drop(&mut self) {
        ACTIVE_GRAPH.with(|cell| {
            cell.set(self.prev);
        });
    }
}
