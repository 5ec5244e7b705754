use crate::cluster::types::Address;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct SelectorState {
    nodes: Vec<Address>,
    cursor: usize,
}

/// Round-robin cursor over the load balancer's current routing nodes.
///
/// Invariant: `cursor < nodes.len()` whenever the list is non-empty; replacing the
/// list resets the cursor to 0.
#[derive(Debug, Default)]
pub struct NodeSelector {
    state: Mutex<SelectorState>,
}

impl NodeSelector {
    pub fn new(nodes: Vec<Address>) -> Self {
        Self {
            state: Mutex::new(SelectorState { nodes, cursor: 0 }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SelectorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the node under the cursor and advances it, whatever happens next.
    pub fn select(&self) -> Option<Address> {
        let mut state = self.lock();
        if state.nodes.is_empty() {
            return None;
        }
        let node = state.nodes[state.cursor].clone();
        state.cursor = (state.cursor + 1) % state.nodes.len();
        Some(node)
    }

    pub fn replace(&self, nodes: Vec<Address>) {
        let mut state = self.lock();
        tracing::info!(
            "Node list replaced: {} -> {} node(s)",
            state.nodes.len(),
            nodes.len()
        );
        state.nodes = nodes;
        state.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().nodes.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    pub fn nodes(&self) -> Vec<Address> {
        self.lock().nodes.clone()
    }
}
