//! Relationship Load Tracking
//!
//! Records which twins have had their full outgoing or incoming relationship
//! sets fetched from the source. Lazy readers consult these markers to decide
//! whether the relationship lists in the index are complete.

use dashmap::DashSet;

/// Per-twin "relationships fully hydrated" markers.
#[derive(Debug, Default)]
pub struct RelationshipLoadTracker {
    outgoing_loaded: DashSet<String>,
    incoming_loaded: DashSet<String>,
}

impl RelationshipLoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_outgoing_loaded(&self, twin_id: &str) {
        self.outgoing_loaded.insert(twin_id.to_string());
    }

    pub fn mark_incoming_loaded(&self, twin_id: &str) {
        self.incoming_loaded.insert(twin_id.to_string());
    }

    pub fn is_outgoing_loaded(&self, twin_id: &str) -> bool {
        self.outgoing_loaded.contains(twin_id)
    }

    pub fn is_incoming_loaded(&self, twin_id: &str) -> bool {
        self.incoming_loaded.contains(twin_id)
    }

    /// Drop both markers for a twin.
    pub fn clear(&self, twin_id: &str) {
        self.outgoing_loaded.remove(twin_id);
        self.incoming_loaded.remove(twin_id);
    }

    /// Number of twins marked (outgoing, incoming).
    pub fn loaded_counts(&self) -> (usize, usize) {
        (self.outgoing_loaded.len(), self.incoming_loaded.len())
    }
}
