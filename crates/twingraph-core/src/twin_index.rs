//! Twin Index
//!
//! Stores twin and relationship instances together with their secondary indices:
//! - twins by model id
//! - outgoing relationship ids per source twin
//! - incoming relationship ids per target twin
//!
//! Reads go straight to the concurrent maps. Mutations are serialized per entity
//! class (one section for twins, one for relationships) so that multi-map updates
//! appear atomic to other mutations of the same class. Nothing inside a section
//! performs I/O.

use crate::load_tracker::RelationshipLoadTracker;
use crate::model::{Relationship, Twin};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error};

/// Secondary index named in a consistency error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryIndex {
    TwinsByModel,
    Outgoing,
    Incoming,
}

impl fmt::Display for SecondaryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TwinsByModel => "twins-by-model",
            Self::Outgoing => "outgoing relationships",
            Self::Incoming => "incoming relationships",
        };
        f.write_str(name)
    }
}

/// Errors raised by twin index mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// An entry the index invariants require is absent; the index was corrupted
    /// by an earlier operation.
    #[error("{index} index has no entry '{entry}' under '{key}'")]
    MissingIndexEntry {
        index: SecondaryIndex,
        key: String,
        entry: String,
    },
}

/// Thread-safe store of twins, relationships and their secondary indices.
#[derive(Debug, Default)]
pub struct TwinIndex {
    twins: DashMap<String, Twin>,
    twins_by_model: DashMap<String, HashSet<String>>,
    relationships: DashMap<String, Relationship>,
    outgoing: DashMap<String, Vec<String>>,
    incoming: DashMap<String, Vec<String>>,
    loads: RelationshipLoadTracker,
    twin_section: Mutex<()>,
    relationship_section: Mutex<()>,
}

impl TwinIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Twins
    // ========================================================================

    /// Insert or replace a twin and file it under its model.
    ///
    /// A twin whose model changed is moved out of its previous model bucket.
    pub fn upsert_twin(&self, twin: Twin) -> bool {
        let _section = self.twin_section.lock();

        let previous_model = self.twins.get(&twin.id).map(|t| t.model_id.clone());
        if let Some(previous) = previous_model.filter(|m| *m != twin.model_id) {
            debug!(
                "Twin {} moved from model {} to {}",
                twin.id, previous, twin.model_id
            );
            self.prune_bucket(&previous, &twin.id);
        }

        self.twins_by_model
            .entry(twin.model_id.clone())
            .or_default()
            .insert(twin.id.clone());
        debug!("Upserted twin {}", twin.id);
        self.twins.insert(twin.id.clone(), twin);
        true
    }

    /// Remove a twin, its model bucket entry and its load markers.
    ///
    /// Relationships touching the twin are left in place.
    pub fn remove_twin(&self, id: &str) -> Result<bool, IndexError> {
        let _section = self.twin_section.lock();

        let Some(model_id) = self.twins.get(id).map(|t| t.model_id.clone()) else {
            return Ok(false);
        };

        let bucketed = self
            .twins_by_model
            .get(&model_id)
            .is_some_and(|bucket| bucket.contains(id));
        if !bucketed {
            let err = IndexError::MissingIndexEntry {
                index: SecondaryIndex::TwinsByModel,
                key: model_id,
                entry: id.to_string(),
            };
            error!("Removing twin {} failed: {}", id, err);
            return Err(err);
        }

        self.twins.remove(id);
        self.prune_bucket(&model_id, id);
        self.loads.clear(id);
        debug!("Removed twin {}", id);
        Ok(true)
    }

    fn prune_bucket(&self, model_id: &str, twin_id: &str) {
        if let Some(mut bucket) = self.twins_by_model.get_mut(model_id) {
            bucket.remove(twin_id);
        }
        self.twins_by_model
            .remove_if(model_id, |_, bucket| bucket.is_empty());
    }

    pub fn get_twin(&self, id: &str) -> Option<Twin> {
        self.twins.get(id).map(|t| t.value().clone())
    }

    /// Ids of twins currently carrying `model_id`; empty when the bucket is absent.
    pub fn get_twin_ids_for_model(&self, model_id: &str) -> HashSet<String> {
        self.twins_by_model
            .get(model_id)
            .map(|bucket| bucket.value().clone())
            .unwrap_or_default()
    }

    pub fn has_model_bucket(&self, model_id: &str) -> bool {
        self.twins_by_model.contains_key(model_id)
    }

    pub fn twin_count(&self) -> usize {
        self.twins.len()
    }

    pub fn model_bucket_count(&self) -> usize {
        self.twins_by_model.len()
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    /// Insert or replace a relationship and list it under both endpoints.
    ///
    /// List membership is idempotent. A relationship whose endpoints changed is
    /// moved out of the lists of its previous endpoints.
    pub fn upsert_relationship(&self, relationship: Relationship) -> bool {
        let _section = self.relationship_section.lock();

        let previous = self
            .relationships
            .get(&relationship.id)
            .map(|r| (r.source_id.clone(), r.target_id.clone()));
        if let Some((source, target)) = previous {
            if source != relationship.source_id {
                remove_from_list(&self.outgoing, &source, &relationship.id);
            }
            if target != relationship.target_id {
                remove_from_list(&self.incoming, &target, &relationship.id);
            }
        }

        add_to_list(&self.outgoing, &relationship.source_id, &relationship.id);
        add_to_list(&self.incoming, &relationship.target_id, &relationship.id);
        debug!(
            "Upserted relationship {} ({} -> {})",
            relationship.id, relationship.source_id, relationship.target_id
        );
        self.relationships
            .insert(relationship.id.clone(), relationship);
        true
    }

    /// Remove a relationship from the store and from both endpoint lists.
    pub fn remove_relationship(&self, id: &str) -> Result<bool, IndexError> {
        let _section = self.relationship_section.lock();

        let Some((source, target)) = self
            .relationships
            .get(id)
            .map(|r| (r.source_id.clone(), r.target_id.clone()))
        else {
            return Ok(false);
        };

        let checks = [
            (SecondaryIndex::Outgoing, &self.outgoing, &source),
            (SecondaryIndex::Incoming, &self.incoming, &target),
        ];
        for (index, lists, key) in checks {
            let listed = lists
                .get(key.as_str())
                .is_some_and(|list| list.iter().any(|r| r == id));
            if !listed {
                let err = IndexError::MissingIndexEntry {
                    index,
                    key: key.clone(),
                    entry: id.to_string(),
                };
                error!("Removing relationship {} failed: {}", id, err);
                return Err(err);
            }
        }

        self.relationships.remove(id);
        remove_from_list(&self.outgoing, &source, id);
        remove_from_list(&self.incoming, &target, id);
        debug!("Removed relationship {}", id);
        Ok(true)
    }

    pub fn get_relationship(&self, id: &str) -> Option<Relationship> {
        self.relationships.get(id).map(|r| r.value().clone())
    }

    pub fn get_outgoing_relationship_ids(&self, twin_id: &str) -> Vec<String> {
        self.outgoing
            .get(twin_id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    pub fn get_incoming_relationship_ids(&self, twin_id: &str) -> Vec<String> {
        self.incoming
            .get(twin_id)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }

    /// Outgoing relationships of a twin, resolved to records.
    pub fn get_outgoing_relationships(&self, twin_id: &str) -> Vec<Relationship> {
        self.get_outgoing_relationship_ids(twin_id)
            .iter()
            .filter_map(|id| self.get_relationship(id))
            .collect()
    }

    /// Incoming relationships of a twin, resolved to records.
    pub fn get_incoming_relationships(&self, twin_id: &str) -> Vec<Relationship> {
        self.get_incoming_relationship_ids(twin_id)
            .iter()
            .filter_map(|id| self.get_relationship(id))
            .collect()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    // ========================================================================
    // Load markers
    // ========================================================================

    /// Relationship hydration markers; cleared for a twin when it is removed.
    pub fn load_tracker(&self) -> &RelationshipLoadTracker {
        &self.loads
    }

    pub fn mark_outgoing_loaded(&self, twin_id: &str) {
        self.loads.mark_outgoing_loaded(twin_id);
    }

    pub fn mark_incoming_loaded(&self, twin_id: &str) {
        self.loads.mark_incoming_loaded(twin_id);
    }

    pub fn is_outgoing_loaded(&self, twin_id: &str) -> bool {
        self.loads.is_outgoing_loaded(twin_id)
    }

    pub fn is_incoming_loaded(&self, twin_id: &str) -> bool {
        self.loads.is_incoming_loaded(twin_id)
    }
}

fn add_to_list(lists: &DashMap<String, Vec<String>>, key: &str, id: &str) {
    let mut list = lists.entry(key.to_string()).or_default();
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}

fn remove_from_list(lists: &DashMap<String, Vec<String>>, key: &str, id: &str) {
    if let Some(mut list) = lists.get_mut(key) {
        list.retain(|existing| existing != id);
    }
    lists.remove_if(key, |_, list| list.is_empty());
}
