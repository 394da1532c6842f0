//! Graph Cache
//!
//! Single handle over the model and twin indices. Built once at startup and
//! shared with request handlers through an `Arc`.

use crate::model_index::ModelIndex;
use crate::twin_index::TwinIndex;
use serde::Serialize;
use std::collections::HashSet;

/// Options applied when the cache is constructed.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Log dangling `extends` references at warn level
    pub warn_on_dangling_extends: bool,
}

/// Point-in-time counters for the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub models: usize,
    pub twins: usize,
    pub relationships: usize,
    pub model_buckets: usize,
    pub outgoing_loaded: usize,
    pub incoming_loaded: usize,
    pub ready: bool,
}

/// In-process digital-twin graph cache.
#[derive(Debug, Default)]
pub struct GraphCache {
    models: ModelIndex,
    twins: TwinIndex,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CacheOptions) -> Self {
        Self {
            models: ModelIndex::new()
                .with_dangling_extends_warnings(options.warn_on_dangling_extends),
            twins: TwinIndex::new(),
        }
    }

    pub fn models(&self) -> &ModelIndex {
        &self.models
    }

    pub fn twins(&self) -> &TwinIndex {
        &self.twins
    }

    /// Whether the ontology has been loaded.
    pub fn is_ready(&self) -> bool {
        self.models.is_loaded()
    }

    /// Twins whose model is `model_id` or any of its descendants.
    pub fn twin_ids_for_model_family(&self, model_id: &str) -> HashSet<String> {
        self.models
            .descendant_ids(model_id)
            .iter()
            .flat_map(|id| self.twins.get_twin_ids_for_model(id))
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        let (outgoing_loaded, incoming_loaded) = self.twins.load_tracker().loaded_counts();
        CacheStats {
            models: self.models.len(),
            twins: self.twins.twin_count(),
            relationships: self.twins.relationship_count(),
            model_buckets: self.twins.model_bucket_count(),
            outgoing_loaded,
            incoming_loaded,
            ready: self.is_ready(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelDefinition, Relationship, Twin};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_twin_ids_for_model_family() {
        let cache = GraphCache::new();
        cache.models().upsert_models(vec![
            ModelDefinition::new("space"),
            ModelDefinition::new("room").extending(["space"]),
            ModelDefinition::new("floor").extending(["space"]),
            ModelDefinition::new("asset"),
        ]);
        cache.twins().upsert_twin(Twin::new("r1", "room"));
        cache.twins().upsert_twin(Twin::new("f1", "floor"));
        cache.twins().upsert_twin(Twin::new("a1", "asset"));

        let family = cache.twin_ids_for_model_family("space");
        assert_eq!(family.len(), 2);
        assert!(family.contains("r1") && family.contains("f1"));
        assert!(cache.twin_ids_for_model_family("unknown").is_empty());
    }

    #[test]
    fn test_stats() {
        let cache = GraphCache::with_options(CacheOptions {
            warn_on_dangling_extends: true,
        });
        assert!(!cache.is_ready());

        cache.models().upsert_models(vec![ModelDefinition::new("m")]);
        cache.twins().upsert_twin(Twin::new("t1", "m"));
        cache.twins().upsert_twin(Twin::new("t2", "m"));
        cache
            .twins()
            .upsert_relationship(Relationship::new("r1", "t1", "t2", "next"));
        cache.twins().mark_outgoing_loaded("t1");

        assert_eq!(
            cache.stats(),
            CacheStats {
                models: 1,
                twins: 2,
                relationships: 1,
                model_buckets: 1,
                outgoing_loaded: 1,
                incoming_loaded: 0,
                ready: true,
            }
        );
    }
}
