//! Source-of-truth integration.
//!
//! The cache never performs I/O itself. This module holds everything that talks
//! to the external twin provider:
//! - [`TwinSource`]: async interface to the provider
//! - [`CacheLoader`]: bulk initial load and change-notification application
//! - [`LazyRelationshipReader`]: on-demand relationship hydration driven by the
//!   load markers

use crate::cache::GraphCache;
use crate::model::{Relationship, Twin};
use crate::model_index::BatchReport;
use crate::twin_index::IndexError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while reading from a source or applying its records.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The provider could not be reached or refused the request
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// A record could not be applied to the cache
    #[error("cache consistency error: {0}")]
    Index(#[from] IndexError),

    /// A source error annotated with the load step that raised it
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SourceError>,
    },
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Async interface to the external twin and ontology provider.
#[async_trait]
pub trait TwinSource: Send + Sync {
    /// All model definitions as provider JSON documents.
    async fn fetch_models(&self) -> Result<Vec<serde_json::Value>, SourceError>;

    /// All twin instances.
    async fn fetch_twins(&self) -> Result<Vec<Twin>, SourceError>;

    /// Every relationship whose source is `twin_id`.
    async fn fetch_outgoing_relationships(
        &self,
        twin_id: &str,
    ) -> Result<Vec<Relationship>, SourceError>;

    /// Every relationship whose target is `twin_id`.
    async fn fetch_incoming_relationships(
        &self,
        twin_id: &str,
    ) -> Result<Vec<Relationship>, SourceError>;

    /// All relationships in the graph.
    async fn fetch_all_relationships(&self) -> Result<Vec<Relationship>, SourceError>;
}

// ============================================================================
// Loading
// ============================================================================

/// Options for the initial load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Fetch every relationship up front and mark all twins hydrated
    pub eager_relationships: bool,
}

/// Summary of an initial load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub models: BatchReport,
    pub twins: usize,
    pub relationships: usize,
}

/// A single change notification from the provider.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// Model documents were uploaded or replaced
    ModelsUpserted(Vec<serde_json::Value>),
    ModelRemoved(String),
    TwinUpserted(Twin),
    TwinRemoved(String),
    RelationshipUpserted(Relationship),
    RelationshipRemoved(String),
}

/// Result of applying one change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A model batch was applied
    Models(BatchReport),
    /// A single-entity change; `false` when a removal found nothing to remove
    Applied(bool),
}

/// Populates a cache from a source and keeps it current.
pub struct CacheLoader {
    cache: Arc<GraphCache>,
    source: Arc<dyn TwinSource>,
    options: LoadOptions,
}

impl CacheLoader {
    pub fn new(cache: Arc<GraphCache>, source: Arc<dyn TwinSource>) -> Self {
        Self {
            cache,
            source,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &Arc<GraphCache> {
        &self.cache
    }

    /// Load models, twins and (optionally) relationships from the source.
    ///
    /// Every fetch completes before the corresponding records are applied.
    pub async fn load(&self) -> Result<LoadReport, SourceError> {
        let documents = self
            .source
            .fetch_models()
            .await
            .map_err(|e| e.with_context("Failed to fetch models"))?;
        let models = self.cache.models().upsert_model_documents(&documents);

        let twins = self
            .source
            .fetch_twins()
            .await
            .map_err(|e| e.with_context("Failed to fetch twins"))?;
        let twin_ids: Vec<String> = twins.iter().map(|t| t.id.clone()).collect();
        for twin in twins {
            self.cache.twins().upsert_twin(twin);
        }

        let mut relationships = 0;
        if self.options.eager_relationships {
            let all = self
                .source
                .fetch_all_relationships()
                .await
                .map_err(|e| e.with_context("Failed to fetch relationships"))?;
            relationships = all.len();
            for relationship in all {
                self.cache.twins().upsert_relationship(relationship);
            }
            for id in &twin_ids {
                self.cache.twins().mark_outgoing_loaded(id);
                self.cache.twins().mark_incoming_loaded(id);
            }
        }

        let report = LoadReport {
            models,
            twins: twin_ids.len(),
            relationships,
        };
        info!(
            "Cache loaded: {} models ({} failed), {} twins, {} relationships",
            report.models.model_count,
            report.models.failures.len(),
            report.twins,
            report.relationships
        );
        Ok(report)
    }

    /// Apply one change notification to the cache.
    pub fn apply(&self, event: ChangeEvent) -> Result<ChangeOutcome, SourceError> {
        debug!("Applying {} change", event_kind(&event));
        let outcome = match event {
            ChangeEvent::ModelsUpserted(documents) => {
                ChangeOutcome::Models(self.cache.models().upsert_model_documents(&documents))
            }
            ChangeEvent::ModelRemoved(id) => {
                ChangeOutcome::Applied(self.cache.models().remove_model(&id))
            }
            ChangeEvent::TwinUpserted(twin) => {
                ChangeOutcome::Applied(self.cache.twins().upsert_twin(twin))
            }
            ChangeEvent::TwinRemoved(id) => {
                ChangeOutcome::Applied(self.cache.twins().remove_twin(&id)?)
            }
            ChangeEvent::RelationshipUpserted(relationship) => {
                ChangeOutcome::Applied(self.cache.twins().upsert_relationship(relationship))
            }
            ChangeEvent::RelationshipRemoved(id) => {
                ChangeOutcome::Applied(self.cache.twins().remove_relationship(&id)?)
            }
        };
        Ok(outcome)
    }
}

fn event_kind(event: &ChangeEvent) -> &'static str {
    match event {
        ChangeEvent::ModelsUpserted(_) => "models-upserted",
        ChangeEvent::ModelRemoved(_) => "model-removed",
        ChangeEvent::TwinUpserted(_) => "twin-upserted",
        ChangeEvent::TwinRemoved(_) => "twin-removed",
        ChangeEvent::RelationshipUpserted(_) => "relationship-upserted",
        ChangeEvent::RelationshipRemoved(_) => "relationship-removed",
    }
}

// ============================================================================
// Lazy relationship hydration
// ============================================================================

/// Serves a twin's relationships, fetching them from the source the first time.
pub struct LazyRelationshipReader {
    cache: Arc<GraphCache>,
    source: Arc<dyn TwinSource>,
}

impl LazyRelationshipReader {
    pub fn new(cache: Arc<GraphCache>, source: Arc<dyn TwinSource>) -> Self {
        Self { cache, source }
    }

    /// Outgoing relationships of a twin. Unknown twins yield an empty list
    /// without contacting the source.
    pub async fn outgoing(&self, twin_id: &str) -> Result<Vec<Relationship>, SourceError> {
        let twins = self.cache.twins();
        if twins.get_twin(twin_id).is_none() {
            return Ok(Vec::new());
        }

        if !twins.is_outgoing_loaded(twin_id) {
            let fetched = self.source.fetch_outgoing_relationships(twin_id).await?;
            debug!(
                "Hydrated {} outgoing relationships for {}",
                fetched.len(),
                twin_id
            );
            for relationship in fetched {
                twins.upsert_relationship(relationship);
            }
            twins.mark_outgoing_loaded(twin_id);
        }

        Ok(twins.get_outgoing_relationships(twin_id))
    }

    /// Incoming relationships of a twin. Unknown twins yield an empty list
    /// without contacting the source.
    pub async fn incoming(&self, twin_id: &str) -> Result<Vec<Relationship>, SourceError> {
        let twins = self.cache.twins();
        if twins.get_twin(twin_id).is_none() {
            return Ok(Vec::new());
        }

        if !twins.is_incoming_loaded(twin_id) {
            let fetched = self.source.fetch_incoming_relationships(twin_id).await?;
            debug!(
                "Hydrated {} incoming relationships for {}",
                fetched.len(),
                twin_id
            );
            for relationship in fetched {
                twins.upsert_relationship(relationship);
            }
            twins.mark_incoming_loaded(twin_id);
        }

        Ok(twins.get_incoming_relationships(twin_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source that counts relationship fetches.
    #[derive(Default)]
    struct CountingSource {
        twins: Vec<Twin>,
        relationships: Vec<Relationship>,
        relationship_fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn fetches(&self) -> usize {
            self.relationship_fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TwinSource for CountingSource {
        async fn fetch_models(&self) -> Result<Vec<serde_json::Value>, SourceError> {
            Ok(vec![
                json!({ "@id": "space", "@type": "Interface" }),
                json!({ "@id": "room", "@type": "Interface", "extends": "space" }),
            ])
        }

        async fn fetch_twins(&self) -> Result<Vec<Twin>, SourceError> {
            Ok(self.twins.clone())
        }

        async fn fetch_outgoing_relationships(
            &self,
            twin_id: &str,
        ) -> Result<Vec<Relationship>, SourceError> {
            self.relationship_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::unavailable("offline"));
            }
            Ok(self
                .relationships
                .iter()
                .filter(|r| r.source_id == twin_id)
                .cloned()
                .collect())
        }

        async fn fetch_incoming_relationships(
            &self,
            twin_id: &str,
        ) -> Result<Vec<Relationship>, SourceError> {
            self.relationship_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .relationships
                .iter()
                .filter(|r| r.target_id == twin_id)
                .cloned()
                .collect())
        }

        async fn fetch_all_relationships(&self) -> Result<Vec<Relationship>, SourceError> {
            self.relationship_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::unavailable("offline"));
            }
            Ok(self.relationships.clone())
        }
    }

    fn source() -> CountingSource {
        CountingSource {
            twins: vec![Twin::new("r1", "room"), Twin::new("r2", "room")],
            relationships: vec![
                Relationship::new("e1", "r1", "r2", "adjacentTo"),
                Relationship::new("e2", "r2", "r1", "adjacentTo"),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_without_relationships() {
        let cache = Arc::new(GraphCache::new());
        let loader = CacheLoader::new(Arc::clone(&cache), Arc::new(source()));

        let report = loader.load().await.unwrap();
        assert!(report.models.is_clean());
        assert_eq!(report.twins, 2);
        assert_eq!(report.relationships, 0);
        assert!(cache.is_ready());
        assert_eq!(cache.twins().relationship_count(), 0);
        assert!(!cache.twins().is_outgoing_loaded("r1"));
    }

    #[tokio::test]
    async fn test_eager_load_marks_twins_hydrated() {
        let cache = Arc::new(GraphCache::new());
        let loader = CacheLoader::new(Arc::clone(&cache), Arc::new(source())).with_options(
            LoadOptions {
                eager_relationships: true,
            },
        );

        let report = loader.load().await.unwrap();
        assert_eq!(report.relationships, 2);
        assert!(cache.twins().is_outgoing_loaded("r1"));
        assert!(cache.twins().is_incoming_loaded("r2"));
        assert_eq!(cache.twin_ids_for_model_family("space").len(), 2);
    }

    #[tokio::test]
    async fn test_eager_load_failure_names_the_step() {
        let cache = Arc::new(GraphCache::new());
        let source = Arc::new(CountingSource {
            fail: true,
            ..source()
        });
        let loader = CacheLoader::new(Arc::clone(&cache), source).with_options(LoadOptions {
            eager_relationships: true,
        });

        let err = loader.load().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to fetch relationships: source unavailable: offline"
        );
        match err {
            SourceError::WithContext { source, .. } => {
                assert!(matches!(*source, SourceError::Unavailable(_)))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!cache.twins().is_outgoing_loaded("r1"));
    }

    #[tokio::test]
    async fn test_lazy_reader_fetches_once() {
        let cache = Arc::new(GraphCache::new());
        let source = Arc::new(source());
        CacheLoader::new(Arc::clone(&cache), source.clone())
            .load()
            .await
            .unwrap();

        let reader = LazyRelationshipReader::new(Arc::clone(&cache), source.clone());
        let first = reader.outgoing("r1").await.unwrap();
        let second = reader.outgoing("r1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "e1");
        assert_eq!(source.fetches(), 1);

        let incoming = reader.incoming("r1").await.unwrap();
        assert_eq!(incoming[0].id, "e2");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_lazy_reader_skips_unknown_twin() {
        let cache = Arc::new(GraphCache::new());
        let source = Arc::new(source());
        let reader = LazyRelationshipReader::new(cache, source.clone());

        assert!(reader.outgoing("ghost").await.unwrap().is_empty());
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_lazy_reader_failure_leaves_twin_unmarked() {
        let cache = Arc::new(GraphCache::new());
        cache.twins().upsert_twin(Twin::new("r1", "room"));
        let source = Arc::new(CountingSource {
            fail: true,
            ..source()
        });
        let reader = LazyRelationshipReader::new(Arc::clone(&cache), source);

        assert!(matches!(
            reader.outgoing("r1").await,
            Err(SourceError::Unavailable(_))
        ));
        assert!(!cache.twins().is_outgoing_loaded("r1"));
    }

    #[test]
    fn test_apply_change_events() {
        let cache = Arc::new(GraphCache::new());
        let loader = CacheLoader::new(Arc::clone(&cache), Arc::new(source()));

        let outcome = loader
            .apply(ChangeEvent::ModelsUpserted(vec![
                json!({ "@id": "m", "@type": "Interface" }),
            ]))
            .unwrap();
        assert!(matches!(outcome, ChangeOutcome::Models(ref r) if r.upserted == 1));

        loader
            .apply(ChangeEvent::TwinUpserted(Twin::new("t1", "m")))
            .unwrap();
        loader
            .apply(ChangeEvent::RelationshipUpserted(Relationship::new(
                "x", "t1", "t1", "self",
            )))
            .unwrap();
        assert_eq!(cache.twins().get_outgoing_relationship_ids("t1"), vec!["x".to_string()]);

        assert_eq!(
            loader
                .apply(ChangeEvent::RelationshipRemoved("x".to_string()))
                .unwrap(),
            ChangeOutcome::Applied(true)
        );
        assert_eq!(
            loader.apply(ChangeEvent::TwinRemoved("t1".to_string())).unwrap(),
            ChangeOutcome::Applied(true)
        );
        assert_eq!(
            loader.apply(ChangeEvent::ModelRemoved("m".to_string())).unwrap(),
            ChangeOutcome::Applied(true)
        );
        assert_eq!(cache.stats().models, 0);
    }
}
