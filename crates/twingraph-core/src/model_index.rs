//! Model Index
//!
//! Stores ontology model definitions and the data derived from them:
//! - descendant sets (every model reachable by walking `extends` in reverse)
//! - unit annotations extracted from model contents
//!
//! Derived data is rebuilt in full whenever the model set changes. The rebuild
//! happens off to the side and the result is swapped in under a write lock, so a
//! reader sees either the previous or the new derived state, never a mix.
//!
//! # Concurrency
//!
//! ```text
//! ModelIndex
//! ├── models: DashMap<id, ModelDefinition>      # per-key atomic, lock-free reads
//! ├── derived: RwLock<Arc<DerivedModelData>>   # swapped after every rebuild
//! ├── write_lock: Mutex<()>                     # serializes model-set mutations
//! └── loaded: AtomicBool                        # readiness flag
//! ```

use crate::model::{document_id, ModelDefinition, UnitAnnotation};
use crate::units::extract_unit_annotations;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

// ============================================================================
// Batch Reports
// ============================================================================

/// Processing step at which a model was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The provider document could not be parsed into a model
    Parse,
    /// Unit annotations could not be derived from the model contents
    UnitAnnotations,
}

/// A single model that failed a processing step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Model id, when it could be determined
    pub model_id: Option<String>,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of a model batch.
///
/// A batch never aborts on a per-model failure; failures are collected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of distinct model ids inserted or replaced by this batch
    pub upserted: usize,
    /// Number of models in the index after the batch
    pub model_count: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    /// True when no model failed any step.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures recorded for a given stage.
    pub fn failures_at(&self, stage: FailureStage) -> impl Iterator<Item = &ItemFailure> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }
}

// ============================================================================
// Model Index
// ============================================================================

/// Data derived from the full model set.
#[derive(Debug, Default)]
struct DerivedModelData {
    descendants: HashMap<String, HashSet<String>>,
    unit_annotations: HashMap<String, Vec<UnitAnnotation>>,
}

/// Thread-safe index of model definitions and their derived data.
#[derive(Debug)]
pub struct ModelIndex {
    models: DashMap<String, ModelDefinition>,
    derived: RwLock<Arc<DerivedModelData>>,
    write_lock: Mutex<()>,
    loaded: AtomicBool,
    warn_on_dangling_extends: bool,
}

impl Default for ModelIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelIndex {
    /// Create an empty, not-yet-loaded index.
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            derived: RwLock::new(Arc::new(DerivedModelData::default())),
            write_lock: Mutex::new(()),
            loaded: AtomicBool::new(false),
            warn_on_dangling_extends: false,
        }
    }

    /// Log dangling `extends` references at warn level instead of debug.
    pub fn with_dangling_extends_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_dangling_extends = enabled;
        self
    }

    /// Insert or replace a batch of models, then rebuild all derived data.
    pub fn upsert_models(&self, models: impl IntoIterator<Item = ModelDefinition>) -> BatchReport {
        let _guard = self.write_lock.lock();

        // Repeated ids in one batch count once; the last record wins
        let mut touched: HashSet<String> = HashSet::new();
        for model in models {
            debug!("Upserting model {}", model.id);
            touched.insert(model.id.clone());
            self.models.insert(model.id.clone(), model);
        }
        let upserted = touched.len();

        let failures = self.rebuild_derived();
        self.loaded.store(true, Ordering::Release);

        let report = BatchReport {
            upserted,
            model_count: self.models.len(),
            failures,
        };
        info!(
            "Model batch applied: {} upserted, {} total, {} failures",
            report.upserted,
            report.model_count,
            report.failures.len()
        );
        report
    }

    /// Parse provider documents and upsert every model that parses.
    ///
    /// Parse failures are reported alongside derivation failures.
    pub fn upsert_model_documents(&self, documents: &[serde_json::Value]) -> BatchReport {
        let mut parsed = Vec::with_capacity(documents.len());
        let mut parse_failures = Vec::new();

        for doc in documents {
            match ModelDefinition::from_document(doc) {
                Ok(model) => parsed.push(model),
                Err(e) => {
                    let model_id = document_id(doc);
                    warn!(
                        "Skipping model {}: {}",
                        model_id.as_deref().unwrap_or("<unknown>"),
                        e
                    );
                    parse_failures.push(ItemFailure {
                        model_id,
                        stage: FailureStage::Parse,
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut report = self.upsert_models(parsed);
        parse_failures.append(&mut report.failures);
        report.failures = parse_failures;
        report
    }

    /// Remove a model along with its derived data. Twins are not touched.
    pub fn remove_model(&self, id: &str) -> bool {
        let _guard = self.write_lock.lock();

        if self.models.remove(id).is_none() {
            return false;
        }
        debug!("Removed model {}", id);
        self.rebuild_derived();
        true
    }

    /// Readiness flag: true once a model batch has completed.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn get_model(&self, id: &str) -> Option<ModelDefinition> {
        self.models.get(id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Models descending from `id`, including itself. Empty for unknown ids.
    pub fn get_descendants(&self, id: &str) -> Vec<ModelDefinition> {
        self.descendant_ids(id)
            .iter()
            .filter_map(|d| self.get_model(d))
            .collect()
    }

    /// Ids of the models descending from `id`, including itself.
    pub fn descendant_ids(&self, id: &str) -> HashSet<String> {
        self.derived
            .read()
            .descendants
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `model_id` is `ancestor_id` or transitively extends it.
    pub fn is_descendant_of(&self, model_id: &str, ancestor_id: &str) -> bool {
        self.derived
            .read()
            .descendants
            .get(ancestor_id)
            .is_some_and(|set| set.contains(model_id))
    }

    /// Unit annotations declared directly on a model.
    pub fn unit_annotations(&self, model_id: &str) -> Vec<UnitAnnotation> {
        self.derived
            .read()
            .unit_annotations
            .get(model_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Unit of `property` for twins of `model_id`, honouring inherited annotations.
    ///
    /// The model's own annotation wins, then the nearest ancestor's in
    /// breadth-first `extends` order.
    pub fn unit_for(&self, model_id: &str, property: &str) -> Option<String> {
        let derived = self.derived.read().clone();
        let mut visited: HashSet<String> = HashSet::from([model_id.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([model_id.to_string()]);

        while let Some(current) = queue.pop_front() {
            let found = derived
                .unit_annotations
                .get(&current)
                .and_then(|annotations| {
                    annotations
                        .iter()
                        .find(|a| a.annotated_property == property)
                });
            if let Some(annotation) = found {
                return Some(annotation.unit.clone());
            }

            let parents = self
                .models
                .get(&current)
                .map(|m| m.extends.clone())
                .unwrap_or_default();
            for parent in parents {
                if visited.insert(parent.clone()) {
                    queue.push_back(parent);
                }
            }
        }

        None
    }

    /// Recompute descendants and unit annotations for every model.
    ///
    /// Must be called with `write_lock` held.
    fn rebuild_derived(&self) -> Vec<ItemFailure> {
        let snapshot: HashMap<String, ModelDefinition> = self
            .models
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        self.report_dangling_extends(&snapshot);

        let mut failures = Vec::new();
        let mut unit_annotations = HashMap::with_capacity(snapshot.len());
        for model in snapshot.values() {
            match extract_unit_annotations(model, &snapshot) {
                Ok(annotations) if annotations.is_empty() => {}
                Ok(annotations) => {
                    unit_annotations.insert(model.id.clone(), annotations);
                }
                Err(e) => {
                    warn!("Unit annotations skipped for model {}: {}", model.id, e);
                    failures.push(ItemFailure {
                        model_id: Some(model.id.clone()),
                        stage: FailureStage::UnitAnnotations,
                        message: e.to_string(),
                    });
                }
            }
        }

        let descendants = compute_all_descendants(&snapshot);

        *self.derived.write() = Arc::new(DerivedModelData {
            descendants,
            unit_annotations,
        });

        failures
    }

    fn report_dangling_extends(&self, snapshot: &HashMap<String, ModelDefinition>) {
        for model in snapshot.values() {
            for parent in model.extends.iter().filter(|p| !snapshot.contains_key(*p)) {
                if self.warn_on_dangling_extends {
                    warn!("Model {} extends unknown model {}", model.id, parent);
                } else {
                    debug!("Model {} extends unknown model {}", model.id, parent);
                }
            }
        }
    }
}

// ============================================================================
// Descendant Computation
// ============================================================================

/// Compute the descendant set of every model in parallel.
fn compute_all_descendants(
    models: &HashMap<String, ModelDefinition>,
) -> HashMap<String, HashSet<String>> {
    // Reverse `extends` edges: parent -> children
    let mut extended_by: HashMap<&str, Vec<&str>> = HashMap::new();
    for model in models.values() {
        for parent in &model.extends {
            extended_by
                .entry(parent.as_str())
                .or_default()
                .push(model.id.as_str());
        }
    }

    let cap = models.len();
    models
        .par_iter()
        .map(|(id, _)| (id.clone(), descendants_of(id, &extended_by, cap)))
        .collect()
}

/// Breadth-first walk of the "is extended by" relation from `root`.
///
/// Stops once the worklist is empty or the iteration count exceeds `cap`.
fn descendants_of(root: &str, extended_by: &HashMap<&str, Vec<&str>>, cap: usize) -> HashSet<String> {
    let mut result: HashSet<String> = HashSet::new();
    let mut worklist: HashSet<&str> = HashSet::from([root]);
    let mut iterations = 0;

    while !worklist.is_empty() {
        if iterations > cap {
            warn!(
                "Descendant walk from {} stopped after {} iterations; extends graph may be cyclic",
                root, iterations
            );
            break;
        }
        iterations += 1;

        for id in &worklist {
            result.insert((*id).to_string());
        }

        worklist = worklist
            .iter()
            .filter_map(|id| extended_by.get(id))
            .flatten()
            .copied()
            .filter(|child| !result.contains(*child))
            .collect();
    }

    result
}
