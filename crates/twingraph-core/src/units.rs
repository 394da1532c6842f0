//! Unit Annotation Extraction
//!
//! A model may declare a property that carries the unit of another property:
//!
//! ```text
//! { "@type": ["Property", "ValueAnnotation"], "name": "areaUnit", "annotates": "area" }
//! ```
//!
//! The annotated property may be declared on the model itself or on any model it
//! (transitively) extends, so extraction needs the whole model set, not just the
//! model being ingested.

use crate::model::{ModelContent, ModelDefinition, UnitAnnotation};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors deriving unit annotations for a single model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("'{unit_property}' on model '{model_id}' is a value annotation but names no annotated property")]
    MissingAnnotationTarget {
        model_id: String,
        unit_property: String,
    },

    #[error("'{unit_property}' on model '{model_id}' annotates '{annotated_property}', which is not declared on the model or its ancestors")]
    UnresolvedAnnotationTarget {
        model_id: String,
        unit_property: String,
        annotated_property: String,
    },

    #[error("'{unit_property}' on model '{model_id}' annotates '{annotated_property}' but no unit is declared")]
    MissingUnit {
        model_id: String,
        unit_property: String,
        annotated_property: String,
    },
}

/// Derive the unit annotations declared by `model`.
///
/// `models` is the full model set used to resolve inherited declarations.
pub fn extract_unit_annotations(
    model: &ModelDefinition,
    models: &HashMap<String, ModelDefinition>,
) -> Result<Vec<UnitAnnotation>, DerivationError> {
    let mut annotations = Vec::new();

    for content in &model.contents {
        let annotated = match (&content.annotates, content.value_annotation) {
            (Some(target), _) => target,
            (None, true) => {
                return Err(DerivationError::MissingAnnotationTarget {
                    model_id: model.id.clone(),
                    unit_property: content.name.clone(),
                })
            }
            (None, false) => continue,
        };

        let target = find_declaration(model, annotated, models).ok_or_else(|| {
            DerivationError::UnresolvedAnnotationTarget {
                model_id: model.id.clone(),
                unit_property: content.name.clone(),
                annotated_property: annotated.clone(),
            }
        })?;

        let unit = content
            .unit
            .as_ref()
            .or(target.unit.as_ref())
            .ok_or_else(|| DerivationError::MissingUnit {
                model_id: model.id.clone(),
                unit_property: content.name.clone(),
                annotated_property: annotated.clone(),
            })?;

        annotations.push(UnitAnnotation {
            model_id: model.id.clone(),
            unit_property: content.name.clone(),
            annotated_property: annotated.clone(),
            unit: unit.clone(),
        });
    }

    Ok(annotations)
}

/// Look up a declaration on `model`, then breadth-first through its ancestors.
fn find_declaration<'a>(
    model: &'a ModelDefinition,
    name: &str,
    models: &'a HashMap<String, ModelDefinition>,
) -> Option<&'a ModelContent> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&ModelDefinition> = VecDeque::new();
    visited.insert(model.id.as_str());
    queue.push_back(model);

    while let Some(current) = queue.pop_front() {
        if let Some(found) = current.content(name) {
            return Some(found);
        }
        for parent_id in &current.extends {
            // Dangling parents are tolerated
            if let Some(parent) = models.get(parent_id) {
                if visited.insert(parent.id.as_str()) {
                    queue.push_back(parent);
                }
            }
        }
    }

    None
}
