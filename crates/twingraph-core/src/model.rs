//! Data Model for the Twin Graph
//!
//! Defines the records the cache stores:
//! - `ModelDefinition`: one ontology interface (DTDL-style) with its inheritance edges
//! - `Twin`: a digital-twin instance carrying a model id
//! - `Relationship`: a directed, named edge between two twins
//! - `UnitAnnotation`: a derived "property X carries the unit of property Y" fact
//!
//! Model definitions arrive from the provider as JSON documents, either as a bare
//! interface or wrapped with provider metadata:
//!
//! ```text
//! {
//!   "uploadedOn": "2024-01-02T03:04:05Z",
//!   "decommissioned": false,
//!   "model": { "@id": "dtmi:com:acme:Space;1", "@type": "Interface", ... }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Custom property bag carried by twins and relationships.
pub type Properties = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while parsing a model document.
#[derive(Debug, Error)]
pub enum ModelParseError {
    #[error("model document is not valid: {source}")]
    InvalidDocument {
        #[source]
        source: serde_json::Error,
    },

    #[error("model document has no '@id'")]
    MissingId,

    #[error("model '{id}' has type '{found}', expected 'Interface'")]
    NotAnInterface { id: String, found: String },

    #[error("content '{name}' of model '{model_id}' has no recognised '@type'")]
    UnknownContentKind { model_id: String, name: String },
}

// ============================================================================
// Model Definitions
// ============================================================================

/// Kind of a declaration inside a model's `contents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Property,
    Relationship,
    Telemetry,
    Component,
    Command,
}

impl ContentKind {
    /// Parse a DTDL `@type` entry; semantic types and adjuncts return `None`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Property" => Some(Self::Property),
            "Relationship" => Some(Self::Relationship),
            "Telemetry" => Some(Self::Telemetry),
            "Component" => Some(Self::Component),
            "Command" => Some(Self::Command),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "Property",
            Self::Relationship => "Relationship",
            Self::Telemetry => "Telemetry",
            Self::Component => "Component",
            Self::Command => "Command",
        }
    }
}

/// A named declaration in a model's contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContent {
    pub kind: ContentKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Target model of a relationship declaration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Unit literal (e.g. "degreeCelsius")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Name of the property whose value this declaration annotates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotates: Option<String>,
    /// Declared with the `ValueAnnotation` adjunct type
    #[serde(default)]
    pub value_annotation: bool,
}

impl ModelContent {
    /// Create a plain declaration with no unit metadata.
    pub fn new(kind: ContentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            schema: None,
            target: None,
            unit: None,
            annotates: None,
            value_annotation: false,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Mark this declaration as a value annotation of `property`.
    pub fn annotating(mut self, property: impl Into<String>) -> Self {
        self.annotates = Some(property.into());
        self.value_annotation = true;
        self
    }
}

/// One ontology interface definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decommissioned: bool,
    #[serde(default)]
    pub contents: Vec<ModelContent>,
}

impl ModelDefinition {
    /// Create a model with no contents.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extends: Vec::new(),
            display_name: None,
            uploaded_on: None,
            decommissioned: false,
            contents: Vec::new(),
        }
    }

    pub fn extending<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extends.extend(parents.into_iter().map(Into::into));
        self
    }

    pub fn with_content(mut self, content: ModelContent) -> Self {
        self.contents.push(content);
        self
    }

    /// Find a declaration by name on this model only (not its ancestors).
    pub fn content(&self, name: &str) -> Option<&ModelContent> {
        self.contents.iter().find(|c| c.name == name)
    }

    /// Parse a provider JSON document (bare interface or metadata wrapper).
    pub fn from_document(doc: &serde_json::Value) -> Result<Self, ModelParseError> {
        let wrapper: RawModelDocument = serde_json::from_value(doc.clone())
            .map_err(|source| ModelParseError::InvalidDocument { source })?;

        let (interface, uploaded_on, decommissioned) = match wrapper {
            RawModelDocument::Wrapped {
                model,
                uploaded_on,
                decommissioned,
            } => (model, uploaded_on, decommissioned),
            RawModelDocument::Bare(model) => (model, None, false),
        };

        interface.into_definition(uploaded_on, decommissioned)
    }
}

/// Best-effort `@id` lookup for error reporting on documents that fail to parse.
pub fn document_id(doc: &serde_json::Value) -> Option<String> {
    doc.get("@id")
        .or_else(|| doc.get("model").and_then(|m| m.get("@id")))
        .or_else(|| doc.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

// ============================================================================
// DTDL document shapes
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawModelDocument {
    Wrapped {
        model: RawInterface,
        #[serde(default, rename = "uploadedOn")]
        uploaded_on: Option<DateTime<Utc>>,
        #[serde(default)]
        decommissioned: bool,
    },
    Bare(RawInterface),
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    #[serde(rename = "@id")]
    id: Option<String>,
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<serde_json::Value>,
    #[serde(default)]
    extends: Option<OneOrMany<String>>,
    #[serde(default)]
    contents: Vec<RawContent>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(rename = "@type")]
    types: OneOrMany<String>,
    name: String,
    #[serde(default)]
    schema: Option<serde_json::Value>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    annotates: Option<String>,
}

impl RawInterface {
    fn into_definition(
        self,
        uploaded_on: Option<DateTime<Utc>>,
        decommissioned: bool,
    ) -> Result<ModelDefinition, ModelParseError> {
        let id = self.id.ok_or(ModelParseError::MissingId)?;

        if let Some(kind) = self.kind.as_deref() {
            if kind != "Interface" {
                return Err(ModelParseError::NotAnInterface {
                    id,
                    found: kind.to_string(),
                });
            }
        }

        let mut contents = Vec::with_capacity(self.contents.len());
        for raw in self.contents {
            let types = raw.types.into_vec();
            let kind = types
                .iter()
                .find_map(|t| ContentKind::from_type_name(t))
                .ok_or_else(|| ModelParseError::UnknownContentKind {
                    model_id: id.clone(),
                    name: raw.name.clone(),
                })?;

            contents.push(ModelContent {
                kind,
                value_annotation: types.iter().any(|t| t == "ValueAnnotation"),
                name: raw.name,
                schema: raw.schema,
                target: raw.target,
                unit: raw.unit,
                annotates: raw.annotates,
            });
        }

        Ok(ModelDefinition {
            id,
            extends: self.extends.map(OneOrMany::into_vec).unwrap_or_default(),
            display_name: self.display_name.as_ref().and_then(display_name_text),
            uploaded_on,
            decommissioned,
            contents,
        })
    }
}

/// `displayName` is either a string or a language map; prefer English.
fn display_name_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("en")
            .or_else(|| map.values().next())
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

// ============================================================================
// Twins and Relationships
// ============================================================================

/// A digital-twin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Twin {
    pub id: String,
    pub model_id: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Twin {
    pub fn new(id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model_id: model_id.into(),
            properties: Properties::new(),
            etag: None,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

/// A directed, named edge between two twins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            name: name.into(),
            properties: Properties::new(),
            etag: None,
        }
    }
}

/// A property whose numeric value is qualified by the unit carried in another property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitAnnotation {
    /// Model that declares the unit-carrying property
    pub model_id: String,
    /// Property holding the unit
    pub unit_property: String,
    /// Property whose value is annotated
    pub annotated_property: String,
    /// Unit literal
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_bare_interface() {
        let doc = json!({
            "@id": "dtmi:com:acme:Sensor;1",
            "@type": "Interface",
            "displayName": { "en": "Sensor" },
            "extends": "dtmi:com:acme:Asset;1",
            "contents": [
                { "@type": ["Telemetry", "Temperature"], "name": "temp", "schema": "double", "unit": "degreeCelsius" },
                { "@type": "Relationship", "name": "isLocatedIn", "target": "dtmi:com:acme:Space;1" }
            ]
        });

        let model = ModelDefinition::from_document(&doc).unwrap();
        assert_eq!(model.id, "dtmi:com:acme:Sensor;1");
        assert_eq!(model.extends, vec!["dtmi:com:acme:Asset;1".to_string()]);
        assert_eq!(model.display_name.as_deref(), Some("Sensor"));
        assert_eq!(model.contents.len(), 2);
        assert_eq!(model.contents[0].kind, ContentKind::Telemetry);
        assert_eq!(model.contents[0].unit.as_deref(), Some("degreeCelsius"));
        assert_eq!(
            model.contents[1].target.as_deref(),
            Some("dtmi:com:acme:Space;1")
        );
    }

    #[test]
    fn test_parse_wrapped_document() {
        let doc = json!({
            "uploadedOn": "2024-01-02T03:04:05Z",
            "decommissioned": true,
            "model": {
                "@id": "dtmi:com:acme:Space;1",
                "@type": "Interface",
                "extends": ["dtmi:com:acme:A;1", "dtmi:com:acme:B;1"],
                "contents": [
                    { "@type": ["Property", "ValueAnnotation"], "name": "areaUnit", "annotates": "area", "schema": "string" }
                ]
            }
        });

        let model = ModelDefinition::from_document(&doc).unwrap();
        assert!(model.decommissioned);
        assert!(model.uploaded_on.is_some());
        assert_eq!(model.extends.len(), 2);
        assert!(model.contents[0].value_annotation);
        assert_eq!(model.contents[0].annotates.as_deref(), Some("area"));
    }

    #[test]
    fn test_parse_rejects_non_interface() {
        let doc = json!({ "@id": "dtmi:x;1", "@type": "Enum" });
        let err = ModelDefinition::from_document(&doc).unwrap_err();
        assert!(matches!(err, ModelParseError::NotAnInterface { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_content_kind() {
        let doc = json!({
            "@id": "dtmi:x;1",
            "@type": "Interface",
            "contents": [ { "@type": "Temperature", "name": "t" } ]
        });
        let err = ModelDefinition::from_document(&doc).unwrap_err();
        assert!(err.to_string().contains("'t'"));
    }

    #[test]
    fn test_parse_missing_id() {
        let doc = json!({ "@type": "Interface", "contents": [] });
        let err = ModelDefinition::from_document(&doc).unwrap_err();
        assert!(matches!(err, ModelParseError::MissingId));
    }

    #[test]
    fn test_document_id_lookup() {
        assert_eq!(
            document_id(&json!({ "model": { "@id": "dtmi:a;1" } })).as_deref(),
            Some("dtmi:a;1")
        );
        assert_eq!(document_id(&json!({ "foo": 1 })), None);
    }

    #[test]
    fn test_twin_serde_defaults() {
        let twin: Twin = serde_json::from_value(json!({ "id": "t1", "model_id": "dtmi:a;1" })).unwrap();
        assert!(twin.properties.is_empty());
        assert_eq!(twin.etag, None);
    }
}
