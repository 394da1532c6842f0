//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use twingraph_core::{CacheLoader, GraphCache, LoadOptions, LoadReport, ModelDefinition, SnapshotSource};

pub const SPACE: &str = "dtmi:com:acme:Space;1";
pub const BUILDING: &str = "dtmi:com:acme:Building;1";
pub const FLOOR: &str = "dtmi:com:acme:Floor;1";
pub const ROOM: &str = "dtmi:com:acme:Room;1";
pub const MEETING_ROOM: &str = "dtmi:com:acme:MeetingRoom;1";
pub const BROKEN: &str = "dtmi:com:acme:Broken;1";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Load the building fixture into a fresh cache.
pub async fn load_building(
    eager_relationships: bool,
) -> (Arc<GraphCache>, Arc<SnapshotSource>, LoadReport) {
    let source = Arc::new(
        SnapshotSource::open(fixture_path("building.json")).expect("Failed to open fixture"),
    );
    let cache = Arc::new(GraphCache::new());
    let report = CacheLoader::new(Arc::clone(&cache), source.clone())
        .with_options(LoadOptions {
            eager_relationships,
        })
        .load()
        .await
        .expect("Failed to load fixture");
    (cache, source, report)
}

pub fn model(id: &str, extends: &[&str]) -> ModelDefinition {
    ModelDefinition::new(id).extending(extends.iter().copied())
}

pub fn ids(values: &[&str]) -> HashSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}
