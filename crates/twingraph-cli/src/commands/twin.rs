//! Twin command - Show a twin and its relationships
//!
//! Relationships are fetched on demand unless the cache was loaded eagerly.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use twingraph_core::{LazyRelationshipReader, Relationship};

use super::open_cache;
use crate::GlobalOptions;

/// Arguments for the twin command
#[derive(clap::Args, Debug)]
pub struct TwinArgs {
    /// Twin id
    twin_id: String,

    /// Snapshot file (defaults to source.snapshot_path from config)
    #[arg(long, short = 's')]
    snapshot: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the twin command
pub async fn execute(args: TwinArgs, global: GlobalOptions) -> Result<()> {
    let loaded = open_cache(&global, args.snapshot.as_deref()).await?;

    let twin = loaded
        .cache
        .twins()
        .get_twin(&args.twin_id)
        .with_context(|| format!("Twin '{}' not found", args.twin_id))?;

    let reader = LazyRelationshipReader::new(Arc::clone(&loaded.cache), loaded.source.clone());
    let outgoing = reader
        .outgoing(&twin.id)
        .await
        .context("Failed to read outgoing relationships")?;
    let incoming = reader
        .incoming(&twin.id)
        .await
        .context("Failed to read incoming relationships")?;

    if args.json {
        let output = serde_json::json!({
            "twin": twin,
            "outgoing": outgoing,
            "incoming": incoming,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} ({})", twin.id, twin.model_id);
    for (name, value) in &twin.properties {
        println!("  {} = {}", name, value);
    }
    if let Some(unit_hint) = unit_hints(&loaded.cache, &twin.model_id, &twin.properties) {
        println!("  units: {}", unit_hint);
    }

    print_relationships("Outgoing", &outgoing, |r| &r.target_id);
    print_relationships("Incoming", &incoming, |r| &r.source_id);
    Ok(())
}

fn print_relationships<F>(title: &str, relationships: &[Relationship], other_end: F)
where
    F: Fn(&Relationship) -> &String,
{
    println!();
    println!("{} ({}):", title, relationships.len());
    for relationship in relationships {
        println!(
            "  {} -[{}]- {}",
            relationship.id,
            relationship.name,
            other_end(relationship)
        );
    }
}

/// Units declared for the twin's properties, e.g. `area=squareMetre`.
fn unit_hints(
    cache: &twingraph_core::GraphCache,
    model_id: &str,
    properties: &twingraph_core::Properties,
) -> Option<String> {
    let hints: Vec<String> = properties
        .keys()
        .filter_map(|name| {
            cache
                .models()
                .unit_for(model_id, name)
                .map(|unit| format!("{}={}", name, unit))
        })
        .collect();
    (!hints.is_empty()).then(|| hints.join(", "))
}
