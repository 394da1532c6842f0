//! Load command - Load a snapshot and report cache statistics

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use twingraph_core::{CacheStats, FailureStage, ItemFailure};

use super::open_cache;
use crate::GlobalOptions;

/// Arguments for the load command
#[derive(clap::Args, Debug)]
pub struct LoadArgs {
    /// Snapshot file (defaults to source.snapshot_path from config)
    #[arg(long, short = 's')]
    snapshot: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct LoadOutput {
    stats: CacheStats,
    rejected_models: Vec<RejectedModel>,
}

#[derive(Debug, Serialize)]
struct RejectedModel {
    model_id: Option<String>,
    stage: &'static str,
    message: String,
}

impl From<&ItemFailure> for RejectedModel {
    fn from(failure: &ItemFailure) -> Self {
        Self {
            model_id: failure.model_id.clone(),
            stage: match failure.stage {
                FailureStage::Parse => "parse",
                FailureStage::UnitAnnotations => "unit-annotations",
            },
            message: failure.message.clone(),
        }
    }
}

/// Execute the load command
pub async fn execute(args: LoadArgs, global: GlobalOptions) -> Result<()> {
    let loaded = open_cache(&global, args.snapshot.as_deref()).await?;

    let output = LoadOutput {
        stats: loaded.cache.stats(),
        rejected_models: loaded
            .report
            .models
            .failures
            .iter()
            .map(RejectedModel::from)
            .collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let stats = &output.stats;
    println!("Models:         {}", stats.models);
    println!("Twins:          {}", stats.twins);
    println!("Model buckets:  {}", stats.model_buckets);
    println!("Relationships:  {}", stats.relationships);
    println!(
        "Hydrated:       {} outgoing, {} incoming",
        stats.outgoing_loaded, stats.incoming_loaded
    );

    if !output.rejected_models.is_empty() {
        println!();
        println!("Rejected models:");
        for rejected in &output.rejected_models {
            println!(
                "  {} [{}] {}",
                rejected.model_id.as_deref().unwrap_or("<unknown>"),
                rejected.stage,
                rejected.message
            );
        }
    }

    Ok(())
}
