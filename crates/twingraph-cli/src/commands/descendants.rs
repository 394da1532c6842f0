//! Descendants command - List the models descending from a model

use std::path::PathBuf;

use anyhow::Result;

use super::{open_cache, print_info};
use crate::GlobalOptions;

/// Arguments for the descendants command
#[derive(clap::Args, Debug)]
pub struct DescendantsArgs {
    /// Model id (e.g., "dtmi:com:acme:Space;1")
    model_id: String,

    /// Snapshot file (defaults to source.snapshot_path from config)
    #[arg(long, short = 's')]
    snapshot: Option<PathBuf>,

    /// Also list the twins of every descendant model
    #[arg(long)]
    twins: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the descendants command
pub async fn execute(args: DescendantsArgs, global: GlobalOptions) -> Result<()> {
    let loaded = open_cache(&global, args.snapshot.as_deref()).await?;
    let models = loaded.cache.models();

    anyhow::ensure!(
        models.contains(&args.model_id),
        "Model '{}' not found",
        args.model_id
    );

    let mut descendants: Vec<String> = models.descendant_ids(&args.model_id).into_iter().collect();
    descendants.sort();

    let mut twins: Vec<String> = if args.twins {
        loaded
            .cache
            .twin_ids_for_model_family(&args.model_id)
            .into_iter()
            .collect()
    } else {
        Vec::new()
    };
    twins.sort();

    if args.json {
        let mut output = serde_json::json!({
            "model_id": args.model_id,
            "descendants": descendants,
        });
        if args.twins {
            output["twins"] = serde_json::json!(twins);
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_info(
        &format!("{} descendants of {}", descendants.len(), args.model_id),
        global.quiet,
    );
    for id in &descendants {
        println!("{}", id);
    }

    if args.twins {
        println!();
        print_info(&format!("{} twins", twins.len()), global.quiet);
        for id in &twins {
            println!("{}", id);
        }
    }

    Ok(())
}
