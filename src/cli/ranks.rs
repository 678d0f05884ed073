use std::path::PathBuf;

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::rank::RankSchema;

#[derive(Args)]
pub struct RanksArgs {
    /// Rank schema file (defaults to the built-in schema)
    #[arg(long, env = "TAXON_DB_RANKS")]
    pub ranks: Option<PathBuf>,

    /// Write the schema as JSON to this file instead of printing it
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Show or export the rank schema
///
/// # Errors
///
/// Returns an error if the schema cannot be loaded or written.
pub fn run(args: RanksArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let schema = match &args.ranks {
        Some(path) => RankSchema::load_from_file(path)?,
        None => RankSchema::load_embedded()?,
    };

    if verbose {
        match &args.ranks {
            Some(path) => eprintln!("Loaded rank schema from {}", path.display()),
            None => eprintln!("Using built-in rank schema"),
        }
    }

    if let Some(output) = args.export {
        let json = serde_json::to_string_pretty(&schema.to_data())?;
        std::fs::write(&output, json)?;
        println!("Exported {} ranks to {}", schema.len(), output.display());
        return Ok(());
    }

    match format {
        OutputFormat::Text => {
            println!("Rank Schema ({} ranks, broadest first)\n", schema.len());
            for (level, name) in schema.names().iter().enumerate() {
                println!("{level:>3}  {name}");
            }
            println!("\nTaxa may also be 'unranked'; unranked taxa fit anywhere in the tree.");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&schema.to_data())?);
        }
    }

    Ok(())
}
