use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::cli::OutputFormat;
use crate::taxonomy::observer::NoopObserver;
use crate::taxonomy::snapshot::TaxonomySnapshot;
use crate::taxonomy::store::TaxonStore;

#[derive(Args)]
pub struct CheckArgs {
    /// Snapshot file to validate
    #[arg(required = true)]
    pub snapshot: PathBuf,
}

/// Load a snapshot and audit it.
///
/// Restoring a snapshot already enforces every invariant on the way in; the
/// audit afterwards cross-checks the secondary indexes of the result.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read, violates an invariant, or
/// fails the audit.
pub fn run(args: CheckArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let snapshot = TaxonomySnapshot::load_from_file(&args.snapshot)?;
    if verbose {
        eprintln!(
            "Loaded snapshot {} (version {}, created {})",
            args.snapshot.display(),
            snapshot.version,
            snapshot.created_at
        );
    }

    let store = TaxonStore::from_snapshot(&snapshot, Arc::new(NoopObserver))
        .map_err(|e| anyhow::anyhow!("{}: {e}", args.snapshot.display()))?;
    let problems = store.check_invariants();
    let stats = store.stats();

    match format {
        OutputFormat::Text => {
            println!("Snapshot: {}", args.snapshot.display());
            println!("Taxa:     {}", stats.taxa);
            println!("Roots:    {}", stats.roots);
            println!("Synonyms: {}", stats.synonyms);
            println!("Deleted:  {}", stats.deleted);
            if verbose {
                println!();
                for rank in stats.ranks.iter().filter(|r| r.count > 0) {
                    println!("  {:<12} {}", rank.rank, rank.count);
                }
            }
            for problem in &problems {
                println!("PROBLEM: {problem}");
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "snapshot": args.snapshot.display().to_string(),
                "valid": problems.is_empty(),
                "stats": stats,
                "problems": problems,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if !problems.is_empty() {
        anyhow::bail!("snapshot failed {} consistency checks", problems.len());
    }
    if format == OutputFormat::Text {
        println!("OK");
    }
    Ok(())
}
