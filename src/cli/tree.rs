use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::core::error::TaxonomyError;
use crate::core::taxon::Taxon;
use crate::core::types::TaxonId;
use crate::taxonomy::observer::NoopObserver;
use crate::taxonomy::page::{Page, PageRequest};
use crate::taxonomy::snapshot::TaxonomySnapshot;
use crate::taxonomy::store::TaxonStore;
use crate::utils::validation::MAX_PAGE_SIZE;

#[derive(Args)]
pub struct TreeArgs {
    /// Snapshot file to read
    #[arg(required = true)]
    pub snapshot: PathBuf,

    /// Start from this taxon (id or name) instead of the roots
    #[arg(long)]
    pub root: Option<String>,

    /// Maximum depth to print below the starting taxa
    #[arg(long)]
    pub depth: Option<usize>,

    /// Show synonyms next to each name
    #[arg(long)]
    pub synonyms: bool,
}

/// Deepest nesting written as JSON
pub const MAX_JSON_DEPTH: usize = 256;

#[derive(Serialize)]
struct TreeNode {
    id: TaxonId,
    name: String,
    rank: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

/// Print a snapshot as an indented tree
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded or the root is unknown.
pub fn run(args: TreeArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let snapshot = TaxonomySnapshot::load_from_file(&args.snapshot)?;
    let store = TaxonStore::from_snapshot(&snapshot, Arc::new(NoopObserver))?;
    if verbose {
        eprintln!("Loaded {} taxa from {}", store.len(), args.snapshot.display());
    }

    let starts = match &args.root {
        Some(root) => vec![resolve_root(&store, root)?],
        None => collect_pages(|page| store.roots(page))?,
    };

    let lines = walk(&store, starts, args.depth)?;

    match format {
        OutputFormat::Text => {
            if lines.is_empty() {
                println!("(empty taxonomy)");
            }
            for line in &lines {
                print_line(line, args.synonyms);
            }
        }
        OutputFormat::Json => {
            if lines.iter().any(|line| line.level >= MAX_JSON_DEPTH) {
                anyhow::bail!(
                    "tree is deeper than {MAX_JSON_DEPTH} levels; pass --depth to limit JSON output"
                );
            }
            println!("{}", serde_json::to_string_pretty(&build_forest(lines))?);
        }
    }

    Ok(())
}

/// Interpret the argument as an id first, then as a name
fn resolve_root(store: &TaxonStore, root: &str) -> anyhow::Result<Taxon> {
    if let Ok(id) = root.parse::<TaxonId>() {
        if let Ok(taxon) = store.get(id) {
            return Ok(taxon);
        }
    }
    Ok(store.get_by_name(root)?)
}

/// Drain every page of a paged listing
fn collect_pages(
    mut fetch: impl FnMut(&PageRequest) -> Result<Page<Taxon>, TaxonomyError>,
) -> anyhow::Result<Vec<Taxon>> {
    let mut taxa = Vec::new();
    let mut request = PageRequest::first(MAX_PAGE_SIZE);
    loop {
        let page = fetch(&request)?;
        taxa.extend(page.items);
        match page.next_cursor {
            Some(cursor) => request = PageRequest::after(MAX_PAGE_SIZE, cursor),
            None => return Ok(taxa),
        }
    }
}

/// A taxon and its distance below the starting taxa
struct Line {
    taxon: Taxon,
    level: usize,
}

/// Pre-order walk with an explicit stack, so chain length is not bounded
/// by the call stack
fn walk(store: &TaxonStore, starts: Vec<Taxon>, depth: Option<usize>) -> anyhow::Result<Vec<Line>> {
    let mut lines = Vec::new();
    let mut stack: Vec<Line> = starts
        .into_iter()
        .rev()
        .map(|taxon| Line { taxon, level: 0 })
        .collect();

    while let Some(line) = stack.pop() {
        if depth.map_or(true, |max| line.level < max) {
            let children = collect_pages(|page| store.children(line.taxon.id, page))?;
            stack.extend(children.into_iter().rev().map(|taxon| Line {
                taxon,
                level: line.level + 1,
            }));
        }
        lines.push(line);
    }
    Ok(lines)
}

/// Fold a pre-order walk back into nested nodes
fn build_forest(lines: Vec<Line>) -> Vec<TreeNode> {
    let mut forest = Vec::new();
    // Nodes on the path from a start taxon to the current line
    let mut open: Vec<TreeNode> = Vec::new();

    for Line { taxon, level } in lines {
        close_to(&mut open, &mut forest, level);
        open.push(TreeNode {
            id: taxon.id,
            name: taxon.name,
            rank: taxon.rank.name().to_string(),
            synonyms: taxon.synonyms.into_iter().collect(),
            children: Vec::new(),
        });
    }
    close_to(&mut open, &mut forest, 0);
    forest
}

fn close_to(open: &mut Vec<TreeNode>, forest: &mut Vec<TreeNode>, level: usize) {
    while open.len() > level {
        let Some(node) = open.pop() else { break };
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => forest.push(node),
        }
    }
}

fn print_line(line: &Line, synonyms: bool) {
    let taxon = &line.taxon;
    let mut text = format!(
        "{}{} [{}] #{}",
        "  ".repeat(line.level),
        taxon.name,
        taxon.rank.name(),
        taxon.id
    );
    if synonyms && !taxon.synonyms.is_empty() {
        let names: Vec<&str> = taxon.synonyms.iter().map(String::as_str).collect();
        text.push_str(&format!(" (syn. {})", names.join(", ")));
    }
    println!("{text}");
}
