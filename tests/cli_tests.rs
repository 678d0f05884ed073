//! Command-line tests for the `ranks`, `check` and `tree` subcommands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use taxon_db::taxonomy::observer::NoopObserver;
use taxon_db::{NewTaxon, RankSchema, TaxonStore};

fn taxon_db() -> Command {
    Command::cargo_bin("taxon-db").unwrap()
}

/// Write a small snapshot: Carnivora > {Canidae > Canis, Felidae}
fn write_snapshot(dir: &Path) -> std::path::PathBuf {
    let store = TaxonStore::with_observer(RankSchema::load_embedded().unwrap(), Arc::new(NoopObserver));
    let carnivora = store.insert(NewTaxon::new("Carnivora", "order")).unwrap();
    let canidae = store
        .insert(NewTaxon::new("Canidae", "family").with_parent(carnivora.id))
        .unwrap();
    store
        .insert(NewTaxon::new("Felidae", "family").with_parent(carnivora.id))
        .unwrap();
    store
        .insert(
            NewTaxon::new("Canis", "genus")
                .with_parent(canidae.id)
                .with_synonym("Dogs"),
        )
        .unwrap();

    let path = dir.join("taxonomy.json");
    store.snapshot().write_to_file(&path).unwrap();
    path
}

#[test]
fn test_ranks_text_and_json() {
    taxon_db()
        .arg("ranks")
        .assert()
        .success()
        .stdout(predicate::str::contains("kingdom"))
        .stdout(predicate::str::contains("species"));

    let output = taxon_db().args(["ranks", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["ranks"].as_array().unwrap().len(), 8);
}

#[test]
fn test_ranks_export_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ranks.json");

    taxon_db()
        .args(["ranks", "--export"])
        .arg(&path)
        .assert()
        .success();
    assert!(RankSchema::load_from_file(&path).is_ok());

    taxon_db()
        .args(["ranks", "--ranks"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("genus"));
}

#[test]
fn test_ranks_rejects_invalid_schema() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ranks.json");
    std::fs::write(&path, r#"{"version": "1.0.0", "ranks": ["genus", "Genus"]}"#).unwrap();

    taxon_db().args(["ranks", "--ranks"]).arg(&path).assert().failure();
}

#[test]
fn test_check_valid_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    taxon_db()
        .arg("check")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Taxa:     4"))
        .stdout(predicate::str::contains("OK"));

    let output = taxon_db()
        .args(["check", "--format", "json"])
        .arg(&snapshot)
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], true);
    assert_eq!(json["stats"]["synonyms"], 1);
}

#[test]
fn test_check_rejects_broken_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(
        &path,
        r#"{
            "version": "1.0.0",
            "created_at": "2024-01-01T00:00:00Z",
            "ranks": ["family", "genus"],
            "next_id": 3,
            "taxa": [
                {"id": 1, "name": "Canis", "rank": "genus"},
                {"id": 2, "name": "Canidae", "rank": "family", "parent_id": 1}
            ]
        }"#,
    )
    .unwrap();

    taxon_db()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rank order violation"));

    taxon_db()
        .arg("check")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure();
}

#[test]
fn test_tree_output() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    taxon_db()
        .args(["tree", "--synonyms"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Carnivora [order]"))
        .stdout(predicate::str::contains("    Canis [genus]"))
        .stdout(predicate::str::contains("(syn. Dogs)"));

    // Depth limit and a named starting point
    taxon_db()
        .args(["tree", "--root", "canidae", "--depth", "0"])
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Canidae [family]"))
        .stdout(predicate::str::contains("Canis").not());

    let output = taxon_db()
        .args(["tree", "--format", "json", "--root", "1"])
        .arg(&snapshot)
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["name"], "Carnivora");
    assert_eq!(json[0]["children"].as_array().unwrap().len(), 2);
}

#[test]
fn test_tree_unknown_root_fails() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());

    taxon_db()
        .args(["tree", "--root", "Ursidae"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_check_rejects_overflowing_ids() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overflow.json");
    std::fs::write(
        &path,
        r#"{
            "version": "1.0.0",
            "created_at": "2024-01-01T00:00:00Z",
            "ranks": ["family", "genus"],
            "next_id": 1,
            "taxa": [{"id": 18446744073709551615, "name": "Canis", "rank": "genus"}]
        }"#,
    )
    .unwrap();

    taxon_db()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("id space exhausted"))
        .stderr(predicate::str::contains("panicked").not());
}

/// Write a single chain of unranked clades, each the child of the previous one
fn write_chain(dir: &Path, depth: u64) -> std::path::PathBuf {
    let taxa: Vec<serde_json::Value> = (1..=depth)
        .map(|id| {
            let mut taxon = serde_json::json!({"id": id, "name": format!("Clade {id}"), "rank": "unranked"});
            if id > 1 {
                taxon["parent_id"] = serde_json::json!(id - 1);
            }
            taxon
        })
        .collect();
    let snapshot = serde_json::json!({
        "version": "1.0.0",
        "created_at": "2024-01-01T00:00:00Z",
        "ranks": ["family", "genus"],
        "next_id": depth + 1,
        "taxa": taxa,
    });

    let path = dir.join("chain.json");
    std::fs::write(&path, snapshot.to_string()).unwrap();
    path
}

#[test]
fn test_tree_deep_chain() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_chain(dir.path(), 2_000);

    taxon_db()
        .arg("tree")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("Clade 2000 [unranked] #2000"));

    // JSON nesting is bounded unless a depth is given
    taxon_db()
        .args(["tree", "--format", "json"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--depth"));

    let output = taxon_db()
        .args(["tree", "--format", "json", "--depth", "2"])
        .arg(&snapshot)
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["children"][0]["children"][0]["name"], "Clade 3");
    assert!(json[0]["children"][0]["children"][0].get("children").is_none());
}
