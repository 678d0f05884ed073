use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::core::error::TaxonomyError;
use crate::core::rank::{RankSchema, RankSchemaError};
use crate::core::taxon::Taxon;
use crate::core::types::TaxonId;
use crate::taxonomy::index::TaxonomyIndex;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid rank schema in snapshot: {0}")]
    Schema(#[from] RankSchemaError),

    #[error("Inconsistent snapshot: {0}")]
    Taxonomy(#[from] TaxonomyError),
}

/// Snapshot version for compatibility checking
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Serializable state of a whole store, ids and tombstones included
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomySnapshot {
    pub version: String,
    pub created_at: String,

    /// Rank schema the taxa were validated against
    pub ranks: Vec<String>,

    /// Next id the store would assign
    pub next_id: TaxonId,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tombstones: Vec<TaxonId>,

    pub taxa: Vec<SnapshotTaxon>,
}

/// A taxon as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTaxon {
    pub id: TaxonId,
    pub name: String,
    pub rank: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaxonId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl From<&Taxon> for SnapshotTaxon {
    fn from(taxon: &Taxon) -> Self {
        Self {
            id: taxon.id,
            name: taxon.name.clone(),
            rank: taxon.rank.name().to_string(),
            parent_id: taxon.parent_id,
            synonyms: taxon.synonyms.iter().cloned().collect(),
        }
    }
}

impl TaxonomySnapshot {
    /// Capture the state of an index, taxa ordered by id
    #[must_use]
    pub fn capture(index: &TaxonomyIndex, schema: &RankSchema) -> Self {
        let mut taxa: Vec<SnapshotTaxon> = index.iter().map(SnapshotTaxon::from).collect();
        taxa.sort_by_key(|t| t.id);

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            ranks: schema.names().to_vec(),
            next_id: index.next_id(),
            tombstones: index.tombstones().iter().copied().collect(),
            taxa,
        }
    }

    /// Load a snapshot from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a snapshot from a JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if snapshot.version != SNAPSHOT_VERSION {
            tracing::warn!(
                expected = SNAPSHOT_VERSION,
                found = %snapshot.version,
                "Snapshot version mismatch"
            );
        }

        Ok(snapshot)
    }

    /// Export to pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot to a file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to_file(&self, path: &Path) -> Result<(), SnapshotError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Rank schema recorded in the snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the recorded rank list is invalid.
    pub fn schema(&self) -> Result<RankSchema, RankSchemaError> {
        RankSchema::new(&self.ranks)
    }

    /// Rebuild an index, validating every invariant along the way
    pub(crate) fn restore(&self, schema: &RankSchema) -> Result<TaxonomyIndex, TaxonomyError> {
        let mut index = TaxonomyIndex::new();

        for entry in self.parents_first()? {
            index.insert_restored(Taxon {
                id: entry.id,
                name: entry.name.clone(),
                rank: schema.rank_of(&entry.rank)?,
                parent_id: entry.parent_id,
                synonyms: entry.synonyms.iter().cloned().collect(),
            })?;
        }

        index.restore_tombstones(self.tombstones.iter().copied().collect::<BTreeSet<_>>())?;
        index.advance_next_id(self.next_id);
        Ok(index)
    }

    /// Order taxa so that every parent precedes its children
    fn parents_first(&self) -> Result<Vec<&SnapshotTaxon>, TaxonomyError> {
        let mut by_id: HashMap<TaxonId, &SnapshotTaxon> = HashMap::with_capacity(self.taxa.len());
        for taxon in &self.taxa {
            if by_id.insert(taxon.id, taxon).is_some() {
                return Err(TaxonomyError::InvalidInput(format!(
                    "taxon id {} appears more than once",
                    taxon.id
                )));
            }
        }

        let mut depths: HashMap<TaxonId, usize> = HashMap::with_capacity(self.taxa.len());
        for taxon in &self.taxa {
            // Walk up until a root or a node of known depth
            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            let mut base = None;
            let mut cursor = Some(taxon.id);
            while let Some(id) = cursor {
                if let Some(&depth) = depths.get(&id) {
                    base = Some(depth);
                    break;
                }
                let node = by_id.get(&id).ok_or_else(|| {
                    TaxonomyError::MissingParent(format!(
                        "parent taxon {id} is not part of the snapshot"
                    ))
                })?;
                if !on_path.insert(id) {
                    return Err(TaxonomyError::CycleDetected {
                        id,
                        new_parent: node.parent_id.unwrap_or(id),
                    });
                }
                path.push(id);
                cursor = node.parent_id;
            }

            let mut depth = base.map_or(0, |d| d + 1);
            for id in path.into_iter().rev() {
                depths.insert(id, depth);
                depth += 1;
            }
        }

        let mut ordered: Vec<&SnapshotTaxon> = self.taxa.iter().collect();
        ordered.sort_by_key(|t| (depths[&t.id], t.id));
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::index::TaxonDraft;

    fn entry(id: u64, name: &str, rank: &str, parent: Option<u64>) -> SnapshotTaxon {
        SnapshotTaxon {
            id: TaxonId(id),
            name: name.to_string(),
            rank: rank.to_string(),
            parent_id: parent.map(TaxonId),
            synonyms: Vec::new(),
        }
    }

    fn snapshot(taxa: Vec<SnapshotTaxon>) -> TaxonomySnapshot {
        TaxonomySnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: String::new(),
            ranks: RankSchema::load_embedded().unwrap().names().to_vec(),
            next_id: TaxonId(1),
            tombstones: Vec::new(),
            taxa,
        }
    }

    #[test]
    fn test_restore_children_listed_first() {
        let snap = snapshot(vec![
            entry(9, "Canis lupus", "species", Some(4)),
            entry(4, "Canis", "genus", Some(2)),
            entry(2, "Canidae", "family", None),
        ]);
        let index = snap.restore(&snap.schema().unwrap()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.next_id(), TaxonId(10));
        assert_eq!(index.get_by_name("canis lupus").unwrap().id, TaxonId(9));
        assert!(index.check_invariants().is_empty());
    }

    #[test]
    fn test_restore_rejects_cycles_and_orphans() {
        let snap = snapshot(vec![
            entry(1, "A", "unranked", Some(2)),
            entry(2, "B", "unranked", Some(1)),
        ]);
        assert!(matches!(
            snap.restore(&snap.schema().unwrap()),
            Err(TaxonomyError::CycleDetected { .. })
        ));

        let snap = snapshot(vec![entry(1, "A", "genus", Some(7))]);
        assert!(matches!(
            snap.restore(&snap.schema().unwrap()),
            Err(TaxonomyError::MissingParent(_))
        ));
    }

    #[test]
    fn test_restore_rejects_invalid_content() {
        let snap = snapshot(vec![entry(1, "A", "genus", None), entry(1, "B", "genus", None)]);
        assert!(matches!(
            snap.restore(&snap.schema().unwrap()),
            Err(TaxonomyError::InvalidInput(_))
        ));

        let snap = snapshot(vec![entry(1, "A", "tribe", None)]);
        assert!(matches!(
            snap.restore(&snap.schema().unwrap()),
            Err(TaxonomyError::InvalidRank(_))
        ));

        let snap = snapshot(vec![
            entry(1, "Canis", "genus", None),
            entry(2, "Canidae", "family", Some(1)),
        ]);
        assert!(matches!(
            snap.restore(&snap.schema().unwrap()),
            Err(TaxonomyError::RankOrderViolation { .. })
        ));
    }

    #[test]
    fn test_restore_rejects_exhausted_id_space() {
        let snap = snapshot(vec![entry(u64::MAX, "Canis", "genus", None)]);
        let err = snap.restore(&snap.schema().unwrap()).unwrap_err();
        assert_eq!(err, TaxonomyError::InvalidInput("id space exhausted".to_string()));

        let mut snap = snapshot(vec![entry(1, "Canis", "genus", None)]);
        snap.tombstones = vec![TaxonId(u64::MAX)];
        assert!(matches!(
            snap.restore(&snap.schema().unwrap()),
            Err(TaxonomyError::InvalidInput(_))
        ));

        // A counter parked at the last id restores, but cannot hand it out
        let mut snap = snapshot(vec![entry(1, "Canis", "genus", None)]);
        snap.next_id = TaxonId(u64::MAX);
        let schema = snap.schema().unwrap();
        let mut index = snap.restore(&schema).unwrap();
        let err = index
            .insert(TaxonDraft {
                name: "Vulpes".to_string(),
                rank: schema.rank_of("genus").unwrap(),
                parent_id: None,
                synonyms: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, TaxonomyError::InvalidInput(_)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.next_id(), TaxonId(u64::MAX));
    }

    #[test]
    fn test_capture_preserves_tombstones() {
        let schema = RankSchema::load_embedded().unwrap();
        let mut index = TaxonomyIndex::new();
        let id = index
            .insert(TaxonDraft {
                name: "Canidae".to_string(),
                rank: schema.rank_of("family").unwrap(),
                parent_id: None,
                synonyms: vec!["Dogs".to_string()],
            })
            .unwrap();
        index
            .insert(TaxonDraft {
                name: "Felidae".to_string(),
                rank: schema.rank_of("family").unwrap(),
                parent_id: None,
                synonyms: Vec::new(),
            })
            .unwrap();
        index.remove(TaxonId(2), crate::core::types::DeletePolicy::Restrict).unwrap();

        let snap = TaxonomySnapshot::capture(&index, &schema);
        assert_eq!(snap.tombstones, vec![TaxonId(2)]);
        assert_eq!(snap.next_id, TaxonId(3));

        let parsed = TaxonomySnapshot::from_json(&snap.to_json().unwrap()).unwrap();
        let restored = parsed.restore(&schema).unwrap();
        assert_eq!(restored.get(id).unwrap().synonyms.len(), 1);
        assert!(matches!(restored.get(TaxonId(2)), Err(TaxonomyError::NotFound(_))));
        assert_eq!(restored.next_id(), TaxonId(3));
    }
}
