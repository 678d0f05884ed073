use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::Bound;

use crate::core::error::{Result, TaxonomyError};
use crate::core::rank::RankSchema;
use crate::core::taxon::{SortKey, Taxon};
use crate::core::types::{DeletePolicy, Rank, TaxonId};
use crate::utils::validation::{normalize_name, validate_name, MAX_SYNONYMS};

/// Whether a name table entry is a canonical name or a synonym
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    Canonical,
    Synonym,
}

/// Owner of a normalized name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameEntry {
    pub id: TaxonId,
    pub kind: NameKind,
}

/// Input for a new taxon once its rank has been resolved against the schema
#[derive(Debug, Clone)]
pub struct TaxonDraft {
    pub name: String,
    pub rank: Rank,
    pub parent_id: Option<TaxonId>,
    pub synonyms: Vec<String>,
}

/// In-memory taxonomy with incrementally maintained secondary indexes.
///
/// Every mutating method validates first and only then applies, so a call
/// that returns an error leaves the index untouched.
#[derive(Debug, Clone)]
pub struct TaxonomyIndex {
    /// Active taxa by id
    taxa: HashMap<TaxonId, Taxon>,

    /// Index: normalized name or synonym -> owner
    names: BTreeMap<String, NameEntry>,

    /// Index: parent id -> ordered child keys
    children: HashMap<TaxonId, BTreeSet<SortKey>>,

    /// Ordered keys of taxa without a parent
    roots: BTreeSet<SortKey>,

    /// Ids of deleted taxa; never handed out again
    tombstones: BTreeSet<TaxonId>,

    /// Next id to assign
    next_id: u64,
}

impl Default for TaxonomyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            taxa: HashMap::new(),
            names: BTreeMap::new(),
            children: HashMap::new(),
            roots: BTreeSet::new(),
            tombstones: BTreeSet::new(),
            next_id: 1,
        }
    }

    /// Number of active taxa
    #[must_use]
    pub fn len(&self) -> usize {
        self.taxa.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taxa.is_empty()
    }

    /// Id the next insert will receive
    #[must_use]
    pub fn next_id(&self) -> TaxonId {
        TaxonId(self.next_id)
    }

    #[must_use]
    pub fn tombstones(&self) -> &BTreeSet<TaxonId> {
        &self.tombstones
    }

    /// Iterate over all active taxa in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Taxon> {
        self.taxa.values()
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Get an active taxon by id
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if the id is unknown or deleted.
    pub fn get(&self, id: TaxonId) -> Result<&Taxon> {
        self.taxa.get(&id).ok_or_else(|| self.missing(id))
    }

    /// Get an active taxon by canonical name or synonym (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if no taxon carries the name.
    pub fn get_by_name(&self, name: &str) -> Result<&Taxon> {
        self.names
            .get(&normalize_name(name))
            .and_then(|entry| self.taxa.get(&entry.id))
            .ok_or_else(|| TaxonomyError::name_not_found(name))
    }

    /// Owner of a name, if any
    #[must_use]
    pub fn resolve_name(&self, name: &str) -> Option<NameEntry> {
        self.names.get(&normalize_name(name)).copied()
    }

    #[must_use]
    pub fn contains(&self, id: TaxonId) -> bool {
        self.taxa.contains_key(&id)
    }

    fn missing(&self, id: TaxonId) -> TaxonomyError {
        if self.tombstones.contains(&id) {
            TaxonomyError::taxon_deleted(id)
        } else {
            TaxonomyError::taxon_not_found(id)
        }
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    fn child_set(&self, parent: Option<TaxonId>) -> Option<&BTreeSet<SortKey>> {
        match parent {
            Some(id) => self.children.get(&id),
            None => Some(&self.roots),
        }
    }

    fn child_ids(&self, id: TaxonId) -> impl DoubleEndedIterator<Item = TaxonId> + '_ {
        self.children
            .get(&id)
            .into_iter()
            .flat_map(|set| set.iter().map(|(_, child)| *child))
    }

    /// Number of direct children of a taxon
    #[must_use]
    pub fn child_count(&self, id: TaxonId) -> usize {
        self.children.get(&id).map_or(0, BTreeSet::len)
    }

    /// Direct children ordered by name, ties broken by id
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if the taxon does not exist.
    pub fn children(&self, id: TaxonId) -> Result<Vec<&Taxon>> {
        self.get(id)?;
        Ok(self.child_ids(id).map(|child| &self.taxa[&child]).collect())
    }

    /// Root taxa ordered by name, ties broken by id
    #[must_use]
    pub fn roots(&self) -> Vec<&Taxon> {
        self.roots.iter().map(|(_, id)| &self.taxa[id]).collect()
    }

    /// One page of the children of `parent` (or of the roots when `None`),
    /// starting strictly after `after`. The flag reports whether more remain.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if the parent does not exist.
    pub fn children_page(
        &self,
        parent: Option<TaxonId>,
        after: Option<&SortKey>,
        limit: usize,
    ) -> Result<(Vec<&Taxon>, bool)> {
        if let Some(id) = parent {
            self.get(id)?;
        }
        let Some(set) = self.child_set(parent) else {
            return Ok((Vec::new(), false));
        };

        let lower = after.map_or(Bound::Unbounded, |key| Bound::Excluded(key.clone()));
        let mut keys = set.range((lower, Bound::Unbounded));
        let page: Vec<&Taxon> = keys
            .by_ref()
            .take(limit)
            .map(|(_, id)| &self.taxa[id])
            .collect();
        let has_more = keys.next().is_some();

        Ok((page, has_more))
    }

    /// Ancestors from the immediate parent up to the root
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if the taxon does not exist.
    pub fn ancestors(&self, id: TaxonId) -> Result<Vec<&Taxon>> {
        let mut current = self.get(id)?;
        let mut lineage = Vec::new();
        while let Some(parent_id) = current.parent_id {
            let parent = &self.taxa[&parent_id];
            lineage.push(parent);
            current = parent;
        }
        Ok(lineage)
    }

    /// All descendants in pre-order, children visited in sibling order
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if the taxon does not exist.
    pub fn descendants(&self, id: TaxonId) -> Result<Vec<&Taxon>> {
        self.get(id)?;
        let mut result = Vec::new();
        let mut stack: Vec<TaxonId> = self.child_ids(id).rev().collect();
        while let Some(next) = stack.pop() {
            result.push(&self.taxa[&next]);
            stack.extend(self.child_ids(next).rev());
        }
        Ok(result)
    }

    /// Other taxa sharing the same parent (other roots for a root)
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::NotFound`] if the taxon does not exist.
    pub fn siblings(&self, id: TaxonId) -> Result<Vec<&Taxon>> {
        let taxon = self.get(id)?;
        Ok(self
            .child_set(taxon.parent_id)
            .into_iter()
            .flatten()
            .filter(|(_, sibling)| *sibling != id)
            .map(|(_, sibling)| &self.taxa[sibling])
            .collect())
    }

    /// Names (canonical and synonyms) starting with a normalized prefix, in
    /// name order, starting strictly after `after`.
    #[must_use]
    pub fn search_page(
        &self,
        prefix: &str,
        after: Option<&str>,
        limit: usize,
    ) -> (Vec<(&str, NameEntry)>, bool) {
        let prefix = normalize_name(prefix);
        let lower = match after {
            Some(last) if last >= prefix.as_str() => Bound::Excluded(last.to_string()),
            _ => Bound::Included(prefix.clone()),
        };

        let mut matches = self
            .names
            .range::<String, _>((lower, Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(&prefix));
        let page: Vec<(&str, NameEntry)> = matches
            .by_ref()
            .take(limit)
            .map(|(name, entry)| (name.as_str(), *entry))
            .collect();
        let has_more = matches.next().is_some();

        (page, has_more)
    }

    /// Ids of all taxa owning a name that starts with the prefix
    #[must_use]
    pub fn ids_with_name_prefix(&self, prefix: &str) -> BTreeSet<TaxonId> {
        let prefix = normalize_name(prefix);
        self.names
            .range::<String, _>((Bound::Included(prefix.clone()), Bound::Unbounded))
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(_, entry)| entry.id)
            .collect()
    }

    /// Ids of every active taxon
    #[must_use]
    pub fn all_ids(&self) -> BTreeSet<TaxonId> {
        self.taxa.keys().copied().collect()
    }

    // ------------------------------------------------------------------
    // Validation helpers
    // ------------------------------------------------------------------

    /// Closest rank at or above `start`, skipping unranked taxa
    fn nearest_ranked(&self, start: Option<TaxonId>) -> Option<&Rank> {
        let mut cursor = start;
        while let Some(id) = cursor {
            let taxon = self.taxa.get(&id)?;
            if taxon.rank.is_ranked() {
                return Some(&taxon.rank);
            }
            cursor = taxon.parent_id;
        }
        None
    }

    /// Shallowest rank among the nearest ranked descendants of `id`,
    /// looking through unranked children
    fn shallowest_ranked_below(&self, id: TaxonId) -> Option<&Rank> {
        let mut shallowest: Option<&Rank> = None;
        let mut stack: Vec<TaxonId> = self.child_ids(id).collect();
        while let Some(next) = stack.pop() {
            let taxon = &self.taxa[&next];
            match taxon.rank.level() {
                Some(level) => {
                    if shallowest.and_then(Rank::level).map_or(true, |best| level < best) {
                        shallowest = Some(&taxon.rank);
                    }
                }
                None => stack.extend(self.child_ids(next)),
            }
        }
        shallowest
    }

    fn check_rank_order(ancestor: Option<&Rank>, child: &Rank) -> Result<()> {
        match ancestor {
            Some(parent) if !RankSchema::is_valid_child_rank(parent, child) => {
                Err(TaxonomyError::RankOrderViolation {
                    parent_rank: parent.name().to_string(),
                    child_rank: child.name().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Check that the subtree rooted at `id`, carrying `rank`, may hang below `parent`
    fn check_subtree_placement(&self, id: TaxonId, rank: &Rank, parent: Option<TaxonId>) -> Result<()> {
        let ancestor = self.nearest_ranked(parent);
        if rank.is_ranked() {
            Self::check_rank_order(ancestor, rank)
        } else if let Some(below) = self.shallowest_ranked_below(id) {
            Self::check_rank_order(ancestor, below)
        } else {
            Ok(())
        }
    }

    fn check_parent(&self, parent: Option<TaxonId>) -> Result<()> {
        match parent {
            Some(id) if !self.taxa.contains_key(&id) => Err(TaxonomyError::MissingParent(
                if self.tombstones.contains(&id) {
                    format!("parent taxon {id} was deleted")
                } else {
                    format!("parent taxon {id} does not exist")
                },
            )),
            _ => Ok(()),
        }
    }

    /// Validate a synonym list for `owner` (if it already exists) whose
    /// canonical name normalizes to `canonical_key`
    fn validate_synonyms(
        &self,
        owner: Option<TaxonId>,
        canonical_key: &str,
        synonyms: &[String],
    ) -> Result<BTreeSet<String>> {
        if synonyms.len() > MAX_SYNONYMS {
            return Err(TaxonomyError::InvalidInput(format!(
                "a taxon may carry at most {MAX_SYNONYMS} synonyms"
            )));
        }

        let mut seen = HashSet::new();
        let mut accepted = BTreeSet::new();
        for raw in synonyms {
            let synonym = validate_name(raw)?;
            let key = normalize_name(&synonym);
            if key == canonical_key {
                return Err(TaxonomyError::InvalidInput(format!(
                    "synonym '{synonym}' repeats the canonical name"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(TaxonomyError::InvalidInput(format!(
                    "synonym '{synonym}' is listed more than once"
                )));
            }
            if let Some(entry) = self.names.get(&key) {
                if Some(entry.id) != owner {
                    return Err(TaxonomyError::DuplicateName {
                        name: synonym,
                        existing: entry.id,
                    });
                }
            }
            accepted.insert(synonym);
        }
        Ok(accepted)
    }

    fn validate_new(&self, id: TaxonId, draft: TaxonDraft) -> Result<Taxon> {
        let name = validate_name(&draft.name)?;
        let key = normalize_name(&name);
        if let Some(entry) = self.names.get(&key) {
            return Err(TaxonomyError::DuplicateName {
                name,
                existing: entry.id,
            });
        }

        let synonyms = self.validate_synonyms(None, &key, &draft.synonyms)?;
        self.check_parent(draft.parent_id)?;
        Self::check_rank_order(self.nearest_ranked(draft.parent_id), &draft.rank)?;

        Ok(Taxon {
            id,
            name,
            rank: draft.rank,
            parent_id: draft.parent_id,
            synonyms,
        })
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    fn link_child(&mut self, parent: Option<TaxonId>, key: SortKey) {
        match parent {
            Some(id) => {
                self.children.entry(id).or_default().insert(key);
            }
            None => {
                self.roots.insert(key);
            }
        }
    }

    fn unlink_child(&mut self, parent: Option<TaxonId>, key: &SortKey) {
        match parent {
            Some(id) => {
                if let Some(set) = self.children.get_mut(&id) {
                    set.remove(key);
                    if set.is_empty() {
                        self.children.remove(&id);
                    }
                }
            }
            None => {
                self.roots.remove(key);
            }
        }
    }

    fn commit(&mut self, taxon: Taxon) {
        let key = taxon.sort_key();
        self.names.insert(
            key.0.clone(),
            NameEntry {
                id: taxon.id,
                kind: NameKind::Canonical,
            },
        );
        for synonym in &taxon.synonyms {
            self.names.insert(
                normalize_name(synonym),
                NameEntry {
                    id: taxon.id,
                    kind: NameKind::Synonym,
                },
            );
        }
        self.link_child(taxon.parent_id, key);
        self.taxa.insert(taxon.id, taxon);
    }

    /// Remove a taxon from every index without tombstoning it
    fn detach(&mut self, id: TaxonId) -> Option<Taxon> {
        let taxon = self.taxa.remove(&id)?;
        let key = taxon.sort_key();
        self.names.remove(&key.0);
        for synonym in &taxon.synonyms {
            self.names.remove(&normalize_name(synonym));
        }
        self.unlink_child(taxon.parent_id, &key);
        self.children.remove(&id);
        Some(taxon)
    }

    fn relink(&mut self, id: TaxonId, new_parent: Option<TaxonId>) {
        let (key, old_parent) = match self.taxa.get_mut(&id) {
            Some(taxon) => {
                let old_parent = std::mem::replace(&mut taxon.parent_id, new_parent);
                (taxon.sort_key(), old_parent)
            }
            None => return,
        };
        self.unlink_child(old_parent, &key);
        self.link_child(new_parent, key);
    }

    /// Insert a new taxon under a freshly assigned id
    ///
    /// # Errors
    ///
    /// Returns the specific violated invariant: `DuplicateName`,
    /// `MissingParent`, `RankOrderViolation` or `InvalidInput`.
    pub fn insert(&mut self, draft: TaxonDraft) -> Result<TaxonId> {
        let following = id_after(self.next_id)?;
        let taxon = self.validate_new(TaxonId(self.next_id), draft)?;
        let id = taxon.id;
        self.next_id = following;
        self.commit(taxon);
        Ok(id)
    }

    /// Insert a taxon that already carries an id (snapshot restore)
    pub(crate) fn insert_restored(&mut self, taxon: Taxon) -> Result<()> {
        if self.taxa.contains_key(&taxon.id) {
            return Err(TaxonomyError::InvalidInput(format!(
                "taxon id {} appears more than once",
                taxon.id
            )));
        }
        let id = taxon.id;
        let following = id_after(id.0)?;
        let draft = TaxonDraft {
            name: taxon.name,
            rank: taxon.rank,
            parent_id: taxon.parent_id,
            synonyms: taxon.synonyms.into_iter().collect(),
        };
        let taxon = self.validate_new(id, draft)?;
        self.next_id = self.next_id.max(following);
        self.commit(taxon);
        Ok(())
    }

    /// Drop taxa inserted by a failed batch and rewind the id counter
    pub(crate) fn discard(&mut self, ids: &[TaxonId], next_id: TaxonId) {
        for id in ids.iter().rev() {
            self.detach(*id);
        }
        self.next_id = next_id.0;
    }

    /// Mark ids as deleted (snapshot restore)
    pub(crate) fn restore_tombstones(&mut self, tombstones: BTreeSet<TaxonId>) -> Result<()> {
        if let Some(id) = tombstones.iter().find(|id| self.taxa.contains_key(id)) {
            return Err(TaxonomyError::InvalidInput(format!(
                "taxon {id} is both active and deleted"
            )));
        }
        if let Some(max) = tombstones.iter().next_back() {
            self.next_id = self.next_id.max(id_after(max.0)?);
        }
        self.tombstones = tombstones;
        Ok(())
    }

    pub(crate) fn advance_next_id(&mut self, next_id: TaxonId) {
        self.next_id = self.next_id.max(next_id.0);
    }

    /// Delete a taxon according to `policy`, returning the removed ids
    /// (the taxon itself first, then any cascaded descendants in pre-order)
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, or `HasChildren` under [`DeletePolicy::Restrict`].
    pub fn remove(&mut self, id: TaxonId, policy: DeletePolicy) -> Result<Vec<TaxonId>> {
        let parent = self.get(id)?.parent_id;
        let count = self.child_count(id);

        let removed = match policy {
            DeletePolicy::Restrict if count > 0 => {
                return Err(TaxonomyError::HasChildren { id, count });
            }
            DeletePolicy::Restrict => vec![id],
            DeletePolicy::Cascade => {
                let mut removed = vec![id];
                removed.extend(self.descendants(id)?.iter().map(|t| t.id));
                removed
            }
            DeletePolicy::Promote => {
                let orphans: Vec<TaxonId> = self.child_ids(id).collect();
                for child in orphans {
                    self.relink(child, parent);
                }
                vec![id]
            }
        };

        // Leaves first so every parent still exists while its children go
        for doomed in removed.iter().rev() {
            self.detach(*doomed);
            self.tombstones.insert(*doomed);
        }
        Ok(removed)
    }

    /// Move a taxon (with its subtree) under a new parent, or to the root level
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `MissingParent`, `CycleDetected` or `RankOrderViolation`.
    pub fn reparent(&mut self, id: TaxonId, new_parent: Option<TaxonId>) -> Result<()> {
        let taxon = self.get(id)?;
        if taxon.parent_id == new_parent {
            return Ok(());
        }
        let rank = taxon.rank.clone();

        if let Some(parent) = new_parent {
            self.check_parent(Some(parent))?;
            let mut cursor = Some(parent);
            while let Some(ancestor) = cursor {
                if ancestor == id {
                    return Err(TaxonomyError::CycleDetected {
                        id,
                        new_parent: parent,
                    });
                }
                cursor = self.taxa[&ancestor].parent_id;
            }
        }

        self.check_subtree_placement(id, &rank, new_parent)?;
        self.relink(id, new_parent);
        Ok(())
    }

    /// Change the canonical name of a taxon
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidInput` or `DuplicateName` (including when
    /// the new name is already one of the taxon's own synonyms).
    pub fn rename(&mut self, id: TaxonId, new_name: &str) -> Result<()> {
        let name = validate_name(new_name)?;
        let key = normalize_name(&name);
        let taxon = self.get(id)?;
        let old_key = taxon.sort_key();
        let parent = taxon.parent_id;

        if let Some(entry) = self.names.get(&key) {
            if entry.id != id || entry.kind == NameKind::Synonym {
                return Err(TaxonomyError::DuplicateName {
                    name,
                    existing: entry.id,
                });
            }
        }

        self.names.remove(&old_key.0);
        self.names.insert(
            key.clone(),
            NameEntry {
                id,
                kind: NameKind::Canonical,
            },
        );
        self.unlink_child(parent, &old_key);
        self.link_child(parent, (key, id));
        if let Some(taxon) = self.taxa.get_mut(&id) {
            taxon.name = name;
        }
        Ok(())
    }

    /// Change the rank of a taxon
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `RankOrderViolation` against either the nearest
    /// ranked ancestor or the nearest ranked descendants.
    pub fn set_rank(&mut self, id: TaxonId, rank: Rank) -> Result<()> {
        let taxon = self.get(id)?;
        if taxon.rank == rank {
            return Ok(());
        }

        let ancestor = self.nearest_ranked(taxon.parent_id);
        let below = self.shallowest_ranked_below(id);
        if rank.is_ranked() {
            Self::check_rank_order(ancestor, &rank)?;
            if let Some(below) = below {
                Self::check_rank_order(Some(&rank), below)?;
            }
        } else if let Some(below) = below {
            Self::check_rank_order(ancestor, below)?;
        }

        if let Some(taxon) = self.taxa.get_mut(&id) {
            taxon.rank = rank;
        }
        Ok(())
    }

    /// Attach a synonym. Returns `false` if the taxon already carries it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidInput` or `DuplicateName`.
    pub fn add_synonym(&mut self, id: TaxonId, synonym: &str) -> Result<bool> {
        let synonym = validate_name(synonym)?;
        let key = normalize_name(&synonym);
        let taxon = self.get(id)?;

        if key == taxon.normalized_name() {
            return Err(TaxonomyError::InvalidInput(format!(
                "synonym '{synonym}' repeats the canonical name"
            )));
        }
        if let Some(entry) = self.names.get(&key) {
            if entry.id == id {
                return Ok(false);
            }
            return Err(TaxonomyError::DuplicateName {
                name: synonym,
                existing: entry.id,
            });
        }
        if taxon.synonyms.len() >= MAX_SYNONYMS {
            return Err(TaxonomyError::InvalidInput(format!(
                "a taxon may carry at most {MAX_SYNONYMS} synonyms"
            )));
        }

        self.names.insert(
            key,
            NameEntry {
                id,
                kind: NameKind::Synonym,
            },
        );
        if let Some(taxon) = self.taxa.get_mut(&id) {
            taxon.synonyms.insert(synonym);
        }
        Ok(true)
    }

    /// Detach a synonym (matched case-insensitively)
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the taxon does not exist or does not carry the synonym.
    pub fn remove_synonym(&mut self, id: TaxonId, synonym: &str) -> Result<()> {
        self.get(id)?;
        let key = normalize_name(synonym);
        match self.names.get(&key) {
            Some(entry) if entry.id == id && entry.kind == NameKind::Synonym => {}
            _ => {
                return Err(TaxonomyError::NotFound(format!(
                    "synonym '{synonym}' of taxon {id}"
                )))
            }
        }

        self.names.remove(&key);
        if let Some(taxon) = self.taxa.get_mut(&id) {
            taxon.synonyms.retain(|s| normalize_name(s) != key);
        }
        Ok(())
    }

    /// Replace the full synonym set of a taxon
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidInput` or `DuplicateName`.
    pub fn set_synonyms(&mut self, id: TaxonId, synonyms: &[String]) -> Result<()> {
        let taxon = self.get(id)?;
        let accepted = self.validate_synonyms(Some(id), &taxon.normalized_name(), synonyms)?;
        let previous = taxon.synonyms.clone();

        for synonym in &previous {
            self.names.remove(&normalize_name(synonym));
        }
        for synonym in &accepted {
            self.names.insert(
                normalize_name(synonym),
                NameEntry {
                    id,
                    kind: NameKind::Synonym,
                },
            );
        }
        if let Some(taxon) = self.taxa.get_mut(&id) {
            taxon.synonyms = accepted;
        }
        Ok(())
    }

    /// Delete every taxon. Ids are tombstoned, so numbering continues.
    pub fn clear(&mut self) -> usize {
        let removed = self.taxa.len();
        self.tombstones.extend(self.taxa.keys().copied());
        self.taxa.clear();
        self.names.clear();
        self.children.clear();
        self.roots.clear();
        removed
    }

    // ------------------------------------------------------------------
    // Auditing
    // ------------------------------------------------------------------

    /// Full consistency audit. Returns a description of every violation found.
    #[must_use]
    pub fn check_invariants(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut expected_names = 0;

        for taxon in self.taxa.values() {
            let key = taxon.sort_key();
            expected_names += 1 + taxon.synonyms.len();

            if self.tombstones.contains(&taxon.id) {
                problems.push(format!("taxon {} is active but tombstoned", taxon.id));
            }
            if taxon.id.0 >= self.next_id {
                problems.push(format!("taxon {} is not below the id counter", taxon.id));
            }

            // Parent chain must end at a root within len() steps
            let mut steps = 0;
            let mut cursor = taxon.parent_id;
            while let Some(parent) = cursor {
                steps += 1;
                if steps > self.taxa.len() {
                    problems.push(format!("taxon {} is part of a cycle", taxon.id));
                    break;
                }
                match self.taxa.get(&parent) {
                    Some(p) => cursor = p.parent_id,
                    None => {
                        problems.push(format!("taxon {} has missing ancestor {parent}", taxon.id));
                        break;
                    }
                }
            }

            if taxon.rank.is_ranked() {
                if let Err(e) = Self::check_rank_order(self.nearest_ranked(taxon.parent_id), &taxon.rank) {
                    problems.push(format!("taxon {}: {e}", taxon.id));
                }
            }

            if !self.child_set(taxon.parent_id).is_some_and(|set| set.contains(&key)) {
                problems.push(format!("taxon {} missing from its parent's child set", taxon.id));
            }

            if self.names.get(&key.0)
                != Some(&NameEntry {
                    id: taxon.id,
                    kind: NameKind::Canonical,
                })
            {
                problems.push(format!("canonical name of taxon {} is not indexed", taxon.id));
            }
            for synonym in &taxon.synonyms {
                if self.names.get(&normalize_name(synonym))
                    != Some(&NameEntry {
                        id: taxon.id,
                        kind: NameKind::Synonym,
                    })
                {
                    problems.push(format!("synonym '{synonym}' of taxon {} is not indexed", taxon.id));
                }
            }
        }

        if self.names.len() != expected_names {
            problems.push(format!(
                "name table holds {} entries, expected {expected_names}",
                self.names.len()
            ));
        }

        let linked = self.roots.len() + self.children.values().map(BTreeSet::len).sum::<usize>();
        if linked != self.taxa.len() {
            problems.push(format!(
                "child sets reference {linked} taxa, expected {}",
                self.taxa.len()
            ));
        }

        problems
    }
}

/// The id following `id`; ids are never reused, so the counter cannot wrap
fn id_after(id: u64) -> Result<u64> {
    id.checked_add(1)
        .ok_or_else(|| TaxonomyError::InvalidInput("id space exhausted".to_string()))
}
