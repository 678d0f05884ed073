use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::core::error::{Result, TaxonomyError};
use crate::core::rank::RankSchema;
use crate::core::taxon::{BatchInserted, BatchTaxon, NewTaxon, ParentRef, Taxon, TaxonUpdate};
use crate::core::types::{DeletePolicy, Rank, TaxonId, UNRANKED};
use crate::taxonomy::index::{NameKind, TaxonDraft, TaxonomyIndex};
use crate::taxonomy::observer::{OperationEvent, StoreObserver, TracingObserver};
use crate::taxonomy::page::{decode_cursor, decode_sort_key, encode_cursor, encode_sort_key, Page, PageRequest};
use crate::taxonomy::query::TaxonQuery;
use crate::taxonomy::snapshot::{SnapshotError, TaxonomySnapshot};
use crate::utils::validation::{check_batch_limit, normalize_name};

/// A name search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// The normalized name that matched
    pub matched: String,

    /// Whether the match was on the canonical name or a synonym
    pub kind: NameKind,

    pub taxon: Taxon,
}

/// Result of a boolean query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// The query rendered as an S-expression
    pub query: String,
    pub count: usize,
    pub taxa: Vec<Taxon>,
}

/// Summary counts for the whole store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub taxa: usize,
    pub roots: usize,
    pub synonyms: usize,
    pub deleted: usize,
    pub next_id: TaxonId,
    /// Taxa per rank, in schema order, then `unranked`
    pub ranks: Vec<RankCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankCount {
    pub rank: String,
    pub count: usize,
}

/// Thread-safe taxonomy store.
///
/// All reads and writes go through this type. Reads share the lock; every
/// mutation holds it exclusively for validation and apply, so concurrent
/// readers never observe a half-applied change. Results are returned as
/// owned values and the index itself never leaves the store.
pub struct TaxonStore {
    schema: RankSchema,
    index: RwLock<TaxonomyIndex>,
    observer: Arc<dyn StoreObserver>,
}

impl std::fmt::Debug for TaxonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("TaxonStore");
        debug.field("schema", &self.schema);
        // Never block here: the formatting thread may hold the write lock
        if let Ok(index) = self.index.try_read() {
            debug.field("taxa", &index.len());
        }
        debug.finish_non_exhaustive()
    }
}

impl TaxonStore {
    /// Create an empty store that logs through `tracing`
    #[must_use]
    pub fn new(schema: RankSchema) -> Self {
        Self::with_observer(schema, Arc::new(TracingObserver))
    }

    /// Create an empty store reporting to a custom observer
    #[must_use]
    pub fn with_observer(schema: RankSchema, observer: Arc<dyn StoreObserver>) -> Self {
        Self {
            schema,
            index: RwLock::new(TaxonomyIndex::new()),
            observer,
        }
    }

    /// Create a store preloaded from a snapshot, using the snapshot's rank schema
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot's schema or taxa violate any invariant.
    pub fn from_snapshot(
        snapshot: &TaxonomySnapshot,
        observer: Arc<dyn StoreObserver>,
    ) -> std::result::Result<Self, SnapshotError> {
        let schema = snapshot.schema()?;
        let index = snapshot.restore(&schema)?;
        tracing::info!(
            taxa = index.len(),
            deleted = index.tombstones().len(),
            "Restored taxonomy snapshot"
        );
        Ok(Self {
            schema,
            index: RwLock::new(index),
            observer,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &RankSchema {
        &self.schema
    }

    // Mutations never panic between validation and apply, so a poisoned
    // lock still guards a consistent index.
    fn read(&self) -> RwLockReadGuard<'_, TaxonomyIndex> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TaxonomyIndex> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run an operation and report it to the observer once the lock is released
    fn observe<T>(&self, operation: &'static str, target: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = run();
        self.observer.on_operation(&OperationEvent {
            operation,
            target,
            outcome: result.as_ref().map(|_| ()),
            duration: start.elapsed(),
        });
        result
    }

    /// [`observe`](Self::observe) for reads that cannot fail
    fn observe_read<T>(&self, operation: &'static str, run: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let value = run();
        self.observer.on_operation(&OperationEvent {
            operation,
            target: "",
            outcome: Ok(()),
            duration: start.elapsed(),
        });
        value
    }

    fn draft(&self, name: String, rank: &str, parent_id: Option<TaxonId>, synonyms: Vec<String>) -> Result<TaxonDraft> {
        Ok(TaxonDraft {
            name,
            rank: self.schema.rank_of(rank)?,
            parent_id,
            synonyms,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Number of active taxa
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Look up a taxon by id
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown or deleted ids.
    pub fn get(&self, id: TaxonId) -> Result<Taxon> {
        self.observe("get", &format!("id={id}"), || self.read().get(id).cloned())
    }

    /// Look up a taxon by canonical name or synonym, case-insensitively
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no active taxon carries the name.
    pub fn get_by_name(&self, name: &str) -> Result<Taxon> {
        self.observe("get_by_name", &format!("name={name:?}"), || {
            self.read().get_by_name(name).cloned()
        })
    }

    /// Direct children of a taxon, one page at a time
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown parent, `InvalidInput` for a bad token
    /// or page size.
    pub fn children(&self, id: TaxonId, page: &PageRequest) -> Result<Page<Taxon>> {
        self.observe("children", &format!("id={id}"), || self.child_page(Some(id), page))
    }

    /// Root taxa, one page at a time
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad token or page size.
    pub fn roots(&self, page: &PageRequest) -> Result<Page<Taxon>> {
        self.observe("roots", "", || self.child_page(None, page))
    }

    fn child_page(&self, parent: Option<TaxonId>, page: &PageRequest) -> Result<Page<Taxon>> {
        let limit = page.page_size()?;
        let after = page.cursor.as_deref().map(decode_sort_key).transpose()?;

        let index = self.read();
        let (taxa, has_more) = index.children_page(parent, after.as_ref(), limit)?;
        let next_cursor = if has_more {
            taxa.last().map(|t| encode_sort_key(&t.sort_key()))
        } else {
            None
        };

        Ok(Page {
            items: taxa.into_iter().cloned().collect(),
            next_cursor,
        })
    }

    /// Ancestors from the immediate parent up to the root
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn ancestors(&self, id: TaxonId) -> Result<Vec<Taxon>> {
        self.observe("ancestors", &format!("id={id}"), || {
            Ok(self.read().ancestors(id)?.into_iter().cloned().collect())
        })
    }

    /// Whole subtree below a taxon, in pre-order
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn descendants(&self, id: TaxonId) -> Result<Vec<Taxon>> {
        self.observe("descendants", &format!("id={id}"), || {
            Ok(self.read().descendants(id)?.into_iter().cloned().collect())
        })
    }

    /// Other children of the same parent
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn siblings(&self, id: TaxonId) -> Result<Vec<Taxon>> {
        self.observe("siblings", &format!("id={id}"), || {
            Ok(self.read().siblings(id)?.into_iter().cloned().collect())
        })
    }

    /// Prefix search over canonical names and synonyms, in name order
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank prefix, a bad token or page size.
    pub fn search(&self, prefix: &str, page: &PageRequest) -> Result<Page<SearchHit>> {
        self.observe("search", &format!("prefix={prefix:?}"), || {
            if normalize_name(prefix).is_empty() {
                return Err(TaxonomyError::InvalidInput(
                    "search prefix must not be blank".to_string(),
                ));
            }
            let limit = page.page_size()?;
            let after = page.cursor.as_deref().map(decode_cursor).transpose()?;

            let index = self.read();
            let (hits, has_more) = index.search_page(prefix, after.as_deref(), limit);
            let next_cursor = if has_more {
                hits.last().map(|(name, _)| encode_cursor(name))
            } else {
                None
            };

            let items = hits
                .into_iter()
                .map(|(name, entry)| {
                    index.get(entry.id).map(|taxon| SearchHit {
                        matched: name.to_string(),
                        kind: entry.kind,
                        taxon: taxon.clone(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Page { items, next_cursor })
        })
    }

    /// Evaluate a boolean query; results ordered by name, ties by id
    ///
    /// # Errors
    ///
    /// Returns `InvalidRank` or `NotFound` for bad query terms.
    pub fn query(&self, query: &TaxonQuery) -> Result<QueryResult> {
        let rendered = query.to_string();
        self.observe("query", &rendered, || {
            let index = self.read();
            let ids = query.evaluate(&index, &self.schema)?;
            let mut taxa = ids
                .into_iter()
                .map(|id| index.get(id).cloned())
                .collect::<Result<Vec<_>>>()?;
            taxa.sort_by_cached_key(Taxon::sort_key);

            Ok(QueryResult {
                query: rendered.clone(),
                count: taxa.len(),
                taxa,
            })
        })
    }

    /// Summary counts
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.observe_read("stats", || self.compute_stats())
    }

    fn compute_stats(&self) -> StoreStats {
        let index = self.read();
        let mut per_rank: HashMap<&str, usize> = HashMap::new();
        let mut roots = 0;
        let mut synonyms = 0;
        for taxon in index.iter() {
            *per_rank.entry(taxon.rank.name()).or_default() += 1;
            roots += usize::from(taxon.is_root());
            synonyms += taxon.synonyms.len();
        }

        let ranks = self
            .schema
            .names()
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(UNRANKED))
            .map(|rank| RankCount {
                rank: rank.to_string(),
                count: per_rank.get(rank).copied().unwrap_or(0),
            })
            .collect();

        StoreStats {
            taxa: index.len(),
            roots,
            synonyms,
            deleted: index.tombstones().len(),
            next_id: index.next_id(),
            ranks,
        }
    }

    /// Capture the full store state
    #[must_use]
    pub fn snapshot(&self) -> TaxonomySnapshot {
        self.observe_read("snapshot", || TaxonomySnapshot::capture(&self.read(), &self.schema))
    }

    /// Full consistency audit; empty when every invariant holds
    #[must_use]
    pub fn check_invariants(&self) -> Vec<String> {
        self.observe_read("check_invariants", || self.read().check_invariants())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Insert a new taxon and return it with its assigned id
    ///
    /// # Errors
    ///
    /// Returns `InvalidRank`, `DuplicateName`, `MissingParent`,
    /// `RankOrderViolation` or `InvalidInput`.
    pub fn insert(&self, new: NewTaxon) -> Result<Taxon> {
        let target = format!("name={:?} rank={} parent={:?}", new.name, new.rank, new.parent_id);
        self.observe("insert", &target, || {
            let draft = self.draft(new.name, &new.rank, new.parent_id, new.synonyms)?;
            let mut index = self.write();
            let id = index.insert(draft)?;
            index.get(id).cloned()
        })
    }

    /// Insert many taxa at once, parents resolved by batch key or existing id.
    ///
    /// Entries whose parent has not been inserted yet are deferred and retried
    /// once, in input order. The batch is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns `MissingParent` for parents still unresolved after the retry,
    /// `InvalidInput` for duplicate keys or oversized batches, or the first
    /// invariant violation raised by an entry.
    pub fn insert_batch(&self, batch: Vec<BatchTaxon>) -> Result<Vec<BatchInserted>> {
        self.observe("insert_batch", &format!("entries={}", batch.len()), || {
            check_batch_limit(batch.len())?;

            let mut positions: HashMap<&str, usize> = HashMap::with_capacity(batch.len());
            for (position, entry) in batch.iter().enumerate() {
                if positions.insert(entry.key.as_str(), position).is_some() {
                    return Err(TaxonomyError::InvalidInput(format!(
                        "batch key '{}' is used more than once",
                        entry.key
                    )));
                }
            }

            // Resolve ranks before taking the lock
            let ranks = batch
                .iter()
                .map(|entry| self.schema.rank_of(&entry.rank))
                .collect::<Result<Vec<_>>>()?;

            let mut index = self.write();
            let next_id = index.next_id();
            let mut assigned: Vec<Option<TaxonId>> = vec![None; batch.len()];
            let mut inserted: Vec<TaxonId> = Vec::with_capacity(batch.len());

            let outcome = (|| -> Result<()> {
                let mut deferred = Vec::new();
                for (position, entry) in batch.iter().enumerate() {
                    match resolve_parent(entry, &assigned, &positions, &index)? {
                        Some(parent) => {
                            let id = insert_entry(&mut index, entry, &ranks[position], parent)?;
                            assigned[position] = Some(id);
                            inserted.push(id);
                        }
                        None => deferred.push(position),
                    }
                }

                for position in deferred {
                    let entry = &batch[position];
                    let parent = resolve_parent(entry, &assigned, &positions, &index)?
                        .ok_or_else(|| unresolved_parent(entry))?;
                    let id = insert_entry(&mut index, entry, &ranks[position], parent)?;
                    assigned[position] = Some(id);
                    inserted.push(id);
                }
                Ok(())
            })();

            if let Err(error) = outcome {
                index.discard(&inserted, next_id);
                return Err(error);
            }

            Ok(batch
                .iter()
                .zip(assigned)
                .filter_map(|(entry, id)| {
                    id.map(|id| BatchInserted {
                        key: entry.key.clone(),
                        id,
                    })
                })
                .collect())
        })
    }

    /// Apply several changes to one taxon atomically.
    ///
    /// Changes are applied as synonyms, name, rank, then parent; if a later
    /// step fails the earlier ones are reverted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation encountered.
    pub fn update(&self, id: TaxonId, update: TaxonUpdate) -> Result<Taxon> {
        self.observe("update", &format!("id={id}"), || {
            if update.is_empty() {
                return self.read().get(id).cloned();
            }
            let rank = update.rank.as_deref().map(|r| self.schema.rank_of(r)).transpose()?;

            let mut index = self.write();
            let before = index.get(id)?.clone();

            let outcome = (|| -> Result<()> {
                if let Some(synonyms) = &update.synonyms {
                    index.set_synonyms(id, synonyms)?;
                }
                if let Some(name) = &update.name {
                    index.rename(id, name)?;
                }
                if let Some(rank) = rank {
                    index.set_rank(id, rank)?;
                }
                if let Some(parent) = update.parent_id {
                    index.reparent(id, parent)?;
                }
                Ok(())
            })();

            if let Err(error) = outcome {
                revert(&mut index, &before);
                return Err(error);
            }
            index.get(id).cloned()
        })
    }

    /// Change the canonical name of a taxon
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `DuplicateName` or `InvalidInput`.
    pub fn rename(&self, id: TaxonId, name: &str) -> Result<Taxon> {
        self.observe("rename", &format!("id={id} name={name:?}"), || {
            let mut index = self.write();
            index.rename(id, name)?;
            index.get(id).cloned()
        })
    }

    /// Change the rank of a taxon
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidRank` or `RankOrderViolation`.
    pub fn set_rank(&self, id: TaxonId, rank: &str) -> Result<Taxon> {
        self.observe("set_rank", &format!("id={id} rank={rank}"), || {
            let rank = self.schema.rank_of(rank)?;
            let mut index = self.write();
            index.set_rank(id, rank)?;
            index.get(id).cloned()
        })
    }

    /// Move a taxon under a new parent, or to the root level with `None`
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `MissingParent`, `CycleDetected` or `RankOrderViolation`.
    pub fn reparent(&self, id: TaxonId, new_parent: Option<TaxonId>) -> Result<Taxon> {
        self.observe("reparent", &format!("id={id} parent={new_parent:?}"), || {
            let mut index = self.write();
            index.reparent(id, new_parent)?;
            index.get(id).cloned()
        })
    }

    /// Delete a taxon, returning every removed id
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, or `HasChildren` under [`DeletePolicy::Restrict`].
    pub fn delete(&self, id: TaxonId, policy: DeletePolicy) -> Result<Vec<TaxonId>> {
        self.observe("delete", &format!("id={id} policy={policy}"), || {
            self.write().remove(id, policy)
        })
    }

    /// Attach a synonym; adding one the taxon already carries changes nothing
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `DuplicateName` or `InvalidInput`.
    pub fn add_synonym(&self, id: TaxonId, synonym: &str) -> Result<Taxon> {
        self.observe("add_synonym", &format!("id={id} synonym={synonym:?}"), || {
            let mut index = self.write();
            index.add_synonym(id, synonym)?;
            index.get(id).cloned()
        })
    }

    /// Detach a synonym
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the taxon or the synonym is absent.
    pub fn remove_synonym(&self, id: TaxonId, synonym: &str) -> Result<Taxon> {
        self.observe("remove_synonym", &format!("id={id} synonym={synonym:?}"), || {
            let mut index = self.write();
            index.remove_synonym(id, synonym)?;
            index.get(id).cloned()
        })
    }

    /// Delete every taxon, returning how many were removed
    pub fn clear(&self) -> usize {
        self.observe("clear", "", || Ok(self.write().clear()))
            .unwrap_or_default()
    }
}

/// Parent of a batch entry if it can be placed now. `Ok(None)` means the
/// entry references a batch key that has not been inserted yet.
fn resolve_parent(
    entry: &BatchTaxon,
    assigned: &[Option<TaxonId>],
    positions: &HashMap<&str, usize>,
    index: &TaxonomyIndex,
) -> Result<Option<Option<TaxonId>>> {
    match &entry.parent {
        None => Ok(Some(None)),
        Some(ParentRef::Id(id)) => {
            if index.contains(*id) {
                Ok(Some(Some(*id)))
            } else {
                Err(TaxonomyError::MissingParent(format!(
                    "batch entry '{}' references taxon {id}, which does not exist",
                    entry.key
                )))
            }
        }
        Some(ParentRef::Key(key)) => match positions.get(key.as_str()) {
            Some(&position) => Ok(assigned[position].map(Some)),
            None => Err(unresolved_parent(entry)),
        },
    }
}

fn unresolved_parent(entry: &BatchTaxon) -> TaxonomyError {
    let parent = match &entry.parent {
        Some(ParentRef::Key(key)) => format!("key '{key}'"),
        Some(ParentRef::Id(id)) => format!("taxon {id}"),
        None => "nothing".to_string(),
    };
    TaxonomyError::MissingParent(format!(
        "batch entry '{}' references {parent}, which could not be resolved",
        entry.key
    ))
}

fn insert_entry(
    index: &mut TaxonomyIndex,
    entry: &BatchTaxon,
    rank: &Rank,
    parent: Option<TaxonId>,
) -> Result<TaxonId> {
    index.insert(TaxonDraft {
        name: entry.name.clone(),
        rank: rank.clone(),
        parent_id: parent,
        synonyms: entry.synonyms.clone(),
    })
}

/// Restore a taxon's fields after a failed multi-step update. Steps are
/// undone in reverse order, which always leads back through valid states.
fn revert(index: &mut TaxonomyIndex, before: &Taxon) {
    let id = before.id;
    let synonyms: Vec<String> = before.synonyms.iter().cloned().collect();
    let steps = [
        index.reparent(id, before.parent_id),
        index.set_rank(id, before.rank.clone()),
        index.rename(id, &before.name),
        index.set_synonyms(id, &synonyms),
    ];
    for step in steps {
        if let Err(error) = step {
            tracing::error!(taxon = %id, %error, "Failed to revert partial update");
        }
    }
}
