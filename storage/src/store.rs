use crate::index::CitationIndex;
use crate::wal::{Wal, WalError};
use citegraph_core::error::{CitegraphError, ErrorCode};
use citegraph_core::model::{CacheRecord, Edge, EdgeKind, Identifier, Paper, PaperFilter};
use rkyv::ser::{serializers::AllocSerializer, Serializer};
use rkyv::{Archive, Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info};

pub const DEFAULT_SEARCH_LIMIT: usize = 50;
pub const DEFAULT_RELATED_LIMIT: usize = 15;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("Serialization error")]
    Serialization,
}

impl CitegraphError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Wal(err) => err.error_code(),
            StoreError::Serialization => ErrorCode::Internal,
        }
    }
}

/// WAL entry types for durability
#[derive(Archive, Deserialize, Serialize, Debug, Clone)]
#[archive(check_bytes)]
pub enum WalEntry {
    Put(CacheRecord),
    PutEdges(Vec<Edge>),
    Transaction(Vec<TxOperation>),
}

#[derive(Archive, Deserialize, Serialize, Debug, Clone)]
#[archive(check_bytes)]
pub enum TxOperation {
    Put(CacheRecord),
    PutEdges(Vec<Edge>),
}

/// One mutation inside a [`LocalStore::commit`] batch.
#[derive(Debug, Clone)]
pub enum StoreMutation {
    /// Insert or overwrite by identifier.
    Upsert(CacheRecord),
    /// Insert only when no record exists for the identifier.
    InsertIfAbsent(CacheRecord),
    Edges(Vec<Edge>),
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoreStats {
    pub paper_count: usize,
    pub fully_expanded_count: usize,
    pub edge_count: usize,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

#[derive(Default)]
struct StoreState {
    records: HashMap<Identifier, CacheRecord>,
    index: CitationIndex,
}

impl StoreState {
    fn apply(&mut self, operation: &TxOperation) {
        match operation {
            TxOperation::Put(record) => {
                self.records
                    .insert(record.identifier().clone(), record.clone());
            }
            TxOperation::PutEdges(edges) => {
                for edge in edges {
                    self.index.add_edge(edge);
                }
            }
        }
    }

    fn apply_entry(&mut self, entry: &WalEntry) {
        match entry {
            WalEntry::Put(record) => self.apply(&TxOperation::Put(record.clone())),
            WalEntry::PutEdges(edges) => {
                for edge in edges {
                    self.index.add_edge(edge);
                }
            }
            WalEntry::Transaction(operations) => {
                for operation in operations {
                    self.apply(operation);
                }
            }
        }
    }

    /// Edges not yet stored, self-loops and in-batch duplicates removed.
    fn new_edges(&self, edges: &[Edge]) -> Vec<Edge> {
        let mut seen = std::collections::HashSet::new();
        edges
            .iter()
            .filter(|edge| edge.citing != edge.cited && !self.index.contains(edge))
            .filter(|edge| seen.insert((*edge).clone()))
            .cloned()
            .collect()
    }
}

/// Durable paper/edge cache: a WAL on disk replayed into in-memory maps.
///
/// Every write is a single WAL record, fsynced before the in-memory state
/// changes under the write lock, so readers never see a partial record.
pub struct LocalStore {
    wal: Arc<Mutex<Option<Wal>>>,
    tx_lock: Arc<Mutex<()>>,
    state: Arc<RwLock<StoreState>>,
}

impl LocalStore {
    /// Open a store, replaying its WAL to restore previous state.
    pub async fn open(wal_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut wal = Wal::open(&wal_path).await?;
        let mut state = StoreState::default();

        let last_lsn = wal
            .replay(|lsn, data| {
                let archived = rkyv::check_archived_root::<WalEntry>(&data[..])
                    .map_err(|_| WalError::UndecodableRecord { lsn })?;
                let entry: WalEntry = archived
                    .deserialize(&mut rkyv::Infallible)
                    .map_err(|_| WalError::UndecodableRecord { lsn })?;
                state.apply_entry(&entry);
                Ok(())
            })
            .await?;

        info!(
            path = %wal.path().display(),
            last_lsn,
            papers = state.records.len(),
            edges = state.index.edge_count(),
            "local store opened"
        );

        Ok(Self {
            wal: Arc::new(Mutex::new(Some(wal))),
            tx_lock: Arc::new(Mutex::new(())),
            state: Arc::new(RwLock::new(state)),
        })
    }

    pub async fn lookup(&self, id: &Identifier) -> Option<CacheRecord> {
        let state = self.state.read().await;
        state.records.get(id).cloned()
    }

    /// Insert or overwrite by identifier; last write wins.
    pub async fn upsert(&self, record: CacheRecord) -> Result<(), StoreError> {
        self.commit(vec![StoreMutation::Upsert(record)]).await
    }

    /// Returns the number of edges that were not already stored.
    pub async fn upsert_edges(&self, edges: Vec<Edge>) -> Result<usize, StoreError> {
        let fresh = {
            let _tx_guard = self.tx_lock.lock().await;
            let fresh = self.state.read().await.new_edges(&edges);
            if fresh.is_empty() {
                return Ok(0);
            }
            self.write_and_apply(WalEntry::PutEdges(fresh.clone()))
                .await?;
            fresh
        };
        Ok(fresh.len())
    }

    /// Apply a batch as one WAL record. Operations that would not change
    /// anything (existing edges, records already present for
    /// `InsertIfAbsent`) are left out of the record.
    pub async fn commit(&self, mutations: Vec<StoreMutation>) -> Result<(), StoreError> {
        if mutations.is_empty() {
            return Ok(());
        }

        let _tx_guard = self.tx_lock.lock().await;

        let operations = {
            let state = self.state.read().await;
            let mut operations = Vec::with_capacity(mutations.len());
            let mut pending: std::collections::HashSet<Identifier> =
                std::collections::HashSet::new();

            for mutation in mutations {
                match mutation {
                    StoreMutation::Upsert(record) => {
                        pending.insert(record.identifier().clone());
                        operations.push(TxOperation::Put(record));
                    }
                    StoreMutation::InsertIfAbsent(record) => {
                        let id = record.identifier();
                        if !state.records.contains_key(id) && pending.insert(id.clone()) {
                            operations.push(TxOperation::Put(record));
                        }
                    }
                    StoreMutation::Edges(edges) => {
                        let fresh = state.new_edges(&edges);
                        if !fresh.is_empty() {
                            operations.push(TxOperation::PutEdges(fresh));
                        }
                    }
                }
            }
            operations
        };

        if operations.is_empty() {
            return Ok(());
        }
        debug!(operations = operations.len(), "committing store batch");
        self.write_and_apply(WalEntry::Transaction(operations)).await
    }

    /// Caller must hold `tx_lock`.
    async fn write_and_apply(&self, entry: WalEntry) -> Result<(), StoreError> {
        let bytes = serialize_wal_entry(&entry)?;

        {
            let mut guard = self.wal.lock().await;
            let wal = guard.as_mut().ok_or(WalError::Closed)?;
            wal.append(&bytes).await?;
            wal.flush().await?;
        }

        let mut state = self.state.write().await;
        state.apply_entry(&entry);
        Ok(())
    }

    /// Neighbors from persisted edges only, in insertion order.
    pub async fn query_neighbors(&self, id: &Identifier, kind: EdgeKind) -> Vec<Identifier> {
        let state = self.state.read().await;
        state.index.neighbors(id, kind)
    }

    /// Lazily yields papers matching `filter`, ordered by identifier.
    ///
    /// The scan holds a read lock until it is dropped; writers wait for it.
    pub async fn all_papers(&self, filter: PaperFilter) -> PaperScan {
        let guard = self.state.clone().read_owned().await;
        let mut ids: Vec<Identifier> = guard.records.keys().cloned().collect();
        ids.sort();
        PaperScan {
            guard,
            ids: ids.into_iter(),
            filter,
        }
    }

    /// Case-insensitive substring search over title, authors and keywords.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<Paper> {
        let needle = query.trim().to_lowercase();
        let state = self.state.read().await;

        let mut hits: Vec<Paper> = state
            .records
            .values()
            .map(|record| &record.paper)
            .filter(|paper| paper_matches(paper, &needle))
            .cloned()
            .collect();

        hits.sort_by(|a, b| {
            b.citation_count
                .cmp(&a.citation_count)
                .then_with(|| compare_year_desc(a.year, b.year))
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        hits.truncate(limit);
        hits
    }

    /// Papers related through shared references or co-citation, strongest first.
    pub async fn related(&self, id: &Identifier, limit: usize) -> Vec<(Identifier, usize)> {
        let state = self.state.read().await;
        let mut scores = state.index.bibliographic_coupling(id);
        for (other, count) in state.index.co_citation(id) {
            *scores.entry(other).or_insert(0) += count;
        }

        let mut ranked: Vec<(Identifier, usize)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        let years = state.records.values().filter_map(|record| record.paper.year);
        let (min_year, max_year) = years.fold((None, None), |(min, max), year| {
            (
                Some(min.map_or(year, |m: i32| m.min(year))),
                Some(max.map_or(year, |m: i32| m.max(year))),
            )
        });

        StoreStats {
            paper_count: state.records.len(),
            fully_expanded_count: state
                .records
                .values()
                .filter(|record| record.fully_expanded)
                .count(),
            edge_count: state.index.edge_count(),
            min_year,
            max_year,
        }
    }

    pub async fn edges(&self) -> Vec<Edge> {
        self.state.read().await.index.edges()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Rewrite the WAL to one entry per live record plus one edge batch.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _tx_guard = self.tx_lock.lock().await;

        let payloads = {
            let state = self.state.read().await;
            let mut records: Vec<&CacheRecord> = state.records.values().collect();
            records.sort_by(|a, b| a.identifier().cmp(b.identifier()));

            let mut payloads = Vec::with_capacity(records.len() + 1);
            for record in records {
                payloads.push(serialize_wal_entry(&WalEntry::Put(record.clone()))?);
            }
            let edges = state.index.edges();
            if !edges.is_empty() {
                payloads.push(serialize_wal_entry(&WalEntry::PutEdges(edges))?);
            }
            payloads
        };

        let mut guard = self.wal.lock().await;
        let wal = guard.take().ok_or(WalError::Closed)?;
        let path = wal.path().to_path_buf();
        match wal.rewrite(&payloads).await {
            Ok(rewritten) => {
                *guard = Some(rewritten);
                info!(path = %path.display(), entries = payloads.len(), "compacted WAL");
                Ok(())
            }
            Err(err) => {
                // The original file is untouched unless the rename succeeded.
                *guard = Some(Wal::open(&path).await?);
                Err(err.into())
            }
        }
    }
}

/// Lazy, filtered iteration over stored papers.
pub struct PaperScan {
    guard: OwnedRwLockReadGuard<StoreState>,
    ids: std::vec::IntoIter<Identifier>,
    filter: PaperFilter,
}

impl Iterator for PaperScan {
    type Item = Paper;

    fn next(&mut self) -> Option<Paper> {
        for id in self.ids.by_ref() {
            if let Some(record) = self.guard.records.get(&id) {
                if self.filter.matches(&record.paper) {
                    return Some(record.paper.clone());
                }
            }
        }
        None
    }
}

fn paper_matches(paper: &Paper, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let title_hit = paper
        .title
        .as_deref()
        .is_some_and(|title| title.to_lowercase().contains(needle));
    title_hit
        || paper
            .authors
            .iter()
            .any(|author| author.to_lowercase().contains(needle))
        || paper
            .keywords
            .iter()
            .any(|keyword| keyword.to_lowercase().contains(needle))
}

/// Known years first, newest first.
fn compare_year_desc(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn serialize_wal_entry(entry: &WalEntry) -> Result<Vec<u8>, StoreError> {
    let mut serializer = AllocSerializer::<4096>::default();
    serializer
        .serialize_value(entry)
        .map_err(|_| StoreError::Serialization)?;
    Ok(serializer.into_serializer().into_inner().to_vec())
}
