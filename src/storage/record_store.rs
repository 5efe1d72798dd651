use crate::models::ProductRecord;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Handle for one in-flight load. Later tickets supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// A newer load was already applied; the records were dropped.
    Stale,
    /// Nothing to apply; recorded as a failed load.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub ticket: LoadTicket,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Arc<Vec<ProductRecord>>,
    applied: Option<LoadTicket>,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    last_error: Option<LoadFailure>,
}

/// Current record set shared between the loader and readers.
///
/// Readers get immutable snapshots; a commit swaps the whole set at once.
#[derive(Debug, Default)]
pub struct RecordStore {
    next_ticket: AtomicU64,
    state: RwLock<StoreState>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_load(&self) -> LoadTicket {
        LoadTicket(self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Replaces the record set unless a newer load has already landed.
    ///
    /// An empty set is never applied: it is recorded as a failed load and
    /// the previous records stay visible. A dashboard that re-hydrates from
    /// an empty file would show nothing instead; here the last good set wins.
    pub fn commit(&self, ticket: LoadTicket, records: Vec<ProductRecord>) -> CommitOutcome {
        if records.is_empty() {
            self.reject(ticket, "dataset contains no populated rows");
            return CommitOutcome::Empty;
        }

        let mut state = self.write_state();
        if state.applied.is_some_and(|applied| applied >= ticket) {
            warn!(
                "Discarding load #{}: load #{} already applied",
                ticket.sequence(),
                state.applied.map_or(0, LoadTicket::sequence)
            );
            return CommitOutcome::Stale;
        }

        let count = records.len();
        state.records = Arc::new(records);
        state.applied = Some(ticket);
        state.generation += 1;
        state.loaded_at = Some(Utc::now());
        state.last_error = None;
        info!(
            "Applied load #{} ({} records, generation {})",
            ticket.sequence(),
            count,
            state.generation
        );
        CommitOutcome::Applied
    }

    /// Records a failed load. The current records are left untouched.
    pub fn reject(&self, ticket: LoadTicket, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.write_state();
        if state.applied.is_some_and(|applied| applied > ticket) {
            warn!("Ignoring failure of superseded load #{}: {}", ticket.sequence(), reason);
            return;
        }

        warn!("Load #{} failed: {}", ticket.sequence(), reason);
        state.last_error = Some(LoadFailure {
            ticket,
            reason,
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Arc<Vec<ProductRecord>> {
        Arc::clone(&self.read_state().records)
    }

    pub fn last_error(&self) -> Option<LoadFailure> {
        self.read_state().last_error.clone()
    }

    /// Number of successful commits so far; 0 means nothing loaded yet.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.read_state().loaded_at
    }

    pub fn is_loaded(&self) -> bool {
        self.generation() > 0
    }

    // A panicking writer cannot leave a half-swapped set behind, so the
    // state is still consistent after poisoning.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
