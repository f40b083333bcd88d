//! Claims Storage Ports
//!
//! The claims domain talks to storage only through the traits in this
//! module. The PostgreSQL adapter lives in `infra_db`; an in-memory adapter
//! is available behind the `mock` feature for tests.
//!
//! # Sessions
//!
//! Bulk import writes through a [`ClaimSession`], a single storage
//! transaction opened by [`ClaimStore::begin`]. Nothing written through a
//! session is visible to other readers until [`ClaimSession::commit`]; a
//! session that is rolled back or dropped leaves the store unchanged.
//!
//! ```rust,ignore
//! let mut session = store.begin(None).await?;
//! let existing = session.existing_claim_ids(&ids).await?;
//! session.insert_claim(&claim).await?;
//! session.commit().await?;
//! ```

use async_trait::async_trait;
use std::collections::HashSet;

use core_kernel::{ClaimId, DomainPort, HealthCheckable, OperationMetadata, PortError};

use crate::annotation::{Flag, Note};
use crate::claim::{Claim, ClaimDetail, ClaimRecord, ClaimStatus};
use crate::query::{ClaimPage, ClaimQuery, ClaimView, DashboardStats, DataCounts, ExportFilter};

/// One storage transaction
#[async_trait]
pub trait ClaimSession: Send {
    /// Returns which of `ids` already exist, locking them for the rest of
    /// the session
    async fn existing_claim_ids(&mut self, ids: &[ClaimId]) -> Result<HashSet<ClaimId>, PortError>;

    /// Returns which of `ids` already have a detail record
    async fn existing_detail_ids(&mut self, ids: &[ClaimId])
        -> Result<HashSet<ClaimId>, PortError>;

    /// Inserts a new claim
    async fn insert_claim(&mut self, claim: &Claim) -> Result<(), PortError>;

    /// Replaces every field of an existing claim except its identifier
    async fn update_claim(&mut self, claim: &Claim) -> Result<(), PortError>;

    /// Creates or replaces a claim's detail, returning true if it was created
    async fn upsert_detail(&mut self, detail: &ClaimDetail) -> Result<bool, PortError>;

    /// Makes every write of the session durable
    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    /// Discards every write of the session
    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}

/// Storage operations required by the claims domain
#[async_trait]
pub trait ClaimStore: DomainPort + HealthCheckable {
    /// Opens a storage session
    async fn begin(
        &self,
        metadata: Option<&OperationMetadata>,
    ) -> Result<Box<dyn ClaimSession>, PortError>;

    /// Returns every claim matching the filter with its detail, by id ascending
    async fn export_claims(&self, filter: &ExportFilter) -> Result<Vec<ClaimRecord>, PortError>;

    /// Returns one page of the claims listing, by id descending
    async fn list_claims(&self, query: &ClaimQuery) -> Result<ClaimPage, PortError>;

    /// Returns the detail view of a claim
    async fn get_claim(&self, id: ClaimId, viewer: Option<&str>) -> Result<ClaimView, PortError>;

    /// Changes a claim's status
    async fn update_status(&self, id: ClaimId, status: ClaimStatus) -> Result<Claim, PortError>;

    /// Flags a claim for review
    ///
    /// Flagging a claim the user already flagged returns the existing flag
    /// and `false`.
    async fn flag_claim(
        &self,
        id: ClaimId,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<(Flag, bool), PortError>;

    /// Attaches a note to a claim
    async fn add_note(&self, id: ClaimId, author: &str, text: &str) -> Result<Note, PortError>;

    /// Aggregate figures for the dashboard
    async fn dashboard(&self) -> Result<DashboardStats, PortError>;

    /// Row counts per table
    async fn data_counts(&self) -> Result<DataCounts, PortError>;

    /// Deletes every claim with its details, flags and notes, returning
    /// what was deleted
    async fn purge(&self) -> Result<DataCounts, PortError>;
}

/// Mock implementation of ClaimStore for testing
///
/// Keeps everything in memory. A session takes an exclusive lock on the
/// state and writes to a private copy that replaces the state on commit,
/// so store reads wait until the session ends.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::HealthCheckResult;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use crate::error::ClaimError;
    use crate::query::{
        average_underpayment, ClaimListItem, StatusCount, RECENT_ACTIVITY_LIMIT,
    };

    #[derive(Debug, Clone, Default)]
    struct MockState {
        claims: BTreeMap<ClaimId, Claim>,
        details: BTreeMap<ClaimId, ClaimDetail>,
        flags: Vec<Flag>,
        notes: Vec<Note>,
    }

    impl MockState {
        fn claim(&self, id: ClaimId) -> Result<&Claim, PortError> {
            self.claims
                .get(&id)
                .ok_or_else(|| PortError::not_found("Claim", id))
        }

        fn counts(&self) -> DataCounts {
            DataCounts {
                claims: self.claims.len() as u64,
                details: self.details.len() as u64,
                flags: self.flags.len() as u64,
                notes: self.notes.len() as u64,
            }
        }
    }

    fn claim_error(error: ClaimError) -> PortError {
        PortError::validation(error.to_string())
    }

    /// In-memory mock implementation of ClaimStore
    #[derive(Debug, Default)]
    pub struct MockClaimStore {
        state: Arc<Mutex<MockState>>,
        fail_on_insert: Arc<AtomicI64>,
        fail_on_commit: Arc<AtomicBool>,
    }

    impl MockClaimStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with claims for testing
        pub async fn with_records(records: Vec<ClaimRecord>) -> Self {
            let store = Self::new();
            {
                let mut state = store.state.lock().await;
                for record in records {
                    if let Some(detail) = record.detail {
                        state.details.insert(detail.claim_id, detail);
                    }
                    state.claims.insert(record.claim.id, record.claim);
                }
            }
            store
        }

        /// Makes sessions fail when inserting the given claim
        pub fn fail_on_insert(&self, id: ClaimId) {
            self.fail_on_insert.store(id.value(), Ordering::SeqCst);
        }

        /// Makes session commits fail
        pub fn fail_on_commit(&self) {
            self.fail_on_commit.store(true, Ordering::SeqCst);
        }

        /// Clears injected faults
        pub fn clear_faults(&self) {
            self.fail_on_insert.store(0, Ordering::SeqCst);
            self.fail_on_commit.store(false, Ordering::SeqCst);
        }
    }

    impl DomainPort for MockClaimStore {}

    #[async_trait]
    impl HealthCheckable for MockClaimStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult::healthy("mock-claim-store", std::time::Duration::ZERO)
        }
    }

    /// Session over a private copy of the mock state
    pub struct MockClaimSession {
        guard: OwnedMutexGuard<MockState>,
        working: MockState,
        fail_on_insert: i64,
        fail_on_commit: bool,
    }

    #[async_trait]
    impl ClaimSession for MockClaimSession {
        async fn existing_claim_ids(
            &mut self,
            ids: &[ClaimId],
        ) -> Result<HashSet<ClaimId>, PortError> {
            Ok(ids
                .iter()
                .filter(|id| self.working.claims.contains_key(id))
                .copied()
                .collect())
        }

        async fn existing_detail_ids(
            &mut self,
            ids: &[ClaimId],
        ) -> Result<HashSet<ClaimId>, PortError> {
            Ok(ids
                .iter()
                .filter(|id| self.working.details.contains_key(id))
                .copied()
                .collect())
        }

        async fn insert_claim(&mut self, claim: &Claim) -> Result<(), PortError> {
            if claim.id.value() == self.fail_on_insert {
                return Err(PortError::internal(format!(
                    "injected failure inserting claim {}",
                    claim.id
                )));
            }
            if self.working.claims.contains_key(&claim.id) {
                return Err(PortError::conflict(format!("claim {} already exists", claim.id)));
            }
            self.working.claims.insert(claim.id, claim.clone());
            Ok(())
        }

        async fn update_claim(&mut self, claim: &Claim) -> Result<(), PortError> {
            let existing = self
                .working
                .claims
                .get_mut(&claim.id)
                .ok_or_else(|| PortError::not_found("Claim", claim.id))?;
            *existing = claim.clone();
            Ok(())
        }

        async fn upsert_detail(&mut self, detail: &ClaimDetail) -> Result<bool, PortError> {
            if !self.working.claims.contains_key(&detail.claim_id) {
                return Err(PortError::not_found("Claim", detail.claim_id));
            }
            Ok(self
                .working
                .details
                .insert(detail.claim_id, detail.clone())
                .is_none())
        }

        async fn commit(self: Box<Self>) -> Result<(), PortError> {
            let MockClaimSession {
                mut guard,
                working,
                fail_on_commit,
                ..
            } = *self;
            if fail_on_commit {
                return Err(PortError::connection("injected commit failure"));
            }
            *guard = working;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), PortError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ClaimStore for MockClaimStore {
        async fn begin(
            &self,
            _metadata: Option<&OperationMetadata>,
        ) -> Result<Box<dyn ClaimSession>, PortError> {
            let guard = self.state.clone().lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(MockClaimSession {
                guard,
                working,
                fail_on_insert: self.fail_on_insert.load(Ordering::SeqCst),
                fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
            }))
        }

        async fn export_claims(
            &self,
            filter: &ExportFilter,
        ) -> Result<Vec<ClaimRecord>, PortError> {
            let state = self.state.lock().await;
            Ok(state
                .claims
                .values()
                .filter(|claim| filter.matches(claim))
                .map(|claim| ClaimRecord {
                    claim: claim.clone(),
                    detail: state.details.get(&claim.id).cloned(),
                })
                .collect())
        }

        async fn list_claims(&self, query: &ClaimQuery) -> Result<ClaimPage, PortError> {
            let state = self.state.lock().await;
            let matching: Vec<&Claim> = state
                .claims
                .values()
                .rev()
                .filter(|claim| query.matches(claim))
                .collect();
            let total_count = matching.len() as u64;
            let window = query.window(total_count);

            let items = matching
                .into_iter()
                .skip(window.offset as usize)
                .take(window.page_size as usize)
                .map(|claim| ClaimListItem {
                    claim: claim.clone(),
                    has_detail: state.details.contains_key(&claim.id),
                    flag_count: state.flags.iter().filter(|f| f.claim_id == claim.id).count()
                        as u64,
                    note_count: state.notes.iter().filter(|n| n.claim_id == claim.id).count()
                        as u64,
                })
                .collect::<Vec<_>>();

            Ok(ClaimPage {
                items,
                page: window.page,
                page_size: window.page_size,
                total_count,
                total_pages: window.total_pages,
            })
        }

        async fn get_claim(
            &self,
            id: ClaimId,
            viewer: Option<&str>,
        ) -> Result<ClaimView, PortError> {
            let state = self.state.lock().await;
            let claim = state.claim(id)?.clone();

            let mut notes: Vec<Note> =
                state.notes.iter().filter(|n| n.claim_id == id).cloned().collect();
            notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let mut flags: Vec<Flag> =
                state.flags.iter().filter(|f| f.claim_id == id).cloned().collect();
            flags.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let flagged_by_viewer =
                viewer.is_some_and(|user| flags.iter().any(|f| f.user_id == user));

            Ok(ClaimView {
                underpayment: claim.underpayment(),
                detail: state.details.get(&id).cloned(),
                claim,
                notes,
                flags,
                flagged_by_viewer,
            })
        }

        async fn update_status(
            &self,
            id: ClaimId,
            status: ClaimStatus,
        ) -> Result<Claim, PortError> {
            let mut state = self.state.lock().await;
            let claim = state
                .claims
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Claim", id))?;
            claim.set_status(status);
            Ok(claim.clone())
        }

        async fn flag_claim(
            &self,
            id: ClaimId,
            user_id: &str,
            reason: Option<&str>,
        ) -> Result<(Flag, bool), PortError> {
            let mut state = self.state.lock().await;
            state.claim(id)?;
            if let Some(existing) = state
                .flags
                .iter()
                .find(|f| f.claim_id == id && f.user_id == user_id)
            {
                return Ok((existing.clone(), false));
            }
            let flag = Flag::new(id, user_id, reason).map_err(claim_error)?;
            state.flags.push(flag.clone());
            Ok((flag, true))
        }

        async fn add_note(&self, id: ClaimId, author: &str, text: &str) -> Result<Note, PortError> {
            let mut state = self.state.lock().await;
            state.claim(id)?;
            let note = Note::new(id, author, text).map_err(claim_error)?;
            state.notes.push(note.clone());
            Ok(note)
        }

        async fn dashboard(&self) -> Result<DashboardStats, PortError> {
            let state = self.state.lock().await;
            let total_claims = state.claims.len() as u64;
            let total_billed: Decimal =
                state.claims.values().map(|c| c.billed_amount.value()).sum();
            let total_paid: Decimal = state.claims.values().map(|c| c.paid_amount.value()).sum();
            let flagged: HashSet<ClaimId> = state.flags.iter().map(|f| f.claim_id).collect();

            let status_breakdown = ClaimStatus::ALL
                .into_iter()
                .map(|status| StatusCount {
                    status,
                    count: state.claims.values().filter(|c| c.status == status).count() as u64,
                })
                .filter(|entry| entry.count > 0)
                .collect();

            let mut recent_flags = state.flags.clone();
            recent_flags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            recent_flags.truncate(RECENT_ACTIVITY_LIMIT);
            let mut recent_notes = state.notes.clone();
            recent_notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            recent_notes.truncate(RECENT_ACTIVITY_LIMIT);

            Ok(DashboardStats {
                total_claims,
                flagged_claims: flagged.len() as u64,
                total_billed,
                total_paid,
                average_underpayment: average_underpayment(total_billed - total_paid, total_claims),
                outstanding: total_billed - total_paid,
                status_breakdown,
                recent_flags,
                recent_notes,
            })
        }

        async fn data_counts(&self) -> Result<DataCounts, PortError> {
            Ok(self.state.lock().await.counts())
        }

        async fn purge(&self) -> Result<DataCounts, PortError> {
            let mut state = self.state.lock().await;
            let counts = state.counts();
            *state = MockState::default();
            Ok(counts)
        }
    }
}
