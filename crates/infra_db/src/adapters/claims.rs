//! PostgreSQL Claims Adapter
//!
//! Implements the `ClaimStore` port on top of [`ClaimsRepository`]. Import
//! sessions map to one database transaction each; claims touched by a
//! session are locked with `FOR UPDATE` until it commits or rolls back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresClaimStore;
//! use domain_claims::ClaimStore;
//! use std::sync::Arc;
//!
//! let store: Arc<dyn ClaimStore> = Arc::new(PostgresClaimStore::new(pool));
//! let page = store.list_claims(&ClaimQuery::new()).await?;
//! ```

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use core_kernel::{
    Amount, ClaimId, DomainPort, FlagId, HealthCheckResult, HealthCheckable,
    NoteId, OperationMetadata, PortError,
};
use domain_claims::query::{average_underpayment, ClaimListItem, StatusCount, RECENT_ACTIVITY_LIMIT};
use domain_claims::{
    Claim, ClaimDetail, ClaimPage, ClaimQuery, ClaimRecord, ClaimSession, ClaimStatus, ClaimStore,
    ClaimView, DashboardStats, DataCounts, ExportFilter, Flag, Note,
};

use crate::error::DatabaseError;
use crate::repositories::claims::{
    ClaimRow, ClaimStatus as DbClaimStatus, ClaimValues, ClaimWithDetailRow, ClaimsRepository,
    CountsRow, ExportCriteria, FlagRow, ListingCriteria, NoteRow,
};

const ADAPTER_ID: &str = "postgres-claim-store";

/// PostgreSQL-backed implementation of the ClaimStore trait
#[derive(Debug, Clone)]
pub struct PostgresClaimStore {
    repository: ClaimsRepository,
    pool: PgPool,
}

impl PostgresClaimStore {
    /// Creates a new PostgreSQL claim store
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ClaimsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &ClaimsRepository {
        &self.repository
    }

    async fn require_claim(&self, id: ClaimId) -> Result<(), PortError> {
        if self.repository.exists(id.value()).await? {
            Ok(())
        } else {
            Err(PortError::not_found("Claim", id))
        }
    }
}

impl DomainPort for PostgresClaimStore {}

#[async_trait]
impl HealthCheckable for PostgresClaimStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(_) => HealthCheckResult::healthy(ADAPTER_ID, start.elapsed()),
            Err(e) => HealthCheckResult::unhealthy(
                ADAPTER_ID,
                start.elapsed(),
                format!("Database error: {}", e),
            ),
        }
    }
}

/// One import transaction
pub struct PostgresClaimSession {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ClaimSession for PostgresClaimSession {
    async fn existing_claim_ids(&mut self, ids: &[ClaimId]) -> Result<HashSet<ClaimId>, PortError> {
        let raw = raw_ids(ids);
        let found = ClaimsRepository::lock_existing(&mut *self.tx, &raw).await?;
        to_claim_ids(found)
    }

    async fn existing_detail_ids(
        &mut self,
        ids: &[ClaimId],
    ) -> Result<HashSet<ClaimId>, PortError> {
        let raw = raw_ids(ids);
        let found = ClaimsRepository::existing_details(&mut *self.tx, &raw).await?;
        to_claim_ids(found)
    }

    async fn insert_claim(&mut self, claim: &Claim) -> Result<(), PortError> {
        ClaimsRepository::insert_claim(&mut *self.tx, &claim_values(claim)).await?;
        Ok(())
    }

    async fn update_claim(&mut self, claim: &Claim) -> Result<(), PortError> {
        ClaimsRepository::update_claim(&mut *self.tx, &claim_values(claim)).await?;
        Ok(())
    }

    async fn upsert_detail(&mut self, detail: &ClaimDetail) -> Result<bool, PortError> {
        let inserted = ClaimsRepository::upsert_detail(
            &mut *self.tx,
            detail.claim_id.value(),
            &detail.cpt_codes,
            detail.denial_reason.as_deref(),
        )
        .await?;
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        let PostgresClaimSession { tx } = *self;
        tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Import transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        let PostgresClaimSession { tx } = *self;
        tx.rollback().await.map_err(DatabaseError::from)?;
        debug!("Import transaction rolled back");
        Ok(())
    }
}

#[async_trait]
impl ClaimStore for PostgresClaimStore {
    #[instrument(skip(self, metadata))]
    async fn begin(
        &self,
        metadata: Option<&OperationMetadata>,
    ) -> Result<Box<dyn ClaimSession>, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        debug!(
            correlation_id = metadata.and_then(|m| m.correlation_id.as_deref()),
            initiated_by = metadata.and_then(|m| m.initiated_by.as_deref()),
            "Import transaction opened"
        );
        Ok(Box::new(PostgresClaimSession { tx }))
    }

    #[instrument(skip(self))]
    async fn export_claims(&self, filter: &ExportFilter) -> Result<Vec<ClaimRecord>, PortError> {
        let criteria = ExportCriteria {
            status: filter.status.map(to_db_status),
            insurer: filter.insurer_name().map(str::to_string),
            from: filter.from,
            to: filter.to,
        };
        let rows = self.repository.find_for_export(&criteria).await?;
        debug!(count = rows.len(), "Loaded claims for export");
        rows.into_iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PortError::from)
    }

    #[instrument(skip(self))]
    async fn list_claims(&self, query: &ClaimQuery) -> Result<ClaimPage, PortError> {
        let criteria = ListingCriteria {
            search: query.search_term(),
            status: query.status.map(to_db_status),
        };
        let total_count = self.repository.count_listing(&criteria).await?.max(0) as u64;
        let window = query.window(total_count);

        let rows = self
            .repository
            .find_listing(&criteria, i64::from(window.page_size), window.offset as i64)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ClaimListItem {
                claim: claim_from_row(row.claim)?,
                has_detail: row.has_detail,
                flag_count: row.flag_count.max(0) as u64,
                note_count: row.note_count.max(0) as u64,
            });
        }

        Ok(ClaimPage {
            items,
            page: window.page,
            page_size: window.page_size,
            total_count,
            total_pages: window.total_pages,
        })
    }

    #[instrument(skip(self), fields(claim_id = %id))]
    async fn get_claim(&self, id: ClaimId, viewer: Option<&str>) -> Result<ClaimView, PortError> {
        let row = self.repository.get_with_detail(id.value()).await?;
        let record = record_from_row(row)?;

        let notes = self
            .repository
            .notes_for(id.value())
            .await?
            .into_iter()
            .map(note_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let flags = self
            .repository
            .flags_for(id.value())
            .await?
            .into_iter()
            .map(flag_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let flagged_by_viewer =
            viewer.is_some_and(|user| flags.iter().any(|f| f.user_id == user));

        Ok(ClaimView {
            underpayment: record.claim.underpayment(),
            claim: record.claim,
            detail: record.detail,
            notes,
            flags,
            flagged_by_viewer,
        })
    }

    #[instrument(skip(self), fields(claim_id = %id))]
    async fn update_status(&self, id: ClaimId, status: ClaimStatus) -> Result<Claim, PortError> {
        let row = self
            .repository
            .update_status(id.value(), to_db_status(status))
            .await?;
        info!(status = %status, "Claim status updated");
        claim_from_row(row).map_err(PortError::from)
    }

    #[instrument(skip(self, reason), fields(claim_id = %id))]
    async fn flag_claim(
        &self,
        id: ClaimId,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<(Flag, bool), PortError> {
        self.require_claim(id).await?;
        let flag = Flag::new(id, user_id, reason)
            .map_err(|e| PortError::validation_field(e.to_string(), "reason"))?;

        let (row, created) = self
            .repository
            .insert_flag(&FlagRow {
                flag_id: *flag.id.as_uuid(),
                claim_id: id.value(),
                user_id: flag.user_id,
                reason: flag.reason,
                created_at: flag.created_at,
            })
            .await?;
        debug!(created, "Flag recorded");
        Ok((flag_from_row(row)?, created))
    }

    #[instrument(skip(self, text), fields(claim_id = %id))]
    async fn add_note(&self, id: ClaimId, author: &str, text: &str) -> Result<Note, PortError> {
        self.require_claim(id).await?;
        let note = Note::new(id, author, text)
            .map_err(|e| PortError::validation_field(e.to_string(), "note"))?;

        self.repository
            .insert_note(&NoteRow {
                note_id: *note.id.as_uuid(),
                claim_id: id.value(),
                author: note.author.clone(),
                note_text: note.text.clone(),
                created_at: note.created_at,
            })
            .await?;
        Ok(note)
    }

    #[instrument(skip(self))]
    async fn dashboard(&self) -> Result<DashboardStats, PortError> {
        let totals = self.repository.totals().await?;
        let total_claims = totals.total_claims.max(0) as u64;

        let status_breakdown = self
            .repository
            .status_counts()
            .await?
            .into_iter()
            .map(|row| StatusCount {
                status: from_db_status(row.status),
                count: row.count.max(0) as u64,
            })
            .collect();

        let limit = RECENT_ACTIVITY_LIMIT as i64;
        let recent_flags = self
            .repository
            .recent_flags(limit)
            .await?
            .into_iter()
            .map(flag_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let recent_notes = self
            .repository
            .recent_notes(limit)
            .await?
            .into_iter()
            .map(note_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DashboardStats {
            total_claims,
            flagged_claims: totals.flagged_claims.max(0) as u64,
            total_billed: totals.total_billed,
            total_paid: totals.total_paid,
            average_underpayment: average_underpayment(totals.total_underpayment, total_claims),
            outstanding: totals.total_underpayment,
            status_breakdown,
            recent_flags,
            recent_notes,
        })
    }

    #[instrument(skip(self))]
    async fn data_counts(&self) -> Result<DataCounts, PortError> {
        let counts = self.repository.counts().await?;
        Ok(data_counts(counts))
    }

    #[instrument(skip(self))]
    async fn purge(&self) -> Result<DataCounts, PortError> {
        let counts = data_counts(self.repository.purge().await?);
        info!(
            claims = counts.claims,
            details = counts.details,
            flags = counts.flags,
            notes = counts.notes,
            "Purged all claims data"
        );
        Ok(counts)
    }
}

// ============================================================================
// Row conversions
// ============================================================================

fn raw_ids(ids: &[ClaimId]) -> Vec<i64> {
    ids.iter().map(ClaimId::value).collect()
}

fn to_claim_ids(raw: Vec<i64>) -> Result<HashSet<ClaimId>, PortError> {
    raw.into_iter()
        .map(|id| stored_claim_id(id).map_err(PortError::from))
        .collect()
}

fn stored_claim_id(id: i64) -> Result<ClaimId, DatabaseError> {
    ClaimId::new(id).map_err(|e| DatabaseError::InvalidData(e.to_string()))
}

fn stored_amount(value: rust_decimal::Decimal) -> Result<Amount, DatabaseError> {
    Amount::new(value).map_err(|e| DatabaseError::InvalidData(e.to_string()))
}

fn to_db_status(status: ClaimStatus) -> DbClaimStatus {
    match status {
        ClaimStatus::Paid => DbClaimStatus::Paid,
        ClaimStatus::Denied => DbClaimStatus::Denied,
        ClaimStatus::UnderReview => DbClaimStatus::UnderReview,
    }
}

fn from_db_status(status: DbClaimStatus) -> ClaimStatus {
    match status {
        DbClaimStatus::Paid => ClaimStatus::Paid,
        DbClaimStatus::Denied => ClaimStatus::Denied,
        DbClaimStatus::UnderReview => ClaimStatus::UnderReview,
    }
}

fn claim_values(claim: &Claim) -> ClaimValues {
    ClaimValues {
        id: claim.id.value(),
        patient_name: claim.patient_name.clone(),
        billed_amount: claim.billed_amount.value(),
        paid_amount: claim.paid_amount.value(),
        status: to_db_status(claim.status),
        insurer_name: claim.insurer_name.clone(),
        discharge_date: claim.discharge_date,
    }
}

fn claim_from_row(row: ClaimRow) -> Result<Claim, DatabaseError> {
    Ok(Claim {
        id: stored_claim_id(row.id)?,
        patient_name: row.patient_name,
        billed_amount: stored_amount(row.billed_amount)?,
        paid_amount: stored_amount(row.paid_amount)?,
        status: from_db_status(row.status),
        insurer_name: row.insurer_name,
        discharge_date: row.discharge_date,
    })
}

fn record_from_row(row: ClaimWithDetailRow) -> Result<ClaimRecord, DatabaseError> {
    let claim = claim_from_row(row.claim)?;
    let detail = row.cpt_codes.map(|cpt_codes| ClaimDetail {
        claim_id: claim.id,
        cpt_codes,
        denial_reason: row.denial_reason,
    });
    Ok(ClaimRecord { claim, detail })
}

fn flag_from_row(row: FlagRow) -> Result<Flag, DatabaseError> {
    Ok(Flag {
        id: FlagId::from_uuid(row.flag_id),
        claim_id: stored_claim_id(row.claim_id)?,
        user_id: row.user_id,
        reason: row.reason,
        created_at: row.created_at,
    })
}

fn note_from_row(row: NoteRow) -> Result<Note, DatabaseError> {
    Ok(Note {
        id: NoteId::from_uuid(row.note_id),
        claim_id: stored_claim_id(row.claim_id)?,
        author: row.author,
        text: row.note_text,
        created_at: row.created_at,
    })
}

fn data_counts(row: CountsRow) -> DataCounts {
    DataCounts {
        claims: row.claims.max(0) as u64,
        details: row.details.max(0) as u64,
        flags: row.flags.max(0) as u64,
        notes: row.notes.max(0) as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn row(id: i64) -> ClaimRow {
        ClaimRow {
            id,
            patient_name: "Jane Roe".to_string(),
            billed_amount: dec!(250.00),
            paid_amount: dec!(100.00),
            status: DbClaimStatus::UnderReview,
            insurer_name: "Aetna".to_string(),
            discharge_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_mapping_is_symmetric() {
        for status in ClaimStatus::ALL {
            assert_eq!(from_db_status(to_db_status(status)), status);
        }
    }

    #[test]
    fn test_claim_from_row() {
        let claim = claim_from_row(row(42)).unwrap();
        assert_eq!(claim.id.value(), 42);
        assert_eq!(claim.status, ClaimStatus::UnderReview);
        assert_eq!(claim.underpayment(), dec!(150.00));
    }

    #[test]
    fn test_invalid_stored_row_is_rejected() {
        let mut bad = row(0);
        assert!(matches!(claim_from_row(bad.clone()), Err(DatabaseError::InvalidData(_))));
        bad.id = 1;
        bad.paid_amount = dec!(-1.00);
        assert!(matches!(claim_from_row(bad), Err(DatabaseError::InvalidData(_))));
    }

    #[test]
    fn test_record_without_detail() {
        let record = record_from_row(ClaimWithDetailRow {
            claim: row(7),
            cpt_codes: None,
            denial_reason: Some("ignored".to_string()),
        })
        .unwrap();
        assert!(record.detail.is_none());
    }
}
