//! Claims repository implementation
//!
//! This module provides database access for claim records, their details,
//! flags and notes. Statements that run inside an import session take a
//! connection borrowed from the session's transaction; everything else runs
//! on the pool.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DatabaseError;

const CLAIM_COLUMNS: &str = "c.id, c.patient_name, c.billed_amount, c.paid_amount, c.status, \
     c.insurer_name, c.discharge_date, c.created_at, c.updated_at";

/// Repository for managing claims data
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

impl ClaimsRepository {
    /// Creates a new ClaimsRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Session statements
    // ========================================================================

    /// Returns which of `ids` exist, locking the rows until the transaction ends
    pub async fn lock_existing(
        conn: &mut PgConnection,
        ids: &[i64],
    ) -> Result<Vec<i64>, DatabaseError> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM claims WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Returns which of `ids` have a detail record
    pub async fn existing_details(
        conn: &mut PgConnection,
        ids: &[i64],
    ) -> Result<Vec<i64>, DatabaseError> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT claim_id FROM claim_details WHERE claim_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(rows)
    }

    /// Inserts a claim
    pub async fn insert_claim(conn: &mut PgConnection, claim: &ClaimValues) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO claims (
                id, patient_name, billed_amount, paid_amount,
                status, insurer_name, discharge_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(claim.id)
        .bind(&claim.patient_name)
        .bind(claim.billed_amount)
        .bind(claim.paid_amount)
        .bind(claim.status)
        .bind(&claim.insurer_name)
        .bind(claim.discharge_date)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Replaces the fields of an existing claim
    pub async fn update_claim(conn: &mut PgConnection, claim: &ClaimValues) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE claims
            SET patient_name = $2, billed_amount = $3, paid_amount = $4,
                status = $5, insurer_name = $6, discharge_date = $7,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(claim.id)
        .bind(&claim.patient_name)
        .bind(claim.billed_amount)
        .bind(claim.paid_amount)
        .bind(claim.status)
        .bind(&claim.insurer_name)
        .bind(claim.discharge_date)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Claim", claim.id));
        }
        Ok(())
    }

    /// Creates or replaces a detail, returning true if it was created
    pub async fn upsert_detail(
        conn: &mut PgConnection,
        claim_id: i64,
        cpt_codes: &str,
        denial_reason: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO claim_details (claim_id, cpt_codes, denial_reason)
            VALUES ($1, $2, $3)
            ON CONFLICT (claim_id) DO UPDATE
            SET cpt_codes = EXCLUDED.cpt_codes,
                denial_reason = EXCLUDED.denial_reason,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(claim_id)
        .bind(cpt_codes)
        .bind(denial_reason)
        .fetch_one(conn)
        .await?;
        Ok(inserted)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Retrieves claims with their details matching an export filter, by id
    pub async fn find_for_export(
        &self,
        filter: &ExportCriteria,
    ) -> Result<Vec<ClaimWithDetailRow>, DatabaseError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, d.cpt_codes, d.denial_reason \
             FROM claims c LEFT JOIN claim_details d ON d.claim_id = c.id WHERE TRUE",
            CLAIM_COLUMNS
        ));
        if let Some(status) = filter.status {
            query.push(" AND c.status = ").push_bind(status);
        }
        if let Some(insurer) = &filter.insurer {
            query
                .push(" AND lower(c.insurer_name) = lower(")
                .push_bind(insurer.clone())
                .push(")");
        }
        if let Some(from) = filter.from {
            query.push(" AND c.discharge_date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND c.discharge_date <= ").push_bind(to);
        }
        query.push(" ORDER BY c.id ASC");

        let rows = query
            .build_query_as::<ClaimWithDetailRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Counts claims matching a listing filter
    pub async fn count_listing(&self, filter: &ListingCriteria) -> Result<i64, DatabaseError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM claims c WHERE TRUE");
        push_listing_filter(&mut query, filter);

        let count = query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Retrieves one page of the listing, by id descending
    pub async fn find_listing(
        &self,
        filter: &ListingCriteria,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ClaimListRow>, DatabaseError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, \
             EXISTS (SELECT 1 FROM claim_details d WHERE d.claim_id = c.id) AS has_detail, \
             (SELECT COUNT(*) FROM claim_flags f WHERE f.claim_id = c.id) AS flag_count, \
             (SELECT COUNT(*) FROM claim_notes n WHERE n.claim_id = c.id) AS note_count \
             FROM claims c WHERE TRUE",
            CLAIM_COLUMNS
        ));
        push_listing_filter(&mut query, filter);
        query
            .push(" ORDER BY c.id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build_query_as::<ClaimListRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Retrieves a claim with its detail
    pub async fn get_with_detail(&self, id: i64) -> Result<ClaimWithDetailRow, DatabaseError> {
        let sql = format!(
            "SELECT {}, d.cpt_codes, d.denial_reason \
             FROM claims c LEFT JOIN claim_details d ON d.claim_id = c.id WHERE c.id = $1",
            CLAIM_COLUMNS
        );
        sqlx::query_as::<_, ClaimWithDetailRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Claim", id))
    }

    /// Checks if a claim exists
    pub async fn exists(&self, id: i64) -> Result<bool, DatabaseError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM claims WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Changes a claim's status
    pub async fn update_status(&self, id: i64, status: ClaimStatus) -> Result<ClaimRow, DatabaseError> {
        sqlx::query_as::<_, ClaimRow>(
            r#"
            UPDATE claims
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, patient_name, billed_amount, paid_amount, status,
                      insurer_name, discharge_date, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Claim", id))
    }

    /// Flags of a claim, newest first
    pub async fn flags_for(&self, claim_id: i64) -> Result<Vec<FlagRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, FlagRow>(
            r#"
            SELECT flag_id, claim_id, user_id, reason, created_at
            FROM claim_flags
            WHERE claim_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Notes of a claim, newest first
    pub async fn notes_for(&self, claim_id: i64) -> Result<Vec<NoteRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT note_id, claim_id, author, note_text, created_at
            FROM claim_notes
            WHERE claim_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Inserts a flag unless the user already flagged the claim
    ///
    /// Returns the stored flag and whether it was created.
    pub async fn insert_flag(&self, flag: &FlagRow) -> Result<(FlagRow, bool), DatabaseError> {
        let inserted = sqlx::query_as::<_, FlagRow>(
            r#"
            INSERT INTO claim_flags (flag_id, claim_id, user_id, reason, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (claim_id, user_id) DO NOTHING
            RETURNING flag_id, claim_id, user_id, reason, created_at
            "#,
        )
        .bind(flag.flag_id)
        .bind(flag.claim_id)
        .bind(&flag.user_id)
        .bind(&flag.reason)
        .bind(flag.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row, true));
        }

        let existing = sqlx::query_as::<_, FlagRow>(
            r#"
            SELECT flag_id, claim_id, user_id, reason, created_at
            FROM claim_flags
            WHERE claim_id = $1 AND user_id = $2
            "#,
        )
        .bind(flag.claim_id)
        .bind(&flag.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((existing, false))
    }

    /// Inserts a note
    pub async fn insert_note(&self, note: &NoteRow) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO claim_notes (note_id, claim_id, author, note_text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(note.note_id)
        .bind(note.claim_id)
        .bind(&note.author)
        .bind(&note.note_text)
        .bind(note.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Aggregate figures over all claims
    pub async fn totals(&self) -> Result<TotalsRow, DatabaseError> {
        let row = sqlx::query_as::<_, TotalsRow>(
            r#"
            SELECT
                COUNT(*) AS total_claims,
                (SELECT COUNT(DISTINCT claim_id) FROM claim_flags) AS flagged_claims,
                COALESCE(SUM(billed_amount), 0) AS total_billed,
                COALESCE(SUM(paid_amount), 0) AS total_paid,
                COALESCE(SUM(billed_amount - paid_amount), 0) AS total_underpayment
            FROM claims
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Number of claims per status
    pub async fn status_counts(&self) -> Result<Vec<StatusCountRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, StatusCountRow>(
            "SELECT status, COUNT(*) AS count FROM claims GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent flags across all claims
    pub async fn recent_flags(&self, limit: i64) -> Result<Vec<FlagRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, FlagRow>(
            r#"
            SELECT flag_id, claim_id, user_id, reason, created_at
            FROM claim_flags
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Most recent notes across all claims
    pub async fn recent_notes(&self, limit: i64) -> Result<Vec<NoteRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT note_id, claim_id, author, note_text, created_at
            FROM claim_notes
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Row counts per table
    pub async fn counts(&self) -> Result<CountsRow, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        Self::counts_on(&mut conn).await
    }

    async fn counts_on(conn: &mut PgConnection) -> Result<CountsRow, DatabaseError> {
        let row = sqlx::query_as::<_, CountsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM claims) AS claims,
                (SELECT COUNT(*) FROM claim_details) AS details,
                (SELECT COUNT(*) FROM claim_flags) AS flags,
                (SELECT COUNT(*) FROM claim_notes) AS notes
            "#,
        )
        .fetch_one(conn)
        .await?;
        Ok(row)
    }

    /// Deletes every claim and its sub-records, returning what was deleted
    pub async fn purge(&self) -> Result<CountsRow, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("LOCK TABLE claims IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        let counts = Self::counts_on(&mut *tx).await?;
        sqlx::query("DELETE FROM claims").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(counts)
    }
}

fn push_listing_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ListingCriteria) {
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        query
            .push(" AND (c.patient_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.insurer_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        query.push(" AND c.status = ").push_bind(status);
    }
}

/// Escapes LIKE wildcards so the term matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Claim status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "claim_status")]
pub enum ClaimStatus {
    #[sqlx(rename = "Paid")]
    Paid,
    #[sqlx(rename = "Denied")]
    Denied,
    #[sqlx(rename = "Under Review")]
    UnderReview,
}

/// Database row for claim
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    pub id: i64,
    pub patient_name: String,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub insurer_name: String,
    pub discharge_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claim joined with its optional detail
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimWithDetailRow {
    #[sqlx(flatten)]
    pub claim: ClaimRow,
    pub cpt_codes: Option<String>,
    pub denial_reason: Option<String>,
}

/// Claim with listing counters
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimListRow {
    #[sqlx(flatten)]
    pub claim: ClaimRow,
    pub has_detail: bool,
    pub flag_count: i64,
    pub note_count: i64,
}

/// Values written for a claim
#[derive(Debug, Clone)]
pub struct ClaimValues {
    pub id: i64,
    pub patient_name: String,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub insurer_name: String,
    pub discharge_date: NaiveDate,
}

/// Database row for flag
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FlagRow {
    pub flag_id: Uuid,
    pub claim_id: i64,
    pub user_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Database row for note
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NoteRow {
    pub note_id: Uuid,
    pub claim_id: i64,
    pub author: String,
    pub note_text: String,
    pub created_at: DateTime<Utc>,
}

/// Dashboard totals
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TotalsRow {
    pub total_claims: i64,
    pub flagged_claims: i64,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    pub total_underpayment: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCountRow {
    pub status: ClaimStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct CountsRow {
    pub claims: i64,
    pub details: i64,
    pub flags: i64,
    pub notes: i64,
}

/// Export filter in storage terms
#[derive(Debug, Clone, Default)]
pub struct ExportCriteria {
    pub status: Option<ClaimStatus>,
    pub insurer: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Listing filter in storage terms
#[derive(Debug, Clone, Default)]
pub struct ListingCriteria {
    pub search: Option<String>,
    pub status: Option<ClaimStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("Blue Cross"), "Blue Cross");
    }

    #[test]
    fn test_listing_filter_sql() {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1 FROM claims c WHERE TRUE");
        push_listing_filter(
            &mut query,
            &ListingCriteria {
                search: Some("doe".to_string()),
                status: Some(ClaimStatus::Denied),
            },
        );
        assert_eq!(
            query.sql(),
            "SELECT 1 FROM claims c WHERE TRUE AND (c.patient_name ILIKE $1 OR c.insurer_name ILIKE $2) AND c.status = $3"
        );
    }
}
