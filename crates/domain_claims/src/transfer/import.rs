//! Bulk import
//!
//! An import runs in two phases:
//!
//! ```text
//! Validating ──► Committing ──► Done
//!     │              │
//!     ▼              ▼
//! Rejected       RolledBack
//! (FormatError)  (StorageError)
//! ```
//!
//! Validating reads and checks both files without touching storage. A file
//! that cannot be read rejects the batch; a record that fails validation is
//! reported and skipped. Committing applies every accepted record in one
//! [`ClaimSession`], and any storage failure rolls the whole session back.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use core_kernel::{ClaimId, OperationMetadata, PortError};

use crate::claim::{ClaimDetail, ClaimRecord};
use crate::fields::{self, Field, FieldError, RawRecord};
use crate::ports::{ClaimSession, ClaimStore};
use super::error::{FileRole, FormatError, ImportError};
use super::format::FileFormat;
use super::reader::{read_records, RecordKind};

/// Default upload limit, 50 MiB
pub const DEFAULT_MAX_BYTES: usize = 50 * 1024 * 1024;
/// Default limit on data rows per file
pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// How records whose id already exists are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Existing ids are rejected as duplicates
    #[default]
    Add,
    /// Existing ids are replaced
    Overwrite,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Add => f.write_str("add"),
            ImportMode::Overwrite => f.write_str("overwrite"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(ImportMode::Add),
            "overwrite" => Ok(ImportMode::Overwrite),
            other => Err(format!("unknown import mode '{}', expected add or overwrite", other)),
        }
    }
}

/// Resource limits for one import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_bytes: usize,
    pub max_rows: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// An uploaded file
#[derive(Debug, Clone, Default)]
pub struct ImportFile {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
}

impl ImportFile {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// Everything needed to run an import
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub claims: ImportFile,
    pub details: Option<ImportFile>,
    /// Declared format of the claims file
    pub format: Option<FileFormat>,
    pub mode: ImportMode,
    pub limits: ImportLimits,
    pub metadata: OperationMetadata,
}

impl ImportRequest {
    pub fn new(claims: ImportFile, mode: ImportMode) -> Self {
        Self {
            claims,
            details: None,
            format: None,
            mode,
            limits: ImportLimits::default(),
            metadata: OperationMetadata::default(),
        }
    }

    pub fn with_details(mut self, details: ImportFile) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_limits(mut self, limits: ImportLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A record that was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based record position in its file
    pub row: usize,
    pub claim_id: Option<i64>,
    /// The failing field, when a single field is to blame
    pub field: Option<Field>,
    pub message: String,
    pub source: FileRole,
}

impl RowError {
    fn from_fields(
        source: FileRole,
        record: &RawRecord,
        id_field: Field,
        errors: Vec<FieldError>,
    ) -> Self {
        let field = match errors.as_slice() {
            [single] => Some(single.field),
            _ => None,
        };
        Self {
            row: record.row,
            claim_id: record.id_hint(id_field),
            field,
            message: errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
            source,
        }
    }

    fn malformed(source: FileRole, row: usize, reason: &str) -> Self {
        Self {
            row,
            claim_id: None,
            field: None,
            message: reason.to_string(),
            source,
        }
    }

    fn for_claim(source: FileRole, row: usize, id: ClaimId, field: Field, message: String) -> Self {
        Self {
            row,
            claim_id: Some(id.value()),
            field: Some(field),
            message,
            source,
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}: {}", self.source, self.row, self.message)
    }
}

/// Outcome of a committed import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub format: FileFormat,
    pub claims_inserted: usize,
    pub claims_updated: usize,
    pub details_inserted: usize,
    pub details_updated: usize,
    /// Records not imported, equal to the number of errors
    pub rejected: usize,
    /// Ordered by file, then row
    pub errors: Vec<RowError>,
}

impl ImportReport {
    fn new(mode: ImportMode, format: FileFormat) -> Self {
        Self {
            mode,
            format,
            claims_inserted: 0,
            claims_updated: 0,
            details_inserted: 0,
            details_updated: 0,
            rejected: 0,
            errors: Vec::new(),
        }
    }

    /// Claims written, inserted or updated
    pub fn claims_written(&self) -> usize {
        self.claims_inserted + self.claims_updated
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn reject(&mut self, error: RowError) {
        debug!(source = %error.source, row = error.row, message = %error.message, "Row rejected");
        self.errors.push(error);
    }

    fn count_detail(&mut self, inserted: bool) {
        if inserted {
            self.details_inserted += 1;
        } else {
            self.details_updated += 1;
        }
    }
}

/// A validated claim waiting to be written
struct PendingClaim {
    row: usize,
    record: ClaimRecord,
}

/// A validated details row waiting to be written
struct PendingDetail {
    row: usize,
    detail: ClaimDetail,
}

/// Imports claims, and optionally claim details, into the store
///
/// Returns the report of a committed batch. A file that cannot be read
/// fails with [`ImportError::Format`] before storage is touched; a storage
/// failure fails with [`ImportError::Storage`] after rolling back.
pub async fn import_claims(
    store: &dyn ClaimStore,
    request: ImportRequest,
) -> Result<ImportReport, ImportError> {
    let ImportRequest {
        claims,
        details,
        format,
        mode,
        limits,
        metadata,
    } = request;

    let claims_format = resolve_format(FileRole::Claims, &claims, format, &limits)?;
    let claims_file = read_records(&claims.bytes, claims_format, RecordKind::Claim, limits.max_rows)
        .map_err(|e| ImportError::format(FileRole::Claims, e))?;
    let claim_rows = claims_file.records;

    let detail_rows = match (&details, claims_file.embedded_details) {
        (Some(_), Some(_)) => {
            return Err(ImportError::format(FileRole::Details, FormatError::DetailsTwice));
        }
        (Some(file), None) => {
            let details_format = resolve_format(FileRole::Details, file, None, &limits)?;
            read_records(&file.bytes, details_format, RecordKind::Detail, limits.max_rows)
                .map_err(|e| ImportError::format(FileRole::Details, e))?
                .records
        }
        (None, Some(embedded)) => embedded,
        (None, None) => Vec::new(),
    };

    info!(
        correlation_id = metadata.correlation_id.as_deref().unwrap_or("-"),
        initiated_by = metadata.initiated_by.as_deref().unwrap_or("-"),
        %mode,
        format = %claims_format,
        claim_rows = claim_rows.len(),
        detail_rows = detail_rows.len(),
        "Starting claims import"
    );

    let mut report = ImportReport::new(mode, claims_format);
    let pending_claims = validate_claims(&claim_rows, &mut report);
    let pending_details = validate_details(&detail_rows, &mut report);

    let mut session = store.begin(Some(&metadata)).await?;
    let applied = apply(session.as_mut(), mode, &pending_claims, &pending_details, &mut report).await;
    match applied {
        Ok(()) => {
            session.commit().await?;
        }
        Err(error) => {
            warn!(error = %error, "Import failed, rolling back");
            if let Err(rollback_error) = session.rollback().await {
                warn!(error = %rollback_error, "Rollback failed");
            }
            return Err(ImportError::Storage(error));
        }
    }

    report.errors.sort_by_key(|e| (e.source, e.row));
    report.rejected = report.errors.len();
    if report.rejected > 0 {
        warn!(rejected = report.rejected, "Import committed with rejected rows");
    }
    info!(
        claims_inserted = report.claims_inserted,
        claims_updated = report.claims_updated,
        details_inserted = report.details_inserted,
        details_updated = report.details_updated,
        "Claims import committed"
    );

    Ok(report)
}

fn resolve_format(
    role: FileRole,
    file: &ImportFile,
    declared: Option<FileFormat>,
    limits: &ImportLimits,
) -> Result<FileFormat, ImportError> {
    if file.bytes.len() > limits.max_bytes {
        return Err(ImportError::format(
            role,
            FormatError::TooLarge {
                size: file.bytes.len(),
                limit: limits.max_bytes,
            },
        ));
    }
    FileFormat::detect(declared, file.filename.as_deref(), &file.bytes)
        .map_err(|e| ImportError::format(role, e))
}

fn validate_claims(rows: &[RawRecord], report: &mut ImportReport) -> Vec<PendingClaim> {
    let mut first_seen: HashMap<ClaimId, usize> = HashMap::new();
    let mut pending = Vec::with_capacity(rows.len());

    for raw in rows {
        if let Some(reason) = raw.malformed_reason() {
            report.reject(RowError::malformed(FileRole::Claims, raw.row, reason));
            continue;
        }
        match fields::claim_from_record(raw) {
            Ok(record) => {
                let id = record.claim.id;
                if let Some(first) = first_seen.get(&id) {
                    report.reject(RowError::for_claim(
                        FileRole::Claims,
                        raw.row,
                        id,
                        Field::Id,
                        format!("duplicate id {} in file, first seen at row {}", id, first),
                    ));
                    continue;
                }
                first_seen.insert(id, raw.row);
                pending.push(PendingClaim { row: raw.row, record });
            }
            Err(errors) => {
                report.reject(RowError::from_fields(FileRole::Claims, raw, Field::Id, errors));
            }
        }
    }

    pending
}

fn validate_details(rows: &[RawRecord], report: &mut ImportReport) -> Vec<PendingDetail> {
    let mut first_seen: HashMap<ClaimId, usize> = HashMap::new();
    let mut pending = Vec::with_capacity(rows.len());

    for raw in rows {
        if let Some(reason) = raw.malformed_reason() {
            report.reject(RowError::malformed(FileRole::Details, raw.row, reason));
            continue;
        }
        match fields::detail_from_record(raw) {
            Ok(detail) => {
                let id = detail.claim_id;
                if let Some(first) = first_seen.get(&id) {
                    report.reject(RowError::for_claim(
                        FileRole::Details,
                        raw.row,
                        id,
                        Field::ClaimId,
                        format!("duplicate claim_id {} in file, first seen at row {}", id, first),
                    ));
                    continue;
                }
                first_seen.insert(id, raw.row);
                pending.push(PendingDetail { row: raw.row, detail });
            }
            Err(errors) => {
                report.reject(RowError::from_fields(
                    FileRole::Details,
                    raw,
                    Field::ClaimId,
                    errors,
                ));
            }
        }
    }

    pending
}

async fn apply(
    session: &mut dyn ClaimSession,
    mode: ImportMode,
    claims: &[PendingClaim],
    details: &[PendingDetail],
    report: &mut ImportReport,
) -> Result<(), PortError> {
    let ids: Vec<ClaimId> = claims.iter().map(|p| p.record.claim.id).collect();
    let existing = session.existing_claim_ids(&ids).await?;
    let mut accepted: HashSet<ClaimId> = HashSet::with_capacity(ids.len());

    for pending in claims {
        let claim = &pending.record.claim;
        if existing.contains(&claim.id) {
            if mode == ImportMode::Add {
                report.reject(RowError::for_claim(
                    FileRole::Claims,
                    pending.row,
                    claim.id,
                    Field::Id,
                    format!("claim {} already exists", claim.id),
                ));
                continue;
            }
            session.update_claim(claim).await?;
            report.claims_updated += 1;
        } else {
            session.insert_claim(claim).await?;
            report.claims_inserted += 1;
        }
        accepted.insert(claim.id);

        if let Some(detail) = &pending.record.detail {
            let inserted = session.upsert_detail(detail).await?;
            report.count_detail(inserted);
        }
    }

    if details.is_empty() {
        return Ok(());
    }

    let detail_ids: Vec<ClaimId> = details.iter().map(|p| p.detail.claim_id).collect();
    let owners = session.existing_claim_ids(&detail_ids).await?;
    let existing_details = session.existing_detail_ids(&detail_ids).await?;

    for pending in details {
        let id = pending.detail.claim_id;
        if !owners.contains(&id) && !accepted.contains(&id) {
            report.reject(RowError::for_claim(
                FileRole::Details,
                pending.row,
                id,
                Field::ClaimId,
                format!("claim {} does not exist", id),
            ));
            continue;
        }
        if mode == ImportMode::Add && existing_details.contains(&id) {
            report.reject(RowError::for_claim(
                FileRole::Details,
                pending.row,
                id,
                Field::ClaimId,
                format!("claim {} already has details", id),
            ));
            continue;
        }
        let inserted = session.upsert_detail(&pending.detail).await?;
        report.count_detail(inserted);
    }

    Ok(())
}
