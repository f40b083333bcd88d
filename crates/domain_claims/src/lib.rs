//! Claims Records Domain
//!
//! This crate implements the insurance claims records model: claims with
//! their one-to-one detail record, review flags and notes, the read models
//! behind listings and the dashboard, and bulk transfer of claims to and
//! from pipe-delimited CSV or JSON files.
//!
//! # Claim Lifecycle
//!
//! ```text
//! import (add / overwrite) -> status edits, flags, notes -> purge
//! ```
//!
//! Storage is reached only through the [`ports::ClaimStore`] trait.

pub mod annotation;
pub mod claim;
pub mod error;
pub mod fields;
pub mod ports;
pub mod query;
pub mod transfer;

pub use annotation::{Flag, Note, DEFAULT_FLAG_REASON};
pub use claim::{Claim, ClaimDetail, ClaimRecord, ClaimStatus};
pub use error::ClaimError;
pub use fields::{Field, FieldError};
pub use ports::{ClaimSession, ClaimStore};
pub use query::{
    ClaimListItem, ClaimPage, ClaimQuery, ClaimView, DashboardStats, DataCounts, ExportFilter,
    StatusCount,
};
pub use transfer::{
    export_claims, import_claims, ExportError, ExportFile, FileFormat, FormatError, ImportError,
    ImportFile, ImportLimits, ImportMode, ImportReport, ImportRequest, RowError,
};
