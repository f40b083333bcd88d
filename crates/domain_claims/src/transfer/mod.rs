//! Bulk Import/Export
//!
//! Moves claims between the store and pipe-delimited CSV or JSON files.
//!
//! # Import
//!
//! [`import_claims`] reads a claims file (and optionally a separate details
//! file, or the `claim_details` array of a JSON export envelope),
//! validates every record against the typed field schema and writes
//! the accepted records in one storage session:
//!
//! - `add` rejects records whose id already exists
//! - `overwrite` replaces them
//!
//! # Export
//!
//! [`export_claims`] writes the claims matching an [`ExportFilter`] with
//! their details. The output is accepted by import unchanged.
//!
//! [`ExportFilter`]: crate::query::ExportFilter

pub mod error;
pub mod export;
pub mod format;
pub mod import;
pub mod reader;

pub use error::{ExportError, FileRole, FormatError, ImportError};
pub use export::{export_claims, render, ExportFile};
pub use format::FileFormat;
pub use import::{
    import_claims, ImportFile, ImportLimits, ImportMode, ImportReport, ImportRequest, RowError,
    DEFAULT_MAX_BYTES, DEFAULT_MAX_ROWS,
};
