//! Bulk data DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use domain_claims::{DataCounts, ExportFilter, FileFormat};

use crate::dto::claims::parse_status;
use crate::error::ApiError;

/// Query parameters of the export endpoint
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ExportParams {
    pub format: Option<String>,
    pub status: Option<String>,
    #[validate(length(max = 255))]
    pub insurer: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ExportParams {
    /// Output format, CSV unless requested otherwise
    pub fn file_format(&self) -> Result<FileFormat, ApiError> {
        match self.format.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            Some(format) => Ok(FileFormat::from_str(format)?),
            None => Ok(FileFormat::Csv),
        }
    }

    pub fn filter(&self) -> Result<ExportFilter, ApiError> {
        self.validate()?;
        Ok(ExportFilter {
            status: parse_status(self.status.as_deref())?,
            insurer: self.insurer.clone(),
            from: self.from,
            to: self.to,
        })
    }
}

/// Text fields of the import form
#[derive(Debug, Default)]
pub struct ImportForm {
    pub mode: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub deleted: DataCounts,
}
