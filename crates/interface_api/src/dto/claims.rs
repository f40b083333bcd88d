//! Claims DTOs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use domain_claims::annotation::MAX_FLAG_REASON_LEN;
use domain_claims::query::MAX_SEARCH_LEN;
use domain_claims::{ClaimQuery, ClaimStatus, Flag};

use crate::error::ApiError;

const SEARCH_MAX: u64 = MAX_SEARCH_LEN as u64;
const FLAG_REASON_MAX: u64 = MAX_FLAG_REASON_LEN as u64;

/// Query parameters of the claims listing
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListClaimsParams {
    #[validate(length(max = SEARCH_MAX))]
    pub search: Option<String>,
    pub status: Option<String>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListClaimsParams {
    /// Builds the domain query; an empty status means no filter
    pub fn into_query(self) -> Result<ClaimQuery, ApiError> {
        self.validate()?;

        let mut query = ClaimQuery::new();
        let default_page_size = query.page_size;
        if let Some(search) = self.search {
            query = query.with_search(search);
        }
        if let Some(status) = parse_status(self.status.as_deref())? {
            query = query.with_status(status);
        }
        Ok(query.paginate(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(default_page_size),
        ))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1))]
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn status(&self) -> Result<ClaimStatus, ApiError> {
        self.validate()?;
        ClaimStatus::from_str(self.status.trim()).map_err(|e| ApiError::validation(e.to_string()))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct FlagRequest {
    #[validate(length(max = FLAG_REASON_MAX))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlagResponse {
    pub flag: Flag,
    /// False when the user had already flagged the claim
    pub created: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteRequest {
    #[validate(length(min = 1))]
    pub note: String,
}

/// Parses an optional status filter; blank means none
pub fn parse_status(raw: Option<&str>) -> Result<Option<ClaimStatus>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(label) => ClaimStatus::from_str(label)
            .map(Some)
            .map_err(|e| ApiError::validation(e.to_string())),
        None => Ok(None),
    }
}
