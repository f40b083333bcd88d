//! Read models for listings, claim views and the dashboard

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::annotation::{Flag, Note};
use crate::claim::{Claim, ClaimDetail, ClaimStatus};

/// Longest search term honoured; longer input is truncated
pub const MAX_SEARCH_LEN: usize = 200;
/// Page sizes offered by the listing
pub const PAGE_SIZES: [u32; 3] = [10, 20, 50];
/// Page size used when the requested one is not offered
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Number of recent flags and notes shown on the dashboard
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Listing query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimQuery {
    /// Case-insensitive substring of the patient or insurer name
    pub search: Option<String>,
    /// Exact status
    pub status: Option<ClaimStatus>,
    /// Requested page, 1-based
    pub page: u32,
    /// Requested page size
    pub page_size: u32,
}

impl ClaimQuery {
    pub fn new() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status(mut self, status: ClaimStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn paginate(mut self, page: u32, page_size: u32) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    /// Normalized search term: trimmed, truncated, `None` when blank
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.chars().take(MAX_SEARCH_LEN).collect())
    }

    /// Requested page size if offered, otherwise the default
    pub fn effective_page_size(&self) -> u32 {
        if PAGE_SIZES.contains(&self.page_size) {
            self.page_size
        } else {
            DEFAULT_PAGE_SIZE
        }
    }

    /// Returns true if the claim satisfies the search and status filters
    pub fn matches(&self, claim: &Claim) -> bool {
        if let Some(status) = self.status {
            if claim.status != status {
                return false;
            }
        }
        match self.search_term() {
            Some(term) => {
                let term = term.to_lowercase();
                claim.patient_name.to_lowercase().contains(&term)
                    || claim.insurer_name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }

    /// Resolves the page actually served for a result of `total_count` rows
    pub fn window(&self, total_count: u64) -> PageWindow {
        let page_size = self.effective_page_size();
        let total_pages = total_count.div_ceil(u64::from(page_size)).max(1) as u32;
        let page = self.page.clamp(1, total_pages);
        PageWindow {
            page,
            page_size,
            total_pages,
            offset: u64::from(page - 1) * u64::from(page_size),
        }
    }
}

/// The page served for a query after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub offset: u64,
}

/// Filter applied to exports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClaimStatus>,
    /// Insurer name, matched case-insensitively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurer: Option<String>,
    /// Earliest discharge date, inclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    /// Latest discharge date, inclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

impl ExportFilter {
    /// Trimmed insurer name, `None` when blank
    pub fn insurer_name(&self) -> Option<&str> {
        self.insurer.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, claim: &Claim) -> bool {
        if self.status.is_some_and(|status| claim.status != status) {
            return false;
        }
        if let Some(insurer) = self.insurer_name() {
            if claim.insurer_name.to_lowercase() != insurer.to_lowercase() {
                return false;
            }
        }
        if self.from.is_some_and(|from| claim.discharge_date < from) {
            return false;
        }
        if self.to.is_some_and(|to| claim.discharge_date > to) {
            return false;
        }
        true
    }
}

/// A row of the claims listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimListItem {
    #[serde(flatten)]
    pub claim: Claim,
    pub has_detail: bool,
    pub flag_count: u64,
    pub note_count: u64,
}

/// One page of the claims listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimPage {
    pub items: Vec<ClaimListItem>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl ClaimPage {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Everything shown on a claim's detail view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimView {
    pub claim: Claim,
    pub detail: Option<ClaimDetail>,
    /// Newest first
    pub notes: Vec<Note>,
    /// Newest first
    pub flags: Vec<Flag>,
    /// Whether the viewing user has flagged this claim
    pub flagged_by_viewer: bool,
    pub underpayment: Decimal,
}

/// Number of claims with a given status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: ClaimStatus,
    pub count: u64,
}

/// Aggregate figures for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_claims: u64,
    /// Claims with at least one flag
    pub flagged_claims: u64,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    /// Mean of billed minus paid, rounded to cents
    pub average_underpayment: Decimal,
    /// Total billed minus total paid
    pub outstanding: Decimal,
    pub status_breakdown: Vec<StatusCount>,
    pub recent_flags: Vec<Flag>,
    pub recent_notes: Vec<Note>,
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCounts {
    pub claims: u64,
    pub details: u64,
    pub flags: u64,
    pub notes: u64,
}

/// Mean underpayment rounded to cents, zero for an empty set
pub fn average_underpayment(total_underpayment: Decimal, claims: u64) -> Decimal {
    if claims == 0 {
        return Decimal::ZERO;
    }
    (total_underpayment / Decimal::from(claims)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_page_size_falls_back() {
        assert_eq!(ClaimQuery::new().paginate(1, 20).effective_page_size(), 20);
        assert_eq!(ClaimQuery::new().paginate(1, 33).effective_page_size(), 10);
    }

    #[test]
    fn test_window_clamps_page() {
        let window = ClaimQuery::new().paginate(9, 10).window(25);
        assert_eq!(window.page, 3);
        assert_eq!(window.total_pages, 3);
        assert_eq!(window.offset, 20);

        let window = ClaimQuery::new().paginate(0, 10).window(0);
        assert_eq!(window.page, 1);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.offset, 0);
    }

    #[test]
    fn test_search_term_is_truncated() {
        let query = ClaimQuery::new().with_search("x".repeat(500));
        assert_eq!(query.search_term().map(|s| s.len()), Some(MAX_SEARCH_LEN));
        assert_eq!(ClaimQuery::new().with_search("   ").search_term(), None);
    }
}
