//! User annotations on claims: review flags and free-text notes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ClaimId, FlagId, NoteId};
use crate::error::ClaimError;

/// Reason recorded when the user does not supply one
pub const DEFAULT_FLAG_REASON: &str = "Flagged for review";
/// Maximum length of a flag reason
pub const MAX_FLAG_REASON_LEN: usize = 255;
/// Maximum length of a note body
pub const MAX_NOTE_LEN: usize = 5000;

/// A review flag placed on a claim by a user
///
/// A user flags a given claim at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub id: FlagId,
    pub claim_id: ClaimId,
    pub user_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Flag {
    /// Creates a new flag
    ///
    /// A missing or blank reason falls back to [`DEFAULT_FLAG_REASON`].
    pub fn new(
        claim_id: ClaimId,
        user_id: impl Into<String>,
        reason: Option<&str>,
    ) -> Result<Self, ClaimError> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_FLAG_REASON);
        if reason.chars().count() > MAX_FLAG_REASON_LEN {
            return Err(ClaimError::TooLong {
                field: "reason".to_string(),
                max: MAX_FLAG_REASON_LEN,
            });
        }

        Ok(Self {
            id: FlagId::new(),
            claim_id,
            user_id: user_id.into(),
            reason: reason.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// A free-text note attached to a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub claim_id: ClaimId,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note
    ///
    /// The text is trimmed and truncated to [`MAX_NOTE_LEN`] characters.
    pub fn new(
        claim_id: ClaimId,
        author: impl Into<String>,
        text: &str,
    ) -> Result<Self, ClaimError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ClaimError::EmptyNote);
        }

        Ok(Self {
            id: NoteId::new(),
            claim_id,
            author: author.into(),
            text: text.chars().take(MAX_NOTE_LEN).collect(),
            created_at: Utc::now(),
        })
    }
}
