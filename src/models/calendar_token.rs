use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// OAuth tokens a user granted for their external calendar. The exchange
/// itself happens outside this service; we only keep the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarToken {
    pub user_id: String,
    pub user_type: Role,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Token to act with out of a user's rows: an unexpired one when any
    /// exists (those of type `role` first), else the most recent row.
    /// `tokens` must be ordered most recently updated first.
    pub fn preferred(tokens: &[CalendarToken], role: Role, now: DateTime<Utc>) -> Option<&CalendarToken> {
        tokens
            .iter()
            .filter(|t| !t.is_expired(now))
            .min_by_key(|t| t.user_type != role)
            .or_else(|| tokens.first())
    }
}
