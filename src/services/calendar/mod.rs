pub mod google;
pub mod ics;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::availability::Interval;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
    pub meet_link: Option<String>,
}

/// External calendar the users connected. Calls are made with the user's own
/// access token, already obtained through the provider's OAuth flow.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn create_event(
        &self,
        access_token: &str,
        event: &NewCalendarEvent,
    ) -> anyhow::Result<CreatedEvent>;

    async fn busy_periods(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Interval>>;
}
