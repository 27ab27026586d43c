use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;

use super::{CalendarProvider, CreatedEvent, NewCalendarEvent};
use crate::services::availability::Interval;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub struct GoogleCalendarProvider {
    api_base: String,
    client: reqwest::Client,
}

impl GoogleCalendarProvider {
    pub fn new(api_base: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    id: String,
    html_link: Option<String>,
    hangout_link: Option<String>,
}

#[derive(Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: std::collections::HashMap<String, FreeBusyCalendar>,
}

#[derive(Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyPeriod>,
}

#[derive(Deserialize)]
struct BusyPeriod {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Request body for `events.insert`, asking for a Meet link alongside.
pub fn event_body(event: &NewCalendarEvent, request_id: &str) -> serde_json::Value {
    let attendees: Vec<serde_json::Value> = event
        .attendees
        .iter()
        .map(|email| json!({ "email": email }))
        .collect();

    json!({
        "summary": event.summary,
        "description": event.description,
        "start": { "dateTime": rfc3339(&event.start), "timeZone": "UTC" },
        "end": { "dateTime": rfc3339(&event.end), "timeZone": "UTC" },
        "attendees": attendees,
        "conferenceData": {
            "createRequest": {
                "requestId": request_id,
                "conferenceSolutionKey": { "type": "hangoutsMeet" }
            }
        }
    })
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn create_event(
        &self,
        access_token: &str,
        event: &NewCalendarEvent,
    ) -> anyhow::Result<CreatedEvent> {
        let url = format!(
            "{}/calendars/primary/events?conferenceDataVersion=1",
            self.api_base
        );
        let body = event_body(event, &format!("meet-{}", uuid::Uuid::new_v4()));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .context("failed to call Google Calendar API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Calendar API error ({status}): {text}");
        }

        let created: EventResponse = resp
            .json()
            .await
            .context("failed to parse Google Calendar event")?;

        Ok(CreatedEvent {
            id: created.id,
            html_link: created.html_link,
            meet_link: created.hangout_link,
        })
    }

    async fn busy_periods(
        &self,
        access_token: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Interval>> {
        let url = format!("{}/freeBusy", self.api_base);
        let body = json!({
            "timeMin": rfc3339(&from),
            "timeMax": rfc3339(&to),
            "items": [{ "id": "primary" }],
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .context("failed to call Google free/busy API")?
            .error_for_status()
            .context("Google free/busy API returned error")?;

        let data: FreeBusyResponse = resp
            .json()
            .await
            .context("failed to parse free/busy response")?;

        Ok(data
            .calendars
            .into_values()
            .flat_map(|cal| cal.busy)
            .map(|period| (period.start, period.end))
            .collect())
    }
}
