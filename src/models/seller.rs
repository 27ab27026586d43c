use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AvailabilitySettings, CalendarToken, UserProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub user_id: String,
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub availability_settings: Option<AvailabilitySettings>,
    pub created_at: DateTime<Utc>,
}

impl Seller {
    /// Stored settings, or the default business week when none were saved.
    pub fn settings(&self) -> AvailabilitySettings {
        self.availability_settings.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerSummary {
    pub email: String,
    pub full_name: String,
}

/// One entry of the public seller directory.
#[derive(Debug, Clone, Serialize)]
pub struct SellerListing {
    pub id: String,
    pub business_name: String,
    pub description: String,
    pub location: String,
    pub owner: OwnerSummary,
    pub has_google_calendar: bool,
    pub is_online: bool,
}

impl SellerListing {
    pub fn new(
        seller: &Seller,
        owner: Option<&UserProfile>,
        token: Option<&CalendarToken>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: seller.id.clone(),
            business_name: or_placeholder(&seller.business_name, "Unknown Business"),
            description: or_placeholder(&seller.description, "No description available"),
            location: or_placeholder(&seller.location, "Location not specified"),
            owner: OwnerSummary {
                email: owner.map(|p| p.email.clone()).unwrap_or_default(),
                full_name: owner
                    .map(|p| p.display_name("Unknown").to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
            },
            has_google_calendar: token.is_some(),
            is_online: token.is_some_and(|t| !t.is_expired(now)),
        }
    }
}

fn or_placeholder(value: &Option<String>, placeholder: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
        .to_string()
}
