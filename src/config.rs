use std::env;

use chrono_tz::Tz;

use crate::errors::AppError;
use crate::services::calendar::google::DEFAULT_API_BASE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    /// Bearer token required on `/api` routes. Empty disables the check.
    pub api_token: String,
    /// `google` to push events to Google Calendar, anything else disables it.
    pub calendar_provider: String,
    pub google_calendar_api_base: String,
    pub default_timezone: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "appointly.db".to_string()),
            api_token: env::var("API_TOKEN").unwrap_or_default(),
            calendar_provider: env::var("CALENDAR_PROVIDER").unwrap_or_else(|_| "none".to_string()),
            google_calendar_api_base: env::var("GOOGLE_CALENDAR_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            default_timezone: env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
        }
    }

    /// Timezone for sellers whose settings do not name one.
    pub fn default_tz(&self) -> Result<Tz, AppError> {
        self.default_timezone
            .parse::<Tz>()
            .map_err(|_| AppError::Config(format!("unknown DEFAULT_TIMEZONE: {}", self.default_timezone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(tz: &str) -> AppConfig {
        AppConfig {
            port: 3000,
            database_url: ":memory:".to_string(),
            api_token: String::new(),
            calendar_provider: "none".to_string(),
            google_calendar_api_base: DEFAULT_API_BASE.to_string(),
            default_timezone: tz.to_string(),
        }
    }

    #[test]
    fn test_default_tz() {
        assert_eq!(config("Europe/Zurich").default_tz().unwrap(), chrono_tz::Europe::Zurich);
        assert!(matches!(config("Nowhere/Else").default_tz(), Err(AppError::Config(_))));
    }
}
