use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SLOT_DURATION: u32 = 60;
pub const DEFAULT_BUFFER_TIME: u32 = 15;

/// A seller's weekly working hours and slot shape, stored as JSON on the
/// seller row. Keys are camelCase to stay readable by existing clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySettings {
    #[serde(default)]
    pub working_hours: WorkingHours,
    /// Minutes per slot. Zero falls back to the default.
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u32,
    /// Minutes left free between consecutive slots.
    #[serde(default = "default_buffer_time")]
    pub buffer_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkingHours {
    #[serde(default = "weekday_hours")]
    pub monday: DayHours,
    #[serde(default = "weekday_hours")]
    pub tuesday: DayHours,
    #[serde(default = "weekday_hours")]
    pub wednesday: DayHours,
    #[serde(default = "weekday_hours")]
    pub thursday: DayHours,
    #[serde(default = "weekday_hours")]
    pub friday: DayHours,
    #[serde(default = "weekend_hours")]
    pub saturday: DayHours,
    #[serde(default = "weekend_hours")]
    pub sunday: DayHours,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayHours {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub enabled: bool,
}

fn default_slot_duration() -> u32 {
    DEFAULT_SLOT_DURATION
}

fn default_buffer_time() -> u32 {
    DEFAULT_BUFFER_TIME
}

fn weekday_hours() -> DayHours {
    DayHours {
        start: "09:00".to_string(),
        end: "17:00".to_string(),
        enabled: true,
    }
}

fn weekend_hours() -> DayHours {
    DayHours {
        start: "10:00".to_string(),
        end: "14:00".to_string(),
        enabled: false,
    }
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            monday: weekday_hours(),
            tuesday: weekday_hours(),
            wednesday: weekday_hours(),
            thursday: weekday_hours(),
            friday: weekday_hours(),
            saturday: weekend_hours(),
            sunday: weekend_hours(),
        }
    }
}

impl Default for AvailabilitySettings {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            slot_duration: DEFAULT_SLOT_DURATION,
            buffer_time: DEFAULT_BUFFER_TIME,
            timezone: None,
        }
    }
}

impl WorkingHours {
    pub fn for_weekday(&self, day: Weekday) -> &DayHours {
        match day {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

impl AvailabilitySettings {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let settings: AvailabilitySettings = serde_json::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for day in WEEK {
            let hours = self.working_hours.for_weekday(day);
            let start = parse_time(&hours.start)?;
            let end = parse_time(&hours.end)?;
            if hours.enabled && start >= end {
                anyhow::bail!(
                    "working hours for {day} must start before they end ({}-{})",
                    hours.start,
                    hours.end
                );
            }
        }
        if self.slot_duration > 24 * 60 {
            anyhow::bail!("slot duration too long: {} minutes", self.slot_duration);
        }
        if let Some(tz) = &self.timezone {
            tz.parse::<Tz>()
                .map_err(|_| anyhow::anyhow!("unknown timezone: {tz}"))?;
        }
        Ok(())
    }

    pub fn effective_slot_duration(&self) -> chrono::Duration {
        let minutes = if self.slot_duration == 0 {
            DEFAULT_SLOT_DURATION
        } else {
            self.slot_duration
        };
        chrono::Duration::minutes(i64::from(minutes))
    }

    pub fn buffer(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.buffer_time))
    }

    /// Opening and closing time for `day`, or `None` when the day is off.
    pub fn window_for(&self, day: Weekday) -> Option<(NaiveTime, NaiveTime)> {
        let hours = self.working_hours.for_weekday(day);
        if !hours.enabled {
            return None;
        }
        let start = parse_time(&hours.start).ok()?;
        let end = parse_time(&hours.end).ok()?;
        (start < end).then_some((start, end))
    }

    /// Seller timezone, or `fallback` when none (or an unknown one) is set.
    pub fn tz_or(&self, fallback: Tz) -> Tz {
        self.timezone
            .as_deref()
            .and_then(|tz| tz.parse::<Tz>().ok())
            .unwrap_or(fallback)
    }

    pub fn to_human_readable(&self) -> String {
        let days: Vec<String> = WEEK
            .iter()
            .filter_map(|day| {
                let hours = self.working_hours.for_weekday(*day);
                hours
                    .enabled
                    .then(|| format!("{day}: {}-{}", hours.start, hours.end))
            })
            .collect();

        if days.is_empty() {
            return "no working hours configured".to_string();
        }
        days.join(", ")
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| anyhow::anyhow!("time out of range: {s}"))
}
