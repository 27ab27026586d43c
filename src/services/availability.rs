//! Slot generation and interval overlap.
//!
//! Every path that needs to know whether a seller is free (the slot listing,
//! booking validation, status changes) goes through these functions.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::AvailabilitySettings;

pub type Interval = (DateTime<Utc>, DateTime<Utc>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` share at
/// least one instant. Back-to-back intervals do not overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Candidate slots for `date` in the seller's local time `tz`.
///
/// Slots begin at the day's opening time, last `slot_duration` minutes and
/// are spaced `slot_duration + buffer_time` apart. A slot that would run past
/// closing time is not emitted. Local times that do not exist (DST gap) are
/// skipped. All slots start out available.
pub fn generate_slots(settings: &AvailabilitySettings, date: NaiveDate, tz: Tz) -> Vec<Slot> {
    let Some((open, close)) = settings.window_for(date.weekday()) else {
        return vec![];
    };

    let duration = settings.effective_slot_duration();
    let step = duration + settings.buffer();
    let close = date.and_time(close);

    let mut slots = vec![];
    let mut current = date.and_time(open);
    while current < close {
        let slot_end = current + duration;
        if slot_end > close {
            break;
        }
        if let (Some(start), Some(end)) = (to_utc(tz, current), to_utc(tz, slot_end)) {
            slots.push(Slot {
                start,
                end,
                available: true,
            });
        }
        current += step;
    }
    slots
}

/// A slot stays available only if it starts after `now` and overlaps none of
/// the `busy` intervals.
pub fn mark_availability(slots: Vec<Slot>, busy: &[Interval], now: DateTime<Utc>) -> Vec<Slot> {
    slots
        .into_iter()
        .map(|slot| {
            let conflict = busy
                .iter()
                .any(|(start, end)| intervals_overlap(slot.start, slot.end, *start, *end));
            Slot {
                available: slot.available && !conflict && slot.start > now,
                ..slot
            }
        })
        .collect()
}

/// UTC bounds `[start, end)` of the local calendar day `date` in `tz`.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> Interval {
    let start = local_midnight(date, tz);
    let next = date.succ_opt().map(|d| local_midnight(d, tz));
    (start, next.unwrap_or(start + Duration::days(1)))
}

/// Whether `[start, end)` lies inside the working hours of the local day on
/// which it starts.
pub fn fits_working_hours(
    settings: &AvailabilitySettings,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> bool {
    let local_start = start.with_timezone(&tz).naive_local();
    let local_end = end.with_timezone(&tz).naive_local();
    let date = local_start.date();

    match settings.window_for(date.weekday()) {
        Some((open, close)) => {
            local_start >= date.and_time(open) && local_end <= date.and_time(close)
        }
        None => false,
    }
}

fn to_utc(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // A few zones skip midnight on DST days; the day then starts an hour later.
    to_utc(tz, midnight)
        .or_else(|| to_utc(tz, midnight + Duration::hours(1)))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
