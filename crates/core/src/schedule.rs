//! Free/busy helpers for scheduling questions. Every function is
//! deterministic given `now` and the input events; nothing here touches a
//! clock or any shared state.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::domain::event::Event;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub slot_minutes: u32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self { start_hour: 8, end_hour: 18, slot_minutes: 60 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Availability grid for the next 7 days within business hours. Slots that
/// already ended at `now` are not generated.
pub fn default_slots(now: DateTime<Utc>, hours: &BusinessHours) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    if hours.slot_minutes == 0 || hours.start_hour >= hours.end_hour {
        return slots;
    }

    for day_offset in 0..7i64 {
        let date = now.date_naive() + Duration::days(day_offset);
        let mut minute = hours.start_hour * 60;
        let closing = hours.end_hour * 60;

        while minute + hours.slot_minutes <= closing {
            let start = date
                .and_hms_opt(minute / 60, minute % 60, 0)
                .map(|naive| naive.and_utc());
            if let Some(start) = start {
                let end = start + Duration::minutes(i64::from(hours.slot_minutes));
                if end > now {
                    slots.push(TimeSlot { start, end });
                }
            }
            minute += hours.slot_minutes;
        }
    }

    slots
}

/// A slot and an event overlap unless one entirely precedes the other
/// (inclusive bounds on both sides).
fn overlaps(slot: &TimeSlot, event: &Event) -> bool {
    !(slot.end < event.starts_at || event.ends_at < slot.start)
}

/// Subtracts every slot overlapping any of the given events.
pub fn free_slots(slots: &[TimeSlot], events: &[Event]) -> Vec<TimeSlot> {
    slots
        .iter()
        .filter(|slot| events.iter().all(|event| !overlaps(slot, event)))
        .copied()
        .collect()
}

/// Events grouped by their start relative to `now`. The week buckets span
/// Monday through Sunday, so `today` and `tomorrow` usually also appear in
/// `this_week`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelativeBuckets {
    pub today: Vec<Event>,
    pub tomorrow: Vec<Event>,
    pub this_week: Vec<Event>,
    pub next_week: Vec<Event>,
}

pub fn bucket_events(now: DateTime<Utc>, events: &[Event]) -> RelativeBuckets {
    let today = now.date_naive();
    let tomorrow = today + Duration::days(1);
    let this_week = today.week(Weekday::Mon);
    let next_week_first = this_week.last_day() + Duration::days(1);
    let next_week = next_week_first.week(Weekday::Mon);

    let mut buckets = RelativeBuckets::default();
    for event in events {
        let date = event.starts_at.date_naive();
        if date == today {
            buckets.today.push(event.clone());
        }
        if date == tomorrow {
            buckets.tomorrow.push(event.clone());
        }
        if date >= this_week.first_day() && date <= this_week.last_day() {
            buckets.this_week.push(event.clone());
        }
        if date >= next_week.first_day() && date <= next_week.last_day() {
            buckets.next_week.push(event.clone());
        }
    }
    buckets
}
