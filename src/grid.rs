//! The fixed universe of bookable start times and the conversions between
//! 12-hour clock labels ("H:MM AM/PM") and minutes since midnight.

use serde::{Deserialize, Serialize};

use crate::model::{Minute, MINUTES_PER_DAY, SLOT_MINUTES};

/// 06:00, the first bookable start.
pub const FIRST_SLOT: Minute = 6 * 60;

/// 23:00, the last bookable start. 23:30 is left out so the last booking
/// still fits before midnight.
pub const LAST_SLOT: Minute = 23 * 60;

pub const SLOT_COUNT: usize = ((LAST_SLOT - FIRST_SLOT) / SLOT_MINUTES) as usize + 1;

/// A time of day on the grid. Serializes as its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TimeSlot {
    minute: Minute,
}

impl TimeSlot {
    pub fn from_minute(minute: Minute) -> Self {
        Self {
            minute: minute % MINUTES_PER_DAY,
        }
    }

    pub fn minute(&self) -> Minute {
        self.minute
    }

    pub fn label(&self) -> String {
        format_label(self.minute)
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.label()
    }
}

/// Permissive like [`to_minutes`]: an unparseable label lands on midnight.
impl From<String> for TimeSlot {
    fn from(label: String) -> Self {
        TimeSlot::from_minute(to_minutes(&label))
    }
}

/// Every bookable start time in chronological order. Cheap to clone and restart.
pub fn generate_slots() -> impl Iterator<Item = TimeSlot> + Clone {
    (FIRST_SLOT..=LAST_SLOT)
        .step_by(SLOT_MINUTES as usize)
        .map(TimeSlot::from_minute)
}

/// Strict parse of "H:MM AM/PM". Hours 1–12, minutes 00–59, meridiem in
/// either case.
pub fn parse_label(label: &str) -> Option<Minute> {
    let mut parts = label.split_whitespace();
    let clock = parts.next()?;
    let meridiem = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (h, m) = clock.split_once(':')?;
    if m.len() != 2 {
        return None;
    }
    let hour: Minute = h.parse().ok()?;
    let minute: Minute = m.parse().ok()?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }

    let hour24 = match meridiem.to_ascii_uppercase().as_str() {
        "AM" => hour % 12,
        "PM" => hour % 12 + 12,
        _ => return None,
    };
    Some(hour24 * 60 + minute)
}

/// Minutes since midnight for a label. Malformed input yields `0`; forms
/// upstream only ever submit labels this module produced.
pub fn to_minutes(label: &str) -> Minute {
    parse_label(label).unwrap_or(0)
}

/// Inverse of [`parse_label`] for `0..1440`.
pub fn format_label(minute: Minute) -> String {
    let minute = minute % MINUTES_PER_DAY;
    let hour24 = minute / 60;
    let meridiem = if hour24 < 12 { "AM" } else { "PM" };
    let hour12 = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{hour12}:{:02} {meridiem}", minute % 60)
}

/// Human length of `[start, end)`, or `""` when `end <= start`.
pub fn duration(start_label: &str, end_label: &str) -> String {
    duration_between(to_minutes(start_label), to_minutes(end_label))
}

pub fn duration_between(start: Minute, end: Minute) -> String {
    if end <= start {
        return String::new();
    }
    let total = end - start;
    let hours = total / 60;
    let minutes = total % 60;

    let mut parts = Vec::with_capacity(2);
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }
    parts.join(" ")
}

fn plural(n: Minute, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
