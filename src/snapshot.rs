//! Data handed over by the external reservation and blackout stores.
//!
//! Stores may express times either as minutes since midnight or as
//! "H:MM AM/PM" labels; both are accepted. Records that cannot be
//! interpreted are skipped with a warning rather than failing the load.

use std::convert::Infallible;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use ulid::Ulid;

use crate::grid::parse_label;
use crate::model::*;

/// Read side of the external store, for a date range (inclusive).
#[async_trait]
pub trait CalendarSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn reservations(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Reservation>, Self::Error>;

    async fn blackouts(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<BlackoutWindow>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum TimeValue {
    Minute(Minute),
    Label(String),
}

impl TimeValue {
    fn minute(&self) -> Option<Minute> {
        match self {
            TimeValue::Minute(m) if *m <= MINUTES_PER_DAY => Some(*m),
            TimeValue::Minute(_) => None,
            TimeValue::Label(label) => parse_label(label),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlackout {
    #[serde(default)]
    id: Option<Ulid>,
    date: NaiveDate,
    #[serde(default)]
    is_full_day: bool,
    #[serde(default, alias = "startMinute", alias = "startLabel", alias = "startTime")]
    start: Option<TimeValue>,
    #[serde(default, alias = "endMinute", alias = "endLabel", alias = "endTime")]
    end: Option<TimeValue>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReservation {
    id: Ulid,
    date: NaiveDate,
    #[serde(default)]
    is_full_day: bool,
    #[serde(default, alias = "startMinute", alias = "startLabel", alias = "startTime")]
    start: Option<TimeValue>,
    #[serde(default, alias = "endMinute", alias = "endLabel", alias = "endTime")]
    end: Option<TimeValue>,
    #[serde(default = "default_status")]
    status: ReservationStatus,
    #[serde(flatten)]
    details: ClientDetails,
}

fn default_status() -> ReservationStatus {
    ReservationStatus::Pending
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSnapshot {
    blackouts: Vec<RawBlackout>,
    reservations: Vec<RawReservation>,
}

impl RawBlackout {
    fn into_window(self) -> Option<BlackoutWindow> {
        let id = self.id.unwrap_or_else(Ulid::new);
        if self.is_full_day {
            return Some(BlackoutWindow::full_day(id, self.date, self.reason));
        }
        let start = self.start.as_ref().and_then(TimeValue::minute);
        let end = self.end.as_ref().and_then(TimeValue::minute);
        match (start, end) {
            (Some(start), Some(end)) if start < end => {
                Some(BlackoutWindow::partial(id, self.date, Span::new(start, end), self.reason))
            }
            _ => {
                warn!(%id, date = %self.date, "partial blackout without a valid start/end, skipped");
                None
            }
        }
    }
}

impl RawReservation {
    fn into_reservation(self) -> Option<Reservation> {
        let window = if self.is_full_day {
            ReservationWindow::FullDay
        } else {
            let Some(start) = self.start.as_ref().and_then(TimeValue::minute) else {
                warn!(id = %self.id, date = %self.date, "reservation without a valid start, skipped");
                return None;
            };
            let end = self.end.as_ref().and_then(TimeValue::minute);
            ReservationWindow::At { start, end }
        };
        Some(Reservation {
            id: self.id,
            date: self.date,
            window,
            status: self.status,
            details: self.details,
        })
    }
}

/// Blackouts and reservations as fetched from the external store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub blackouts: Vec<BlackoutWindow>,
    pub reservations: Vec<Reservation>,
    /// Records dropped because their times could not be interpreted.
    pub skipped: usize,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        let total = raw.blackouts.len() + raw.reservations.len();
        let blackouts: Vec<_> = raw.blackouts.into_iter().filter_map(RawBlackout::into_window).collect();
        let reservations: Vec<_> = raw
            .reservations
            .into_iter()
            .filter_map(RawReservation::into_reservation)
            .collect();
        let skipped = total - blackouts.len() - reservations.len();
        Ok(Self {
            blackouts,
            reservations,
            skipped,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Earliest and latest date mentioned, if any.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self
            .blackouts
            .iter()
            .map(|b| b.date)
            .chain(self.reservations.iter().map(|r| r.date));
        dates.fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
    }
}

#[async_trait]
impl CalendarSource for Snapshot {
    type Error = Infallible;

    async fn reservations(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Reservation>, Infallible> {
        Ok(self
            .reservations
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }

    async fn blackouts(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<BlackoutWindow>, Infallible> {
        Ok(self
            .blackouts
            .iter()
            .filter(|b| b.date >= from && b.date <= to)
            .cloned()
            .collect())
    }
}
