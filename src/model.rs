use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::grid::TimeSlot;

/// Minutes since midnight. The only time-of-day type.
pub type Minute = u32;

pub const MINUTES_PER_DAY: Minute = 24 * 60;

/// Cadence of the slot grid, also the assumed length of a reservation with no end.
pub const SLOT_MINUTES: Minute = 30;

/// Half-open interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Minute,
    pub end: Minute,
}

impl Span {
    pub fn new(start: Minute, end: Minute) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// The whole calendar day, used for full-day sentinels.
    pub fn whole_day() -> Self {
        Self::new(0, MINUTES_PER_DAY)
    }

    pub fn duration(&self) -> Minute {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_minute(&self, m: Minute) -> bool {
        self.start <= m && m < self.end
    }
}

// ── Blackouts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum BlackoutCoverage {
    FullDay,
    /// `start < end` always holds.
    Partial { span: Span },
}

/// Staff-declared exclusion period on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutWindow {
    pub id: Ulid,
    pub date: NaiveDate,
    pub coverage: BlackoutCoverage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BlackoutWindow {
    pub fn full_day(id: Ulid, date: NaiveDate, reason: Option<String>) -> Self {
        Self {
            id,
            date,
            coverage: BlackoutCoverage::FullDay,
            reason,
        }
    }

    pub fn partial(id: Ulid, date: NaiveDate, span: Span, reason: Option<String>) -> Self {
        Self {
            id,
            date,
            coverage: BlackoutCoverage::Partial { span },
            reason,
        }
    }

    pub fn is_full_day(&self) -> bool {
        matches!(self.coverage, BlackoutCoverage::FullDay)
    }

    /// The blocked part of the day.
    pub fn span(&self) -> Span {
        match self.coverage {
            BlackoutCoverage::FullDay => Span::whole_day(),
            BlackoutCoverage::Partial { span } => span,
        }
    }
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 4] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
    ];

    /// `completed` and `cancelled` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a reservation sits in its day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ReservationWindow {
    /// Blocks the entire date.
    FullDay,
    /// `end` is absent on legacy records.
    At { start: Minute, end: Option<Minute> },
}

impl ReservationWindow {
    pub fn timed(start: Minute, end: Minute) -> Self {
        ReservationWindow::At {
            start,
            end: Some(end),
        }
    }

    pub fn is_full_day(&self) -> bool {
        matches!(self, ReservationWindow::FullDay)
    }

    /// Interval this window occupies. A missing or inverted end falls back
    /// to one slot length.
    pub fn effective_span(&self) -> Span {
        match *self {
            ReservationWindow::FullDay => Span::whole_day(),
            ReservationWindow::At { start, end } => {
                let end = end
                    .filter(|e| *e > start)
                    .unwrap_or(start.saturating_add(SLOT_MINUTES));
                // Saturates into an empty span only for starts no day can hold.
                Span { start, end }
            }
        }
    }
}

/// Contact and service fields. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    pub date: NaiveDate,
    pub window: ReservationWindow,
    pub status: ReservationStatus,
    #[serde(flatten)]
    pub details: ClientDetails,
}

impl Reservation {
    /// Cancelled reservations never take part in conflict checks.
    pub fn is_blocking(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }

    pub fn effective_span(&self) -> Span {
        self.window.effective_span()
    }
}

/// Input for a new booking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub id: Ulid,
    pub date: NaiveDate,
    pub window: ReservationWindow,
    pub details: ClientDetails,
}

// ── Per-date state ───────────────────────────────────────────────

/// Everything scheduled on one date. Blackouts and reservations are
/// independent sets; neither references the other.
#[derive(Debug, Clone)]
pub struct DayState {
    pub date: NaiveDate,
    /// Sorted by effective start.
    pub reservations: Vec<Reservation>,
    pub blackouts: Vec<BlackoutWindow>,
}

impl DayState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            reservations: Vec::new(),
            blackouts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty() && self.blackouts.is_empty()
    }

    /// Insert reservation maintaining sort order by effective start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let start = reservation.effective_span().start;
        let pos = self
            .reservations
            .partition_point(|r| r.effective_span().start <= start);
        self.reservations.insert(pos, reservation);
    }

    /// Remove reservation by id.
    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn reservation_mut(&mut self, id: Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.reservations.iter().filter(|r| r.is_blocking()).count()
    }

    pub fn insert_blackout(&mut self, blackout: BlackoutWindow) {
        self.blackouts.push(blackout);
    }

    pub fn remove_blackout(&mut self, id: Ulid) -> Option<BlackoutWindow> {
        let pos = self.blackouts.iter().position(|b| b.id == id)?;
        Some(self.blackouts.remove(pos))
    }

    pub fn contains(&self, id: Ulid) -> bool {
        self.reservation(id).is_some() || self.blackouts.iter().any(|b| b.id == id)
    }
}

// ── Calendar affordances ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    None,
    Partial,
    Full,
}

/// What blocked a candidate slot or span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum ConflictSource {
    Blackout(Ulid),
    Reservation(Ulid),
}

impl std::fmt::Display for ConflictSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictSource::Blackout(id) => write!(f, "blackout {id}"),
            ConflictSource::Reservation(id) => write!(f, "reservation {id}"),
        }
    }
}

/// Calendar events, flat with no nesting. Broadcast by the notify hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum CalendarEvent {
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationRescheduled {
        id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
        window: ReservationWindow,
    },
    ReservationStatusChanged {
        id: Ulid,
        date: NaiveDate,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    /// Trigger point for the external notifier; carries contact and schedule.
    ReservationConfirmed {
        reservation: Reservation,
    },
    BlackoutAdded {
        blackout: BlackoutWindow,
    },
    BlackoutRemoved {
        id: Ulid,
        date: NaiveDate,
    },
}

impl CalendarEvent {
    /// Date whose channel receives this event.
    pub fn date(&self) -> NaiveDate {
        match self {
            CalendarEvent::ReservationCreated { reservation }
            | CalendarEvent::ReservationConfirmed { reservation } => reservation.date,
            CalendarEvent::ReservationRescheduled { to, .. } => *to,
            CalendarEvent::ReservationStatusChanged { date, .. }
            | CalendarEvent::BlackoutRemoved { date, .. } => *date,
            CalendarEvent::BlackoutAdded { blackout } => blackout.date,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub slot: TimeSlot,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub status: DayStatus,
}
