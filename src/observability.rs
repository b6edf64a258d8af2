use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::model::{CalendarEvent, ConflictSource};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: availability lookups. Labels: operation.
pub const AVAILABILITY_CHECKS_TOTAL: &str = "daybook_availability_checks_total";

/// Counter: reservations created. Labels: status.
pub const RESERVATIONS_CREATED_TOTAL: &str = "daybook_reservations_created_total";

/// Counter: writes rejected for overlapping something. Labels: source.
pub const CONFLICTS_TOTAL: &str = "daybook_conflicts_total";

/// Counter: lifecycle transitions. Labels: to, outcome.
pub const TRANSITIONS_TOTAL: &str = "daybook_transitions_total";

/// Counter: contact/service detail edits.
pub const DETAIL_UPDATES_TOTAL: &str = "daybook_detail_updates_total";

/// Counter: events broadcast on the notify hub. Labels: event.
pub const EVENTS_PUBLISHED_TOTAL: &str = "daybook_events_published_total";

/// Histogram: time to refresh a date range from a calendar source, seconds.
pub const REFRESH_DURATION_SECONDS: &str = "daybook_refresh_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: dates held in memory.
pub const DAYS_LOADED: &str = "daybook_days_loaded";

/// Install a Prometheus recorder whose exposition text can be rendered on
/// demand. No-op if `enabled` is false.
pub fn init(enabled: bool) -> Option<PrometheusHandle> {
    if !enabled {
        return None;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("metrics recorder not installed: {e}");
            None
        }
    }
}

/// Map an event variant to a short label for metrics.
pub fn event_label(event: &CalendarEvent) -> &'static str {
    match event {
        CalendarEvent::ReservationCreated { .. } => "reservation_created",
        CalendarEvent::ReservationRescheduled { .. } => "reservation_rescheduled",
        CalendarEvent::ReservationStatusChanged { .. } => "reservation_status_changed",
        CalendarEvent::ReservationConfirmed { .. } => "reservation_confirmed",
        CalendarEvent::BlackoutAdded { .. } => "blackout_added",
        CalendarEvent::BlackoutRemoved { .. } => "blackout_removed",
    }
}

pub fn conflict_label(source: &ConflictSource) -> &'static str {
    match source {
        ConflictSource::Blackout(_) => "blackout",
        ConflictSource::Reservation(_) => "reservation",
    }
}
