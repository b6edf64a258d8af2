use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::snapshot::CalendarSource;

use super::blackout::BlackoutRegistry;
use super::conflict::{check_no_conflict, conflicts, validate_details, validate_stored_window, validate_window};
use super::lifecycle::{self, Transition};
use super::{Engine, EngineError};

/// Counts from a [`Engine::refresh`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub days: usize,
    pub reservations: usize,
    pub blackouts: usize,
    pub skipped: usize,
}

fn record_conflict(err: &EngineError) {
    if let EngineError::Conflict(source) = err {
        metrics::counter!(observability::CONFLICTS_TOTAL, "source" => observability::conflict_label(source))
            .increment(1);
    }
}

pub(crate) fn validate_blackout(blackout: &BlackoutWindow) -> Result<(), EngineError> {
    if let BlackoutCoverage::Partial { span } = blackout.coverage {
        if span.start >= span.end {
            return Err(EngineError::InvalidWindow("blackout end must be after start"));
        }
        if span.end > MINUTES_PER_DAY {
            return Err(EngineError::InvalidWindow("blackout end past midnight"));
        }
    }
    if blackout.reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LEN) {
        return Err(EngineError::LimitExceeded("blackout reason too long"));
    }
    Ok(())
}

impl Engine {
    /// Book a new reservation. Fails with `Conflict` if any blackout or
    /// active reservation overlaps the requested window.
    pub async fn create_reservation(&self, request: NewReservation) -> Result<Reservation, EngineError> {
        validate_window(&request.window)?;
        validate_details(&request.details)?;
        if self.store.date_for_entity(&request.id).is_some() {
            return Err(EngineError::AlreadyExists(request.id));
        }

        let day = self.store.get_or_create_day(request.date);
        let mut guard = day.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many reservations on date"));
        }

        check_no_conflict(
            request.date,
            &request.window,
            &guard.reservations,
            BlackoutRegistry::new(&guard.blackouts),
            None,
        )
        .inspect_err(record_conflict)?;

        if !self.store.claim_entity(request.id, request.date) {
            return Err(EngineError::AlreadyExists(request.id));
        }

        let status = if self.config.auto_confirm {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        };
        let reservation = Reservation {
            id: request.id,
            date: request.date,
            window: request.window,
            status,
            details: request.details,
        };
        guard.insert_reservation(reservation.clone());
        drop(guard);
        self.record_day_count();

        info!(id = %reservation.id, date = %reservation.date, %status, "reservation created");
        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL, "status" => status.as_str()).increment(1);
        self.publish(CalendarEvent::ReservationCreated {
            reservation: reservation.clone(),
        });
        if status == ReservationStatus::Confirmed {
            self.publish(CalendarEvent::ReservationConfirmed {
                reservation: reservation.clone(),
            });
        }
        Ok(reservation)
    }

    /// Move a reservation to a new date and/or window. The reservation never
    /// conflicts with itself.
    pub async fn reschedule_reservation(
        &self,
        id: Ulid,
        date: NaiveDate,
        window: ReservationWindow,
    ) -> Result<Reservation, EngineError> {
        validate_window(&window)?;
        let (from, mut source, target) = self.resolve_move_write(&id, date).await?;

        let current = source.reservation(id).ok_or(EngineError::NotFound(id))?;
        if current.status.is_terminal() {
            return Err(EngineError::Closed(id));
        }

        let updated = match target {
            None => {
                check_no_conflict(
                    date,
                    &window,
                    &source.reservations,
                    BlackoutRegistry::new(&source.blackouts),
                    Some(id),
                )
                .inspect_err(record_conflict)?;

                let mut reservation = source.remove_reservation(id).ok_or(EngineError::NotFound(id))?;
                reservation.window = window;
                source.insert_reservation(reservation.clone());
                reservation
            }
            Some(mut target) => {
                if target.reservations.len() >= MAX_RESERVATIONS_PER_DAY {
                    return Err(EngineError::LimitExceeded("too many reservations on date"));
                }
                check_no_conflict(
                    date,
                    &window,
                    &target.reservations,
                    BlackoutRegistry::new(&target.blackouts),
                    Some(id),
                )
                .inspect_err(record_conflict)?;

                let mut reservation = source.remove_reservation(id).ok_or(EngineError::NotFound(id))?;
                reservation.date = date;
                reservation.window = window;
                target.insert_reservation(reservation.clone());
                self.store.map_entity(id, date);
                reservation
            }
        };
        drop(source);
        self.record_day_count();

        info!(%id, %from, to = %date, "reservation rescheduled");
        self.publish(CalendarEvent::ReservationRescheduled {
            id,
            from,
            to: date,
            window,
        });
        Ok(updated)
    }

    /// Apply a lifecycle transition. A move into `confirmed` also emits
    /// `ReservationConfirmed` for the external notifier.
    pub async fn transition_reservation(
        &self,
        id: Ulid,
        to: ReservationStatus,
    ) -> Result<Transition, EngineError> {
        let (date, mut guard) = self.resolve_entity_write(&id).await?;
        let slot = guard.reservation_mut(id).ok_or(EngineError::NotFound(id))?;

        let outcome = lifecycle::transition(slot.clone(), to);
        let from = slot.status;
        let result = match outcome {
            Ok(t) => {
                *slot = t.reservation.clone();
                t
            }
            Err(e) => {
                metrics::counter!(
                    observability::TRANSITIONS_TOTAL,
                    "to" => to.as_str(),
                    "outcome" => "rejected"
                )
                .increment(1);
                warn!(%id, %from, %to, "transition rejected");
                return Err(e.into());
            }
        };
        drop(guard);

        metrics::counter!(
            observability::TRANSITIONS_TOTAL,
            "to" => to.as_str(),
            "outcome" => "applied"
        )
        .increment(1);
        info!(%id, %from, %to, "reservation status changed");
        self.publish(CalendarEvent::ReservationStatusChanged { id, date, from, to });
        if result.is_confirmation() {
            self.publish(CalendarEvent::ReservationConfirmed {
                reservation: result.reservation.clone(),
            });
        }
        Ok(result)
    }

    /// Replace the opaque contact/service fields.
    pub async fn update_reservation_details(
        &self,
        id: Ulid,
        details: ClientDetails,
    ) -> Result<Reservation, EngineError> {
        validate_details(&details)?;
        let (date, mut guard) = self.resolve_entity_write(&id).await?;
        let reservation = guard.reservation_mut(id).ok_or(EngineError::NotFound(id))?;
        reservation.details = details;
        let updated = reservation.clone();
        drop(guard);

        info!(%id, %date, "reservation details updated");
        metrics::counter!(observability::DETAIL_UPDATES_TOTAL).increment(1);
        Ok(updated)
    }

    /// Declare a blackout. Existing reservations are kept; the ids of
    /// active ones it now overlaps are returned for staff follow-up.
    pub async fn add_blackout(&self, blackout: BlackoutWindow) -> Result<Vec<Ulid>, EngineError> {
        validate_blackout(&blackout)?;
        let day = self.store.get_or_create_day(blackout.date);
        let mut guard = day.write().await;
        if guard.blackouts.len() >= MAX_BLACKOUTS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many blackouts on date"));
        }
        if !self.store.claim_entity(blackout.id, blackout.date) {
            return Err(EngineError::AlreadyExists(blackout.id));
        }

        let affected: Vec<Ulid> = conflicts(
            blackout.date,
            &blackout.span(),
            &guard.reservations,
            BlackoutRegistry::default(),
            None,
        )
        .into_iter()
        .filter_map(|c| match c {
            ConflictSource::Reservation(id) => Some(id),
            ConflictSource::Blackout(_) => None,
        })
        .collect();
        guard.insert_blackout(blackout.clone());
        drop(guard);
        self.record_day_count();

        if affected.is_empty() {
            info!(id = %blackout.id, date = %blackout.date, "blackout added");
        } else {
            warn!(
                id = %blackout.id,
                date = %blackout.date,
                affected = affected.len(),
                "blackout overlaps active reservations"
            );
        }
        self.publish(CalendarEvent::BlackoutAdded { blackout });
        Ok(affected)
    }

    pub async fn remove_blackout(&self, id: Ulid) -> Result<NaiveDate, EngineError> {
        let (date, mut guard) = self.resolve_entity_write(&id).await?;
        guard.remove_blackout(id).ok_or(EngineError::NotFound(id))?;
        self.store.unmap_entity(&id);
        drop(guard);

        info!(%id, %date, "blackout removed");
        self.publish(CalendarEvent::BlackoutRemoved { id, date });
        Ok(date)
    }

    /// Load a reservation from the external store as-is: no conflict check
    /// and no bookable-hours check, since stored data is authoritative. Only
    /// a start outside the day is refused.
    pub async fn import_reservation(&self, reservation: Reservation) -> Result<(), EngineError> {
        validate_stored_window(&reservation.window)?;
        let day = self.store.get_or_create_day(reservation.date);
        let mut guard = day.write().await;
        if !self.store.claim_entity(reservation.id, reservation.date) {
            return Err(EngineError::AlreadyExists(reservation.id));
        }
        guard.insert_reservation(reservation);
        Ok(())
    }

    pub async fn import_blackout(&self, blackout: BlackoutWindow) -> Result<(), EngineError> {
        validate_blackout(&blackout)?;
        let day = self.store.get_or_create_day(blackout.date);
        let mut guard = day.write().await;
        if !self.store.claim_entity(blackout.id, blackout.date) {
            return Err(EngineError::AlreadyExists(blackout.id));
        }
        guard.insert_blackout(blackout);
        Ok(())
    }

    /// Replace `[from, to]` with what `source` currently holds.
    pub async fn refresh<S: CalendarSource + ?Sized>(
        &self,
        source: &S,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RefreshStats, EngineError> {
        if to < from {
            return Ok(RefreshStats::default());
        }
        if (to - from).num_days() >= MAX_CALENDAR_RANGE_DAYS {
            return Err(EngineError::LimitExceeded("date range too wide"));
        }
        let started = Instant::now();

        let (reservations, blackouts) =
            futures::try_join!(source.reservations(from, to), source.blackouts(from, to))
                .map_err(|e| EngineError::Source(e.to_string()))?;

        let mut stats = RefreshStats::default();
        let mut by_date: BTreeMap<NaiveDate, (Vec<Reservation>, Vec<BlackoutWindow>)> = BTreeMap::new();
        for r in reservations {
            if r.date < from || r.date > to || validate_stored_window(&r.window).is_err() {
                warn!(id = %r.id, date = %r.date, "skipping reservation from source");
                stats.skipped += 1;
                continue;
            }
            by_date.entry(r.date).or_default().0.push(r);
        }
        for b in blackouts {
            if b.date < from || b.date > to || validate_blackout(&b).is_err() {
                warn!(id = %b.id, date = %b.date, "skipping blackout from source");
                stats.skipped += 1;
                continue;
            }
            by_date.entry(b.date).or_default().1.push(b);
        }
        for date in self.store.dates_between(from, to) {
            by_date.entry(date).or_default();
        }

        // Lock and clear every day first: an id the source moved between two
        // dates in the range must be free to claim on its new date.
        let mut days = Vec::with_capacity(by_date.len());
        for (date, batch) in by_date {
            let guard = self.store.get_or_create_day(date).write_owned().await;
            days.push((date, guard, batch));
        }
        for (_, guard, _) in days.iter_mut() {
            self.store.clear_day(guard);
        }

        for (date, mut guard, (reservations, blackouts)) in days {
            for r in reservations {
                if !self.store.claim_entity(r.id, date) {
                    warn!(id = %r.id, %date, "reservation id already present on another date");
                    stats.skipped += 1;
                    continue;
                }
                guard.insert_reservation(r);
                stats.reservations += 1;
            }
            for b in blackouts {
                if !self.store.claim_entity(b.id, date) {
                    stats.skipped += 1;
                    continue;
                }
                guard.insert_blackout(b);
                stats.blackouts += 1;
            }
            stats.days += 1;
        }
        self.record_day_count();
        self.notify.prune();

        metrics::histogram!(observability::REFRESH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        info!(
            %from,
            %to,
            days = stats.days,
            reservations = stats.reservations,
            blackouts = stats.blackouts,
            skipped = stats.skipped,
            channels = self.notify.channel_count(),
            "calendar refreshed"
        );
        Ok(stats)
    }
}
