use chrono::NaiveDate;
use ulid::Ulid;

use crate::grid::TimeSlot;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::availability::{free_spans, open_hours};
use super::blackout::BlackoutRegistry;
use super::conflict::{candidate_end_times, conflicts, day_status, is_slot_available};
use super::lifecycle::sort_for_display;
use super::{Engine, EngineError};

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<(), EngineError> {
    if to >= from && (to - from).num_days() >= MAX_CALENDAR_RANGE_DAYS {
        return Err(EngineError::LimitExceeded("date range too wide"));
    }
    Ok(())
}

fn count_check(operation: &'static str) {
    metrics::counter!(observability::AVAILABILITY_CHECKS_TOTAL, "operation" => operation).increment(1);
}

impl Engine {
    /// Fail-open availability: a missing date or slot counts as bookable.
    pub async fn is_bookable(
        &self,
        date: Option<NaiveDate>,
        slot_start: Option<Minute>,
        exclude: Option<Ulid>,
    ) -> bool {
        count_check("is_bookable");
        let (Some(date), Some(slot_start)) = (date, slot_start) else {
            return true;
        };
        let Some(day) = self.store.get_day(&date) else {
            return true;
        };
        let guard = day.read().await;
        is_slot_available(
            date,
            slot_start,
            &guard.reservations,
            BlackoutRegistry::new(&guard.blackouts),
            exclude,
        )
    }

    /// Every slot of the grid with its availability on `date`.
    pub async fn slot_grid(&self, date: NaiveDate) -> Vec<SlotAvailability> {
        count_check("slot_grid");
        let Some(day) = self.store.get_day(&date) else {
            return self
                .slots
                .iter()
                .map(|&slot| SlotAvailability { slot, available: true })
                .collect();
        };
        let guard = day.read().await;
        let blackouts = BlackoutRegistry::new(&guard.blackouts);
        // A full-day block needs no per-slot scan.
        let closed = day_status(date, &guard.reservations, blackouts) == DayStatus::Full;
        self.slots
            .iter()
            .map(|&slot| SlotAvailability {
                slot,
                available: !closed
                    && is_slot_available(date, slot.minute(), &guard.reservations, blackouts, None),
            })
            .collect()
    }

    pub async fn day_status(&self, date: NaiveDate) -> DayStatus {
        let Some(day) = self.store.get_day(&date) else {
            return DayStatus::None;
        };
        let guard = day.read().await;
        day_status(date, &guard.reservations, BlackoutRegistry::new(&guard.blackouts))
    }

    /// Day status for every date in `[from, to]`.
    pub async fn calendar(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CalendarDay>, EngineError> {
        check_range(from, to)?;
        count_check("calendar");
        let mut days = Vec::new();
        for date in from.iter_days().take_while(|d| *d <= to) {
            days.push(CalendarDay {
                date,
                status: self.day_status(date).await,
            });
        }
        Ok(days)
    }

    /// Available end times once `start` has been chosen.
    pub async fn candidate_end_times(&self, date: NaiveDate, start: TimeSlot) -> Vec<TimeSlot> {
        count_check("candidate_end_times");
        let Some(day) = self.store.get_day(&date) else {
            return candidate_end_times(date, start, &self.slots, &[], BlackoutRegistry::default()).collect();
        };
        let guard = day.read().await;
        candidate_end_times(
            date,
            start,
            &self.slots,
            &guard.reservations,
            BlackoutRegistry::new(&guard.blackouts),
        )
        .collect()
    }

    /// Overlap report for a prospective window, as shown by the admin editor.
    pub async fn conflicts_for(
        &self,
        date: NaiveDate,
        window: ReservationWindow,
        exclude: Option<Ulid>,
    ) -> Vec<ConflictSource> {
        let Some(day) = self.store.get_day(&date) else {
            return Vec::new();
        };
        let guard = day.read().await;
        conflicts(
            date,
            &window.effective_span(),
            &guard.reservations,
            BlackoutRegistry::new(&guard.blackouts),
            exclude,
        )
    }

    pub async fn free_spans(&self, date: NaiveDate) -> Vec<Span> {
        let Some(day) = self.store.get_day(&date) else {
            return vec![open_hours()];
        };
        let guard = day.read().await;
        free_spans(date, &guard.reservations, BlackoutRegistry::new(&guard.blackouts))
    }

    pub async fn get_reservation(&self, id: Ulid) -> Option<Reservation> {
        let date = self.store.date_for_entity(&id)?;
        let day = self.store.get_day(&date)?;
        let guard = day.read().await;
        guard.reservation(id).cloned()
    }

    pub async fn blackouts_for(&self, date: NaiveDate) -> Vec<BlackoutWindow> {
        match self.store.get_day(&date) {
            Some(day) => day.read().await.blackouts.clone(),
            None => Vec::new(),
        }
    }

    /// Reservations dated `[from, to]`, by date then start time.
    pub async fn reservations_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Reservation>, EngineError> {
        check_range(from, to)?;
        let mut out = Vec::new();
        for date in self.store.dates_between(from, to) {
            if let Some(day) = self.store.get_day(&date) {
                out.extend(day.read().await.reservations.iter().cloned());
            }
        }
        Ok(out)
    }

    /// Every reservation in staff triage order.
    pub async fn reservations_for_display(&self) -> Vec<Reservation> {
        let mut all = Vec::new();
        for date in self.store.all_dates() {
            if let Some(day) = self.store.get_day(&date) {
                all.extend(day.read().await.reservations.iter().cloned());
            }
        }
        sort_for_display(all)
    }
}
