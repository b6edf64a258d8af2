mod availability;
mod blackout;
mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use availability::{free_spans, merge_overlapping, open_hours, subtract_intervals};
pub use blackout::BlackoutRegistry;
pub use conflict::{candidate_end_times, conflicts, day_status, is_slot_available};
pub use error::{EngineError, InvalidTransition};
pub use lifecycle::{allowed_transitions, can_transition, sort_for_display, transition, Transition};
pub use mutations::RefreshStats;
pub use store::InMemoryStore;

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::debug;
use ulid::Ulid;

use crate::grid::{generate_slots, TimeSlot};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;

pub type SharedDayState = Arc<RwLock<DayState>>;

pub(super) type DayWriteGuard = OwnedRwLockWriteGuard<DayState>;

/// Policy knobs supplied by the embedding application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// New reservations start `confirmed` instead of `pending`.
    pub auto_confirm: bool,
}

/// In-memory calendar over the pure availability functions.
///
/// Each date sits behind its own `RwLock`. Writes re-check conflicts while
/// holding the write lock of every date they touch, so two concurrent
/// requests for the same slot cannot both succeed.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub notify: Arc<NotifyHub>,
    pub(super) config: EngineConfig,
    pub(super) slots: Vec<TimeSlot>,
}

impl Engine {
    pub fn new(config: EngineConfig, notify: Arc<NotifyHub>) -> Self {
        Self {
            store: InMemoryStore::new(),
            notify,
            config,
            slots: generate_slots().collect(),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The slot universe, in canonical order.
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn get_day(&self, date: &NaiveDate) -> Option<SharedDayState> {
        self.store.get_day(date)
    }

    pub fn date_for_entity(&self, id: &Ulid) -> Option<NaiveDate> {
        self.store.date_for_entity(id)
    }

    /// Broadcast + count in one call.
    pub(super) fn publish(&self, event: CalendarEvent) {
        let label = observability::event_label(&event);
        debug!(event = label, date = %event.date(), "publish");
        metrics::counter!(observability::EVENTS_PUBLISHED_TOTAL, "event" => label).increment(1);
        self.notify.send(&event);
    }

    pub(super) fn record_day_count(&self) {
        metrics::gauge!(observability::DAYS_LOADED).set(self.store.day_count() as f64);
    }

    /// Lookup entity → date, acquire that day's write lock.
    ///
    /// The entity may move to another date between lookup and lock; the
    /// lookup is retried until the locked day actually holds it.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(NaiveDate, DayWriteGuard), EngineError> {
        const ATTEMPTS: usize = 4;
        for _ in 0..ATTEMPTS {
            let date = self
                .store
                .date_for_entity(entity_id)
                .ok_or(EngineError::NotFound(*entity_id))?;
            let day = self
                .store
                .get_day(&date)
                .ok_or(EngineError::NotFound(*entity_id))?;
            let guard = day.write_owned().await;
            if guard.contains(*entity_id) {
                return Ok((date, guard));
            }
        }
        Err(EngineError::NotFound(*entity_id))
    }

    /// Write locks for moving an entity to `to`: the day currently holding
    /// it, plus `to` when that is another date. Both are taken in date order.
    /// Retried like [`Self::resolve_entity_write`] when the entity moves
    /// between lookup and lock.
    pub(super) async fn resolve_move_write(
        &self,
        entity_id: &Ulid,
        to: NaiveDate,
    ) -> Result<(NaiveDate, DayWriteGuard, Option<DayWriteGuard>), EngineError> {
        const ATTEMPTS: usize = 4;
        for _ in 0..ATTEMPTS {
            let from = self
                .store
                .date_for_entity(entity_id)
                .ok_or(EngineError::NotFound(*entity_id))?;
            let source_day = self
                .store
                .get_day(&from)
                .ok_or(EngineError::NotFound(*entity_id))?;

            let (source, target) = if from == to {
                (source_day.write_owned().await, None)
            } else {
                let target_day = self.store.get_or_create_day(to);
                if from < to {
                    let s = source_day.write_owned().await;
                    let t = target_day.write_owned().await;
                    (s, Some(t))
                } else {
                    let t = target_day.write_owned().await;
                    let s = source_day.write_owned().await;
                    (s, Some(t))
                }
            };
            if source.contains(*entity_id) {
                return Ok((from, source, target));
            }
        }
        Err(EngineError::NotFound(*entity_id))
    }
}
