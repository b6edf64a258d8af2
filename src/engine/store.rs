use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::SharedDayState;

pub struct InMemoryStore {
    days: DashMap<NaiveDate, SharedDayState>,
    /// Reverse lookup: entity (reservation/blackout) id → date
    entity_to_date: DashMap<Ulid, NaiveDate>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            days: DashMap::new(),
            entity_to_date: DashMap::new(),
        }
    }

    // ── Day index ────────────────────────────────────────────

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn get_day(&self, date: &NaiveDate) -> Option<SharedDayState> {
        self.days.get(date).map(|e| e.value().clone())
    }

    pub fn get_or_create_day(&self, date: NaiveDate) -> SharedDayState {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(date))))
            .value()
            .clone()
    }

    /// Loaded dates within `[from, to]`, ascending.
    pub fn dates_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .days
            .iter()
            .map(|e| *e.key())
            .filter(|d| *d >= from && *d <= to)
            .collect();
        dates.sort();
        dates
    }

    pub fn all_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.days.iter().map(|e| *e.key()).collect();
        dates.sort();
        dates
    }

    // ── Entity index ─────────────────────────────────────────

    pub fn date_for_entity(&self, entity_id: &Ulid) -> Option<NaiveDate> {
        self.entity_to_date.get(entity_id).map(|e| *e.value())
    }

    /// Record `entity_id` on `date` unless the id is already taken.
    pub fn claim_entity(&self, entity_id: Ulid, date: NaiveDate) -> bool {
        match self.entity_to_date.entry(entity_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(date);
                true
            }
        }
    }

    pub fn map_entity(&self, entity_id: Ulid, date: NaiveDate) {
        self.entity_to_date.insert(entity_id, date);
    }

    pub fn unmap_entity(&self, entity_id: &Ulid) {
        self.entity_to_date.remove(entity_id);
    }

    /// Forget everything on one day. Caller holds that day's write lock.
    pub fn clear_day(&self, day: &mut DayState) {
        for r in day.reservations.drain(..) {
            self.entity_to_date.remove(&r.id);
        }
        for b in day.blackouts.drain(..) {
            self.entity_to_date.remove(&b.id);
        }
    }
}
