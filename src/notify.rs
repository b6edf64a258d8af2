use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::CalendarEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for calendar events, per date plus one channel for all dates.
///
/// The engine only signals; delivering email/SMS on `ReservationConfirmed`
/// is up to whoever subscribes.
pub struct NotifyHub {
    channels: DashMap<NaiveDate, broadcast::Sender<CalendarEvent>>,
    all: broadcast::Sender<CalendarEvent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            all: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to events for one date. Creates the channel if needed.
    pub fn subscribe(&self, date: NaiveDate) -> broadcast::Receiver<CalendarEvent> {
        let sender = self
            .channels
            .entry(date)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Subscribe to every event regardless of date.
    pub fn subscribe_all(&self) -> broadcast::Receiver<CalendarEvent> {
        self.all.subscribe()
    }

    /// Send a notification. No-op if nobody is listening. A reschedule
    /// across dates reaches both dates' channels.
    pub fn send(&self, event: &CalendarEvent) {
        let _ = self.all.send(event.clone());
        self.send_to(event.date(), event);
        if let CalendarEvent::ReservationRescheduled { from, to, .. } = event {
            if from != to {
                self.send_to(*from, event);
            }
        }
    }

    fn send_to(&self, date: NaiveDate, event: &CalendarEvent) {
        if let Some(sender) = self.channels.get(&date) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a date's channel once nothing listens to it anymore. The engine
    /// runs this after every refresh.
    pub fn prune(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    /// Per-date channels currently held.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
