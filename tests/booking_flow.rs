use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::broadcast;
use ulid::Ulid;

use daybook::engine::{Engine, EngineConfig, EngineError};
use daybook::grid::{self, TimeSlot};
use daybook::model::*;
use daybook::notify::NotifyHub;
use daybook::snapshot::Snapshot;

// ── Test infrastructure ──────────────────────────────────────

const CALENDAR: &str = r#"{
    "blackouts": [
        { "id": "01J3A0000000000000000000B1", "date": "2025-12-25", "isFullDay": true, "reason": "Closed" },
        { "id": "01J3A0000000000000000000B2", "date": "2025-12-22", "startTime": "12:00 PM", "endTime": "1:00 PM", "reason": "Lunch" }
    ],
    "reservations": [
        {
            "id": "01J3A0000000000000000000R1",
            "date": "2025-12-22",
            "startTime": "9:00 AM",
            "endTime": "10:30 AM",
            "status": "confirmed",
            "clientName": "Lin",
            "clientEmail": "lin@example.com",
            "serviceType": "family session"
        },
        {
            "id": "01J3A0000000000000000000R2",
            "date": "2025-12-22",
            "startTime": "3:00 PM",
            "endTime": "4:00 PM",
            "status": "cancelled"
        }
    ]
}"#;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn loaded_engine(config: EngineConfig) -> (Arc<Engine>, Arc<NotifyHub>) {
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(config, notify.clone()));
    let snapshot = Snapshot::from_json(CALENDAR).unwrap();
    let (from, to) = snapshot.date_range().unwrap();
    engine.refresh(&snapshot, from, to).await.unwrap();
    (engine, notify)
}

async fn recv(rx: &mut broadcast::Receiver<CalendarEvent>) -> CalendarEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

fn booking(d: NaiveDate, start: &str, end: &str) -> NewReservation {
    NewReservation {
        id: Ulid::new(),
        date: d,
        window: ReservationWindow::timed(grid::to_minutes(start), grid::to_minutes(end)),
        details: ClientDetails {
            client_name: "Noor".into(),
            client_email: "noor@example.com".into(),
            service_type: "portrait".into(),
            notes: None,
        },
    }
}

fn available_labels(slots: &[SlotAvailability]) -> Vec<String> {
    slots.iter().filter(|s| s.available).map(|s| s.slot.label()).collect()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn loaded_calendar_drives_availability() {
    let (engine, _notify) = loaded_engine(EngineConfig::default()).await;
    let d = date(2025, 12, 22);

    assert_eq!(engine.day_status(date(2025, 12, 25)).await, DayStatus::Full);
    assert_eq!(engine.day_status(d).await, DayStatus::Partial);
    assert!(available_labels(&engine.slot_grid(date(2025, 12, 25)).await).is_empty());

    let open = available_labels(&engine.slot_grid(d).await);
    assert!(!open.contains(&"9:00 AM".to_string()));
    assert!(!open.contains(&"10:00 AM".to_string()));
    assert!(open.contains(&"10:30 AM".to_string()));
    assert!(!open.contains(&"12:30 PM".to_string()));
    // The cancelled booking does not hold its time.
    assert!(open.contains(&"3:00 PM".to_string()));
}

#[tokio::test]
async fn client_books_through_the_selectors() {
    let (engine, notify) = loaded_engine(EngineConfig::default()).await;
    let d = date(2025, 12, 22);
    let mut rx = notify.subscribe(d);

    // Start at 11:00; the lunch blackout caps the end-time list.
    let start = TimeSlot::from_minute(grid::to_minutes("11:00 AM"));
    let ends: Vec<String> = engine
        .candidate_end_times(d, start)
        .await
        .iter()
        .take(2)
        .map(TimeSlot::label)
        .collect();
    assert_eq!(ends, vec!["11:30 AM", "1:00 PM"]);
    assert_eq!(grid::duration("11:00 AM", "11:30 AM"), "30 minutes");

    let r = engine.create_reservation(booking(d, "11:00 AM", "12:00 PM")).await.unwrap();
    match recv(&mut rx).await {
        CalendarEvent::ReservationCreated { reservation } => assert_eq!(reservation.id, r.id),
        other => panic!("unexpected event {other:?}"),
    }

    // A second client racing for the same hour loses.
    let err = engine.create_reservation(booking(d, "11:30 AM", "12:00 PM")).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(ConflictSource::Reservation(id)) if id == r.id));
}

#[tokio::test]
async fn staff_confirm_then_complete() {
    let (engine, notify) = loaded_engine(EngineConfig::default()).await;
    let mut all = notify.subscribe_all();
    let r = engine.create_reservation(booking(date(2025, 12, 23), "2:00 PM", "3:30 PM")).await.unwrap();
    assert!(matches!(recv(&mut all).await, CalendarEvent::ReservationCreated { .. }));

    engine.transition_reservation(r.id, ReservationStatus::Confirmed).await.unwrap();
    assert!(matches!(recv(&mut all).await, CalendarEvent::ReservationStatusChanged { .. }));
    match recv(&mut all).await {
        CalendarEvent::ReservationConfirmed { reservation } => {
            assert_eq!(reservation.details.client_email, "noor@example.com");
            assert_eq!(grid::duration_between(840, 930), "1 hour 30 minutes");
        }
        other => panic!("unexpected event {other:?}"),
    }

    engine.transition_reservation(r.id, ReservationStatus::Completed).await.unwrap();
    let err = engine
        .transition_reservation(r.id, ReservationStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition(_)));

    let listed = engine.reservations_for_display().await;
    assert_eq!(listed.last().map(|r| r.status), Some(ReservationStatus::Completed));
}

#[tokio::test]
async fn admin_moves_booking_off_a_new_blackout() {
    let (engine, _notify) = loaded_engine(EngineConfig::default()).await;
    let d = date(2025, 12, 22);
    let existing: Ulid = "01J3A0000000000000000000R1".parse().unwrap();

    let affected = engine
        .add_blackout(BlackoutWindow::partial(Ulid::new(), d, Span::new(480, 600), Some("Maintenance".into())))
        .await
        .unwrap();
    assert_eq!(affected, vec![existing]);

    // Moving within its own old window only conflicts with the blackout.
    let conflicts = engine
        .conflicts_for(d, ReservationWindow::timed(570, 660), Some(existing))
        .await;
    assert_eq!(conflicts.len(), 1);
    assert!(matches!(conflicts[0], ConflictSource::Blackout(_)));

    let moved = engine
        .reschedule_reservation(existing, d, ReservationWindow::timed(600, 690))
        .await
        .unwrap();
    assert_eq!(moved.status, ReservationStatus::Confirmed);
    assert!(!engine.is_bookable(Some(d), Some(630), None).await);
    assert!(engine.is_bookable(Some(d), Some(630), Some(existing)).await);
}

#[tokio::test]
async fn auto_confirm_emits_confirmation_on_create() {
    let (engine, notify) = loaded_engine(EngineConfig { auto_confirm: true }).await;
    let mut all = notify.subscribe_all();
    let r = engine.create_reservation(booking(date(2025, 12, 29), "6:00 PM", "7:00 PM")).await.unwrap();
    assert_eq!(r.status, ReservationStatus::Confirmed);
    assert!(matches!(recv(&mut all).await, CalendarEvent::ReservationCreated { .. }));
    assert!(matches!(recv(&mut all).await, CalendarEvent::ReservationConfirmed { .. }));
}

#[tokio::test]
async fn concurrent_clients_cannot_double_book() {
    let (engine, _notify) = loaded_engine(EngineConfig::default()).await;
    let d = date(2025, 12, 30);

    let mut set = tokio::task::JoinSet::new();
    for i in 0..16u32 {
        let engine = engine.clone();
        // Overlapping windows of varied length all starting around 10:00.
        let end = 630 + 30 * (i % 3);
        set.spawn(async move {
            let mut req = booking(d, "10:00 AM", "10:30 AM");
            req.window = ReservationWindow::timed(600, end);
            engine.create_reservation(req).await
        });
    }
    let mut ok = 0;
    while let Some(res) = set.join_next().await {
        if res.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(
        engine.reservations_between(d, d).await.unwrap().len(),
        1
    );
}
