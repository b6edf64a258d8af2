use chrono::NaiveDate;
use ulid::Ulid;

use crate::grid::{TimeSlot, FIRST_SLOT, LAST_SLOT};
use crate::limits::*;
use crate::model::*;

use super::blackout::BlackoutRegistry;
use super::EngineError;

/// Reservations on `date` that still hold their time, minus `exclude`.
fn active_on<'a>(
    date: NaiveDate,
    reservations: &'a [Reservation],
    exclude: Option<Ulid>,
) -> impl Iterator<Item = &'a Reservation> + 'a {
    reservations
        .iter()
        .filter(move |r| r.date == date && r.is_blocking() && Some(r.id) != exclude)
}

/// Can a booking start at `slot_start` on `date`?
///
/// `exclude` skips one reservation so that editing a booking does not
/// collide with itself.
pub fn is_slot_available(
    date: NaiveDate,
    slot_start: Minute,
    reservations: &[Reservation],
    blackouts: BlackoutRegistry<'_>,
    exclude: Option<Ulid>,
) -> bool {
    if blackouts.is_minute_blocked(date, slot_start) {
        return false;
    }
    !active_on(date, reservations, exclude).any(|r| r.effective_span().contains_minute(slot_start))
}

pub fn day_status(
    date: NaiveDate,
    reservations: &[Reservation],
    blackouts: BlackoutRegistry<'_>,
) -> DayStatus {
    let mut any = false;
    for window in blackouts.windows_for(date) {
        if window.is_full_day() {
            return DayStatus::Full;
        }
        any = true;
    }
    for r in active_on(date, reservations, None) {
        if r.window.is_full_day() {
            return DayStatus::Full;
        }
        any = true;
    }
    if any { DayStatus::Partial } else { DayStatus::None }
}

/// Slots after `start` (by position in `all_slots`) that are themselves
/// available, for populating an end-time selector.
///
/// A `start` missing from `all_slots` offers the slots strictly later than
/// its minute.
pub fn candidate_end_times<'a>(
    date: NaiveDate,
    start: TimeSlot,
    all_slots: &'a [TimeSlot],
    reservations: &'a [Reservation],
    blackouts: BlackoutRegistry<'a>,
) -> impl Iterator<Item = TimeSlot> + 'a {
    let skip = match all_slots.iter().position(|s| *s == start) {
        Some(idx) => idx + 1,
        None => all_slots
            .iter()
            .position(|s| s.minute() > start.minute())
            .unwrap_or(all_slots.len()),
    };
    // A full-day block empties the whole list without scanning slots.
    let day_blocked = blackouts.is_fully_blocked(date)
        || active_on(date, reservations, None).any(|r| r.window.is_full_day());

    all_slots
        .iter()
        .skip(skip)
        .take_while(move |_| !day_blocked)
        .filter(move |s| is_slot_available(date, s.minute(), reservations, blackouts, None))
        .copied()
}

/// Everything on `date` whose interval overlaps `span`, blackouts first.
pub fn conflicts(
    date: NaiveDate,
    span: &Span,
    reservations: &[Reservation],
    blackouts: BlackoutRegistry<'_>,
    exclude: Option<Ulid>,
) -> Vec<ConflictSource> {
    let mut found: Vec<ConflictSource> = blackouts
        .windows_for(date)
        .filter(|w| w.span().overlaps(span))
        .map(|w| ConflictSource::Blackout(w.id))
        .collect();
    found.extend(
        active_on(date, reservations, exclude)
            .filter(|r| r.effective_span().overlaps(span))
            .map(|r| ConflictSource::Reservation(r.id)),
    );
    found
}

pub(crate) fn check_no_conflict(
    date: NaiveDate,
    window: &ReservationWindow,
    reservations: &[Reservation],
    blackouts: BlackoutRegistry<'_>,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    let span = window.effective_span();
    match conflicts(date, &span, reservations, blackouts, exclude).first() {
        Some(source) => Err(EngineError::Conflict(*source)),
        None => Ok(()),
    }
}

/// A requested window must start on the bookable part of the day and end
/// after it starts, no later than midnight.
pub(crate) fn validate_window(window: &ReservationWindow) -> Result<(), EngineError> {
    match *window {
        ReservationWindow::FullDay => Ok(()),
        ReservationWindow::At { start, end } => {
            if !(FIRST_SLOT..=LAST_SLOT).contains(&start) {
                return Err(EngineError::InvalidWindow("start outside bookable hours"));
            }
            match end {
                Some(end) if end <= start => Err(EngineError::InvalidWindow("end must be after start")),
                Some(end) if end > MINUTES_PER_DAY => Err(EngineError::InvalidWindow("end past midnight")),
                Some(end) if end - start > MAX_RESERVATION_MINUTES => {
                    Err(EngineError::LimitExceeded("reservation too long"))
                }
                _ => Ok(()),
            }
        }
    }
}

/// Records from the external store are trusted except for a start that
/// does not fall on the day at all.
pub(crate) fn validate_stored_window(window: &ReservationWindow) -> Result<(), EngineError> {
    match *window {
        ReservationWindow::At { start, .. } if start >= MINUTES_PER_DAY => {
            Err(EngineError::InvalidWindow("start past midnight"))
        }
        _ => Ok(()),
    }
}

pub(crate) fn validate_details(details: &ClientDetails) -> Result<(), EngineError> {
    if details.client_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("client name too long"));
    }
    if details.client_email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("client email too long"));
    }
    if details.service_type.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("service type too long"));
    }
    if details.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
        return Err(EngineError::LimitExceeded("notes too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{generate_slots, to_minutes};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reservation(d: NaiveDate, start: &str, end: &str, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Ulid::new(),
            date: d,
            window: ReservationWindow::timed(to_minutes(start), to_minutes(end)),
            status,
            details: ClientDetails::default(),
        }
    }

    fn slots() -> Vec<TimeSlot> {
        generate_slots().collect()
    }

    // ── is_slot_available ────────────────────────────────

    #[test]
    fn full_day_blackout_closes_every_slot() {
        let d = date(2025, 7, 4);
        let blackouts = vec![BlackoutWindow::full_day(Ulid::new(), d, Some("Holiday".into()))];
        for slot in generate_slots() {
            assert!(!is_slot_available(d, slot.minute(), &[], (&blackouts).into(), None));
        }
    }

    #[test]
    fn partial_blackout_closes_only_its_hours() {
        let d = date(2025, 7, 5);
        let blackouts = vec![BlackoutWindow::partial(
            Ulid::new(),
            d,
            Span::new(to_minutes("10:00 AM"), to_minutes("2:00 PM")),
            None,
        )];
        let reg = BlackoutRegistry::from(&blackouts);
        assert!(!is_slot_available(d, to_minutes("11:00 AM"), &[], reg, None));
        assert!(is_slot_available(d, to_minutes("9:00 AM"), &[], reg, None));
    }

    #[test]
    fn reservation_conflict_is_half_open() {
        let d = date(2025, 7, 10);
        let r = reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Confirmed);
        let rs = [r];
        assert!(!is_slot_available(d, to_minutes("11:00 AM"), &rs, BlackoutRegistry::default(), None));
        assert!(is_slot_available(d, to_minutes("12:00 PM"), &rs, BlackoutRegistry::default(), None));
        assert!(is_slot_available(d, to_minutes("9:30 AM"), &rs, BlackoutRegistry::default(), None));
    }

    #[test]
    fn editing_excludes_own_reservation() {
        let d = date(2025, 7, 10);
        let r = reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Confirmed);
        let id = r.id;
        let rs = [r];
        assert!(is_slot_available(d, to_minutes("11:00 AM"), &rs, BlackoutRegistry::default(), Some(id)));
    }

    #[test]
    fn cancelled_reservation_is_transparent() {
        let d = date(2025, 7, 10);
        let rs = [reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Cancelled)];
        assert!(is_slot_available(d, to_minutes("11:00 AM"), &rs, BlackoutRegistry::default(), None));
    }

    #[test]
    fn other_dates_do_not_interfere() {
        let d = date(2025, 7, 10);
        let rs = [reservation(date(2025, 7, 11), "10:00 AM", "12:00 PM", ReservationStatus::Pending)];
        assert!(is_slot_available(d, to_minutes("11:00 AM"), &rs, BlackoutRegistry::default(), None));
    }

    #[test]
    fn missing_end_blocks_one_slot() {
        let d = date(2025, 7, 10);
        let mut r = reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Pending);
        r.window = ReservationWindow::At { start: 600, end: None };
        let rs = [r];
        assert!(!is_slot_available(d, 600, &rs, BlackoutRegistry::default(), None));
        assert!(is_slot_available(d, 630, &rs, BlackoutRegistry::default(), None));
    }

    #[test]
    fn full_day_reservation_closes_the_date() {
        let d = date(2025, 7, 12);
        let mut r = reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Confirmed);
        r.window = ReservationWindow::FullDay;
        let rs = [r];
        for slot in generate_slots() {
            assert!(!is_slot_available(d, slot.minute(), &rs, BlackoutRegistry::default(), None));
        }
    }

    // ── day_status ───────────────────────────────────────

    #[test]
    fn day_status_none_partial_full() {
        let d = date(2025, 8, 1);
        assert_eq!(day_status(d, &[], BlackoutRegistry::default()), DayStatus::None);

        let rs = [reservation(d, "10:00 AM", "11:00 AM", ReservationStatus::Pending)];
        assert_eq!(day_status(d, &rs, BlackoutRegistry::default()), DayStatus::Partial);

        let blackouts = vec![BlackoutWindow::full_day(Ulid::new(), d, None)];
        assert_eq!(day_status(d, &rs, (&blackouts).into()), DayStatus::Full);
    }

    #[test]
    fn day_status_ignores_cancelled() {
        let d = date(2025, 8, 2);
        let mut full = reservation(d, "10:00 AM", "11:00 AM", ReservationStatus::Cancelled);
        full.window = ReservationWindow::FullDay;
        let rs = [full, reservation(d, "1:00 PM", "2:00 PM", ReservationStatus::Cancelled)];
        assert_eq!(day_status(d, &rs, BlackoutRegistry::default()), DayStatus::None);
    }

    #[test]
    fn day_status_partial_blackout() {
        let d = date(2025, 8, 3);
        let blackouts = vec![BlackoutWindow::partial(Ulid::new(), d, Span::new(600, 660), None)];
        assert_eq!(day_status(d, &[], (&blackouts).into()), DayStatus::Partial);
        assert_eq!(day_status(date(2025, 8, 4), &[], (&blackouts).into()), DayStatus::None);
    }

    #[test]
    fn day_status_full_day_reservation() {
        let d = date(2025, 8, 5);
        let mut r = reservation(d, "10:00 AM", "11:00 AM", ReservationStatus::Confirmed);
        r.window = ReservationWindow::FullDay;
        assert_eq!(day_status(d, &[r], BlackoutRegistry::default()), DayStatus::Full);
    }

    // ── candidate_end_times ──────────────────────────────

    #[test]
    fn end_times_follow_start_by_index() {
        let d = date(2025, 9, 1);
        let all = slots();
        let start = TimeSlot::from_minute(to_minutes("10:00 PM"));
        let ends: Vec<_> = candidate_end_times(d, start, &all, &[], BlackoutRegistry::default()).collect();
        assert_eq!(
            ends.iter().map(TimeSlot::label).collect::<Vec<_>>(),
            vec!["10:30 PM", "11:00 PM"]
        );
    }

    #[test]
    fn end_times_skip_unavailable_slots() {
        let d = date(2025, 9, 2);
        let all = slots();
        let rs = [reservation(d, "10:00 AM", "11:00 AM", ReservationStatus::Confirmed)];
        let start = TimeSlot::from_minute(to_minutes("9:00 AM"));
        let ends: Vec<_> = candidate_end_times(d, start, &all, &rs, BlackoutRegistry::default())
            .take(4)
            .map(|s| s.label())
            .collect();
        assert_eq!(ends, vec!["9:30 AM", "11:00 AM", "11:30 AM", "12:00 PM"]);
    }

    #[test]
    fn end_times_empty_on_blocked_day() {
        let d = date(2025, 9, 3);
        let all = slots();
        let blackouts = vec![BlackoutWindow::full_day(Ulid::new(), d, None)];
        let start = all[0];
        assert_eq!(candidate_end_times(d, start, &all, &[], (&blackouts).into()).count(), 0);
    }

    #[test]
    fn end_times_for_last_slot_is_empty() {
        let d = date(2025, 9, 4);
        let all = slots();
        let last = *all.last().unwrap();
        assert_eq!(candidate_end_times(d, last, &all, &[], BlackoutRegistry::default()).count(), 0);
    }

    #[test]
    fn end_times_for_off_grid_start_are_strictly_later() {
        let d = date(2025, 9, 5);
        let all = slots();
        let off_grid = TimeSlot::from_minute(to_minutes("6:15 AM"));
        let ends: Vec<_> = candidate_end_times(d, off_grid, &all, &[], BlackoutRegistry::default()).collect();
        assert_eq!(ends.len(), all.len() - 1);
        assert_eq!(ends[0].label(), "6:30 AM");

        let late = TimeSlot::from_minute(to_minutes("10:15 PM"));
        let ends: Vec<String> = candidate_end_times(d, late, &all, &[], BlackoutRegistry::default())
            .map(|s| s.label())
            .collect();
        assert_eq!(ends, vec!["10:30 PM", "11:00 PM"]);

        let after_grid = TimeSlot::from_minute(to_minutes("11:45 PM"));
        assert_eq!(candidate_end_times(d, after_grid, &all, &[], BlackoutRegistry::default()).count(), 0);

        let before_grid = TimeSlot::from_minute(to_minutes("5:00 AM"));
        assert_eq!(
            candidate_end_times(d, before_grid, &all, &[], BlackoutRegistry::default()).count(),
            all.len()
        );
    }

    // ── conflicts / validation ───────────────────────────

    #[test]
    fn conflicts_report_blackouts_then_reservations() {
        let d = date(2025, 10, 1);
        let blackouts = vec![BlackoutWindow::partial(Ulid::new(), d, Span::new(600, 660), None)];
        let r = reservation(d, "10:30 AM", "11:30 AM", ReservationStatus::Pending);
        let rid = r.id;
        let found = conflicts(d, &Span::new(570, 690), &[r], (&blackouts).into(), None);
        assert_eq!(
            found,
            vec![ConflictSource::Blackout(blackouts[0].id), ConflictSource::Reservation(rid)]
        );
    }

    #[test]
    fn back_to_back_spans_do_not_conflict() {
        let d = date(2025, 10, 2);
        let rs = [reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Confirmed)];
        let window = ReservationWindow::timed(720, 780);
        assert!(check_no_conflict(d, &window, &rs, BlackoutRegistry::default(), None).is_ok());
        let window = ReservationWindow::timed(540, 600);
        assert!(check_no_conflict(d, &window, &rs, BlackoutRegistry::default(), None).is_ok());
    }

    #[test]
    fn overlapping_span_conflicts() {
        let d = date(2025, 10, 3);
        let r = reservation(d, "10:00 AM", "12:00 PM", ReservationStatus::Confirmed);
        let rid = r.id;
        let window = ReservationWindow::timed(540, 630);
        let err = check_no_conflict(d, &window, &[r], BlackoutRegistry::default(), None).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(ConflictSource::Reservation(id)) if id == rid));
    }

    #[test]
    fn window_validation() {
        assert!(validate_window(&ReservationWindow::FullDay).is_ok());
        assert!(validate_window(&ReservationWindow::timed(600, 660)).is_ok());
        assert!(validate_window(&ReservationWindow::At { start: 600, end: None }).is_ok());
        assert!(matches!(
            validate_window(&ReservationWindow::timed(600, 600)),
            Err(EngineError::InvalidWindow(_))
        ));
        assert!(matches!(
            validate_window(&ReservationWindow::timed(300, 400)),
            Err(EngineError::InvalidWindow(_))
        ));
        assert!(matches!(
            validate_window(&ReservationWindow::timed(1380, 1500)),
            Err(EngineError::InvalidWindow(_))
        ));
        assert!(validate_window(&ReservationWindow::timed(1380, 1440)).is_ok());
    }
}
