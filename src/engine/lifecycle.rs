use std::borrow::Borrow;

use crate::model::{Reservation, ReservationStatus};

use super::error::InvalidTransition;

/// Statuses reachable from `from` in one step.
///
/// `pending → confirmed → completed`, with `cancelled` reachable from either
/// active state. `completed` and `cancelled` are terminal.
pub fn allowed_transitions(from: ReservationStatus) -> &'static [ReservationStatus] {
    use ReservationStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Completed, Cancelled],
        Completed | Cancelled => &[],
    }
}

pub fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Outcome of a successful status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub reservation: Reservation,
    pub previous: ReservationStatus,
}

impl Transition {
    /// The moment the external notifier should be invoked.
    pub fn is_confirmation(&self) -> bool {
        self.reservation.status == ReservationStatus::Confirmed
            && self.previous != ReservationStatus::Confirmed
    }
}

pub fn transition(mut reservation: Reservation, to: ReservationStatus) -> Result<Transition, InvalidTransition> {
    let from = reservation.status;
    if !can_transition(from, to) {
        return Err(InvalidTransition { from, to });
    }
    reservation.status = to;
    Ok(Transition {
        reservation,
        previous: from,
    })
}

/// Staff triage order: active reservations by date, then terminal ones by
/// date. Stable, so same-date entries keep their input order.
pub fn sort_for_display<R: Borrow<Reservation>>(mut reservations: Vec<R>) -> Vec<R> {
    reservations.sort_by_key(|r| {
        let r: &Reservation = r.borrow();
        (r.status.is_terminal(), r.date)
    });
    reservations
}
