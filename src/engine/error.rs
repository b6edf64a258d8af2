use thiserror::Error;
use ulid::Ulid;

use crate::model::{ConflictSource, ReservationStatus};

/// The one failure the pure lifecycle can produce. Callers must not apply
/// the status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot move reservation from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ReservationStatus,
    pub to: ReservationStatus,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("conflict with {0}")]
    Conflict(ConflictSource),
    #[error("invalid window: {0}")]
    InvalidWindow(&'static str),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("reservation {0} is completed or cancelled")]
    Closed(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("calendar source error: {0}")]
    Source(String),
}
