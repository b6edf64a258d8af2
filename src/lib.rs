//! Availability, conflict detection and reservation lifecycle for a
//! single-calendar booking service.
//!
//! The pure core lives in [`grid`] and the free functions re-exported from
//! [`engine`]; [`engine::Engine`] wraps them in an in-memory calendar that
//! serializes writes per date.

pub mod engine;
pub mod grid;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod snapshot;
