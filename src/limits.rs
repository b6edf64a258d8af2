/// Max non-cancelled and cancelled reservations kept for a single date.
pub const MAX_RESERVATIONS_PER_DAY: usize = 256;

/// Max blackout windows on a single date.
pub const MAX_BLACKOUTS_PER_DAY: usize = 32;

/// Longest timed reservation (12 hours).
pub const MAX_RESERVATION_MINUTES: u32 = 12 * 60;

/// Widest date range a calendar or listing query may cover.
pub const MAX_CALENDAR_RANGE_DAYS: i64 = 366;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_NOTES_LEN: usize = 4096;
pub const MAX_REASON_LEN: usize = 512;
