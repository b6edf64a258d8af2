use chrono::NaiveDate;

use crate::grid::FIRST_SLOT;
use crate::model::*;

use super::blackout::BlackoutRegistry;

// ── Free-span algorithm ───────────────────────────────────────────

/// The part of a day that can hold bookings: from the first slot to midnight.
pub fn open_hours() -> Span {
    Span::new(FIRST_SLOT, MINUTES_PER_DAY)
}

/// Open intervals of `date`: opening hours minus blackouts minus every
/// non-cancelled reservation. Sorted, disjoint.
pub fn free_spans(
    date: NaiveDate,
    reservations: &[Reservation],
    blackouts: BlackoutRegistry<'_>,
) -> Vec<Span> {
    let mut blocked: Vec<Span> = blackouts.windows_for(date).map(BlackoutWindow::span).collect();
    blocked.extend(
        reservations
            .iter()
            .filter(|r| r.date == date && r.is_blocking())
            .map(Reservation::effective_span),
    );
    if blocked.is_empty() {
        return vec![open_hours()];
    }
    blocked.sort_by_key(|s| s.start);
    let blocked = merge_overlapping(&blocked);
    subtract_intervals(&[open_hours()], &blocked)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut() {
            if span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

/// `base` minus `to_remove`; both sorted by start, `to_remove` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}
