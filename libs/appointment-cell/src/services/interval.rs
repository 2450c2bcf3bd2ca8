// libs/appointment-cell/src/services/interval.rs
//
// Half-open interval helpers shared by conflict detection and availability.

use chrono::{NaiveDateTime, TimeDelta};

pub type Interval = (NaiveDateTime, NaiveDateTime);

/// Strict half-open overlap. Touching intervals do not overlap.
pub fn overlaps(a: Interval, b: Interval) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Sorts by start and folds overlapping or touching intervals together.
///
/// The result is the minimal sorted cover of the input, so merging it again
/// returns the same sequence.
pub fn merge_intervals(intervals: &[Interval]) -> Vec<Interval> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|interval| interval.0);

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for current in sorted {
        match merged.last_mut() {
            Some(last) if current.0 <= last.1 => {
                last.1 = last.1.max(current.1);
            }
            _ => merged.push(current),
        }
    }
    merged
}

/// Drops intervals outside `[window_start, window_end)` and clips the rest to it.
pub fn clamp_to_window(
    intervals: &[Interval],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<Interval> {
    intervals
        .iter()
        .filter(|(start, end)| *start < window_end && *end > window_start)
        .map(|(start, end)| ((*start).max(window_start), (*end).min(window_end)))
        .collect()
}

/// Cuts `[start, end)` into consecutive slots of exactly `slot_minutes`.
/// A trailing remainder shorter than one slot is discarded, as is a step
/// that does not fit the calendar at all.
pub fn chunk(start: NaiveDateTime, end: NaiveDateTime, slot_minutes: i64) -> Vec<Interval> {
    let Some(step) = TimeDelta::try_minutes(slot_minutes).filter(|step| *step > TimeDelta::zero()) else {
        return Vec::new();
    };

    let mut slots = Vec::new();
    let mut current = start;
    while let Some(next) = current.checked_add_signed(step).filter(|next| *next <= end) {
        slots.push((current, next));
        current = next;
    }
    slots
}

/// Free gaps of `[window_start, window_end)` around already merged, clamped busy intervals.
pub fn free_gaps(
    busy: &[Interval],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Vec<Interval> {
    let mut gaps = Vec::new();
    let mut cursor = window_start;
    for &(start, end) in busy {
        if start > cursor {
            gaps.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < window_end {
        gaps.push((cursor, window_end));
    }
    gaps
}
