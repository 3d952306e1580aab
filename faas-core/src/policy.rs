//! Worker selection policies (§4.4).

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::config::SelectionPolicy;

/// Chooses one selectable, not-yet-tried index, or `None` if the scan finds
/// nothing (`NoWorker`). Round-Robin's cursor advances only when the scan
/// actually finds a slot — a failed scan leaves it untouched, per the
/// resolved Open Question in §9.
pub fn select(
    policy: SelectionPolicy,
    selectable: &[bool],
    excluded: &HashSet<usize>,
    rr_cursor: &AtomicUsize,
    load: &[AtomicI64],
) -> Option<usize> {
    let candidates = |i: &usize| selectable[*i] && !excluded.contains(i);

    match policy {
        SelectionPolicy::RoundRobin => select_round_robin(selectable, excluded, rr_cursor),
        SelectionPolicy::FirstAvailable => (0..selectable.len()).find(candidates),
        SelectionPolicy::Weighted => (0..selectable.len())
            .filter(candidates)
            .min_by_key(|&i| (load[i].load(Ordering::SeqCst), i)),
    }
}

fn select_round_robin(
    selectable: &[bool],
    excluded: &HashSet<usize>,
    rr_cursor: &AtomicUsize,
) -> Option<usize> {
    let len = selectable.len();
    if len == 0 {
        return None;
    }
    let start = rr_cursor.load(Ordering::SeqCst) % len;
    for offset in 0..len {
        let idx = (start + offset) % len;
        if selectable[idx] && !excluded.contains(&idx) {
            rr_cursor.store((idx + 1) % len, Ordering::SeqCst);
            return Some(idx);
        }
    }
    None
}
