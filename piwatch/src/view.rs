//! View
//!
//! Pure model of the scrolling feed region: which rows exist, when each one
//! becomes visible, and the two eviction bounds (row count and rendered
//! height). Drawing itself lives in the tools crate.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::feed::FeedEntry;

pub const DEFAULT_MAX_ROWS: usize = 100;
/// Per-position reveal delay within one batch, so a batch cascades in
/// instead of appearing at once.
pub const STAGGER_STEP: Duration = Duration::from_millis(75);
/// Cap on the stagger so large batches still settle quickly.
pub const STAGGER_MAX: Duration = Duration::from_millis(600);
/// How long a newly revealed row stays emphasized.
pub const HIGHLIGHT_WINDOW: Duration = Duration::from_millis(900);

// Fixed prefix of a drawn row: "[HH:MM:SS] " plus the separator between
// node and domain.
const TIME_PREFIX_WIDTH: usize = 11;
const NODE_SEPARATOR_WIDTH: usize = 2;

#[derive(Debug, Clone)]
pub struct FeedRow {
    pub entry: FeedEntry,
    pub inserted_at: Instant,
    pub reveal_delay: Duration,
}

impl FeedRow {
    pub fn revealed(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.reveal_delay
    }

    pub fn highlighted(&self, now: Instant) -> bool {
        let age = now.duration_since(self.inserted_at);
        age >= self.reveal_delay && age < self.reveal_delay + HIGHLIGHT_WINDOW
    }

    /// Terminal lines this row occupies at the given width, accounting for
    /// wrapping of long domains.
    pub fn rendered_lines(&self, width: usize) -> usize {
        let text = TIME_PREFIX_WIDTH
            + self.entry.node.len()
            + NODE_SEPARATOR_WIDTH
            + self.entry.event.domain.len();
        text.div_ceil(width.max(1)).max(1)
    }
}

/// Bounded sequence of feed rows, oldest first. Both bounds are enforced
/// after every insertion batch: count, then height, then count once more.
pub struct FeedView {
    rows: VecDeque<FeedRow>,
    max_rows: usize,
}

impl FeedView {
    pub fn new(max_rows: usize) -> FeedView {
        FeedView {
            rows: VecDeque::new(),
            max_rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &FeedRow> {
        self.rows.iter()
    }

    /// Appends one poll's novel entries, assigning each a reveal delay
    /// proportional to its position in the batch, capped at
    /// [`STAGGER_MAX`].
    pub fn push_batch(&mut self, entries: Vec<FeedEntry>, now: Instant) {
        for (i, entry) in entries.into_iter().enumerate() {
            let delay = STAGGER_STEP
                .checked_mul(i as u32)
                .map(|d| d.min(STAGGER_MAX))
                .unwrap_or(STAGGER_MAX);
            self.rows.push_back(FeedRow {
                entry,
                inserted_at: now,
                reveal_delay: delay,
            });
        }
    }

    /// Applies both bounds for the given drawing area, evicting oldest
    /// rows first.
    pub fn enforce(&mut self, area_rows: usize, width: usize) {
        self.enforce_rows();
        self.enforce_height(area_rows, width);
        self.enforce_rows();
    }

    /// Total terminal lines the current rows occupy at the given width.
    pub fn rendered_height(&self, width: usize) -> usize {
        self.rows.iter().map(|r| r.rendered_lines(width)).sum()
    }

    fn enforce_rows(&mut self) {
        while self.rows.len() > self.max_rows {
            self.rows.pop_front();
        }
    }

    fn enforce_height(&mut self, area_rows: usize, width: usize) {
        // The height cannot shrink below one line per row; bail after a
        // bounded number of evictions rather than loop forever.
        let mut guard = self.rows.len();
        while guard > 0 && self.rendered_height(width) > area_rows {
            self.rows.pop_front();
            guard -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::QueryEvent;

    fn entry(node: &str, timestamp: i64, domain: &str) -> FeedEntry {
        FeedEntry {
            node: node.to_string(),
            event: QueryEvent {
                timestamp,
                domain: domain.to_string(),
                blocked: false,
            },
        }
    }

    fn entries(n: usize) -> Vec<FeedEntry> {
        (0..n).map(|i| entry("attic", i as i64, "a.com")).collect()
    }

    #[test]
    fn stagger_is_position_proportional_and_capped() {
        let mut view = FeedView::new(DEFAULT_MAX_ROWS);
        view.push_batch(entries(20), Instant::now());
        let delays: Vec<_> = view.rows().map(|r| r.reveal_delay).collect();
        assert_eq!(delays[0], Duration::ZERO);
        assert_eq!(delays[1], STAGGER_STEP);
        assert_eq!(delays[3], STAGGER_STEP * 3);
        assert_eq!(delays[19], STAGGER_MAX);
    }

    #[test]
    fn rows_reveal_after_their_delay_and_then_unhighlight() {
        let start = Instant::now();
        let mut view = FeedView::new(DEFAULT_MAX_ROWS);
        view.push_batch(entries(2), start);
        let second = view.rows().nth(1).unwrap();

        assert!(!second.revealed(start));
        let after_delay = start + STAGGER_STEP;
        assert!(second.revealed(after_delay));
        assert!(second.highlighted(after_delay));
        assert!(!second.highlighted(after_delay + HIGHLIGHT_WINDOW));
    }

    #[test]
    fn count_bound_evicts_oldest_first() {
        let mut view = FeedView::new(3);
        view.push_batch(entries(5), Instant::now());
        view.enforce(100, 80);
        assert_eq!(view.len(), 3);
        let kept: Vec<_> = view.rows().map(|r| r.entry.event.timestamp).collect();
        assert_eq!(kept, [2, 3, 4]);
    }

    #[test]
    fn height_bound_evicts_until_the_area_fits() {
        let mut view = FeedView::new(100);
        view.push_batch(entries(10), Instant::now());
        view.enforce(4, 80);
        assert_eq!(view.len(), 4);
        assert!(view.rendered_height(80) <= 4);
        let kept: Vec<_> = view.rows().map(|r| r.entry.event.timestamp).collect();
        assert_eq!(kept, [6, 7, 8, 9]);
    }

    #[test]
    fn wrapped_rows_count_their_full_height() {
        let long = "a".repeat(150);
        let row = FeedRow {
            entry: entry("attic", 0, &long),
            inserted_at: Instant::now(),
            reveal_delay: Duration::ZERO,
        };
        // 11 + 5 + 2 + 150 = 168 cells at width 80 -> 3 lines.
        assert_eq!(row.rendered_lines(80), 3);
        assert_eq!(row.rendered_lines(200), 1);

        let mut view = FeedView::new(100);
        let wide: Vec<_> = (0..5).map(|i| entry("attic", i, &long)).collect();
        view.push_batch(wide, Instant::now());
        view.enforce(7, 80);
        // Each row is 3 lines tall, so only two fit in 7.
        assert_eq!(view.len(), 2);
        assert!(view.rendered_height(80) <= 7);
    }

    #[test]
    fn zero_width_area_does_not_loop_forever() {
        let mut view = FeedView::new(100);
        view.push_batch(entries(10), Instant::now());
        view.enforce(0, 0);
        assert!(view.is_empty());
    }

    #[test]
    fn both_bounds_hold_after_every_batch() {
        let mut view = FeedView::new(8);
        for poll in 0..6 {
            view.push_batch(entries(5), Instant::now());
            view.enforce(6, 80);
            assert!(view.len() <= 8, "count bound violated after poll {}", poll);
            assert!(view.rendered_height(80) <= 6);
        }
    }
}
