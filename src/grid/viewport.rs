//! Container measurement, debouncing and filler rows

use crate::config::ViewportConfig;
use std::time::{Duration, Instant};

/// Changes smaller than this on both axes are ignored
const SIZE_EPSILON_PX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerSize {
    pub width: f64,
    pub height: f64,
}

impl ContainerSize {
    pub fn new(width: f64, height: f64) -> Self {
        ContainerSize { width, height }
    }

    pub fn differs_from(&self, other: &ContainerSize) -> bool {
        (self.width - other.width).abs() > SIZE_EPSILON_PX
            || (self.height - other.height).abs() > SIZE_EPSILON_PX
    }
}

/// Holds the latest value until it has been quiet for `delay`
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet period
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the value once its quiet period has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = matches!(&self.pending, Some((_, due)) if now >= *due);
        if ready {
            self.pending.take().map(|(v, _)| v)
        } else {
            None
        }
    }
}

/// Debounced container size that drops sub-pixel jitter
#[derive(Debug, Clone)]
pub struct ContainerTracker {
    current: ContainerSize,
    debounce: Debouncer<ContainerSize>,
}

impl ContainerTracker {
    pub fn new(viewport: &ViewportConfig) -> Self {
        ContainerTracker {
            current: ContainerSize::default(),
            debounce: Debouncer::new(viewport.resize_debounce),
        }
    }

    pub fn current(&self) -> ContainerSize {
        self.current
    }

    pub fn observe(&mut self, size: ContainerSize, now: Instant) {
        if size.differs_from(&self.current) {
            self.debounce.push(size, now);
        }
    }

    /// Apply a settled measurement; true if the size changed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.debounce.poll(now) {
            Some(size) if size.differs_from(&self.current) => {
                self.current = size;
                true
            }
            _ => false,
        }
    }
}

/// Rows currently rendered, from the scroll position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRegion {
    pub top_row: usize,
    pub bottom_row: usize,
}

impl VisibleRegion {
    pub fn from_scroll(scroll_top: f64, container_height: f64, row_height: f64) -> Self {
        if row_height <= 0.0 {
            return VisibleRegion {
                top_row: 0,
                bottom_row: 0,
            };
        }
        let top_row = (scroll_top.max(0.0) / row_height).floor() as usize;
        let rows = (container_height.max(0.0) / row_height).ceil() as usize;
        VisibleRegion {
            top_row,
            bottom_row: top_row + rows.saturating_sub(1),
        }
    }
}

/// Header band height, including the group header row when shown
pub fn header_height(viewport: &ViewportConfig, show_groups: bool) -> f64 {
    if show_groups {
        viewport.row_height + viewport.group_header_height
    } else {
        viewport.row_height
    }
}

/// Filler rows needed to pad whitespace under the last data row
///
/// Only once all data is loaded; while more rows can arrive the space is left
/// for them.
pub fn empty_rows(
    container_height: f64,
    visible_rows: usize,
    has_more: bool,
    show_groups: bool,
    viewport: &ViewportConfig,
) -> usize {
    if has_more || container_height <= 0.0 || visible_rows == 0 || viewport.row_height <= 0.0 {
        return 0;
    }
    let whitespace = container_height
        - header_height(viewport, show_groups)
        - visible_rows as f64 * viewport.row_height;
    if whitespace <= 0.0 {
        0
    } else {
        (whitespace / viewport.row_height).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_waits_for_quiet_period() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(50));
        d.push(1, t0);
        d.push(2, t0 + Duration::from_millis(30));
        assert_eq!(d.poll(t0 + Duration::from_millis(60)), None);
        assert_eq!(d.poll(t0 + Duration::from_millis(80)), Some(2));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_tracker_ignores_jitter() {
        let t0 = Instant::now();
        let mut tracker = ContainerTracker::new(&ViewportConfig::default());
        tracker.observe(ContainerSize::new(800.0, 600.0), t0);
        assert!(tracker.poll(t0 + Duration::from_millis(60)));

        tracker.observe(ContainerSize::new(800.5, 600.9), t0 + Duration::from_millis(100));
        assert!(!tracker.poll(t0 + Duration::from_millis(200)));
        assert_eq!(tracker.current(), ContainerSize::new(800.0, 600.0));
    }

    #[test]
    fn test_visible_region() {
        let region = VisibleRegion::from_scroll(340.0, 340.0, 34.0);
        assert_eq!(
            region,
            VisibleRegion {
                top_row: 10,
                bottom_row: 19
            }
        );
    }

    #[test]
    fn test_empty_rows() {
        let vp = ViewportConfig::default();
        // 680 - 34 header - 5 * 34 rows = 476 px → 14 filler rows
        assert_eq!(empty_rows(680.0, 5, false, false, &vp), 14);
        // Group header takes another 36 px
        assert_eq!(empty_rows(680.0, 5, false, true, &vp), 13);
        assert_eq!(empty_rows(680.0, 5, true, false, &vp), 0);
        assert_eq!(empty_rows(680.0, 50, false, false, &vp), 0);
        assert_eq!(empty_rows(0.0, 5, false, false, &vp), 0);
    }
}
