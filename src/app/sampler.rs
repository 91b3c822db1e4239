//! Render timing observation.
//!
//! The loop reports every frame it presents to the configured
//! [`RenderObserver`]. [`RenderSampler`] is a ready-made observer that keeps
//! a sliding window and summarizes it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::ConfigError;

/// Timings for one presented frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub frame: u64,
    pub started: Instant,
    pub finished: Instant,
    /// Layout plus widget rendering.
    pub render: Duration,
    /// Backend presentation.
    pub flush: Duration,
    pub dirty_cells: usize,
    pub total_cells: usize,
    pub full_redraw: bool,
}

impl RenderStats {
    pub fn total(&self) -> Duration {
        self.finished.saturating_duration_since(self.started)
    }

    /// Share of cells written, `0.0` for an empty frame.
    pub fn dirty_ratio(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.dirty_cells as f64 / self.total_cells as f64
        }
    }
}

/// Receives frame statistics on the loop thread.
pub trait RenderObserver: Send + Sync {
    fn observe_render(&self, stats: &RenderStats);
}

/// Aggregate of the sampler window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderSummary {
    /// Frames observed since creation.
    pub frames: u64,
    /// Frames currently in the window.
    pub samples: usize,
    pub window: usize,
    pub last: Option<RenderStats>,
    pub avg_total: Duration,
    pub avg_render: Duration,
    pub avg_flush: Duration,
    pub max_total: Duration,
    pub max_render: Duration,
    pub max_flush: Duration,
    /// Mean dirty ratio over frames with at least one cell.
    pub avg_dirty_ratio: f64,
}

struct Samples {
    frames: u64,
    window: VecDeque<RenderStats>,
}

/// Keeps the last `window` frames.
pub struct RenderSampler {
    capacity: usize,
    inner: Mutex<Samples>,
}

impl RenderSampler {
    pub const DEFAULT_WINDOW: usize = 120;

    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self {
            capacity: window,
            inner: Mutex::new(Samples {
                frames: 0,
                window: VecDeque::with_capacity(window),
            }),
        })
    }

    pub fn window(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, stats: RenderStats) {
        let mut inner = self.inner.lock();
        inner.frames += 1;
        if inner.window.len() == self.capacity {
            inner.window.pop_front();
        }
        inner.window.push_back(stats);
    }

    pub fn summary(&self) -> RenderSummary {
        let (frames, samples): (u64, Vec<RenderStats>) = {
            let inner = self.inner.lock();
            (inner.frames, inner.window.iter().copied().collect())
        };
        let mut summary = RenderSummary {
            frames,
            samples: samples.len(),
            window: self.capacity,
            last: samples.last().copied(),
            ..RenderSummary::default()
        };
        if samples.is_empty() {
            return summary;
        }

        let mut sum_total = Duration::ZERO;
        let mut sum_render = Duration::ZERO;
        let mut sum_flush = Duration::ZERO;
        let mut ratio_sum = 0.0;
        let mut ratio_count = 0usize;
        for s in &samples {
            sum_total += s.total();
            sum_render += s.render;
            sum_flush += s.flush;
            summary.max_total = summary.max_total.max(s.total());
            summary.max_render = summary.max_render.max(s.render);
            summary.max_flush = summary.max_flush.max(s.flush);
            if s.total_cells > 0 {
                ratio_sum += s.dirty_ratio();
                ratio_count += 1;
            }
        }

        let n = samples.len() as u32;
        summary.avg_total = sum_total / n;
        summary.avg_render = sum_render / n;
        summary.avg_flush = sum_flush / n;
        if ratio_count > 0 {
            summary.avg_dirty_ratio = ratio_sum / ratio_count as f64;
        }
        summary
    }
}

impl Default for RenderSampler {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_WINDOW,
            inner: Mutex::new(Samples {
                frames: 0,
                window: VecDeque::with_capacity(Self::DEFAULT_WINDOW),
            }),
        }
    }
}

impl RenderObserver for RenderSampler {
    fn observe_render(&self, stats: &RenderStats) {
        self.record(*stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(frame: u64, millis: u64, dirty: usize, total: usize) -> RenderStats {
        let started = Instant::now();
        RenderStats {
            frame,
            started,
            finished: started + Duration::from_millis(millis),
            render: Duration::from_millis(millis / 2),
            flush: Duration::from_millis(millis / 2),
            dirty_cells: dirty,
            total_cells: total,
            full_redraw: false,
        }
    }

    #[test]
    fn test_window_slides() {
        let sampler = RenderSampler::new(2).expect("window");
        for i in 0..5 {
            sampler.record(stats(i, 10, 0, 10));
        }
        let summary = sampler.summary();
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.last.map(|s| s.frame), Some(4));
    }

    #[test]
    fn test_summary_averages_and_maxima() {
        let sampler = RenderSampler::default();
        sampler.observe_render(&stats(0, 10, 5, 10));
        sampler.observe_render(&stats(1, 30, 0, 0));
        sampler.observe_render(&stats(2, 20, 10, 10));

        let summary = sampler.summary();
        assert_eq!(summary.window, 120);
        assert_eq!(summary.avg_total, Duration::from_millis(20));
        assert_eq!(summary.max_total, Duration::from_millis(30));
        assert_eq!(summary.max_flush, Duration::from_millis(15));
        // The empty frame is left out of the ratio.
        assert!((summary.avg_dirty_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(RenderSampler::new(0), Err(ConfigError::ZeroWindow)));
        assert_eq!(RenderSampler::default().summary(), RenderSummary { window: 120, ..RenderSummary::default() });
    }
}
