//! Render core counters.
//!
//! Lock-free atomics with relaxed ordering; a `snapshot()` gives tests and
//! diagnostics a coherent-enough view without touching the drain lock.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use core_frame::{FramePriority, FrameSource};

#[derive(Debug, Default)]
pub struct RenderMetrics {
    submitted: AtomicU64,
    submitted_by_source: [AtomicU64; FrameSource::COUNT],
    submitted_by_priority: [AtomicU64; FramePriority::COUNT],
    rendered: AtomicU64,
    commits_skipped: AtomicU64,
    drops_expired: AtomicU64,
    drops_overflow: AtomicU64,
    ticks: AtomicU64,
    drain_timeouts: AtomicU64,
    hw_failures: AtomicU64,
    render_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Frames accepted by `submit`.
    pub submitted: u64,
    pub submitted_by_source: [u64; FrameSource::COUNT],
    pub submitted_by_priority: [u64; FramePriority::COUNT],
    /// Ticks that performed a hardware commit.
    pub rendered: u64,
    /// Ticks whose selection was identity-equal to the last committed one.
    pub commits_skipped: u64,
    /// Frames pruned from a queue because their TTL ran out.
    pub drops_expired: u64,
    /// Frames evicted by the bounded per-priority queues.
    pub drops_overflow: u64,
    /// Render loop iterations (including skipped and empty ones).
    pub ticks: u64,
    /// Ticks abandoned because the drain lock stayed contended.
    pub drain_timeouts: u64,
    /// Transient load/commit failures.
    pub hw_failures: u64,
    /// Faults captured inside selection/merge.
    pub render_errors: u64,
}

impl MetricsSnapshot {
    pub fn by_source(&self, source: FrameSource) -> u64 {
        self.submitted_by_source[source.index()]
    }

    pub fn by_priority(&self, priority: FramePriority) -> u64 {
        self.submitted_by_priority[priority.index()]
    }
}

impl RenderMetrics {
    pub fn record_submit(&self, priority: FramePriority, source: FrameSource) {
        self.submitted.fetch_add(1, Relaxed);
        self.submitted_by_source[source.index()].fetch_add(1, Relaxed);
        self.submitted_by_priority[priority.index()].fetch_add(1, Relaxed);
    }

    pub fn record_rendered(&self) {
        self.rendered.fetch_add(1, Relaxed);
    }

    pub fn record_commit_skipped(&self) {
        self.commits_skipped.fetch_add(1, Relaxed);
    }

    pub fn record_expired(&self, n: u64) {
        if n > 0 {
            self.drops_expired.fetch_add(n, Relaxed);
        }
    }

    pub fn record_overflow(&self) {
        self.drops_overflow.fetch_add(1, Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Relaxed);
    }

    pub fn record_drain_timeout(&self) {
        self.drain_timeouts.fetch_add(1, Relaxed);
    }

    pub fn record_hw_failure(&self) {
        self.hw_failures.fetch_add(1, Relaxed);
    }

    pub fn record_render_error(&self) {
        self.render_errors.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Relaxed),
            submitted_by_source: std::array::from_fn(|i| self.submitted_by_source[i].load(Relaxed)),
            submitted_by_priority: std::array::from_fn(|i| {
                self.submitted_by_priority[i].load(Relaxed)
            }),
            rendered: self.rendered.load(Relaxed),
            commits_skipped: self.commits_skipped.load(Relaxed),
            drops_expired: self.drops_expired.load(Relaxed),
            drops_overflow: self.drops_overflow.load(Relaxed),
            ticks: self.ticks.load(Relaxed),
            drain_timeouts: self.drain_timeouts.load(Relaxed),
            hw_failures: self.hw_failures.load(Relaxed),
            render_errors: self.render_errors.load(Relaxed),
        }
    }
}
