//! Bounded per-priority frame queues.
//!
//! One set per strip, guarded by the strip's drain lock. Each priority
//! level is a FIFO of capacity [`QUEUE_CAP`]; pushing into a full level
//! evicts the oldest entry. This is deliberate backpressure: producers may
//! flood, but only the newest two frames per level are ever considered.
//!
//! Frames stay queued until they expire or are evicted, so a long-lived
//! frame keeps getting selected tick after tick (which is what makes the
//! identity-skip optimization observable).
//!
//! Depth counters live in a shared atomic block so the drain-timeout
//! diagnostic can report queue sizes without taking the lock it just
//! failed to get.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use core_frame::{Frame, FramePriority};
use tokio::time::Instant;

/// Frames retained per priority level.
pub const QUEUE_CAP: usize = 2;

/// Lock-free view of per-level queue depths.
#[derive(Debug, Default)]
pub struct QueueDepths {
    levels: [AtomicUsize; FramePriority::COUNT],
}

impl QueueDepths {
    pub fn get(&self, priority: FramePriority) -> usize {
        self.levels[priority.index()].load(Relaxed)
    }

    pub fn total(&self) -> usize {
        self.levels.iter().map(|d| d.load(Relaxed)).sum()
    }

    pub fn snapshot(&self) -> [usize; FramePriority::COUNT] {
        std::array::from_fn(|i| self.levels[i].load(Relaxed))
    }
}

#[derive(Debug)]
pub struct PriorityQueues {
    levels: [VecDeque<Arc<Frame>>; FramePriority::COUNT],
    depths: Arc<QueueDepths>,
}

impl Default for PriorityQueues {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueues {
    pub fn new() -> Self {
        Self {
            levels: std::array::from_fn(|_| VecDeque::with_capacity(QUEUE_CAP)),
            depths: Arc::new(QueueDepths::default()),
        }
    }

    /// Shared depth counters, readable without the drain lock.
    pub fn depths(&self) -> Arc<QueueDepths> {
        self.depths.clone()
    }

    /// Append a frame at its priority level. Returns the evicted oldest
    /// frame when the level was full.
    pub fn push(&mut self, frame: Arc<Frame>) -> Option<Arc<Frame>> {
        let index = frame.priority().index();
        let level = &mut self.levels[index];
        let evicted = if level.len() == QUEUE_CAP {
            level.pop_front()
        } else {
            None
        };
        level.push_back(frame);
        self.depths.levels[index].store(level.len(), Relaxed);
        evicted
    }

    /// Remove every expired frame. Returns how many were dropped.
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        for (index, level) in self.levels.iter_mut().enumerate() {
            let before = level.len();
            level.retain(|frame| !frame.is_expired(now));
            dropped += before - level.len();
            self.depths.levels[index].store(level.len(), Relaxed);
        }
        dropped
    }

    /// FIFO iteration over one level.
    pub fn level(&self, priority: FramePriority) -> impl Iterator<Item = &Arc<Frame>> {
        self.levels[priority.index()].iter()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.is_empty())
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(|l| l.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_frame::FrameSource;
    use core_pixel::Color;
    use core_zone::ZoneId;
    use std::time::Duration;

    fn frame(ttl: Duration) -> Arc<Frame> {
        Arc::new(
            Frame::solid(
                ZoneId::Floor,
                Color::RED,
                FramePriority::Manual,
                FrameSource::Manual,
                ttl,
            )
            .expect("valid frame"),
        )
    }

    #[test]
    fn push_evicts_oldest_beyond_capacity() {
        let mut q = PriorityQueues::new();
        let a = frame(Duration::from_secs(1));
        let b = frame(Duration::from_secs(1));
        let c = frame(Duration::from_secs(1));
        assert!(q.push(a.clone()).is_none());
        assert!(q.push(b.clone()).is_none());
        let evicted = q.push(c.clone()).expect("third push evicts");
        assert!(Arc::ptr_eq(&evicted, &a), "oldest goes first");
        let remaining: Vec<_> = q.level(FramePriority::Manual).cloned().collect();
        assert_eq!(remaining.len(), 2);
        assert!(Arc::ptr_eq(&remaining[0], &b));
        assert!(Arc::ptr_eq(&remaining[1], &c));
    }

    #[test]
    fn prune_drops_expired_only() {
        let mut q = PriorityQueues::new();
        q.push(frame(Duration::ZERO));
        q.push(frame(Duration::from_secs(5)));
        let later = Instant::now() + Duration::from_millis(10);
        assert_eq!(q.prune_expired(later), 1);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn depths_track_mutations() {
        let mut q = PriorityQueues::new();
        let depths = q.depths();
        q.push(frame(Duration::ZERO));
        q.push(frame(Duration::from_secs(5)));
        assert_eq!(depths.get(FramePriority::Manual), 2);
        assert_eq!(depths.total(), 2);
        q.prune_expired(Instant::now() + Duration::from_millis(10));
        assert_eq!(depths.get(FramePriority::Manual), 1);
    }
}
