//! Per-tick frame selection and zone merge.
//!
//! Merge contract (fixed order, no races define a winner):
//! * Expired frames are pruned first and never contribute.
//! * Within one priority level frames merge in FIFO order, so the later
//!   submission wins any zone both cover.
//! * ANIMATION is the base layer. TRANSITION and DEBUG are overlays merged
//!   on top of it, highest level last.
//! * IDLE, MANUAL and PULSE are fillers: they merge among themselves in
//!   ascending level order (higher level wins), then only fill zones the
//!   base/overlay layers left untouched.
//!
//! Net effect per zone: DEBUG > TRANSITION > ANIMATION > PULSE > MANUAL >
//! IDLE. Zones no layer claims stay out of the outcome entirely; the strip
//! preserves their previously loaded pixels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use core_frame::{Frame, FramePriority, FrameSource};
use core_zone::{ZoneId, ZoneUpdate};
use tokio::time::Instant;

use crate::queues::PriorityQueues;

/// Base layer plus overlays, merged in ascending order so the highest
/// level lands last.
const BASE_AND_OVERLAYS: [FramePriority; 3] = [
    FramePriority::Animation,
    FramePriority::Transition,
    FramePriority::Debug,
];

/// Fillers below the base layer, ascending.
const FILLERS: [FramePriority; 3] = [
    FramePriority::Idle,
    FramePriority::Manual,
    FramePriority::Pulse,
];

/// Result of one selection/merge pass.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Winning update per zone, ready for `ZoneStrip::build_and_commit`.
    pub updates: HashMap<ZoneId, ZoneUpdate>,
    /// Producer category that won each zone.
    pub sources: HashMap<ZoneId, FrameSource>,
    /// Every non-expired frame that participated, in drain order. The
    /// identity-skip comparison runs over this set.
    pub selected: Vec<Arc<Frame>>,
    /// Frames pruned this pass because their TTL ran out.
    pub expired: usize,
    /// Longest TTL among the selected frames (diagnostic).
    pub max_ttl: Duration,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

fn merge_level(
    queues: &PriorityQueues,
    priority: FramePriority,
    layer: &mut HashMap<ZoneId, (ZoneUpdate, FrameSource)>,
    selected: &mut Vec<Arc<Frame>>,
    max_ttl: &mut Duration,
) {
    for frame in queues.level(priority) {
        for (zone, update) in frame.updates() {
            layer.insert(*zone, (update.clone(), frame.source()));
        }
        *max_ttl = (*max_ttl).max(frame.ttl());
        selected.push(frame.clone());
    }
}

/// Prune expired frames, then build the merged per-zone update map for
/// this tick. Queues are left holding every still-valid frame so a
/// long-lived submission keeps winning subsequent ticks.
pub fn select_and_merge(queues: &mut PriorityQueues, now: Instant) -> MergeOutcome {
    let expired = queues.prune_expired(now);

    let mut fill: HashMap<ZoneId, (ZoneUpdate, FrameSource)> = HashMap::new();
    let mut top: HashMap<ZoneId, (ZoneUpdate, FrameSource)> = HashMap::new();
    let mut selected = Vec::new();
    let mut max_ttl = Duration::ZERO;

    for priority in FILLERS {
        merge_level(queues, priority, &mut fill, &mut selected, &mut max_ttl);
    }
    for priority in BASE_AND_OVERLAYS {
        merge_level(queues, priority, &mut top, &mut selected, &mut max_ttl);
    }

    // Fillers first, then the base/overlay layer on top of them.
    let mut updates = HashMap::with_capacity(fill.len() + top.len());
    let mut sources = HashMap::with_capacity(fill.len() + top.len());
    for (zone, (update, source)) in fill.into_iter().chain(top) {
        updates.insert(zone, update);
        sources.insert(zone, source);
    }

    MergeOutcome {
        updates,
        sources,
        selected,
        expired,
        max_ttl,
    }
}
