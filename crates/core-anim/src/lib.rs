//! Animation protocol and runner lifecycle.
//!
//! An animation is a stepped producer: the runner owns the cadence, the
//! animation owns its internal state. Each tick the runner asks for a
//! step, stamps whatever comes back into a frame with the animation's
//! priority and source, and submits it. Frames carry a short TTL (two
//! ticks) so a stalled producer visibly falls back instead of freezing its
//! last frame forever.

mod service;

pub use service::{AnimationService, RunState};

use core_frame::{FramePriority, FrameSource, ZoneUpdates};

/// What one animation step produced.
#[derive(Debug)]
pub enum Step {
    /// Zone updates to stamp and submit this tick.
    Emit(ZoneUpdates),
    /// Nothing this tick; the runner just sleeps.
    Idle,
    /// The animation is finished; the runner exits as completed.
    Done,
}

/// A stepped frame producer driven by an [`AnimationService`] runner.
///
/// `step` faults (`Err`) stop the runner as if it faulted; the error is
/// logged with the animation's name and a stopped event is published.
pub trait Animation: Send + 'static {
    /// Stable name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Priority stamped onto emitted frames.
    fn priority(&self) -> FramePriority {
        FramePriority::Animation
    }

    /// Source stamped onto emitted frames.
    fn source(&self) -> FrameSource {
        FrameSource::Animation
    }

    /// Produce at most one step per tick.
    fn step(&mut self) -> anyhow::Result<Step>;
}
