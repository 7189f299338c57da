//! Submission-time validation errors.

use core_zone::{StripId, ZoneId};
use std::time::Duration;

/// Why a frame was rejected before enqueue. Nothing is queued when any of
/// these fire; everything after a successful enqueue is handled internally
/// by the render loop and surfaced only through counters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFrame {
    #[error("frame carries no zone updates")]
    EmptyUpdates,
    #[error("ttl {got:?} exceeds the maximum {max:?}")]
    TtlTooLong { got: Duration, max: Duration },
    #[error("zone {zone} is not mapped on any registered strip")]
    UnknownZone { zone: ZoneId },
    #[error("updates span strips {first} and {second}; a frame targets one strip")]
    CrossStrip { first: StripId, second: StripId },
    #[error("per-pixel update for {zone} has {got} pixels, the zone expects {want}")]
    PerPixelLength {
        zone: ZoneId,
        want: usize,
        got: usize,
    },
}
