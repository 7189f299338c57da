//! The frame record.

use std::collections::HashMap;
use std::time::Duration;

use core_pixel::Color;
use core_zone::{ZoneId, ZoneUpdate};
use tokio::time::Instant;

use crate::{FramePriority, FrameSource, InvalidFrame};

/// Per-zone payload map carried by a frame.
pub type ZoneUpdates = HashMap<ZoneId, ZoneUpdate>;

/// One producer submission: updates for one or more zones, tagged with
/// priority, source identity, creation time, and a time-to-live.
///
/// Invariants:
/// * `updates` is non-empty (checked at construction).
/// * Immutable once built; the render core shares frames behind `Arc` and
///   compares selections by pointer identity.
/// * Expiry is strict: a frame is expired when `now - created_at > ttl`,
///   so a zero TTL is valid exactly until the clock moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    priority: FramePriority,
    source: FrameSource,
    created_at: Instant,
    ttl: Duration,
    updates: ZoneUpdates,
}

impl Frame {
    /// TTLs beyond this are rejected as absurd; long-lived intent belongs
    /// to a producer that re-submits, not to a frame that never dies.
    pub const MAX_TTL: Duration = Duration::from_secs(3600);

    pub fn new(
        priority: FramePriority,
        source: FrameSource,
        ttl: Duration,
        updates: ZoneUpdates,
    ) -> Result<Self, InvalidFrame> {
        Self::from_parts(priority, source, ttl, updates, Instant::now())
    }

    /// Construct with a caller-supplied creation instant (primarily for
    /// tests driving a paused clock).
    pub fn from_parts(
        priority: FramePriority,
        source: FrameSource,
        ttl: Duration,
        updates: ZoneUpdates,
        created_at: Instant,
    ) -> Result<Self, InvalidFrame> {
        if updates.is_empty() {
            return Err(InvalidFrame::EmptyUpdates);
        }
        if ttl > Self::MAX_TTL {
            return Err(InvalidFrame::TtlTooLong {
                got: ttl,
                max: Self::MAX_TTL,
            });
        }
        Ok(Self {
            priority,
            source,
            created_at,
            ttl,
            updates,
        })
    }

    /// Single-zone solid color.
    pub fn solid(
        zone: ZoneId,
        color: Color,
        priority: FramePriority,
        source: FrameSource,
        ttl: Duration,
    ) -> Result<Self, InvalidFrame> {
        Self::new(
            priority,
            source,
            ttl,
            HashMap::from([(zone, ZoneUpdate::Solid(color))]),
        )
    }

    /// Multi-zone solid colors.
    pub fn multi(
        colors: impl IntoIterator<Item = (ZoneId, Color)>,
        priority: FramePriority,
        source: FrameSource,
        ttl: Duration,
    ) -> Result<Self, InvalidFrame> {
        let updates = colors
            .into_iter()
            .map(|(zone, color)| (zone, ZoneUpdate::Solid(color)))
            .collect();
        Self::new(priority, source, ttl, updates)
    }

    /// Explicit pixels for one zone, in the zone's logical order.
    pub fn per_pixel(
        zone: ZoneId,
        pixels: Vec<Color>,
        priority: FramePriority,
        source: FrameSource,
        ttl: Duration,
    ) -> Result<Self, InvalidFrame> {
        Self::new(
            priority,
            source,
            ttl,
            HashMap::from([(zone, ZoneUpdate::PerPixel(pixels))]),
        )
    }

    pub fn priority(&self) -> FramePriority {
        self.priority
    }

    pub fn source(&self) -> FrameSource {
        self.source
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn updates(&self) -> &ZoneUpdates {
        &self.updates
    }

    /// Strictly past its time-to-live at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}
