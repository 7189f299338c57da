//! Per-zone render state.
//!
//! Runtime-only cache of what each zone was last rendered with. The render
//! loop is the sole writer (after a successful commit); diagnostics read
//! snapshots through the manager. Change detection hashes the pixel slice
//! (ahash over content and length) instead of keeping a second copy.

use ahash::AHasher;
use std::hash::{Hash, Hasher};

use core_frame::FrameSource;
use core_pixel::Color;
use tokio::time::Instant;

fn hash_pixels(pixels: &[Color]) -> u64 {
    let mut hasher = AHasher::default();
    pixels.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug)]
pub struct ZoneRenderState {
    pixels: Vec<Color>,
    hash: u64,
    last_source: Option<FrameSource>,
    last_update: Option<Instant>,
    dirty: bool,
}

impl ZoneRenderState {
    /// All-black initial state for a zone of `len` pixels.
    pub fn new(len: usize) -> Self {
        let pixels = vec![Color::BLACK; len];
        let hash = hash_pixels(&pixels);
        Self {
            pixels,
            hash,
            last_source: None,
            last_update: None,
            dirty: false,
        }
    }

    /// Record the pixels a commit just rendered for this zone. Returns
    /// whether they differ from the previous value; `dirty` holds the same
    /// answer until the next record.
    pub fn record(
        &mut self,
        pixels: Vec<Color>,
        source: Option<FrameSource>,
        now: Instant,
    ) -> bool {
        let hash = hash_pixels(&pixels);
        let changed = hash != self.hash;
        self.pixels = pixels;
        self.hash = hash;
        if source.is_some() {
            self.last_source = source;
        }
        self.last_update = Some(now);
        self.dirty = changed;
        changed
    }

    /// Last rendered pixels, zone-logical order.
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn last_source(&self) -> Option<FrameSource> {
        self.last_source
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_black_and_clean() {
        let s = ZoneRenderState::new(4);
        assert_eq!(s.pixels(), &[Color::BLACK; 4]);
        assert!(!s.dirty());
        assert_eq!(s.last_source(), None);
    }

    #[test]
    fn record_detects_change_and_identity() {
        let mut s = ZoneRenderState::new(2);
        let now = Instant::now();
        assert!(s.record(
            vec![Color::RED, Color::RED],
            Some(FrameSource::Manual),
            now
        ));
        assert!(s.dirty());
        assert_eq!(s.last_source(), Some(FrameSource::Manual));

        // Same pixels again: unchanged, dirty clears.
        assert!(!s.record(
            vec![Color::RED, Color::RED],
            Some(FrameSource::Pulse),
            now
        ));
        assert!(!s.dirty());
        assert_eq!(s.last_source(), Some(FrameSource::Pulse));
    }

    #[test]
    fn record_without_source_keeps_attribution() {
        let mut s = ZoneRenderState::new(1);
        let now = Instant::now();
        s.record(vec![Color::GREEN], Some(FrameSource::Animation), now);
        s.record(vec![Color::BLACK], None, now);
        assert_eq!(s.last_source(), Some(FrameSource::Animation));
        assert_eq!(s.pixels(), &[Color::BLACK]);
    }
}
