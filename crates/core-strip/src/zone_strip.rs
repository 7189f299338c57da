//! Zone-indexed strip assembly.

use std::collections::HashMap;

use core_pixel::Color;
use core_zone::{StripId, ZoneId, ZoneMap, ZoneUpdate};
use tracing::trace;

use crate::{PortError, StripPort};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StripConfigError {
    #[error("zone map covers {map} pixels but port {strip} drives {port}")]
    PixelCountMismatch {
        strip: StripId,
        map: usize,
        port: usize,
    },
}

/// One output strip: a zone map bound to a physical port.
///
/// `build_and_commit` is the atomic-flush contract: exactly one `load`
/// followed by one `commit` per call, with every pixel accounted for.
/// Zones absent from the update map keep their previously loaded pixels,
/// so partial frames never black out untouched zones.
pub struct ZoneStrip {
    id: StripId,
    map: ZoneMap,
    port: Box<dyn StripPort>,
    /// Scratch buffer reused across ticks to avoid per-frame allocation.
    scratch: Vec<Color>,
}

impl std::fmt::Debug for ZoneStrip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneStrip")
            .field("id", &self.id)
            .field("map", &self.map)
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

impl ZoneStrip {
    pub fn new(
        id: StripId,
        map: ZoneMap,
        port: Box<dyn StripPort>,
    ) -> Result<Self, StripConfigError> {
        if map.pixel_count() != port.pixel_count() {
            return Err(StripConfigError::PixelCountMismatch {
                strip: id,
                map: map.pixel_count(),
                port: port.pixel_count(),
            });
        }
        Ok(Self {
            id,
            map,
            port,
            scratch: Vec::new(),
        })
    }

    pub fn id(&self) -> StripId {
        self.id
    }

    pub fn map(&self) -> &ZoneMap {
        &self.map
    }

    pub fn pixel_count(&self) -> usize {
        self.map.pixel_count()
    }

    /// Assemble the full pixel array from `updates` plus preserved pixels,
    /// then load and commit in one pass.
    ///
    /// Per-pixel payload lengths are validated at submission; a short
    /// payload here leaves the span's tail preserved rather than panicking.
    pub fn build_and_commit(
        &mut self,
        updates: &HashMap<ZoneId, ZoneUpdate>,
    ) -> Result<(), PortError> {
        let n = self.map.pixel_count();
        self.scratch.clear();
        self.scratch.resize(n, Color::BLACK);
        for (zone, span) in self.map.zones() {
            match updates.get(&zone) {
                Some(update) => {
                    for (offset, index) in span.range().enumerate() {
                        let logical = if span.reversed {
                            span.len - 1 - offset
                        } else {
                            offset
                        };
                        self.scratch[index] = match update {
                            ZoneUpdate::Solid(color) => *color,
                            ZoneUpdate::PerPixel(pixels) => pixels
                                .get(logical)
                                .copied()
                                .unwrap_or_else(|| self.port.get_pixel(index)),
                        };
                    }
                }
                None => {
                    for index in span.range() {
                        self.scratch[index] = self.port.get_pixel(index);
                    }
                }
            }
        }
        trace!(
            target: "strip.port",
            strip = %self.id,
            zones = updates.len(),
            "strip_flush"
        );
        self.port.load(&self.scratch)?;
        self.port.commit()
    }

    /// Read back a zone's current pixels (last successful load), in the
    /// zone's logical order. Used for the render-state update after a
    /// commit and for diagnostics.
    pub fn zone_pixels(&self, zone: ZoneId) -> Vec<Color> {
        match self.map.span(zone) {
            Some(span) => {
                let mut out = Vec::with_capacity(span.len);
                for offset in 0..span.len {
                    let index = if span.reversed {
                        span.start + span.len - 1 - offset
                    } else {
                        span.start + offset
                    };
                    out.push(self.port.get_pixel(index));
                }
                out
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryPort;
    use core_zone::ZoneSpan;

    fn strip() -> (ZoneStrip, crate::MemoryProbe) {
        let map = ZoneMap::new(
            8,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 5)),
                (ZoneId::Lamp, ZoneSpan::reversed(5, 3)),
            ],
        )
        .expect("valid map");
        let port = MemoryPort::new(8);
        let probe = port.probe();
        let strip =
            ZoneStrip::new(StripId::Main, map, Box::new(port)).expect("lengths agree");
        (strip, probe)
    }

    #[test]
    fn rejects_pixel_count_mismatch() {
        let map = ZoneMap::new(4, [(ZoneId::Floor, ZoneSpan::new(0, 4))]).expect("valid map");
        let err = ZoneStrip::new(StripId::Main, map, Box::new(MemoryPort::new(8))).unwrap_err();
        assert!(matches!(
            err,
            StripConfigError::PixelCountMismatch { map: 4, port: 8, .. }
        ));
    }

    #[test]
    fn solid_fills_zone_and_preserves_neighbor() {
        let (mut s, _probe) = strip();
        let mut first = HashMap::new();
        first.insert(ZoneId::Lamp, ZoneUpdate::Solid(Color::GREEN));
        s.build_and_commit(&first).expect("commit");

        let mut second = HashMap::new();
        second.insert(ZoneId::Floor, ZoneUpdate::Solid(Color::RED));
        s.build_and_commit(&second).expect("commit");

        // Lamp kept its pixels from the first commit.
        assert_eq!(s.zone_pixels(ZoneId::Lamp), vec![Color::GREEN; 3]);
        assert_eq!(s.zone_pixels(ZoneId::Floor), vec![Color::RED; 5]);
    }

    #[test]
    fn untouched_zone_starts_black() {
        let (mut s, _probe) = strip();
        let mut updates = HashMap::new();
        updates.insert(ZoneId::Floor, ZoneUpdate::Solid(Color::WHITE));
        s.build_and_commit(&updates).expect("commit");
        assert_eq!(s.zone_pixels(ZoneId::Lamp), vec![Color::BLACK; 3]);
    }

    #[test]
    fn per_pixel_honors_reversal() {
        let (mut s, _probe) = strip();
        let mut updates = HashMap::new();
        updates.insert(
            ZoneId::Lamp,
            ZoneUpdate::PerPixel(vec![Color::RED, Color::GREEN, Color::BLUE]),
        );
        s.build_and_commit(&updates).expect("commit");
        // Physical indices 5..8 carry the logical pixels back-to-front.
        assert_eq!(s.port.get_pixel(5), Color::BLUE);
        assert_eq!(s.port.get_pixel(6), Color::GREEN);
        assert_eq!(s.port.get_pixel(7), Color::RED);
        // zone_pixels undoes the reversal back into logical order.
        assert_eq!(
            s.zone_pixels(ZoneId::Lamp),
            vec![Color::RED, Color::GREEN, Color::BLUE]
        );
    }

    #[test]
    fn one_load_one_commit_per_call() {
        let (mut s, probe) = strip();
        let mut updates = HashMap::new();
        updates.insert(ZoneId::Floor, ZoneUpdate::Solid(Color::RED));
        s.build_and_commit(&updates).expect("commit");
        s.build_and_commit(&updates).expect("commit");
        assert_eq!(probe.load_calls(), 2);
        assert_eq!(probe.commit_calls(), 2);
    }

    #[test]
    fn read_back_survives_commit_failure() {
        let map = ZoneMap::new(4, [(ZoneId::Floor, ZoneSpan::new(0, 4))]).expect("valid map");
        let port = MemoryPort::new(4);
        port.probe().fail_commits(1);
        let mut s = ZoneStrip::new(StripId::Main, map, Box::new(port)).expect("lengths agree");

        let mut updates = HashMap::new();
        updates.insert(ZoneId::Floor, ZoneUpdate::Solid(Color::BLUE));
        let err = s.build_and_commit(&updates).unwrap_err();
        assert!(matches!(err, PortError::Transfer(_)));
        // Load succeeded, so read-back already shows the new pixels even
        // though the wire transfer failed.
        assert_eq!(s.zone_pixels(ZoneId::Floor), vec![Color::BLUE; 4]);
    }
}
