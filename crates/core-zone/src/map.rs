//! Static zone→pixel mapping for one strip.
//!
//! A `ZoneMap` is validated once at construction and never mutated:
//! * every span has `len >= 1`,
//! * spans are disjoint,
//! * their union covers `[0, pixel_count)` exactly,
//! * no zone appears twice.
//!
//! Pixel→zone lookup is a dense table built at construction, so the render
//! path pays an index, not a search, per pixel.

use crate::ZoneId;

/// One zone's contiguous pixel range on a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSpan {
    pub start: usize,
    pub len: usize,
    /// When set, per-pixel payloads are written back-to-front across the
    /// span (the physical strip runs opposite to the zone's logical order).
    pub reversed: bool,
}

impl ZoneSpan {
    pub const fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            len,
            reversed: false,
        }
    }

    pub const fn reversed(start: usize, len: usize) -> Self {
        Self {
            start,
            len,
            reversed: true,
        }
    }

    /// Half-open pixel index range covered by this span.
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZoneMapError {
    #[error("zone {zone} has zero length")]
    EmptyZone { zone: ZoneId },
    #[error("zone {zone} appears more than once")]
    DuplicateZone { zone: ZoneId },
    #[error("zone {zone} ends at pixel {end} but the strip has {pixel_count} pixels")]
    OutOfRange {
        zone: ZoneId,
        end: usize,
        pixel_count: usize,
    },
    #[error("zones {a} and {b} overlap at pixel {pixel}")]
    Overlap { a: ZoneId, b: ZoneId, pixel: usize },
    #[error("pixel {pixel} is not covered by any zone")]
    Gap { pixel: usize },
}

/// Immutable mapping from zones to pixel spans on a single strip.
#[derive(Debug, Clone)]
pub struct ZoneMap {
    pixel_count: usize,
    spans: Vec<(ZoneId, ZoneSpan)>,
    /// Dense pixel→zone table, `pixel_count` entries.
    lookup: Vec<ZoneId>,
}

impl ZoneMap {
    pub fn new(
        pixel_count: usize,
        spans: impl IntoIterator<Item = (ZoneId, ZoneSpan)>,
    ) -> Result<Self, ZoneMapError> {
        let mut spans: Vec<(ZoneId, ZoneSpan)> = spans.into_iter().collect();
        spans.sort_by_key(|(_, s)| s.start);

        let mut lookup: Vec<Option<ZoneId>> = vec![None; pixel_count];
        for (zone, span) in &spans {
            if span.len == 0 {
                return Err(ZoneMapError::EmptyZone { zone: *zone });
            }
            if spans.iter().filter(|(z, _)| z == zone).count() > 1 {
                return Err(ZoneMapError::DuplicateZone { zone: *zone });
            }
            let end = span.start + span.len;
            if end > pixel_count {
                return Err(ZoneMapError::OutOfRange {
                    zone: *zone,
                    end,
                    pixel_count,
                });
            }
            for pixel in span.range() {
                if let Some(other) = lookup[pixel] {
                    return Err(ZoneMapError::Overlap {
                        a: other,
                        b: *zone,
                        pixel,
                    });
                }
                lookup[pixel] = Some(*zone);
            }
        }
        let mut dense = Vec::with_capacity(pixel_count);
        for (pixel, entry) in lookup.into_iter().enumerate() {
            match entry {
                Some(zone) => dense.push(zone),
                None => return Err(ZoneMapError::Gap { pixel }),
            }
        }
        Ok(Self {
            pixel_count,
            spans,
            lookup: dense,
        })
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// The span for `zone`, if this strip carries it.
    pub fn span(&self, zone: ZoneId) -> Option<ZoneSpan> {
        self.spans
            .iter()
            .find(|(z, _)| *z == zone)
            .map(|(_, s)| *s)
    }

    pub fn contains(&self, zone: ZoneId) -> bool {
        self.span(zone).is_some()
    }

    /// The zone containing pixel `index`, or `None` past the strip end.
    pub fn zone_at(&self, index: usize) -> Option<ZoneId> {
        self.lookup.get(index).copied()
    }

    /// Zones and spans in ascending pixel order.
    pub fn zones(&self) -> impl Iterator<Item = (ZoneId, ZoneSpan)> + '_ {
        self.spans.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_zone_map() -> ZoneMap {
        ZoneMap::new(
            20,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 15)),
                (ZoneId::Lamp, ZoneSpan::new(15, 5)),
            ],
        )
        .expect("valid map")
    }

    #[test]
    fn lookup_table_matches_spans() {
        let map = two_zone_map();
        assert_eq!(map.zone_at(0), Some(ZoneId::Floor));
        assert_eq!(map.zone_at(14), Some(ZoneId::Floor));
        assert_eq!(map.zone_at(15), Some(ZoneId::Lamp));
        assert_eq!(map.zone_at(19), Some(ZoneId::Lamp));
        assert_eq!(map.zone_at(20), None);
    }

    #[test]
    fn rejects_gap() {
        let err = ZoneMap::new(
            10,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 4)),
                (ZoneId::Lamp, ZoneSpan::new(5, 5)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ZoneMapError::Gap { pixel: 4 });
    }

    #[test]
    fn rejects_overlap() {
        let err = ZoneMap::new(
            10,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 6)),
                (ZoneId::Lamp, ZoneSpan::new(5, 5)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ZoneMapError::Overlap { pixel: 5, .. }));
    }

    #[test]
    fn rejects_out_of_range() {
        let err = ZoneMap::new(10, [(ZoneId::Floor, ZoneSpan::new(0, 11))]).unwrap_err();
        assert!(matches!(err, ZoneMapError::OutOfRange { end: 11, .. }));
    }

    #[test]
    fn rejects_empty_zone() {
        let err = ZoneMap::new(
            10,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 10)),
                (ZoneId::Lamp, ZoneSpan::new(10, 0)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ZoneMapError::EmptyZone { zone: ZoneId::Lamp });
    }

    #[test]
    fn rejects_duplicate_zone() {
        let err = ZoneMap::new(
            10,
            [
                (ZoneId::Floor, ZoneSpan::new(0, 5)),
                (ZoneId::Floor, ZoneSpan::new(5, 5)),
            ],
        )
        .unwrap_err();
        assert_eq!(err, ZoneMapError::DuplicateZone { zone: ZoneId::Floor });
    }

    #[test]
    fn span_lookup() {
        let map = two_zone_map();
        assert_eq!(map.span(ZoneId::Lamp), Some(ZoneSpan::new(15, 5)));
        assert_eq!(map.span(ZoneId::Top), None);
        assert!(map.contains(ZoneId::Floor));
    }
}
