//! Zone update payloads.

use core_pixel::Color;

/// What a frame wants a zone to show.
///
/// `Solid` paints the whole zone one color and is reversal-invariant.
/// `PerPixel` carries explicit pixels in the zone's logical order; its
/// length must equal the zone's span length (validated at submission).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneUpdate {
    Solid(Color),
    PerPixel(Vec<Color>),
}

impl ZoneUpdate {
    /// Number of explicit pixels carried, or `None` for `Solid`.
    pub fn pixel_len(&self) -> Option<usize> {
        match self {
            ZoneUpdate::Solid(_) => None,
            ZoneUpdate::PerPixel(pixels) => Some(pixels.len()),
        }
    }

    /// The color for logical offset `offset` within a zone of length `len`.
    pub fn color_at(&self, offset: usize) -> Color {
        match self {
            ZoneUpdate::Solid(color) => *color,
            ZoneUpdate::PerPixel(pixels) => pixels.get(offset).copied().unwrap_or(Color::BLACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_is_uniform() {
        let u = ZoneUpdate::Solid(Color::RED);
        assert_eq!(u.color_at(0), Color::RED);
        assert_eq!(u.color_at(99), Color::RED);
        assert_eq!(u.pixel_len(), None);
    }

    #[test]
    fn per_pixel_indexes_logical_order() {
        let u = ZoneUpdate::PerPixel(vec![Color::RED, Color::GREEN]);
        assert_eq!(u.color_at(1), Color::GREEN);
        assert_eq!(u.pixel_len(), Some(2));
    }
}
