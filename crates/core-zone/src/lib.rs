//! Zone and strip identity, zone→pixel mapping, and zone update payloads.
//!
//! Zones are a closed enumeration known at startup. Handlers above this
//! layer match exhaustively on `ZoneId`, so adding a zone is a compile-time
//! event, not a runtime configuration surprise.

mod map;
mod update;

pub use map::{ZoneMap, ZoneMapError, ZoneSpan};
pub use update::ZoneUpdate;

use std::fmt;
use std::str::FromStr;

/// Identifier of one addressable zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneId {
    Floor,
    Left,
    Top,
    Lamp,
    Preview,
}

impl ZoneId {
    /// Every zone, in declaration order. `index()` is the position here.
    pub const ALL: [ZoneId; 5] = [
        ZoneId::Floor,
        ZoneId::Left,
        ZoneId::Top,
        ZoneId::Lamp,
        ZoneId::Preview,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Dense index, usable for per-zone arrays.
    pub const fn index(self) -> usize {
        match self {
            ZoneId::Floor => 0,
            ZoneId::Left => 1,
            ZoneId::Top => 2,
            ZoneId::Lamp => 3,
            ZoneId::Preview => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ZoneId::Floor => "floor",
            ZoneId::Left => "left",
            ZoneId::Top => "top",
            ZoneId::Lamp => "lamp",
            ZoneId::Preview => "preview",
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for parsing zone / strip names out of configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub String);

impl FromStr for ZoneId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ZoneId::ALL
            .iter()
            .copied()
            .find(|z| z.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Identifier of one physical output strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StripId {
    Main,
    Preview,
}

impl StripId {
    pub const ALL: [StripId; 2] = [StripId::Main, StripId::Preview];

    pub const fn as_str(self) -> &'static str {
        match self {
            StripId::Main => "main",
            StripId::Preview => "preview",
        }
    }
}

impl fmt::Display for StripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StripId {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StripId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_index_is_dense_and_matches_all() {
        for (i, z) in ZoneId::ALL.iter().enumerate() {
            assert_eq!(z.index(), i);
        }
    }

    #[test]
    fn zone_names_round_trip() {
        for z in ZoneId::ALL {
            assert_eq!(z.as_str().parse::<ZoneId>(), Ok(z));
        }
        assert!("ceiling".parse::<ZoneId>().is_err());
    }

    #[test]
    fn strip_names_round_trip() {
        for s in StripId::ALL {
            assert_eq!(s.as_str().parse::<StripId>(), Ok(s));
        }
    }
}
