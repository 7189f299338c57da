//! Strip output: the hardware port contract and the zone-indexed strip
//! built on top of it.
//!
//! A `StripPort` is the opaque driver boundary: it accepts a full pixel
//! array (`load`), pushes it to the wire in one transfer (`commit`), and
//! reads back the last loaded value (`get_pixel`). The read-back reflects
//! the last *successful* `load`, not the last commit, so preservation
//! semantics survive commit failures.
//!
//! `ZoneStrip` binds a validated `ZoneMap` to a port and translates
//! zone-indexed updates into full-strip writes. The render loop is the only
//! caller; single-writer discipline is enforced a layer up by the drain
//! lock.

mod memory;
mod term;
mod zone_strip;

pub use memory::{MemoryPort, MemoryProbe};
pub use term::TermPort;
pub use zone_strip::{StripConfigError, ZoneStrip};

use core_pixel::Color;

/// Transient output failures. The render loop counts these and retries on
/// the next tick; the strip retains its last transferred frame meanwhile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("pixel payload has {got} entries, strip expects {want}")]
    LengthMismatch { want: usize, got: usize },
    #[error("transfer window busy")]
    Busy,
    #[error("hardware transfer failed: {0}")]
    Transfer(String),
}

/// Driver contract for one physical LED strip.
///
/// Implementations may be non-reentrant; callers must serialize
/// `load`/`commit` pairs externally.
pub trait StripPort: Send {
    /// Fixed number of pixels the port drives.
    fn pixel_count(&self) -> usize;

    /// Copy `pixels` into the transmit buffer. No hardware effect yet.
    /// Rejects payloads whose length differs from `pixel_count`.
    fn load(&mut self, pixels: &[Color]) -> Result<(), PortError>;

    /// Push the transmit buffer to the wire in one atomic transfer.
    fn commit(&mut self) -> Result<(), PortError>;

    /// The last successfully loaded color at `index`, black before any
    /// load. Indexes past the strip end also read black.
    fn get_pixel(&self, index: usize) -> Color;
}
