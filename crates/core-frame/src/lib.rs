//! Frame model: prioritized, TTL-bounded zone updates.
//!
//! A frame is a producer's opinion about what some zones should show for a
//! bounded time. Omission of a zone means "no opinion", never "turn off";
//! turning a zone off is a frame that paints it black.

mod error;
mod frame;
mod priority;

pub use error::InvalidFrame;
pub use frame::{Frame, ZoneUpdates};
pub use priority::{FramePriority, FrameSource};
