//! In-memory strip port.
//!
//! Backs the preview strip in development and every render test that needs
//! to observe the atomic-transfer contract. A `MemoryProbe` cloned off the
//! port before it is boxed keeps counters and buffers observable from the
//! outside, and injects transient load/commit failures.

use std::sync::{Arc, Mutex};

use core_pixel::Color;

use crate::{PortError, StripPort};

#[derive(Debug)]
struct MemoryState {
    loaded: Vec<Color>,
    committed: Vec<Color>,
    load_calls: u64,
    commit_calls: u64,
    fail_next_loads: u32,
    fail_next_commits: u32,
}

#[derive(Debug)]
struct MemoryShared {
    pixel_count: usize,
    state: Mutex<MemoryState>,
}

/// A `StripPort` that transfers into process memory.
#[derive(Debug)]
pub struct MemoryPort {
    shared: Arc<MemoryShared>,
}

/// External view on a `MemoryPort`'s buffers and counters.
#[derive(Debug, Clone)]
pub struct MemoryProbe {
    shared: Arc<MemoryShared>,
}

impl MemoryPort {
    pub fn new(pixel_count: usize) -> Self {
        Self {
            shared: Arc::new(MemoryShared {
                pixel_count,
                state: Mutex::new(MemoryState {
                    loaded: vec![Color::BLACK; pixel_count],
                    committed: vec![Color::BLACK; pixel_count],
                    load_calls: 0,
                    commit_calls: 0,
                    fail_next_loads: 0,
                    fail_next_commits: 0,
                }),
            }),
        }
    }

    pub fn probe(&self) -> MemoryProbe {
        MemoryProbe {
            shared: self.shared.clone(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StripPort for MemoryPort {
    fn pixel_count(&self) -> usize {
        self.shared.pixel_count
    }

    fn load(&mut self, pixels: &[Color]) -> Result<(), PortError> {
        let mut st = self.state();
        st.load_calls += 1;
        if pixels.len() != self.shared.pixel_count {
            return Err(PortError::LengthMismatch {
                want: self.shared.pixel_count,
                got: pixels.len(),
            });
        }
        if st.fail_next_loads > 0 {
            st.fail_next_loads -= 1;
            return Err(PortError::Transfer("injected load failure".into()));
        }
        st.loaded.clear();
        st.loaded.extend_from_slice(pixels);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PortError> {
        let mut st = self.state();
        st.commit_calls += 1;
        if st.fail_next_commits > 0 {
            st.fail_next_commits -= 1;
            return Err(PortError::Transfer("injected commit failure".into()));
        }
        let frame = st.loaded.clone();
        st.committed = frame;
        Ok(())
    }

    fn get_pixel(&self, index: usize) -> Color {
        self.state().loaded.get(index).copied().unwrap_or(Color::BLACK)
    }
}

impl MemoryProbe {
    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pixels of the last successful commit (the wire-visible frame).
    pub fn committed(&self) -> Vec<Color> {
        self.state().committed.clone()
    }

    /// Pixels of the last successful load (the read-back buffer).
    pub fn loaded(&self) -> Vec<Color> {
        self.state().loaded.clone()
    }

    pub fn load_calls(&self) -> u64 {
        self.state().load_calls
    }

    pub fn commit_calls(&self) -> u64 {
        self.state().commit_calls
    }

    /// Make the next `n` loads fail with a transient transfer error.
    pub fn fail_loads(&self, n: u32) {
        self.state().fail_next_loads = n;
    }

    /// Make the next `n` commits fail with a transient transfer error.
    pub fn fail_commits(&self, n: u32) {
        self.state().fail_next_commits = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_then_commit_moves_frame_to_wire() {
        let mut port = MemoryPort::new(3);
        let probe = port.probe();
        port.load(&[Color::RED, Color::GREEN, Color::BLUE])
            .expect("load");
        assert_eq!(probe.committed(), vec![Color::BLACK; 3], "not committed yet");
        port.commit().expect("commit");
        assert_eq!(
            probe.committed(),
            vec![Color::RED, Color::GREEN, Color::BLUE]
        );
    }

    #[test]
    fn load_rejects_wrong_length() {
        let mut port = MemoryPort::new(3);
        let err = port.load(&[Color::RED]).unwrap_err();
        assert_eq!(err, PortError::LengthMismatch { want: 3, got: 1 });
    }

    #[test]
    fn read_back_reflects_load_not_commit() {
        let mut port = MemoryPort::new(2);
        let probe = port.probe();
        probe.fail_commits(1);
        port.load(&[Color::WHITE, Color::WHITE]).expect("load");
        assert!(port.commit().is_err());
        assert_eq!(port.get_pixel(0), Color::WHITE);
        assert_eq!(probe.committed(), vec![Color::BLACK; 2]);
    }

    #[test]
    fn failed_load_keeps_previous_read_back() {
        let mut port = MemoryPort::new(1);
        let probe = port.probe();
        port.load(&[Color::RED]).expect("load");
        probe.fail_loads(1);
        assert!(port.load(&[Color::GREEN]).is_err());
        assert_eq!(port.get_pixel(0), Color::RED);
    }

    #[test]
    fn out_of_range_reads_black() {
        let port = MemoryPort::new(1);
        assert_eq!(port.get_pixel(5), Color::BLACK);
    }
}
