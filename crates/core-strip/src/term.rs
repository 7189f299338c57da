//! Terminal preview port.
//!
//! Paints the loaded pixel array as one row of colored cells so the system
//! can be exercised without LED hardware. All terminal commands for a
//! frame are queued and flushed once inside `commit`, mirroring the single
//! atomic wire transfer of a real strip driver.
//!
//! Runs of equal-colored pixels share one color command; the glyphs in
//! between are accumulated and printed as a single string.

use std::io::{Write, stdout};

use core_pixel::Color;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Color as TermColor, Print, ResetColor, SetForegroundColor},
};
use tracing::trace;

use crate::{PortError, StripPort};

const PIXEL_GLYPH: char = '\u{2588}'; // full block

pub struct TermPort {
    pixel_count: usize,
    /// Terminal row this strip paints onto.
    row: u16,
    loaded: Vec<Color>,
}

impl TermPort {
    pub fn new(pixel_count: usize, row: u16) -> Self {
        Self {
            pixel_count,
            row,
            loaded: vec![Color::BLACK; pixel_count],
        }
    }
}

impl StripPort for TermPort {
    fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    fn load(&mut self, pixels: &[Color]) -> Result<(), PortError> {
        if pixels.len() != self.pixel_count {
            return Err(PortError::LengthMismatch {
                want: self.pixel_count,
                got: pixels.len(),
            });
        }
        self.loaded.clear();
        self.loaded.extend_from_slice(pixels);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PortError> {
        let mut out = stdout();
        let paint = |out: &mut std::io::Stdout| -> std::io::Result<()> {
            queue!(out, MoveTo(0, self.row))?;
            let mut run_color: Option<Color> = None;
            let mut run = String::new();
            for &pixel in &self.loaded {
                if run_color != Some(pixel) {
                    if !run.is_empty() {
                        queue!(out, Print(std::mem::take(&mut run)))?;
                    }
                    let (r, g, b) = pixel.channels();
                    queue!(out, SetForegroundColor(TermColor::Rgb { r, g, b }))?;
                    run_color = Some(pixel);
                }
                run.push(PIXEL_GLYPH);
            }
            if !run.is_empty() {
                queue!(out, Print(run))?;
            }
            queue!(out, ResetColor)?;
            out.flush()
        };
        paint(&mut out).map_err(|e| PortError::Transfer(e.to_string()))?;
        trace!(target: "strip.port", row = self.row, pixels = self.pixel_count, "term_commit");
        Ok(())
    }

    fn get_pixel(&self, index: usize) -> Color {
        self.loaded.get(index).copied().unwrap_or(Color::BLACK)
    }
}
