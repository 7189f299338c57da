//! Demo producers for running without a controller attached.
//!
//! Deliberately simple: the core does not care what an animation computes,
//! only that it answers `step()` at cadence.

use std::collections::HashMap;

use core_anim::{Animation, Step};
use core_frame::ZoneUpdates;
use core_pixel::Color;
use core_zone::{ZoneId, ZoneUpdate};

/// A short lit window running along the zone, wrapping at the end.
pub struct Chase {
    zone: ZoneId,
    len: usize,
    head: usize,
    color: Color,
}

impl Chase {
    const WINDOW: usize = 3;

    pub fn new(zone: ZoneId, len: usize, color: Color) -> Self {
        Self {
            zone,
            len,
            head: 0,
            color,
        }
    }
}

impl Animation for Chase {
    fn name(&self) -> &'static str {
        "chase"
    }

    fn step(&mut self) -> anyhow::Result<Step> {
        let mut pixels = vec![Color::BLACK; self.len];
        for offset in 0..Self::WINDOW.min(self.len) {
            pixels[(self.head + offset) % self.len] = self.color;
        }
        self.head = (self.head + 1) % self.len;
        let updates: ZoneUpdates =
            HashMap::from([(self.zone, ZoneUpdate::PerPixel(pixels))]);
        Ok(Step::Emit(updates))
    }
}

/// Whole-zone brightness triangle wave.
pub struct Breathe {
    zone: ZoneId,
    color: Color,
    level: u8,
    rising: bool,
}

impl Breathe {
    const FLOOR: u8 = 10;
    const STEP: u8 = 4;

    pub fn new(zone: ZoneId, color: Color) -> Self {
        Self {
            zone,
            color,
            level: Self::FLOOR,
            rising: true,
        }
    }
}

impl Animation for Breathe {
    fn name(&self) -> &'static str {
        "breathe"
    }

    fn step(&mut self) -> anyhow::Result<Step> {
        if self.rising {
            self.level = (self.level + Self::STEP).min(100);
            if self.level == 100 {
                self.rising = false;
            }
        } else {
            self.level = self.level.saturating_sub(Self::STEP).max(Self::FLOOR);
            if self.level == Self::FLOOR {
                self.rising = true;
            }
        }
        let updates: ZoneUpdates = HashMap::from([(
            self.zone,
            ZoneUpdate::Solid(self.color.scaled(self.level)),
        )]);
        Ok(Step::Emit(updates))
    }
}
