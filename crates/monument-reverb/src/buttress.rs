//! Soft containment: normalized tanh drive.
//!
//! `tanh(x·d) / tanh(d)` has unity gain at full scale and compresses
//! anything hotter, so a runaway feedback route cannot climb without bound.

use libm::tanhf;
use monument_core::{AudioBlock, BlockParams, ProcessingStage};

use crate::params::FREEZE;

/// Drive range.
pub const DRIVE_RANGE: (f32, f32) = (0.5, 3.0);
const FREEZE_DRIVE_BOOST: f32 = 1.25;

/// Saturation stage.
#[derive(Debug, Clone)]
pub struct Buttress {
    drive: f32,
}

impl Default for Buttress {
    fn default() -> Self {
        Self::new()
    }
}

impl Buttress {
    /// Create at unity-ish drive.
    pub fn new() -> Self {
        Self { drive: 1.0 }
    }

    /// Set drive. Non-finite values are ignored.
    pub fn set_drive(&mut self, drive: f32) {
        if drive.is_finite() {
            self.drive = drive.clamp(DRIVE_RANGE.0, DRIVE_RANGE.1);
        }
    }

    /// Current drive.
    pub fn drive(&self) -> f32 {
        self.drive
    }

    /// Transfer curve for a given drive.
    #[inline]
    pub fn shape(x: f32, drive: f32) -> f32 {
        tanhf(x * drive) / tanhf(drive)
    }
}

impl ProcessingStage for Buttress {
    fn prepare(&mut self, _sample_rate: f32, _max_block: usize, _channels: usize) {}

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        // Frozen tails sit near full scale; squeeze harder.
        let drive = if params.block_value(FREEZE) >= 0.5 {
            (self.drive * FREEZE_DRIVE_BOOST).min(DRIVE_RANGE.1)
        } else {
            self.drive
        };
        for x in block.left.iter_mut().chain(block.right.iter_mut()) {
            *x = Self::shape(*x, drive);
        }
    }

    fn reset(&mut self) {}
}
