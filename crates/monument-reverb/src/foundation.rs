//! Input conditioning: DC removal, input trim and a non-finite guard.

use monument_core::{AudioBlock, BlockParams, DcBlocker, ProcessingStage, SmoothedParam, db_to_linear};

/// Trim range in dB.
pub const TRIM_RANGE_DB: (f32, f32) = (-24.0, 12.0);
const TRIM_SMOOTHING_MS: f32 = 20.0;

/// First stage of every routing.
#[derive(Debug, Clone)]
pub struct Foundation {
    dc: [DcBlocker; 2],
    trim: SmoothedParam,
    trim_db: f32,
}

impl Foundation {
    /// Create at unity trim.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            dc: [DcBlocker::new(sample_rate), DcBlocker::new(sample_rate)],
            trim: SmoothedParam::with_config(1.0, sample_rate, TRIM_SMOOTHING_MS),
            trim_db: 0.0,
        }
    }

    /// Set the input trim in dB. Non-finite values are ignored.
    pub fn set_trim_db(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        self.trim_db = db.clamp(TRIM_RANGE_DB.0, TRIM_RANGE_DB.1);
        self.trim.set_target(db_to_linear(self.trim_db));
    }

    /// Current trim target in dB.
    pub fn trim_db(&self) -> f32 {
        self.trim_db
    }
}

impl ProcessingStage for Foundation {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        for dc in &mut self.dc {
            dc.set_sample_rate(sample_rate);
            dc.reset();
        }
        self.trim.set_sample_rate(sample_rate);
        self.trim.snap_to_target();
    }

    fn process(&mut self, mut block: AudioBlock<'_>, _params: &BlockParams<'_>) {
        block.sanitize();
        let [dc_l, dc_r] = &mut self.dc;
        for (l, r) in block.left.iter_mut().zip(block.right.iter_mut()) {
            let gain = self.trim.advance();
            *l = dc_l.process(*l) * gain;
            *r = dc_r.process(*r) * gain;
        }
    }

    fn reset(&mut self) {
        for dc in &mut self.dc {
            dc.reset();
        }
        self.trim.snap_to_target();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PARAMS;
    use monument_core::{ParameterDistributor, ParameterTargets};

    fn run(stage: &mut Foundation, left: &mut [f32], right: &mut [f32]) {
        let targets = ParameterTargets::new(&PARAMS);
        let mut dist = ParameterDistributor::new(&PARAMS, 48000.0, left.len(), 4);
        let params = dist.begin_block(&targets, left.len());
        stage.process(AudioBlock::new(left, right), &params);
    }

    #[test]
    fn removes_dc() {
        let mut stage = Foundation::new(48000.0);
        let mut l = vec![0.5; 48000];
        let mut r = vec![0.5; 48000];
        run(&mut stage, &mut l, &mut r);
        assert!(l[47999].abs() < 0.01, "dc should settle near zero: {}", l[47999]);
    }

    #[test]
    fn non_finite_input_is_zeroed() {
        let mut stage = Foundation::new(48000.0);
        let mut l = vec![f32::NAN; 64];
        let mut r = vec![f32::INFINITY; 64];
        run(&mut stage, &mut l, &mut r);
        assert!(l.iter().chain(&r).all(|v| *v == 0.0));
    }

    #[test]
    fn trim_is_clamped_and_smoothed() {
        let mut stage = Foundation::new(48000.0);
        stage.set_trim_db(40.0);
        assert_eq!(stage.trim_db(), 12.0);
        stage.set_trim_db(f32::NAN);
        assert_eq!(stage.trim_db(), 12.0);

        let mut l = vec![0.0; 64];
        let mut r = vec![0.0; 64];
        l[0] = 1.0;
        run(&mut stage, &mut l, &mut r);
        assert!(l[0] < 1.1, "trim must ramp, not jump: {}", l[0]);
    }
}
