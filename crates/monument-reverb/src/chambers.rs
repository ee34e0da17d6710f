//! Eight-line feedback delay network: the reverberant core.
//!
//! Signal flow per sample:
//!
//! ```text
//!  in ─► DC block ─► input diffusers ─► mid/side injection ─┐
//!                                                           ▼
//!   ┌── lines[i] ◄── gravity ◄── damping ◄── (inj + g·M·out) ◄┐
//!   │                                                         │
//!   └─► out[i] ─────────────► mix matrix M ───────────────────┘
//!        │
//!        └─► late diffusers ─► pan taps ─► bloom ─► DC block ─► limiter ─► wet
//! ```
//!
//! Late diffusion sits after the read and outside the loop, so the only
//! things inside the loop are the orthogonal matrix, two passive one-pole
//! filters and the loop gain. With `g < 1` the loop cannot gain energy at
//! any `warp` setting.
//!
//! Freeze crossfades the loop gain to 1, injection to 0 and both loop
//! filters to flat over 40 ms; releasing it runs the same ramp backwards.

use libm::{expf, roundf};
use monument_core::{
    AllpassFilter, AudioBlock, BlockParams, DcBlocker, DelayLine, EnvelopeFollower,
    Interpolation, LinearSmoothedParam, Lfo, OnePole, ProcessingStage, TiltFilter, lerp, sanitize,
};

use crate::mix_matrix::{LINES, MixMatrix};
use crate::params::{BLOOM, DENSITY, DRIFT, FREEZE, GRAVITY, MASS, TIME, WARP};

/// Line lengths in samples at 48 kHz. Primes, so pairwise coprime and free
/// of common factors with 48000.
pub const LINE_SAMPLES_48K: [usize; LINES] = [2411, 4201, 7001, 11003, 17011, 26003, 39019, 59009];

const INPUT_DIFFUSER_SAMPLES_48K: [usize; 2] = [149, 223];
const LATE_DIFFUSER_SAMPLES_48K: [usize; LINES] = [157, 173, 197, 223, 251, 281, 313, 347];

const DAMPING_OFFSETS: [f32; LINES] =
    [-0.035, -0.025, -0.015, -0.005, 0.005, 0.015, 0.025, 0.035];
const LATE_COEFF_OFFSETS: [f32; LINES] = [-0.06, -0.045, -0.03, -0.015, 0.015, 0.03, 0.045, 0.06];

const INPUT_MID: [f32; LINES] = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
const INPUT_SIDE: [f32; LINES] = [1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0];

// Constant-power pan positions {-0.9, 0.9, -0.7, 0.7, -0.5, 0.5, -0.3, 0.3}.
const OUTPUT_LEFT: [f32; LINES] = [
    0.9969173, 0.0784591, 0.9723699, 0.2334454, 0.9238795, 0.3826834, 0.8526402, 0.5224986,
];
const OUTPUT_RIGHT: [f32; LINES] = [
    0.0784591, 0.9969173, 0.2334454, 0.9723699, 0.3826834, 0.9238795, 0.5224986, 0.8526402,
];

// Sum of squared pan weights is 4 per side.
const OUTPUT_GAIN: f32 = 0.5;
const INV_SQRT_LINES: f32 = 0.353_553_38;

/// Loop gain ceiling outside freeze.
pub const MAX_FEEDBACK: f32 = 0.98;
const GRAVITY_MIN_HZ: f32 = 20.0;
const GRAVITY_MAX_HZ: f32 = 200.0;
const FREEZE_RAMP_MS: f32 = 40.0;
const FREEZE_CEILING: f32 = 0.9;
const WET_CEILING: f32 = 0.95;

const DRIFT_FRACTION: f32 = 0.0025;
const DRIFT_MAX_SAMPLES: f32 = 12.0;
const DRIFT_RATE_HZ: f32 = 0.07;
const DRIFT_RATE_SPREAD_HZ: f32 = 0.013;

const BLOOM_MIN_SECONDS: f32 = 1.0;
const BLOOM_MAX_SECONDS: f32 = 12.0;
const BLOOM_PEAK: f32 = 0.5;
const BLOOM_CEILING: f32 = 1.5;
const BLOOM_TIME_CAP_SECONDS: f32 = 120.0;
const ONSET_FLOOR: f32 = 1.0e-3;
const ONSET_RATIO: f32 = 2.0;

/// Coefficients that cost a transcendental are refreshed at this interval.
const CONTROL_INTERVAL: usize = 32;

/// Map `time` to the loop gain.
#[inline]
pub fn feedback_for_time(time: f32) -> f32 {
    lerp(0.35, 0.92, time.clamp(0.0, 1.0)).min(MAX_FEEDBACK)
}

/// Plateau/decay envelope applied to the late field, retriggered by onsets.
#[derive(Debug, Clone)]
struct Bloom {
    seconds: f32,
    armed: bool,
    fast: EnvelopeFollower,
    slow: EnvelopeFollower,
    sample_period: f32,
}

impl Bloom {
    fn new(sample_rate: f32) -> Self {
        Self {
            seconds: 0.0,
            armed: true,
            fast: EnvelopeFollower::with_times(sample_rate, 0.5, 30.0),
            slow: EnvelopeFollower::with_times(sample_rate, 20.0, 300.0),
            sample_period: 1.0 / sample_rate,
        }
    }

    fn reset(&mut self) {
        self.seconds = 0.0;
        self.armed = true;
        self.fast.reset();
        self.slow.reset();
    }

    fn detect(&mut self, magnitude: f32) {
        let fast = self.fast.process(magnitude);
        let slow = self.slow.process(magnitude);
        if self.armed && fast > ONSET_FLOOR && fast > ONSET_RATIO * slow {
            self.seconds = 0.0;
            self.armed = false;
        } else if !self.armed && fast < slow * 1.2 {
            self.armed = true;
        }
        self.seconds = (self.seconds + self.sample_period).min(BLOOM_TIME_CAP_SECONDS);
    }

    /// Envelope gain for the current time since onset.
    fn gain(&self, bloom: f32, time: f32) -> f32 {
        if bloom <= 0.0 {
            return 1.0;
        }
        let decay = lerp(BLOOM_MIN_SECONDS, BLOOM_MAX_SECONDS, time);
        let plateau_time = decay * (0.25 + 0.35 * bloom);
        let plateau = if self.seconds < plateau_time {
            1.0
        } else {
            expf(-(self.seconds - plateau_time) / decay)
        };
        let peak = 1.0 + BLOOM_PEAK * bloom * bloom;
        (1.0 + bloom * (plateau * peak - 1.0)).clamp(0.0, BLOOM_CEILING)
    }
}

/// The reverberation core.
///
/// Reads `time`, `mass`, `density`, `bloom`, `warp`, `drift`, `gravity` and
/// `freeze` from the block parameters. Output is the early/wet blend; the
/// dry mix happens in the facade.
#[derive(Debug, Clone)]
pub struct ReverberationCore {
    sample_rate: f32,
    lines: [DelayLine; LINES],
    line_lengths: [f32; LINES],
    drift_lfos: [Lfo; LINES],
    drift_limits: [f32; LINES],
    input_diffusers: [AllpassFilter; 2],
    late_diffusers: [AllpassFilter; LINES],
    damping: [OnePole; LINES],
    gravity: [TiltFilter; LINES],
    matrix: MixMatrix,
    input_dc: [DcBlocker; 2],
    output_dc: [DcBlocker; 2],
    freeze: LinearSmoothedParam,
    bloom: Bloom,
    feedback_override: Option<f32>,

    // Control-interval state
    input_gain: f32,
    early_mix: f32,
    drift_depth: f32,
}

fn scaled(samples: usize, sample_rate: f32) -> usize {
    (roundf(samples as f32 * sample_rate / 48000.0) as usize).max(2)
}

impl ReverberationCore {
    /// Build and prepare a core for `sample_rate`.
    pub fn new(sample_rate: f32) -> Self {
        let mut core = Self {
            sample_rate,
            lines: core::array::from_fn(|_| DelayLine::new(2)),
            line_lengths: [0.0; LINES],
            drift_lfos: core::array::from_fn(|_| Lfo::default()),
            drift_limits: [0.0; LINES],
            input_diffusers: core::array::from_fn(|_| AllpassFilter::new(1)),
            late_diffusers: core::array::from_fn(|_| AllpassFilter::new(1)),
            damping: core::array::from_fn(|_| OnePole::from_pole(sample_rate, 0.0)),
            gravity: core::array::from_fn(|_| TiltFilter::new(sample_rate)),
            matrix: MixMatrix::new(),
            input_dc: core::array::from_fn(|_| DcBlocker::new(sample_rate)),
            output_dc: core::array::from_fn(|_| DcBlocker::new(sample_rate)),
            freeze: LinearSmoothedParam::new(0.0),
            bloom: Bloom::new(sample_rate),
            feedback_override: None,
            input_gain: 0.0,
            early_mix: 0.0,
            drift_depth: 0.0,
        };
        core.configure(sample_rate);
        core
    }

    fn configure(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for i in 0..LINES {
            let length = scaled(LINE_SAMPLES_48K[i], sample_rate);
            self.line_lengths[i] = length as f32;
            self.drift_limits[i] = (length as f32 * DRIFT_FRACTION).min(DRIFT_MAX_SAMPLES);
            self.lines[i].resize(length + DRIFT_MAX_SAMPLES as usize + 4);
            self.lines[i].set_interpolation(Interpolation::Linear);

            let mut lfo = Lfo::new(sample_rate, DRIFT_RATE_HZ + DRIFT_RATE_SPREAD_HZ * i as f32);
            lfo.set_phase(i as f32 / LINES as f32);
            self.drift_lfos[i] = lfo;

            self.late_diffusers[i].set_length(scaled(LATE_DIFFUSER_SAMPLES_48K[i], sample_rate));
            self.damping[i] = OnePole::from_pole(sample_rate, 0.0);
            self.gravity[i] = TiltFilter::new(sample_rate);
        }
        for (diffuser, &samples) in self.input_diffusers.iter_mut().zip(&INPUT_DIFFUSER_SAMPLES_48K) {
            diffuser.set_length(scaled(samples, sample_rate));
        }
        for dc in self.input_dc.iter_mut().chain(self.output_dc.iter_mut()) {
            dc.set_sample_rate(sample_rate);
            dc.reset();
        }
        self.freeze.set_transition_time_ms(FREEZE_RAMP_MS, sample_rate);
        self.bloom = Bloom::new(sample_rate);
    }

    /// Override the `time`-derived loop gain. `None` restores the mapping.
    /// Clamped to `[0, MAX_FEEDBACK]`.
    pub fn set_feedback_gain(&mut self, gain: Option<f32>) {
        self.feedback_override = gain.filter(|g| g.is_finite()).map(|g| g.clamp(0.0, MAX_FEEDBACK));
    }

    /// The active override, if any.
    pub fn feedback_gain_override(&self) -> Option<f32> {
        self.feedback_override
    }

    /// Delay length of each line in samples at the prepared rate.
    pub fn line_lengths(&self) -> &[f32; LINES] {
        &self.line_lengths
    }

    /// The feedback matrix (blend follows `warp`).
    pub fn mix_matrix(&self) -> &MixMatrix {
        &self.matrix
    }

    /// Freeze crossfade position: 0 running, 1 fully frozen.
    pub fn freeze_amount(&self) -> f32 {
        self.freeze.get()
    }

    fn update_control(&mut self, params: &BlockParams<'_>, index: usize) {
        let density = params.value_at(DENSITY, index);
        let warp = params.value_at(WARP, index);
        let gravity = params.value_at(GRAVITY, index);

        self.matrix.set_blend(warp);

        self.input_gain = lerp(0.18, 0.32, density) * INV_SQRT_LINES;
        self.early_mix = lerp(0.45, 0.25, density);
        let input_coeff = lerp(0.12, 0.6, density);
        for diffuser in &mut self.input_diffusers {
            diffuser.set_coefficient(input_coeff);
        }
        let late_base = lerp(0.18, 0.7, density);
        for (diffuser, offset) in self.late_diffusers.iter_mut().zip(LATE_COEFF_OFFSETS) {
            diffuser.set_coefficient((late_base * (1.0 + offset)).clamp(0.05, 0.74));
        }

        let pivot = lerp(GRAVITY_MIN_HZ, GRAVITY_MAX_HZ, gravity);
        for tilt in &mut self.gravity {
            tilt.set_pivot(pivot);
        }

        self.drift_depth = params.value_at(DRIFT, index);
    }

    #[inline]
    fn process_sample(&mut self, in_l: f32, in_r: f32, time: f32, mass: f32, bloom: f32) -> (f32, f32) {
        let frozen = self.freeze.advance();
        let running = 1.0 - frozen;

        let base_gain = self.feedback_override.unwrap_or_else(|| feedback_for_time(time));
        let loop_gain = base_gain + (1.0 - base_gain) * frozen;
        let damping_base = lerp(0.1, 0.85, mass);

        let in_l = self.input_dc[0].process(in_l);
        let in_r = self.input_dc[1].process(in_r);
        self.bloom.detect(in_l.abs().max(in_r.abs()));

        let diff_l = self.input_diffusers[0].process(in_l);
        let diff_r = self.input_diffusers[1].process(in_r);
        let mid = 0.5 * (diff_l + diff_r) * self.input_gain * running;
        let side = 0.5 * (diff_l - diff_r) * self.input_gain * running;

        let mut out = [0.0f32; LINES];
        for i in 0..LINES {
            let drift = self.drift_lfos[i].advance() * self.drift_limits[i] * self.drift_depth;
            out[i] = self.lines[i].read(self.line_lengths[i] - 1.0 + drift);
        }

        let mut feedback = out;
        self.matrix.apply(&mut feedback);

        for i in 0..LINES {
            let injection = mid * INPUT_MID[i] + side * INPUT_SIDE[i];
            let pole = (damping_base + DAMPING_OFFSETS[i]).clamp(0.0, 0.98) * running;
            self.damping[i].set_pole(pole);
            self.gravity[i].set_gains(frozen, 1.0);

            let damped = self.damping[i].process(injection + loop_gain * feedback[i]);
            let mut write = self.gravity[i].process(damped);
            if frozen > 0.0 {
                write += frozen * (write.clamp(-FREEZE_CEILING, FREEZE_CEILING) - write);
            }
            self.lines[i].write(sanitize(write));
        }

        let mut wet_l = 0.0;
        let mut wet_r = 0.0;
        for i in 0..LINES {
            let late = self.late_diffusers[i].process(out[i]);
            wet_l += late * OUTPUT_LEFT[i];
            wet_r += late * OUTPUT_RIGHT[i];
        }

        let envelope = 1.0 + running * (self.bloom.gain(bloom, time) - 1.0);
        let wet_l = self.output_dc[0].process(wet_l * OUTPUT_GAIN * envelope);
        let wet_r = self.output_dc[1].process(wet_r * OUTPUT_GAIN * envelope);
        let wet_l = wet_l.clamp(-WET_CEILING, WET_CEILING);
        let wet_r = wet_r.clamp(-WET_CEILING, WET_CEILING);

        let early = self.early_mix * running;
        (
            in_l * early + wet_l * (1.0 - early),
            in_r * early + wet_r * (1.0 - early),
        )
    }
}

impl ProcessingStage for ReverberationCore {
    fn prepare(&mut self, sample_rate: f32, _max_block: usize, _channels: usize) {
        self.configure(sample_rate);
        #[cfg(feature = "tracing")]
        tracing::debug!(sample_rate, longest_line = self.line_lengths[LINES - 1], "chambers_prepare");
    }

    fn process(&mut self, block: AudioBlock<'_>, params: &BlockParams<'_>) {
        let freeze = params.block_value(FREEZE) >= 0.5;
        self.freeze.set_target(if freeze { 1.0 } else { 0.0 });

        let time = params.get(TIME);
        let mass = params.get(MASS);
        let bloom = params.get(BLOOM);

        for (n, (l, r)) in block.left.iter_mut().zip(block.right.iter_mut()).enumerate() {
            if n % CONTROL_INTERVAL == 0 {
                self.update_control(params, n);
            }
            let (out_l, out_r) = self.process_sample(*l, *r, time.at(n), mass.at(n), bloom.at(n));
            *l = out_l;
            *r = out_r;
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for (i, lfo) in self.drift_lfos.iter_mut().enumerate() {
            lfo.reset();
            lfo.set_phase(i as f32 / LINES as f32);
        }
        for diffuser in self.input_diffusers.iter_mut().chain(self.late_diffusers.iter_mut()) {
            diffuser.clear();
        }
        for filter in &mut self.damping {
            filter.reset();
        }
        for tilt in &mut self.gravity {
            tilt.reset();
        }
        for dc in self.input_dc.iter_mut().chain(self.output_dc.iter_mut()) {
            dc.reset();
        }
        self.freeze.set_immediate(0.0);
        self.bloom.reset();
    }
}
