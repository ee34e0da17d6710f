//! Criterion benchmarks for monument-core DSP primitives
//!
//! Run with: cargo bench -p monument-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use monument_core::{
    AllpassFilter, DcBlocker, DelayLine, EnvelopeFollower, Lfo, LfoWaveform, LinearSmoothedParam,
    OnePole, ParamDescriptor, ParamId, ParameterDistributor, ParameterTargets, SmoothedParam,
    TiltFilter,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

static PARAMS: [ParamDescriptor; 8] = [
    ParamDescriptor::normalized(ParamId(0), "P0", "P0", "p0", 0.5, 20.0),
    ParamDescriptor::normalized(ParamId(1), "P1", "P1", "p1", 0.5, 30.0),
    ParamDescriptor::normalized(ParamId(2), "P2", "P2", "p2", 0.5, 40.0),
    ParamDescriptor::normalized(ParamId(3), "P3", "P3", "p3", 0.5, 60.0),
    ParamDescriptor::normalized(ParamId(4), "P4", "P4", "p4", 0.5, 80.0),
    ParamDescriptor::normalized(ParamId(5), "P5", "P5", "p5", 0.5, 80.0),
    ParamDescriptor::normalized(ParamId(6), "P6", "P6", "p6", 0.5, 40.0),
    ParamDescriptor::stepped(ParamId(7), "P7", "P7", "p7", 0.0),
];

fn generate_test_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect()
}

fn bench_distributor(c: &mut Criterion) {
    let mut group = c.benchmark_group("ParameterDistributor");

    for &block_size in BLOCK_SIZES {
        // Settled: every lane collapses to a constant view.
        group.bench_with_input(
            BenchmarkId::new("settled", block_size),
            &block_size,
            |b, &size| {
                let targets = ParameterTargets::new(&PARAMS);
                let mut dist = ParameterDistributor::new(&PARAMS, SAMPLE_RATE, size, 2);
                for _ in 0..8 {
                    dist.begin_block(&targets, size);
                }
                b.iter(|| {
                    let params = dist.begin_block(&targets, size);
                    black_box(params.block_value(ParamId(0)));
                });
            },
        );

        // Moving: targets change every block so every lane fills a ramp.
        group.bench_with_input(
            BenchmarkId::new("moving", block_size),
            &block_size,
            |b, &size| {
                let targets = ParameterTargets::new(&PARAMS);
                let mut dist = ParameterDistributor::new(&PARAMS, SAMPLE_RATE, size, 2);
                let mut flip = false;
                b.iter(|| {
                    flip = !flip;
                    let value = if flip { 0.2 } else { 0.8 };
                    for desc in &PARAMS {
                        targets.set_target(desc.id, value);
                    }
                    let params = dist.begin_block(&targets, size);
                    black_box(params.value_at(ParamId(3), size - 1));
                });
            },
        );
    }

    group.finish();
}

fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("DelayLine");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::new("linear", block_size),
            &block_size,
            |b, _| {
                let mut delay = DelayLine::new(60000);
                b.iter(|| {
                    for &sample in &input {
                        black_box(delay.read_write(black_box(sample), 39019.37));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_allpass(c: &mut Criterion) {
    let mut group = c.benchmark_group("Allpass");

    for &block_size in BLOCK_SIZES {
        let input = generate_test_signal(block_size);

        group.bench_with_input(
            BenchmarkId::new("process", block_size),
            &block_size,
            |b, _| {
                let mut ap = AllpassFilter::new(223);
                ap.set_coefficient(0.6);
                b.iter(|| {
                    for &sample in &input {
                        black_box(ap.process(black_box(sample)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_loop_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("LoopFilters");
    let input = generate_test_signal(512);

    group.bench_function("one_pole", |b| {
        let mut lp = OnePole::from_pole(SAMPLE_RATE, 0.4);
        b.iter(|| {
            for &sample in &input {
                black_box(lp.process(black_box(sample)));
            }
        });
    });

    group.bench_function("tilt", |b| {
        let mut tilt = TiltFilter::new(SAMPLE_RATE);
        tilt.set_pivot(80.0);
        tilt.set_gains(0.0, 1.0);
        b.iter(|| {
            for &sample in &input {
                black_box(tilt.process(black_box(sample)));
            }
        });
    });

    group.bench_function("dc_blocker", |b| {
        let mut dc = DcBlocker::new(SAMPLE_RATE);
        b.iter(|| {
            for &sample in &input {
                black_box(dc.process(black_box(sample)));
            }
        });
    });

    group.finish();
}

fn bench_modulation_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("Modulation");
    let input = generate_test_signal(512);

    for waveform in [LfoWaveform::Sine, LfoWaveform::SampleAndHold] {
        group.bench_function(format!("lfo_{waveform:?}"), |b| {
            let mut lfo = Lfo::new(SAMPLE_RATE, 0.3);
            lfo.set_waveform(waveform);
            b.iter(|| {
                for _ in 0..512 {
                    black_box(lfo.advance());
                }
            });
        });
    }

    group.bench_function("envelope_block", |b| {
        let mut env = EnvelopeFollower::new(SAMPLE_RATE);
        b.iter(|| black_box(env.process_block(black_box(&input))));
    });

    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Smoothing");

    group.bench_function("exponential", |b| {
        let mut p = SmoothedParam::with_config(0.0, SAMPLE_RATE, 20.0);
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            p.set_target(if flip { 1.0 } else { 0.0 });
            for _ in 0..512 {
                black_box(p.advance());
            }
        });
    });

    group.bench_function("linear_fill", |b| {
        let mut p = LinearSmoothedParam::with_config(0.0, SAMPLE_RATE, 20.0);
        let mut out = vec![0.0; 512];
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            p.set_target(if flip { 1.0 } else { 0.0 });
            p.fill(&mut out);
            black_box(out[511]);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_distributor,
    bench_delay,
    bench_allpass,
    bench_loop_filters,
    bench_modulation_primitives,
    bench_smoothing,
);
criterion_main!(benches);
