//! End-to-end tests for the engine: state round trips, routing switches,
//! block splitting and modulation.

use monument_core::linear_to_db;
use monument_engine::{Engine, EngineConfig, EngineHandle, RoutingSpec};
use monument_modulation::{ConnectionSet, ModulationConnection, RandomDensity, SourceId};
use monument_reverb::RoutingPreset;
use monument_reverb::macros::{EVOLUTION, MATERIAL};
use monument_reverb::params::{DENSITY, MIX, TIME, WARP, WIDTH};

const SR: f32 = 48000.0;

/// Route control-context logs to the test output. `RUST_LOG=debug` shows
/// routing and restore events.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_test_writer()
        .try_init();
}

fn input(len: usize) -> (Vec<f32>, Vec<f32>) {
    let left: Vec<f32> = (0..len)
        .map(|i| {
            let t = i as f32 / SR;
            let burst = if i < 4800 { 0.5 } else { 0.0 };
            burst * (core::f32::consts::TAU * 220.0 * t).sin() + if i == 0 { 1.0 } else { 0.0 }
        })
        .collect();
    let right = left.iter().map(|x| x * 0.7).collect();
    (left, right)
}

fn render(engine: &mut Engine, len: usize, block: usize) -> (Vec<f32>, Vec<f32>) {
    let (mut left, mut right) = input(len);
    for (l, r) in left.chunks_mut(block).zip(right.chunks_mut(block)) {
        engine.process(l, r);
    }
    (left, right)
}

fn configured() -> (Engine, EngineHandle) {
    init_tracing();
    let (engine, handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.set_param(TIME, 0.8);
    handle.set_param(MIX, 0.6);
    handle.set_param(WARP, 0.4);
    handle.set_param(WIDTH, 0.7);
    handle.set_macro(MATERIAL, 0.8);
    handle.set_macro(EVOLUTION, 0.2);
    handle.publish_routing(RoutingPreset::ParallelWorlds).unwrap();
    let mut set = ConnectionSet::randomize(RandomDensity::Dense, 4, 12);
    set.push(ModulationConnection::new(SourceId::BrownianMotion, DENSITY.0, 0.4).with_probability(0.5))
        .unwrap();
    handle.publish_connections(set).unwrap();
    (engine, handle)
}

#[test]
fn restored_state_reproduces_output_on_a_fresh_engine() {
    let (mut a, source) = configured();
    let bytes = source.capture_state().unwrap();
    source.restore_state(&bytes).unwrap();
    let first = render(&mut a, 24000, 512);

    let (mut b, target) = Engine::new(EngineConfig::default()).unwrap();
    target.restore_state(&bytes).unwrap();
    let second = render(&mut b, 24000, 512);

    assert_eq!(first, second);
    assert!(first.0.iter().skip(4800).any(|x| x.abs() > 1e-4), "no tail");
}

#[test]
fn restoring_twice_on_one_engine_repeats_output() {
    let (mut engine, handle) = configured();
    let bytes = handle.capture_state().unwrap();

    handle.restore_state(&bytes).unwrap();
    let first = render(&mut engine, 12000, 256);
    handle.restore_state(&bytes).unwrap();
    let second = render(&mut engine, 12000, 256);

    for (x, y) in first.0.iter().zip(&second.0).chain(first.1.iter().zip(&second.1)) {
        assert!((x - y).abs() < 1e-6, "{x} vs {y}");
    }
}

#[test]
fn block_size_does_not_change_output() {
    let config = EngineConfig { max_block: 256, ..Default::default() };
    let run = |host_block: usize| {
        let (mut engine, handle) = Engine::new(config.clone()).unwrap();
        handle.set_param(TIME, 0.7);
        handle.set_param(MIX, 1.0);
        render(&mut engine, 8192, host_block)
    };
    // Host blocks that are whole multiples of the engine block are split on
    // the same boundaries.
    let reference = run(256);
    assert_eq!(run(1024), reference);
    assert_eq!(run(8192), reference);
}

#[test]
fn oversized_blocks_are_split() {
    let config = EngineConfig { max_block: 64, ..Default::default() };
    let (mut engine, _handle) = Engine::new(config).unwrap();
    let (left, right) = render(&mut engine, 5000, 5000);
    assert!(left.iter().chain(&right).all(|x| x.is_finite()));
    assert!(left[4000..].iter().any(|x| x.abs() > 1e-5));
}

#[test]
fn routing_switch_has_no_discontinuity() {
    init_tracing();
    let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.set_param(MIX, 0.5);
    let block = 256;
    let sine = |i: usize| 0.5 * (core::f32::consts::TAU * 110.0 * i as f32 / SR).sin();

    let mut prev = 0.0f32;
    let mut steady_step = 0.0f32;
    let mut switch_step = 0.0f32;
    let mut peak = 0.0f32;
    for b in 0..200 {
        if b == 100 {
            handle.publish_routing(RoutingPreset::MinimalSparse).unwrap();
        }
        let mut left: Vec<f32> = (0..block).map(|n| sine(b * block + n)).collect();
        let mut right = left.clone();
        engine.process(&mut left, &mut right);
        for &x in &left {
            let step = (x - prev).abs();
            if (40..100).contains(&b) || (150..200).contains(&b) {
                steady_step = steady_step.max(step);
            } else if (100..110).contains(&b) {
                switch_step = switch_step.max(step);
            }
            peak = peak.max(x.abs());
            prev = x;
        }
    }
    assert!(!engine.is_transitioning());
    // The switch may add at most a -40 dB step on top of the signal's own.
    let excess = (switch_step - steady_step).max(1e-9);
    assert!(linear_to_db(excess / peak) < -40.0, "steady {steady_step} switch {switch_step} peak {peak}");
}

#[test]
fn last_published_routing_wins() {
    let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.publish_routing(RoutingPreset::MinimalSparse).unwrap();
    handle.publish_routing(RoutingPreset::ElasticFeedback).unwrap();
    render(&mut engine, 48000, 512);
    assert_eq!(**engine.active_routing(), RoutingPreset::ElasticFeedback.build().unwrap());
    assert_eq!(handle.routing(), RoutingSpec::Preset(RoutingPreset::ElasticFeedback));
}

#[test]
fn zero_depth_connections_do_not_change_output() {
    let (mut plain, _plain_handle) = Engine::new(EngineConfig::default()).unwrap();
    let (mut modulated, handle) = Engine::new(EngineConfig::default()).unwrap();
    let mut set = ConnectionSet::new();
    for source in SourceId::ALL {
        set.push(ModulationConnection::new(source, TIME.0, 0.0)).unwrap();
        set.push(ModulationConnection::new(source, MIX.0, 0.0).with_probability(0.3)).unwrap();
    }
    handle.publish_connections(set).unwrap();
    assert_eq!(render(&mut plain, 12000, 512), render(&mut modulated, 12000, 512));
}

#[test]
fn modulation_moves_the_output() {
    let (mut plain, _plain_handle) = Engine::new(EngineConfig::default()).unwrap();
    let (mut modulated, handle) = Engine::new(EngineConfig::default()).unwrap();
    let mut set = ConnectionSet::new();
    set.push(ModulationConnection::new(SourceId::AudioFollower, MIX.0, 1.0).with_smoothing_ms(20.0))
        .unwrap();
    handle.publish_connections(set).unwrap();
    assert_ne!(render(&mut plain, 12000, 512), render(&mut modulated, 12000, 512));
}

#[test]
fn custom_routing_is_captured() {
    init_tracing();
    use monument_core::graph::RoutingConfiguration;
    use monument_reverb::StageKind;

    let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
    let custom = RoutingConfiguration::builder()
        .series(StageKind::Foundation.slot())
        .series(StageKind::Chambers.slot())
        .series(StageKind::Facade.slot())
        .build(StageKind::COUNT)
        .unwrap();
    handle.publish_routing(custom.clone()).unwrap();
    render(&mut engine, 4096, 512);

    let bytes = handle.capture_state().unwrap();
    let (_other, other) = Engine::new(EngineConfig::default()).unwrap();
    other.restore_state(&bytes).unwrap();
    assert_eq!(other.routing(), RoutingSpec::Custom(custom));
}

#[test]
fn garbage_is_reclaimed_after_the_engine_moves_on() {
    let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
    for preset in RoutingPreset::ALL {
        handle.publish_routing(preset).unwrap();
    }
    handle.publish_connections(ConnectionSet::randomize(RandomDensity::Sparse, 1, 12)).unwrap();
    render(&mut engine, 48000, 512);
    assert!(handle.collect_garbage() > 0);
    assert_eq!(handle.collect_garbage(), 0);
}

#[test]
fn a_non_finite_sample_does_not_poison_the_tail() {
    init_tracing();
    use monument_core::graph::RoutingConfiguration;
    use monument_reverb::StageKind;

    let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
    handle.set_param(MIX, 1.0);
    let custom = RoutingConfiguration::builder()
        .series(StageKind::Chambers.slot())
        .series(StageKind::Facade.slot())
        .build(StageKind::COUNT)
        .unwrap();
    handle.publish_routing(custom).unwrap();

    let block = 256;
    let mut tail = 0.0f32;
    for b in 0..200 {
        let mut left: Vec<f32> = (0..block)
            .map(|i| (core::f32::consts::TAU * 330.0 * (b * block + i) as f32 / SR).sin() * 0.3)
            .collect();
        let mut right = left.clone();
        if b == 0 {
            left[0] = f32::NAN;
            right[1] = f32::INFINITY;
        }
        engine.process(&mut left, &mut right);
        assert!(left.iter().chain(&right).all(|x| x.is_finite()), "block {b}");
        if b >= 100 {
            tail += left.iter().map(|x| x * x).sum::<f32>();
        }
    }
    assert!(tail > 0.0);
}

#[test]
fn every_preset_is_audible_and_bounded() {
    init_tracing();
    for preset in RoutingPreset::ALL {
        let (mut engine, handle) = Engine::new(EngineConfig::default()).unwrap();
        handle.set_param(MIX, 1.0);
        handle.publish_routing(preset).unwrap();
        let (left, right) = render(&mut engine, 48000, 512);
        assert!(left.iter().chain(&right).all(|x| x.is_finite() && x.abs() < 4.0), "{}", preset.name());
        // Past the burst, so even the sparse layout shows its reflections.
        assert!(left[4800..].iter().any(|x| x.abs() > 1e-5), "{} is silent", preset.name());
    }
}
