//! Property tests for the whole engine.

use monument_core::ParamId;
use monument_engine::{Engine, EngineConfig, EngineHandle};
use monument_modulation::{ConnectionSet, RandomDensity};
use monument_reverb::RoutingPreset;
use monument_reverb::macros::MACRO_COUNT;
use monument_reverb::params::PARAM_COUNT;
use proptest::prelude::*;

fn density() -> impl Strategy<Value = RandomDensity> {
    prop::sample::select(vec![RandomDensity::Sparse, RandomDensity::Balanced, RandomDensity::Dense])
}

fn apply(
    handle: &EngineHandle,
    params: &[f32; PARAM_COUNT],
    macros: &[f32; MACRO_COUNT],
    preset: RoutingPreset,
    density: RandomDensity,
    seed: u64,
) {
    for (i, &v) in params.iter().enumerate() {
        handle.set_param(ParamId(i as u32), v);
    }
    for (i, &v) in macros.iter().enumerate() {
        handle.set_macro(ParamId(i as u32), v);
    }
    handle.publish_routing(preset).unwrap();
    handle.publish_connections(ConnectionSet::randomize(density, seed, PARAM_COUNT)).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any settings, routing and modulation keep the output finite.
    #[test]
    fn output_finite_for_any_settings(
        params in prop::array::uniform12(0.0f32..=1.0),
        macros in prop::array::uniform6(0.0f32..=1.0),
        preset_index in 0usize..RoutingPreset::ALL.len(),
        density in density(),
        seed in any::<u64>(),
    ) {
        let config = EngineConfig { max_block: 256, ..Default::default() };
        let (mut engine, handle) = Engine::new(config).unwrap();
        apply(&handle, &params, &macros, RoutingPreset::ALL[preset_index], density, seed);

        for block in 0..24 {
            let mut left: Vec<f32> = (0..256).map(|i| ((block * 256 + i) as f32 * 0.031).sin() * 0.8).collect();
            let mut right: Vec<f32> = left.iter().map(|x| -x * 0.5).collect();
            engine.process(&mut left, &mut right);
            for x in left.iter().chain(&right) {
                prop_assert!(x.is_finite());
                prop_assert!(x.abs() < 64.0, "runaway output {x}");
            }
        }
    }

    /// Splitting a host block on engine-block boundaries changes nothing.
    #[test]
    fn host_block_multiples_match(
        params in prop::array::uniform12(0.0f32..=1.0),
        macros in prop::array::uniform6(0.0f32..=1.0),
        density in density(),
        seed in any::<u64>(),
        multiple in 2usize..6,
    ) {
        let block = 128;
        let len = block * multiple * 4;
        let input: Vec<f32> = (0..len).map(|i| if i % 997 == 0 { 1.0 } else { 0.0 }).collect();

        let run = |host_block: usize| {
            let config = EngineConfig { max_block: block, ..Default::default() };
            let (mut engine, handle) = Engine::new(config).unwrap();
            apply(&handle, &params, &macros, RoutingPreset::OrganicBreathing, density, seed);
            let mut left = input.clone();
            let mut right = input.clone();
            for (l, r) in left.chunks_mut(host_block).zip(right.chunks_mut(host_block)) {
                engine.process(l, r);
            }
            (left, right)
        };
        prop_assert_eq!(run(block), run(block * multiple));
    }
}
