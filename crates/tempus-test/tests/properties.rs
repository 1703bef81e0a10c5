//! Property tests over random command traffic and bubble layouts

use proptest::prelude::*;
use tempus_core::{EntityId, RewindMode, Tick, Vec3};
use tempus_distortion::{BubbleLimits, BubbleManager};
use tempus_test::{run_script, CommandScript, HarnessConfig, ScriptConfig};
use tempus_time::{ClockConfig, Command, TimeEngine};

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::pause()),
        Just(Command::resume()),
        prop::num::f32::ANY.prop_map(Command::set_speed),
        (1u32..10).prop_map(Command::step_ticks),
        (0u32..500).prop_map(Command::start_rewind),
        Just(Command::stop_rewind()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_engine_state_stays_in_bounds(
        commands in prop::collection::vec(prop::option::of(command_strategy()), 1..200)
    ) {
        let config = ClockConfig::default();
        let mut engine = TimeEngine::with_config(config.clone());
        let mut last_tick = Tick::ZERO;

        for command in commands {
            if let Some(command) = command {
                engine.submit(command);
            }
            engine.advance();

            let clock = engine.clock();
            let speed = clock.speed_multiplier();
            prop_assert!(speed >= config.min_speed && speed <= config.max_speed);
            prop_assert!(clock.tick() >= last_tick);
            last_tick = clock.tick();

            let rewind = engine.rewind();
            if rewind.mode != RewindMode::Record {
                prop_assert!(rewind.playback_tick <= clock.tick());
            }
        }
    }

    #[test]
    fn prop_stasis_containment_is_horizontal(
        cx in -100.0f32..100.0,
        cz in -100.0f32..100.0,
        radius in 0.0f32..50.0,
        px in -150.0f32..150.0,
        py in -1000.0f32..1000.0,
        pz in -150.0f32..150.0,
    ) {
        let mut bubbles = BubbleManager::new(BubbleLimits::default());
        let id = bubbles.freeze(Vec3::new(cx, 0.0, cz), radius, 0);
        let point = Vec3::new(px, py, pz);
        bubbles.update(Tick(1), &vec![(EntityId(1), point)]);

        let inside = bubbles.get(id).unwrap().volume.contains_horizontal(&point);
        let scale = bubbles.local_time_scale(EntityId(1));
        prop_assert_eq!(scale, if inside { 0.0 } else { 1.0 });
        prop_assert_eq!(bubbles.attachment(EntityId(1)).is_some(), inside);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_same_seed_same_trajectory(seed in any::<u64>()) {
        let script = CommandScript::random(&ScriptConfig::light().with_seed(seed));
        let config = HarnessConfig {
            walkers: 16,
            seed,
            ..HarnessConfig::default()
        };

        let first = run_script(config.clone(), &script).unwrap();
        let second = run_script(config, &script).unwrap();
        prop_assert_eq!(first.len() as u64, script.steps());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_random_traffic_respects_rewind_bounds(seed in any::<u64>()) {
        let script = CommandScript::random(&ScriptConfig::busy().with_seed(seed));
        let trajectory = run_script(HarnessConfig::default(), &script).unwrap();
        let limits = ClockConfig::default();

        for frame in &trajectory.frames {
            let speed = f32::from_bits(frame.speed_bits);
            prop_assert!(speed >= limits.min_speed && speed <= limits.max_speed);
            if frame.mode != RewindMode::Record {
                prop_assert!(frame.playback_tick <= frame.tick);
            }
        }
    }
}
