use harvest_stage::assets::{AssetId, StaticLoader};
use harvest_stage::config::StageConfigOverrides;
use harvest_stage::ecs::ObjectKind;
use harvest_stage::events::StageEvent;
use harvest_stage::{HostSignal, StageConfig, StageError, ViewportId, ViewportLoopController};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HZ: f64 = 60.0;

fn controller_with(loader: StaticLoader) -> (ViewportLoopController, StageConfig) {
    let config = StageConfig::default();
    (ViewportLoopController::new(&config, Box::new(loader)), config)
}

fn controller() -> (ViewportLoopController, StageConfig) {
    let config = StageConfig::default();
    let loader = StaticLoader::from_catalog(&config.assets.catalog());
    (ViewportLoopController::new(&config, Box::new(loader)), config)
}

fn id(loops: &ViewportLoopController, name: &str) -> ViewportId {
    loops.find(name).expect("viewport from the default config")
}

fn hover_running(loops: &ViewportLoopController) -> usize {
    ["hover-primary", "hover-secondary"].iter().filter(|name| loops.is_running(id(loops, name))).count()
}

#[test]
fn hover_group_never_runs_two_loops() {
    let (mut loops, _) = controller();
    let names = ["hover-primary", "hover-secondary"];
    let mut rng = StdRng::seed_from_u64(41);
    let mut previous_ticks = 0;
    for frame in 0..300 {
        let name = names[rng.gen_range(0..names.len())].to_string();
        let signal = if rng.gen_bool(0.7) { HostSignal::PointerEnter(name) } else { HostSignal::PointerLeave(name) };
        loops.handle(signal).expect("known viewport");
        assert!(hover_running(&loops) <= 1);

        loops.frame(frame as f64 / HZ);
        let ticks: u64 = names.iter().map(|name| loops.tick_count(id(&loops, name))).sum();
        assert!(ticks - previous_ticks <= 1, "one hover region renders at most once per frame");
        previous_ticks = ticks;
    }
}

#[test]
fn entering_the_second_viewport_stops_the_first_in_the_same_call() {
    let (mut loops, _) = controller();
    let primary = id(&loops, "hover-primary");
    let secondary = id(&loops, "hover-secondary");
    let salad = id(&loops, "salad");
    loops.start(salad).expect("salad");
    loops.start(primary).expect("primary");
    loops.start(secondary).expect("secondary");
    assert!(!loops.is_running(primary));
    assert!(loops.is_running(secondary));
    assert!(loops.is_running(salad), "ungrouped viewports are unaffected");
}

#[test]
fn start_is_idempotent() {
    let (mut loops, _) = controller();
    let primary = id(&loops, "hover-primary");
    loops.start(primary).expect("first start");
    loops.start(primary).expect("second start");
    loops.frame(0.0);
    assert_eq!(loops.tick_count(primary), 1);
    let stage = loops.stage_mut(primary).expect("installed");
    assert_eq!(stage.population(ObjectKind::Prop), 1, "the scene is installed once");
    assert_eq!(stage.showcase_key().as_deref(), Some("bank"));
}

#[test]
fn zero_extent_viewport_fails_then_retries_after_resize() {
    let mut config = StageConfig::default();
    config.apply_overrides(&StageConfigOverrides { width: Some(0), ..Default::default() });
    let loader = StaticLoader::from_catalog(&config.assets.catalog());
    let mut loops = ViewportLoopController::new(&config, Box::new(loader));
    let salad = id(&loops, "salad");

    let err = loops.start(salad).unwrap_err();
    assert!(matches!(err, StageError::DimensionFailure { width: 0, height: 600, .. }));
    assert!(loops.stage(salad).is_none());
    assert!(!loops.is_running(salad));
    loops.frame(0.0);
    assert_eq!(loops.tick_count(salad), 0);

    loops.handle(HostSignal::Resize { width: 640, height: 480 }).expect("resize");
    loops.start(salad).expect("retry succeeds");
    assert!(loops.stage(salad).is_some());
    let aspect = loops.camera(salad).expect("camera").aspect();
    assert!((aspect - 640.0 / 480.0).abs() < 1e-6);
    loops.frame(1.0 / HZ);
    assert_eq!(loops.render_stats(salad).map(|s| s.frames), Some(1));
}

#[test]
fn completions_for_stopped_viewports_are_discarded_then_reissued() {
    let config = StageConfig::default();
    let (mut loops, _) = controller_with(StaticLoader::from_catalog(&config.assets.catalog()).with_latency(2));
    let salad = id(&loops, "salad");

    loops.start(salad).expect("start");
    assert_eq!(loops.loads_in_flight(), 4, "pot plus three filler meshes");
    loops.stop(salad).expect("stop");
    for frame in 0..3 {
        loops.frame(frame as f64 / HZ);
    }
    assert_eq!(loops.loads_in_flight(), 0);
    assert_eq!(loops.tick_count(salad), 0);
    let discarded = loops.drain_events(salad).iter().filter(|e| matches!(e, StageEvent::LoadDiscarded { .. })).count();
    assert_eq!(discarded, 4);
    let stage = loops.stage_mut(salad).expect("stage kept while stopped");
    assert_eq!(stage.pending_count(), 26);
    assert_eq!(stage.tracked_count(), 0);

    loops.start(salad).expect("restart");
    assert_eq!(loops.loads_in_flight(), 4);
    for frame in 3..8 {
        loops.frame(frame as f64 / HZ);
    }
    let stage = loops.stage_mut(salad).expect("stage");
    assert_eq!(stage.pending_count(), 0);
    assert_eq!(stage.tracked_count(), 25);
    assert!(stage.recycler().region().is_some(), "pot resolved the region");
}

#[test]
fn failed_loads_degrade_a_single_feature() {
    let config = StageConfig::default();
    let loader = StaticLoader::from_catalog(&config.assets.catalog())
        .with_failure("pot", "corrupt buffer")
        .with_failure("security", "missing file");
    let (mut loops, _) = controller_with(loader);
    let salad = id(&loops, "salad");
    let secondary = id(&loops, "hover-secondary");
    loops.start(salad).expect("salad");
    loops.start(secondary).expect("hover");

    for frame in 0..120 {
        loops.frame(frame as f64 / HZ);
    }
    let events = loops.drain_events(salad);
    assert!(events.contains(&StageEvent::LoadFailed { asset: AssetId::new("pot") }));
    let stage = loops.stage_mut(salad).expect("stage");
    assert!(stage.recycler().region().is_none(), "no pot, no recycling");
    assert_eq!(stage.population(ObjectKind::Filler), 25);
    assert_eq!(loops.tick_count(salad), 120);

    loops.handle(HostSignal::SwapModel { viewport: "hover-secondary".into(), model: "security".into() }).expect("swap");
    loops.frame(120.0 / HZ);
    loops.frame(121.0 / HZ);
    assert_eq!(loops.stage_mut(secondary).expect("stage").showcase_key(), None);
    loops.handle(HostSignal::SwapModel { viewport: "hover-secondary".into(), model: "bank".into() }).expect("swap");
    loops.frame(122.0 / HZ);
    assert_eq!(loops.stage_mut(secondary).expect("stage").showcase_key().as_deref(), Some("bank"));

    let err = loops.handle(HostSignal::SwapModel { viewport: "salad".into(), model: "bank".into() }).unwrap_err();
    assert!(matches!(err, StageError::UnknownAsset(_)));
}

#[test]
fn fixed_steps_follow_wall_clock_with_a_catch_up_cap() {
    let (mut loops, config) = controller();
    let landing = id(&loops, "landing");
    loops.start(landing).expect("landing");
    // 30 Hz host: the first frame runs one step, every later frame two
    for frame in 0..30 {
        loops.frame(frame as f64 / 30.0);
    }
    assert_eq!(loops.fixed_step_count(landing), 59);

    let before = loops.fixed_step_count(landing);
    loops.frame(10.0);
    assert_eq!(loops.fixed_step_count(landing) - before, config.physics.max_catchup_steps as u64);
}
