mod support;

use glam::{Quat, Vec3};
use harvest_stage::ecs::{ObjectKind, Pose, SlotRole, SpawnRequest, StepSettings, TrackedSpec};
use harvest_stage::events::StageEvent;
use harvest_stage::geometry::Bounds3;
use harvest_stage::recycler::{FillerSpec, RecyclePolicy, Recycler};
use std::collections::HashSet;
use support::{preload_box, scripted_stage};

fn column() -> Bounds3 {
    Bounds3::new(Vec3::new(-5.0, 10.0, -5.0), Vec3::new(5.0, 60.0, 5.0))
}

#[test]
fn filler_leaving_the_column_is_replaced_inside_the_spawn_box() {
    let (mut stage, _script) = scripted_stage(21);
    let tomato = preload_box(&mut stage, "tomato", Vec3::splat(2.0));
    stage.set_recycler(
        Recycler::new(column(), RecyclePolicy::RemoveOutside).with_region(column()).with_template(TrackedSpec::filler()),
    );
    let fillers: Vec<_> = (0..5)
        .map(|i| {
            let position = Vec3::new(-2.0 + i as f32, 20.0 + 5.0 * i as f32, 0.0);
            stage
                .spawn(SpawnRequest::tracked(tomato.clone(), 1.0, position, Quat::IDENTITY, TrackedSpec::filler()))
                .expect("spawned")
        })
        .collect();
    stage.fixed_step(StepSettings::default());
    assert_eq!(stage.population(ObjectKind::Filler), 5);
    assert!(stage.drain_events().iter().all(|e| !matches!(e, StageEvent::Recycled { .. })));

    // half extent is 1, so the top point sits at (0, 61, 0)
    let escaped = fillers[0];
    stage.set_body_pose(escaped, Pose { position: Vec3::new(0.0, 60.0, 0.0), orientation: Quat::IDENTITY }).expect("body");
    stage.fixed_step(StepSettings::default());

    assert!(stage.visual(escaped).is_none(), "escaped filler is removed");
    assert_eq!(stage.population(ObjectKind::Filler), 5);
    let events = stage.drain_events();
    assert!(events.contains(&StageEvent::Recycled { removed: 1, spawned: 1 }));

    let before: HashSet<_> = fillers.iter().copied().collect();
    let fresh: Vec<_> = stage.entities_of(ObjectKind::Filler).into_iter().filter(|e| !before.contains(e)).collect();
    assert_eq!(fresh.len(), 1);
    let visual = stage.visual(fresh[0]).expect("replacement visual");
    assert!(column().contains_point(visual.position), "respawned at {:?}", visual.position);
    assert_eq!(visual.mesh, tomato, "empty pool reuses the removed mesh");
    assert_eq!(stage.physics().simulator().body_count(), 5);
}

#[test]
fn pot_region_recycles_fillers_that_drop_in() {
    let (mut stage, _script) = scripted_stage(22);
    let pepper = preload_box(&mut stage, "pepper", Vec3::ONE);
    let carrot = preload_box(&mut stage, "carrot", Vec3::ONE);
    let pot = preload_box(&mut stage, "pot", Vec3::new(1.2, 0.8, 1.2));
    let respawn = Bounds3::new(Vec3::new(-5.0, 30.0, -5.0), Vec3::new(5.0, 80.0, 5.0));
    stage.set_recycler(
        Recycler::new(respawn, RecyclePolicy::RemoveInside)
            .with_pool(vec![FillerSpec::new("pepper", 3.0, 1), FillerSpec::new("carrot", 0.5, 1)])
            .with_template(TrackedSpec::filler()),
    );
    stage.spawn(SpawnRequest {
        asset: pot,
        scale: 10.0,
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        role: SlotRole::RegionSource,
    });
    let region = stage.recycler().region().expect("region from the cached pot mesh");
    assert!((region.max.y - 4.0).abs() < 1e-5);

    let falling = stage
        .spawn(SpawnRequest::tracked(pepper, 3.0, Vec3::new(0.0, 40.0, 0.0), Quat::IDENTITY, TrackedSpec::filler()))
        .expect("spawned");
    let resting = stage
        .spawn(SpawnRequest::tracked(carrot, 0.5, Vec3::new(20.0, 0.0, 0.0), Quat::IDENTITY, TrackedSpec::filler()))
        .expect("spawned");

    stage.set_body_pose(falling, Pose { position: Vec3::new(0.0, 1.0, 0.0), orientation: Quat::IDENTITY }).expect("body");
    stage.fixed_step(StepSettings::default());

    assert!(stage.visual(falling).is_none());
    assert!(stage.visual(resting).is_some(), "objects outside the pot stay");
    assert_eq!(stage.population(ObjectKind::Filler), 2);
    assert_eq!(stage.population(ObjectKind::Prop), 1, "the pot itself is never recycled");
    for entity in stage.entities_of(ObjectKind::Filler) {
        if entity == resting {
            continue;
        }
        let visual = stage.visual(entity).expect("replacement");
        assert!(respawn.contains_point(visual.position));
        assert!(["pepper", "carrot"].contains(&visual.mesh.as_str()));
    }
}

#[test]
fn population_is_conserved_under_churn() {
    let (mut stage, _script) = scripted_stage(23);
    let tomato = preload_box(&mut stage, "tomato", Vec3::ONE);
    let pit = Bounds3::new(Vec3::new(-3.0, -1.0, -3.0), Vec3::new(3.0, 3.0, 3.0));
    stage.set_recycler(
        Recycler::new(column(), RecyclePolicy::RemoveInside).with_region(pit).with_template(TrackedSpec::filler()),
    );
    for i in 0..8 {
        let position = Vec3::new(0.0, 20.0 + i as f32 * 4.0, 0.0);
        stage.spawn(SpawnRequest::tracked(tomato.clone(), 1.0, position, Quat::IDENTITY, TrackedSpec::filler()));
    }

    let mut recycled = 0;
    for step in 0..40 {
        let live = stage.entities_of(ObjectKind::Filler);
        // drop every third live filler into the pit
        for entity in live.iter().skip(step % 3).step_by(3) {
            stage.set_body_pose(*entity, Pose { position: Vec3::ZERO, orientation: Quat::IDENTITY }).expect("body");
        }
        stage.fixed_step(StepSettings::default());
        recycled += stage
            .drain_events()
            .iter()
            .filter_map(|e| match e {
                StageEvent::Recycled { removed, spawned } => {
                    assert_eq!(removed, spawned);
                    Some(*removed)
                }
                _ => None,
            })
            .sum::<usize>();
        assert_eq!(stage.population(ObjectKind::Filler), 8);
        assert_eq!(stage.physics().simulator().body_count(), 8);
    }
    assert!(recycled > 40);
}
