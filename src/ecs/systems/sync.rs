use crate::ecs::physics::{PhysicsWorld, StepSettings};
use crate::ecs::profiler::SystemProfiler;
use crate::ecs::types::*;
use bevy_ecs::prelude::*;

pub fn sys_step_simulation(
    mut profiler: ResMut<SystemProfiler>,
    mut physics: ResMut<PhysicsWorld>,
    settings: Res<StepSettings>,
) {
    let _span = profiler.scope("sys_step_simulation");
    if settings.fixed_dt > 0.0 {
        physics.step(*settings);
    }
}

/// Copies settled body poses onto visuals. Kinematic entities keep their
/// scripted orientation.
pub fn sys_sync_bodies(
    mut profiler: ResMut<SystemProfiler>,
    physics: Res<PhysicsWorld>,
    mut query: Query<(Entity, &PhysicsBody, &mut Visual, Has<Kinematic>, Has<BodyMissing>)>,
    mut commands: Commands,
) {
    let _span = profiler.scope("sys_sync_bodies");
    let simulator = physics.simulator();
    for (entity, body, mut visual, kinematic, reported) in &mut query {
        let Some(pose) = simulator.pose(body.id) else {
            if !reported {
                log::warn!("[sync] body {:?} of entity {} is gone; skipping", body.id, entity.index());
                commands.entity(entity).insert(BodyMissing);
            }
            continue;
        };
        visual.position = pose.position;
        if !kinematic {
            visual.orientation = pose.orientation;
        }
    }
}
