use crate::ecs::profiler::SystemProfiler;
use crate::ecs::types::*;
use bevy_ecs::prelude::*;
use glam::Quat;

/// Fixed yaw increment per rendered frame.
pub fn sys_spin_showcase(mut profiler: ResMut<SystemProfiler>, mut query: Query<(&mut Visual, &Spin)>) {
    let _span = profiler.scope("sys_spin_showcase");
    for (mut visual, spin) in &mut query {
        visual.orientation = (Quat::from_rotation_y(spin.speed) * visual.orientation).normalize();
    }
}
