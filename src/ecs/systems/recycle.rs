use super::StageRng;
use crate::ecs::lifecycle::LifecycleQueue;
use crate::ecs::profiler::SystemProfiler;
use crate::ecs::types::*;
use crate::events::{EventBus, StageEvent};
use crate::recycler::Recycler;
use bevy_ecs::prelude::*;

pub fn sys_evaluate_recycling(
    mut profiler: ResMut<SystemProfiler>,
    recycler: Res<Recycler>,
    mut rng: ResMut<StageRng>,
    objects: Query<(Entity, &ObjectKind, &Visual), With<PhysicsBody>>,
    mut queue: ResMut<LifecycleQueue>,
    mut events: ResMut<EventBus>,
) {
    let _span = profiler.scope("sys_evaluate_recycling");
    let Some(region) = recycler.region() else {
        return;
    };
    let verdict = recycler.evaluate(objects.iter().map(|(entity, kind, visual)| (entity, *kind, visual)), &region);
    if verdict.remove.is_empty() {
        return;
    }
    for entity in &verdict.remove {
        let Ok((_, _, visual)) = objects.get(*entity) else {
            continue;
        };
        let replacement = recycler.respawn_request(&mut rng.0, visual);
        queue.despawn(*entity);
        queue.spawn(replacement);
    }
    log::debug!("[recycle] removed {} spawned {}", verdict.remove.len(), verdict.spawn_count);
    events.push(StageEvent::Recycled { removed: verdict.remove.len(), spawned: verdict.spawn_count });
}
