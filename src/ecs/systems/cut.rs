use super::TimeDelta;
use crate::cut::{angle_about, CutSequence, CutSettings, SequenceState};
use crate::ecs::lifecycle::{CutPlan, LifecycleQueue, SlotRole, SpawnRequest};
use crate::ecs::physics::{BodyId, BodyIndex, BodyType, PhysicsWorld, Pose};
use crate::ecs::profiler::SystemProfiler;
use crate::ecs::types::*;
use crate::events::{EventBus, StageEvent};
use crate::watcher::CollisionWatcher;
use bevy_ecs::prelude::*;
use glam::Quat;

/// A cuttable body touched the blade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutTrigger {
    pub target: Entity,
    pub blade: BodyId,
}

/// Matches collected during collision dispatch, consumed by [`sys_begin_cuts`].
#[derive(Resource, Default, Debug)]
pub struct CutRequests {
    triggered: Vec<CutTrigger>,
}

impl CutRequests {
    pub fn push(&mut self, trigger: CutTrigger) {
        self.triggered.push(trigger);
    }

    pub fn take(&mut self) -> Vec<CutTrigger> {
        std::mem::take(&mut self.triggered)
    }

    pub fn len(&self) -> usize {
        self.triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggered.is_empty()
    }
}

#[derive(Resource, Default)]
pub struct CutWatcher(pub CollisionWatcher<CutRequests>);

/// One running cut, kept on its own entity so several can overlap.
#[derive(Component, Debug, Clone)]
pub struct ActiveCut {
    pub sequence: CutSequence,
    pub target: Entity,
    pub blade: Entity,
    /// Blade orientation with the cut-axis twist removed.
    swing: Quat,
}

impl ActiveCut {
    pub fn state(&self) -> SequenceState {
        self.sequence.state()
    }
}

pub fn sys_dispatch_collisions(
    mut profiler: ResMut<SystemProfiler>,
    mut physics: ResMut<PhysicsWorld>,
    mut watcher: ResMut<CutWatcher>,
    mut requests: ResMut<CutRequests>,
) {
    let _span = profiler.scope("sys_dispatch_collisions");
    let contacts = physics.take_contacts();
    if contacts.is_empty() || watcher.0.is_empty() {
        return;
    }
    let simulator = physics.simulator();
    let fired = watcher.0.dispatch(&contacts, |body| simulator.shape_kind(body), &mut requests);
    if fired > 0 {
        log::debug!("[cut] {fired} blade contact(s) matched");
    }
}

#[allow(clippy::too_many_arguments)]
pub fn sys_begin_cuts(
    mut profiler: ResMut<SystemProfiler>,
    mut requests: ResMut<CutRequests>,
    mut physics: ResMut<PhysicsWorld>,
    index: Res<BodyIndex>,
    settings: Res<CutSettings>,
    visuals: Query<&Visual>,
    mut events: ResMut<EventBus>,
    mut commands: Commands,
) {
    let _span = profiler.scope("sys_begin_cuts");
    for trigger in requests.take() {
        let Some(blade) = index.entity(trigger.blade) else {
            log::warn!("[cut] blade body {:?} has no entity", trigger.blade);
            continue;
        };
        let (Ok(blade_visual), Ok(_)) = (visuals.get(blade), visuals.get(trigger.target)) else {
            log::debug!("[cut] target {} or blade vanished before the cut began", trigger.target.index());
            continue;
        };
        let axis = settings.axis();
        let current = angle_about(blade_visual.orientation, axis);
        let swing = Quat::from_axis_angle(axis, -current) * blade_visual.orientation;
        let mut sequence = CutSequence::new(*settings);
        sequence.begin(current);

        let simulator = physics.simulator_mut();
        if let Some(previous) = simulator.body_type(trigger.blade).filter(|kind| *kind != BodyType::Kinematic) {
            commands.entity(blade).insert(HeldBodyType(previous));
        }
        simulator.set_kinematic(trigger.blade);
        commands.entity(blade).insert(Kinematic);
        commands.spawn(ActiveCut { sequence, target: trigger.target, blade, swing });
        events.push(StageEvent::CutStarted { target: trigger.target, blade });
        log::info!("[cut] started on entity {}", trigger.target.index());
    }
}

/// Drives every running cut: swing the blade, then swap the target for its halves.
/// A blade with no swing left is handed back to the simulator at its final pose.
#[allow(clippy::too_many_arguments)]
pub fn sys_advance_cuts(
    mut profiler: ResMut<SystemProfiler>,
    dt: Res<TimeDelta>,
    mut cuts: Query<(Entity, &mut ActiveCut)>,
    mut visuals: Query<(&mut Visual, Option<&CutPlan>)>,
    blades: Query<(&PhysicsBody, Option<&HeldBodyType>)>,
    mut physics: ResMut<PhysicsWorld>,
    mut queue: ResMut<LifecycleQueue>,
    mut events: ResMut<EventBus>,
    mut commands: Commands,
) {
    let _span = profiler.scope("sys_advance_cuts");
    let mut settled_blades = Vec::new();
    for (cut_entity, mut cut) in &mut cuts {
        let axis = cut.sequence.settings().axis();
        if let Some(angle) = cut.sequence.advance(dt.0) {
            if let Ok((mut blade, _)) = visuals.get_mut(cut.blade) {
                blade.orientation = Quat::from_axis_angle(axis, angle) * cut.swing;
            }
        }
        if cut.sequence.state() == SequenceState::Replacing {
            let target = match visuals.get(cut.target) {
                Ok((visual, Some(plan))) => Some((visual.position, plan.clone())),
                _ => None,
            };
            let placements = cut.sequence.replace(target.as_ref().map(|(position, _)| *position));
            match target {
                Some((_, plan)) if !placements.is_empty() => {
                    queue.despawn(cut.target);
                    for (placement, asset) in placements.iter().zip(plan.halves.iter()) {
                        queue.spawn(SpawnRequest {
                            asset: asset.clone(),
                            scale: plan.scale,
                            position: placement.position,
                            orientation: placement.orientation,
                            role: SlotRole::Tracked(plan.half_spec()),
                        });
                    }
                    events.push(StageEvent::CutCompleted { target: cut.target, halves: placements.len() });
                    log::info!("[cut] entity {} replaced by {} halves", cut.target.index(), placements.len());
                }
                _ => {
                    events.push(StageEvent::CutAborted { target: cut.target });
                    log::debug!("[cut] target {} gone before replacement; nothing spawned", cut.target.index());
                }
            }
        }
        if cut.sequence.is_settled() {
            commands.entity(cut_entity).despawn();
            settled_blades.push(cut.blade);
        }
    }

    settled_blades.sort_unstable();
    settled_blades.dedup();
    for blade in settled_blades {
        if cuts.iter().any(|(_, cut)| cut.blade == blade && !cut.sequence.is_settled()) {
            continue;
        }
        let (Ok((visual, _)), Ok((body, held))) = (visuals.get(blade), blades.get(blade)) else {
            continue;
        };
        let pose = Pose { position: visual.position, orientation: visual.orientation };
        let simulator = physics.simulator_mut();
        simulator.set_pose(body.id, pose);
        simulator.set_body_type(body.id, held.map_or(BodyType::Kinematic, |held| held.0));
        commands.entity(blade).remove::<(Kinematic, HeldBodyType)>();
        log::debug!("[cut] blade {} released", blade.index());
    }
}

