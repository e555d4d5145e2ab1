use super::lifecycle::{apply_lifecycle, despawn_tracked, spawn_or_reserve, spawn_resolved, LifecycleQueue, SlotRole, SpawnRequest};
use super::physics::{BodyDescriptor, BodyId, BodyIndex, PhysicsWorld, Pose, Simulator, StepSettings};
use super::profiler::{SystemProfiler, SystemTimingSummary};
use super::systems::*;
use super::types::*;
use crate::assets::{AssetId, MeshLibrary};
use crate::cut::{CutSettings, SequenceState};
use crate::error::StageError;
use crate::events::{EventBus, StageEvent};
use crate::mesh::MeshAsset;
use crate::recycler::Recycler;
use crate::renderer::{RenderNode, RenderScene};
use bevy_ecs::prelude::{Entity, Schedule, With, World};
use bevy_ecs::schedule::IntoSystemConfigs;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// ECS world for one viewport's scene: tracked objects, their simulator, and
/// the schedules that drive them.
pub struct StageWorld {
    pub world: World,
    schedule_fixed: Schedule,
    schedule_frame: Schedule,
}

impl StageWorld {
    pub fn new(simulator: Box<dyn Simulator>, seed: u64) -> Self {
        let mut world = World::new();
        world.insert_resource(PhysicsWorld::new(simulator));
        world.insert_resource(StepSettings::default());
        world.insert_resource(TimeDelta(0.0));
        world.insert_resource(StageRng(StdRng::seed_from_u64(seed)));
        world.insert_resource(BodyIndex::default());
        world.insert_resource(MeshLibrary::default());
        world.insert_resource(LifecycleQueue::default());
        world.insert_resource(Recycler::default());
        world.insert_resource(CutWatcher::default());
        world.insert_resource(CutRequests::default());
        world.insert_resource(CutSettings::default());
        world.insert_resource(EventBus::default());
        world.insert_resource(SystemProfiler::new());

        // step -> sync -> recycle/collisions; spawns land before the next step
        let mut schedule_fixed = Schedule::default();
        schedule_fixed.add_systems(
            (
                sys_step_simulation,
                sys_sync_bodies,
                sys_evaluate_recycling,
                apply_lifecycle,
                sys_dispatch_collisions,
                sys_begin_cuts,
            )
                .chain(),
        );

        let mut schedule_frame = Schedule::default();
        schedule_frame.add_systems((sys_advance_cuts, sys_spin_showcase, apply_lifecycle).chain());

        Self { world, schedule_fixed, schedule_frame }
    }

    pub fn fixed_step(&mut self, settings: StepSettings) {
        self.world.insert_resource(settings);
        self.schedule_fixed.run(&mut self.world);
    }

    /// Once per rendered frame, after the fixed steps it owes.
    pub fn frame(&mut self, dt: f32) {
        self.world.insert_resource(TimeDelta(dt));
        self.schedule_frame.run(&mut self.world);
    }

    pub fn spawn(&mut self, request: SpawnRequest) -> Option<Entity> {
        spawn_or_reserve(&mut self.world, request)
    }

    pub fn despawn(&mut self, entity: Entity) -> Result<(), StageError> {
        despawn_tracked(&mut self.world, entity)
    }

    /// Bodies without a visual, such as a floor.
    pub fn add_static_body(&mut self, descriptor: &BodyDescriptor) -> BodyId {
        self.world.resource_mut::<PhysicsWorld>().simulator_mut().add_body(descriptor)
    }

    pub fn preload(&mut self, mesh: MeshAsset) {
        self.world.resource_mut::<MeshLibrary>().insert_ready(mesh);
    }

    /// Meshes that pending slots are waiting on and nobody has requested yet.
    pub fn take_load_requests(&mut self) -> Vec<AssetId> {
        self.world.resource_mut::<MeshLibrary>().take_wanted()
    }

    /// Resolves every slot waiting on `asset`. A failed load drops those slots
    /// and the mesh is never requested again. Returns the number of objects spawned.
    pub fn complete_load(&mut self, asset: &AssetId, result: Result<MeshAsset, StageError>) -> usize {
        let slots = self.pending_slots(asset);
        match result {
            Ok(mut mesh) => {
                mesh.id = asset.clone();
                let mesh = self.world.resource_mut::<MeshLibrary>().insert_ready(mesh);
                for (entity, request) in &slots {
                    spawn_resolved(&mut self.world, Some(*entity), request.clone(), &mesh);
                }
                log::debug!("[assets] {asset} ready, {} slot(s) filled", slots.len());
                slots.len()
            }
            Err(err) => {
                log::warn!("[assets] {err}; dropping {} slot(s)", slots.len());
                self.world.resource_mut::<MeshLibrary>().mark_failed(asset);
                for (entity, _) in slots {
                    self.world.despawn(entity);
                }
                self.world.resource_mut::<EventBus>().push(StageEvent::LoadFailed { asset: asset.clone() });
                0
            }
        }
    }

    /// The completion for `asset` arrived while the stage was stopped.
    pub fn discard_load(&mut self, asset: &AssetId) {
        self.world.resource_mut::<MeshLibrary>().forget_in_flight(asset);
        let mut query = self.world.query::<&mut PendingLoad>();
        for mut pending in query.iter_mut(&mut self.world) {
            if pending.request.asset == *asset {
                pending.dropped = true;
            }
        }
        log::debug!("[assets] discarded {asset} for a stopped stage");
        self.world.resource_mut::<EventBus>().push(StageEvent::LoadDiscarded { asset: asset.clone() });
    }

    /// Asks again for every mesh whose completion was discarded. Returns the slot count.
    pub fn reissue_dropped(&mut self) -> usize {
        let mut assets = Vec::new();
        let mut query = self.world.query::<&mut PendingLoad>();
        for mut pending in query.iter_mut(&mut self.world) {
            if pending.dropped {
                pending.dropped = false;
                assets.push(pending.request.asset.clone());
            }
        }
        let mut library = self.world.resource_mut::<MeshLibrary>();
        for asset in &assets {
            library.want(asset);
        }
        assets.len()
    }

    fn pending_slots(&mut self, asset: &AssetId) -> Vec<(Entity, SpawnRequest)> {
        let mut query = self.world.query::<(Entity, &PendingLoad)>();
        query
            .iter(&self.world)
            .filter(|(_, pending)| pending.request.asset == *asset)
            .map(|(entity, pending)| (entity, pending.request.clone()))
            .collect()
    }

    /// Replaces the displayed showcase model, keeping its current orientation.
    pub fn swap_showcase(&mut self, key: &str, asset: AssetId, scale: f32, spin: f32) -> Option<Entity> {
        let mut current: Option<(Entity, String, Visual)> = None;
        let mut query = self.world.query::<(Entity, &ShowcaseModel, &Visual)>();
        if let Some((entity, model, visual)) = query.iter(&self.world).next() {
            current = Some((entity, model.key.clone(), visual.clone()));
        }
        let mut pending = Vec::new();
        let mut query = self.world.query::<(Entity, &PendingLoad)>();
        for (entity, slot) in query.iter(&self.world) {
            if let SlotRole::Showcase { key, .. } = &slot.request.role {
                pending.push((entity, key.clone(), slot.request.clone()));
            }
        }

        let from = current.as_ref().map(|(_, key, _)| key.clone()).or_else(|| pending.first().map(|(_, key, _)| key.clone()));
        if from.as_deref() == Some(key) {
            return None;
        }
        let (position, orientation) = match (&current, pending.first()) {
            (Some((_, _, visual)), _) => (visual.position, visual.orientation),
            (None, Some((_, _, request))) => (request.position, request.orientation),
            (None, None) => Default::default(),
        };
        if let Some((entity, _, _)) = current {
            if let Err(err) = despawn_tracked(&mut self.world, entity) {
                log::debug!("[showcase] previous model already gone: {err}");
            }
        }
        for (entity, _, _) in pending {
            self.world.despawn(entity);
        }

        let request = SpawnRequest { asset, scale, position, orientation, role: SlotRole::Showcase { key: key.to_string(), spin } };
        let spawned = spawn_or_reserve(&mut self.world, request);
        log::info!("[showcase] {} -> {key}", from.as_deref().unwrap_or("-"));
        self.world.resource_mut::<EventBus>().push(StageEvent::ModelSwapped { from, to: key.to_string() });
        spawned
    }

    pub fn showcase_key(&mut self) -> Option<String> {
        let mut query = self.world.query::<&ShowcaseModel>();
        query.iter(&self.world).next().map(|model| model.key.clone())
    }

    /// Live objects of `kind` plus slots reserved for them.
    pub fn population(&mut self, kind: ObjectKind) -> usize {
        let mut live = self.world.query::<&ObjectKind>();
        let spawned = live.iter(&self.world).filter(|k| **k == kind).count();
        let mut slots = self.world.query::<&PendingLoad>();
        let reserved = slots.iter(&self.world).filter(|slot| slot.request.kind() == kind).count();
        spawned + reserved
    }

    pub fn entities_of(&mut self, kind: ObjectKind) -> Vec<Entity> {
        let mut query = self.world.query::<(Entity, &ObjectKind)>();
        let mut out: Vec<Entity> = query.iter(&self.world).filter(|(_, k)| **k == kind).map(|(e, _)| e).collect();
        out.sort();
        out
    }

    pub fn tracked_count(&mut self) -> usize {
        let mut query = self.world.query_filtered::<Entity, With<PhysicsBody>>();
        query.iter(&self.world).count()
    }

    pub fn pending_count(&mut self) -> usize {
        let mut query = self.world.query::<&PendingLoad>();
        query.iter(&self.world).count()
    }

    pub fn visual(&self, entity: Entity) -> Option<&Visual> {
        self.world.get::<Visual>(entity)
    }

    pub fn body_of(&self, entity: Entity) -> Option<BodyId> {
        self.world.get::<PhysicsBody>(entity).map(|body| body.id)
    }

    pub fn entity_for_body(&self, body: BodyId) -> Option<Entity> {
        self.world.resource::<BodyIndex>().entity(body)
    }

    /// Teleports the body; the visual follows on the next sync.
    pub fn set_body_pose(&mut self, entity: Entity, pose: Pose) -> Result<(), StageError> {
        let body = self.body_of(entity).ok_or_else(|| StageError::stale(format!("entity {}", entity.index())))?;
        if self.physics_mut().simulator_mut().set_pose(body, pose) {
            Ok(())
        } else {
            Err(StageError::stale(format!("body {body:?}")))
        }
    }

    pub fn set_recycler(&mut self, recycler: Recycler) {
        self.world.insert_resource(recycler);
    }

    pub fn recycler(&self) -> &Recycler {
        self.world.resource::<Recycler>()
    }

    pub fn set_cut_settings(&mut self, settings: CutSettings) {
        self.world.insert_resource(settings);
    }

    pub fn active_cuts(&mut self) -> Vec<SequenceState> {
        let mut query = self.world.query::<&ActiveCut>();
        query.iter(&self.world).map(|cut| cut.state()).collect()
    }

    pub fn watched_bodies(&self) -> usize {
        self.world.resource::<CutWatcher>().0.len()
    }

    pub fn render_scene(&mut self) -> RenderScene {
        let mut query = self.world.query::<(Entity, &Visual)>();
        let mut nodes: Vec<(Entity, RenderNode)> = query
            .iter(&self.world)
            .map(|(entity, visual)| (entity, RenderNode { mesh: visual.mesh.clone(), model: visual.matrix() }))
            .collect();
        nodes.sort_by_key(|(entity, _)| *entity);
        RenderScene { nodes: nodes.into_iter().map(|(_, node)| node).collect() }
    }

    pub fn drain_events(&mut self) -> Vec<StageEvent> {
        self.world.resource_mut::<EventBus>().drain()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        self.world.resource::<PhysicsWorld>()
    }

    pub fn physics_mut(&mut self) -> bevy_ecs::world::Mut<'_, PhysicsWorld> {
        self.world.resource_mut::<PhysicsWorld>()
    }

    pub fn profiler_summaries(&self) -> Vec<SystemTimingSummary> {
        self.world.resource::<SystemProfiler>().summaries()
    }
}
