use super::physics::{BodyDescriptor, BodyIndex, BodyShape, BodyType, PhysicsWorld};
use super::systems::{CutRequests, CutTrigger, CutWatcher};
use super::types::*;
use crate::assets::{AssetId, MeshLibrary, MeshState};
use crate::error::StageError;
use crate::events::{EventBus, StageEvent};
use crate::mesh::{MeshAsset, MeshBounds};
use crate::recycler::Recycler;
use crate::watcher::CollisionMatch;
use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use serde::Deserialize;

/// How a body shape is derived from a mesh's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeRecipe {
    /// Sphere enclosing the whole mesh.
    BoundingSphere,
    /// Sphere of half the smallest extent.
    Sphere,
    /// Radius from the x extent, height from y.
    Cylinder,
    Cuboid,
    /// Thin-walled open box, walls pulled in by `inset`.
    Crate {
        #[serde(default)]
        lid: bool,
        #[serde(default = "ShapeRecipe::default_wall")]
        wall: f32,
        #[serde(default = "ShapeRecipe::default_inset")]
        inset: f32,
    },
    Blade,
}

impl ShapeRecipe {
    const fn default_wall() -> f32 {
        0.05
    }

    const fn default_inset() -> f32 {
        0.5
    }

    pub fn build(&self, bounds: &MeshBounds, scale: f32) -> BodyShape {
        let size = bounds.size() * scale;
        match *self {
            ShapeRecipe::BoundingSphere => BodyShape::Sphere { radius: bounds.radius * scale },
            ShapeRecipe::Sphere => BodyShape::Sphere { radius: size.min_element() * 0.5 },
            ShapeRecipe::Cylinder => BodyShape::Cylinder { radius: size.x * 0.5, half_height: size.y * 0.5 },
            ShapeRecipe::Cuboid => BodyShape::Cuboid { half_extents: size * 0.5 },
            ShapeRecipe::Crate { lid, wall, inset } => BodyShape::Crate {
                half_extents: (size * 0.5 - Vec3::splat(inset)).max(Vec3::splat(wall)),
                wall,
                lid,
            },
            ShapeRecipe::Blade => BodyShape::Blade { half_extents: size * 0.5 },
        }
    }
}

/// What a cuttable object turns into.
#[derive(Component, Debug, Clone, PartialEq, Deserialize)]
pub struct CutPlan {
    pub halves: [AssetId; 2],
    #[serde(default = "CutPlan::default_scale")]
    pub scale: f32,
    #[serde(default = "CutPlan::default_shape")]
    pub shape: ShapeRecipe,
    #[serde(default = "CutPlan::default_mass")]
    pub mass: f32,
}

impl CutPlan {
    const fn default_scale() -> f32 {
        1.0
    }

    const fn default_shape() -> ShapeRecipe {
        ShapeRecipe::Sphere
    }

    const fn default_mass() -> f32 {
        1.0
    }

    pub fn half_spec(&self) -> TrackedSpec {
        TrackedSpec { kind: ObjectKind::Half, shape: self.shape, mass: self.mass, body_type: BodyType::Dynamic, cut: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSpec {
    pub kind: ObjectKind,
    pub shape: ShapeRecipe,
    pub mass: f32,
    pub body_type: BodyType,
    pub cut: Option<CutPlan>,
}

impl TrackedSpec {
    pub fn filler() -> Self {
        Self { kind: ObjectKind::Filler, shape: ShapeRecipe::BoundingSphere, mass: 1.0, body_type: BodyType::Dynamic, cut: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotRole {
    /// Visual plus simulator body.
    Tracked(TrackedSpec),
    /// Visual only, optionally spinning about Y.
    Display { kind: ObjectKind, spin: f32 },
    /// Visual only; its world bounds become the recycling region.
    RegionSource,
    Showcase { key: String, spin: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub asset: AssetId,
    pub scale: f32,
    pub position: Vec3,
    pub orientation: Quat,
    pub role: SlotRole,
}

impl SpawnRequest {
    pub fn tracked(asset: impl Into<AssetId>, scale: f32, position: Vec3, orientation: Quat, spec: TrackedSpec) -> Self {
        Self { asset: asset.into(), scale, position, orientation, role: SlotRole::Tracked(spec) }
    }

    pub fn kind(&self) -> ObjectKind {
        match &self.role {
            SlotRole::Tracked(spec) => spec.kind,
            SlotRole::Display { kind, .. } => *kind,
            SlotRole::RegionSource | SlotRole::Showcase { .. } => ObjectKind::Prop,
        }
    }
}

/// Despawns and spawns requested by systems, applied together by [`apply_lifecycle`].
#[derive(Resource, Default)]
pub struct LifecycleQueue {
    despawn: Vec<Entity>,
    spawn: Vec<SpawnRequest>,
}

impl LifecycleQueue {
    pub fn despawn(&mut self, entity: Entity) {
        self.despawn.push(entity);
    }

    pub fn spawn(&mut self, request: SpawnRequest) {
        self.spawn.push(request);
    }

    pub fn is_empty(&self) -> bool {
        self.despawn.is_empty() && self.spawn.is_empty()
    }
}

pub fn apply_lifecycle(world: &mut World) {
    let (despawn, spawn) = {
        let mut queue = world.resource_mut::<LifecycleQueue>();
        if queue.is_empty() {
            return;
        }
        (std::mem::take(&mut queue.despawn), std::mem::take(&mut queue.spawn))
    };
    for entity in despawn {
        if let Err(err) = despawn_tracked(world, entity) {
            log::debug!("[lifecycle] queued despawn skipped: {err}");
        }
    }
    for request in spawn {
        spawn_or_reserve(world, request);
    }
}

/// Removes an object's visual and body together. Unknown entities are
/// reported as stale and otherwise ignored.
pub fn despawn_tracked(world: &mut World, entity: Entity) -> Result<(), StageError> {
    if !world.entities().contains(entity) {
        return Err(StageError::stale(format!("entity {}", entity.index())));
    }
    let body = world.get::<PhysicsBody>(entity).copied();
    let kind = world.get::<ObjectKind>(entity).copied();
    let subscription = world.get::<CutSubscription>(entity).copied();

    if let Some(body) = body {
        if !world.resource_mut::<PhysicsWorld>().simulator_mut().remove_body(body.id) {
            log::warn!("[lifecycle] body {:?} of entity {} was already gone", body.id, entity.index());
        }
        world.resource_mut::<BodyIndex>().remove(body.id);
    }
    if let Some(subscription) = subscription {
        world.resource_mut::<CutWatcher>().0.unsubscribe(subscription.handle);
    }
    world.despawn(entity);
    if let Some(kind) = kind {
        world.resource_mut::<EventBus>().push(StageEvent::ObjectDespawned { entity, kind });
    }
    Ok(())
}

/// Spawns right away when the mesh is cached, otherwise reserves a pending
/// slot and asks for the mesh. Returns `None` for meshes known to fail.
pub fn spawn_or_reserve(world: &mut World, request: SpawnRequest) -> Option<Entity> {
    let state = world.resource::<MeshLibrary>().state(&request.asset);
    match state {
        MeshState::Ready(mesh) => Some(spawn_resolved(world, None, request, &mesh)),
        MeshState::Failed => {
            log::warn!("[lifecycle] skipping {}: mesh failed to load", request.asset);
            None
        }
        MeshState::Loading | MeshState::Unrequested => {
            world.resource_mut::<MeshLibrary>().want(&request.asset);
            let asset = request.asset.clone();
            let entity = world.spawn(PendingLoad { request, dropped: false }).id();
            world.resource_mut::<EventBus>().push(StageEvent::SlotReserved { entity, asset });
            Some(entity)
        }
    }
}

/// Populates `slot` (or a fresh entity) from a resolved mesh.
pub fn spawn_resolved(world: &mut World, slot: Option<Entity>, request: SpawnRequest, mesh: &MeshAsset) -> Entity {
    let entity = match slot {
        Some(entity) if world.entities().contains(entity) => {
            world.entity_mut(entity).remove::<PendingLoad>();
            entity
        }
        _ => world.spawn_empty().id(),
    };
    let mut visual = Visual::new(request.asset.clone(), mesh.bounds.aabb(), request.scale);
    visual.position = request.position;
    visual.orientation = request.orientation;

    let kind = request.kind();
    match request.role {
        SlotRole::Tracked(spec) => attach_body(world, entity, visual, spec, &mesh.bounds),
        SlotRole::Display { kind, spin } => {
            let mut node = world.entity_mut(entity);
            node.insert((visual, kind));
            if spin != 0.0 {
                node.insert(Spin { speed: spin });
            }
        }
        SlotRole::RegionSource => {
            let region = visual.world_bounds();
            world.resource_mut::<Recycler>().set_region(region);
            world.entity_mut(entity).insert((visual, ObjectKind::Prop, RegionSource));
            world.resource_mut::<EventBus>().push(StageEvent::RegionResolved { asset: request.asset });
            log::info!("[recycle] region resolved: {:?}..{:?}", region.min, region.max);
        }
        SlotRole::Showcase { key, spin } => {
            world.entity_mut(entity).insert((visual, ObjectKind::Prop, ShowcaseModel { key }, Spin { speed: spin }));
        }
    }
    world.resource_mut::<EventBus>().push(StageEvent::ObjectSpawned { entity, kind });
    entity
}

fn attach_body(world: &mut World, entity: Entity, visual: Visual, spec: TrackedSpec, bounds: &MeshBounds) {
    let descriptor = BodyDescriptor {
        shape: spec.shape.build(bounds, visual.scale),
        mass: spec.mass,
        body_type: spec.body_type,
        position: visual.position,
        orientation: visual.orientation,
    };
    let body = world.resource_mut::<PhysicsWorld>().simulator_mut().add_body(&descriptor);
    world.resource_mut::<BodyIndex>().insert(body, entity);
    world.entity_mut(entity).insert((visual, PhysicsBody { id: body }, spec.kind));

    if let Some(plan) = spec.cut {
        let handle = world.resource_mut::<CutWatcher>().0.subscribe(
            body,
            Box::new(move |hit: &CollisionMatch, requests: &mut CutRequests| {
                requests.push(CutTrigger { target: entity, blade: hit.blade });
            }),
        );
        world.entity_mut(entity).insert((plan, CutSubscription { handle }));
    }
}
