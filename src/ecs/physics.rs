use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use rapier3d::geometry::{CollisionEvent, CollisionEventFlags};
use rapier3d::na::{Isometry3, Quaternion, Translation3, UnitQuaternion};
use rapier3d::pipeline::{ActiveEvents, EventHandler};
use rapier3d::prelude::{
    CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, ContactPair as RapierContactPair, DefaultBroadPhase,
    ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryPipeline, Real, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType, SharedShape, Vector,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Opaque identity of a simulator body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Shape family, fixed when the body is built. Collision filters match on this
/// value instead of inspecting the shape itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Sphere,
    Cylinder,
    Cuboid,
    Compound,
    Blade,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Sphere { radius: f32 },
    Cylinder { radius: f32, half_height: f32 },
    Cuboid { half_extents: Vec3 },
    /// Open box: floor, four walls, optional lid.
    Crate { half_extents: Vec3, wall: f32, lid: bool },
    Blade { half_extents: Vec3 },
}

impl BodyShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            BodyShape::Sphere { .. } => ShapeKind::Sphere,
            BodyShape::Cylinder { .. } => ShapeKind::Cylinder,
            BodyShape::Cuboid { .. } => ShapeKind::Cuboid,
            BodyShape::Crate { .. } => ShapeKind::Compound,
            BodyShape::Blade { .. } => ShapeKind::Blade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    #[default]
    Dynamic,
    Fixed,
    Kinematic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodyDescriptor {
    pub shape: BodyShape,
    pub mass: f32,
    pub body_type: BodyType,
    pub position: Vec3,
    pub orientation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

/// Two bodies that started touching during the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactPair {
    pub a: BodyId,
    pub b: BodyId,
}

impl ContactPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        Self { a, b }
    }

    /// The member that is not `body`, if `body` is part of this pair.
    pub fn partner_of(&self, body: BodyId) -> Option<BodyId> {
        if self.a == body {
            Some(self.b)
        } else if self.b == body {
            Some(self.a)
        } else {
            None
        }
    }
}

/// Rigid-body simulator seam. Gravity is fixed at construction.
pub trait Simulator: Send + Sync {
    fn add_body(&mut self, descriptor: &BodyDescriptor) -> BodyId;
    /// Returns `false` when the body was already gone.
    fn remove_body(&mut self, id: BodyId) -> bool;
    fn step(&mut self, fixed_delta: f32, sub_steps: u32);
    fn drain_collisions(&mut self) -> Vec<ContactPair>;
    fn pose(&self, id: BodyId) -> Option<Pose>;
    fn set_pose(&mut self, id: BodyId, pose: Pose) -> bool;
    fn shape_kind(&self, id: BodyId) -> Option<ShapeKind>;
    fn body_type(&self, id: BodyId) -> Option<BodyType>;
    fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> bool;
    /// Hands the body over to scripted motion.
    fn set_kinematic(&mut self, id: BodyId) -> bool {
        self.set_body_type(id, BodyType::Kinematic)
    }
    fn body_count(&self) -> usize;
}

struct CollisionEventCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl CollisionEventCollector {
    fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    fn drain(&self) -> Vec<CollisionEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }
}

impl EventHandler for CollisionEventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&RapierContactPair>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &RapierContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

struct BodyEntry {
    handle: RigidBodyHandle,
    kind: ShapeKind,
}

pub struct RapierSimulator {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    event_collector: CollisionEventCollector,
    entries: HashMap<BodyId, BodyEntry>,
    collider_bodies: HashMap<ColliderHandle, BodyId>,
    next_id: u64,
}

impl RapierSimulator {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector::new(gravity.x, gravity.y, gravity.z),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            event_collector: CollisionEventCollector::new(),
            entries: HashMap::new(),
            collider_bodies: HashMap::new(),
            next_id: 0,
        }
    }

    fn collider_for(shape: &BodyShape) -> ColliderBuilder {
        match shape {
            BodyShape::Sphere { radius } => ColliderBuilder::ball(radius.max(0.01)),
            BodyShape::Cylinder { radius, half_height } => {
                ColliderBuilder::cylinder(half_height.max(0.01), radius.max(0.01))
            }
            BodyShape::Cuboid { half_extents } | BodyShape::Blade { half_extents } => {
                let h = half_extents.max(Vec3::splat(0.005));
                ColliderBuilder::cuboid(h.x, h.y, h.z)
            }
            BodyShape::Crate { half_extents, wall, lid } => {
                let h = half_extents.max(Vec3::splat(0.05));
                let w = wall.max(0.005);
                let mut parts = vec![
                    (Isometry3::translation(0.0, 0.0, 0.0), SharedShape::cuboid(h.x, w, h.z)),
                    (Isometry3::translation(-h.x, h.y, 0.0), SharedShape::cuboid(w, h.y, h.z)),
                    (Isometry3::translation(h.x, h.y, 0.0), SharedShape::cuboid(w, h.y, h.z)),
                    (Isometry3::translation(0.0, h.y, -h.z), SharedShape::cuboid(h.x, h.y, w)),
                    (Isometry3::translation(0.0, h.y, h.z), SharedShape::cuboid(h.x, h.y, w)),
                ];
                if *lid {
                    parts.push((Isometry3::translation(0.0, h.y * 2.0, 0.0), SharedShape::cuboid(h.x, w, h.z)));
                }
                ColliderBuilder::compound(parts)
            }
        }
    }
}

impl Simulator for RapierSimulator {
    fn add_body(&mut self, descriptor: &BodyDescriptor) -> BodyId {
        let body = RigidBodyBuilder::new(rigid_body_type(descriptor.body_type)).position(to_isometry(descriptor.position, descriptor.orientation)).build();
        let handle = self.bodies.insert(body);
        let mut collider = Self::collider_for(&descriptor.shape)
            .restitution(0.2)
            .friction(0.7)
            .active_events(ActiveEvents::COLLISION_EVENTS);
        if descriptor.body_type == BodyType::Dynamic && descriptor.mass > 0.0 {
            collider = collider.mass(descriptor.mass);
        }
        let collider_handle = self.colliders.insert_with_parent(collider.build(), handle, &mut self.bodies);

        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.entries.insert(id, BodyEntry { handle, kind: descriptor.shape.kind() });
        self.collider_bodies.insert(collider_handle, id);
        id
    }

    fn remove_body(&mut self, id: BodyId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(body) = self.bodies.get(entry.handle) {
            for collider in body.colliders() {
                self.collider_bodies.remove(collider);
            }
        }
        self.bodies
            .remove(
                entry.handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn step(&mut self, fixed_delta: f32, sub_steps: u32) {
        self.integration_parameters.dt = fixed_delta;
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(sub_steps as usize).unwrap_or(NonZeroUsize::MIN);
        let hooks = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &hooks,
            &self.event_collector,
        );
    }

    fn drain_collisions(&mut self) -> Vec<ContactPair> {
        let mut out = Vec::new();
        for event in self.event_collector.drain() {
            let CollisionEvent::Started(a, b, flags) = event else {
                continue;
            };
            if flags.contains(CollisionEventFlags::SENSOR) {
                continue;
            }
            if let (Some(body_a), Some(body_b)) = (self.collider_bodies.get(&a), self.collider_bodies.get(&b)) {
                out.push(ContactPair::new(*body_a, *body_b));
            }
        }
        out
    }

    fn pose(&self, id: BodyId) -> Option<Pose> {
        let entry = self.entries.get(&id)?;
        let body = self.bodies.get(entry.handle)?;
        let t = body.translation();
        let r = body.rotation();
        Some(Pose { position: Vec3::new(t.x, t.y, t.z), orientation: Quat::from_xyzw(r.i, r.j, r.k, r.w) })
    }

    fn set_pose(&mut self, id: BodyId, pose: Pose) -> bool {
        let Some(entry) = self.entries.get(&id) else {
            return false;
        };
        match self.bodies.get_mut(entry.handle) {
            Some(body) => {
                body.set_position(to_isometry(pose.position, pose.orientation), true);
                true
            }
            None => false,
        }
    }

    fn shape_kind(&self, id: BodyId) -> Option<ShapeKind> {
        self.entries.get(&id).map(|entry| entry.kind)
    }

    fn body_type(&self, id: BodyId) -> Option<BodyType> {
        let entry = self.entries.get(&id)?;
        let body = self.bodies.get(entry.handle)?;
        Some(match body.body_type() {
            RigidBodyType::Dynamic => BodyType::Dynamic,
            RigidBodyType::Fixed => BodyType::Fixed,
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => BodyType::Kinematic,
        })
    }

    fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> bool {
        let Some(entry) = self.entries.get(&id) else {
            return false;
        };
        match self.bodies.get_mut(entry.handle) {
            Some(body) => {
                body.set_body_type(rigid_body_type(body_type), true);
                true
            }
            None => false,
        }
    }

    fn body_count(&self) -> usize {
        self.entries.len()
    }
}

fn rigid_body_type(body_type: BodyType) -> RigidBodyType {
    match body_type {
        BodyType::Dynamic => RigidBodyType::Dynamic,
        BodyType::Fixed => RigidBodyType::Fixed,
        BodyType::Kinematic => RigidBodyType::KinematicPositionBased,
    }
}

fn to_isometry(position: Vec3, orientation: Quat) -> Isometry3<Real> {
    let q = orientation.normalize();
    Isometry3::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z)),
    )
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct StepSettings {
    pub fixed_dt: f32,
    pub sub_steps: u32,
}

impl Default for StepSettings {
    fn default() -> Self {
        Self { fixed_dt: 1.0 / 60.0, sub_steps: 1 }
    }
}

/// Owns the simulator for one stage along with the contacts produced by the
/// most recent step.
#[derive(Resource)]
pub struct PhysicsWorld {
    simulator: Box<dyn Simulator>,
    contacts: Vec<ContactPair>,
}

impl PhysicsWorld {
    pub fn new(simulator: Box<dyn Simulator>) -> Self {
        Self { simulator, contacts: Vec::new() }
    }

    pub fn step(&mut self, settings: StepSettings) {
        self.simulator.step(settings.fixed_dt, settings.sub_steps);
        let fresh = self.simulator.drain_collisions();
        self.contacts.extend(fresh);
    }

    pub fn take_contacts(&mut self) -> Vec<ContactPair> {
        std::mem::take(&mut self.contacts)
    }

    pub fn simulator(&self) -> &dyn Simulator {
        self.simulator.as_ref()
    }

    pub fn simulator_mut(&mut self) -> &mut dyn Simulator {
        self.simulator.as_mut()
    }
}

/// Reverse lookup from simulator body to the entity that owns it.
#[derive(Resource, Default, Debug)]
pub struct BodyIndex {
    entities: HashMap<BodyId, Entity>,
}

impl BodyIndex {
    pub fn insert(&mut self, body: BodyId, entity: Entity) {
        self.entities.insert(body, entity);
    }

    pub fn remove(&mut self, body: BodyId) -> Option<Entity> {
        self.entities.remove(&body)
    }

    pub fn entity(&self, body: BodyId) -> Option<Entity> {
        self.entities.get(&body).copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball_at(y: f32) -> BodyDescriptor {
        BodyDescriptor {
            shape: BodyShape::Sphere { radius: 0.5 },
            mass: 1.0,
            body_type: BodyType::Dynamic,
            position: Vec3::new(0.0, y, 0.0),
            orientation: Quat::IDENTITY,
        }
    }

    #[test]
    fn dynamic_bodies_fall_under_gravity() {
        let mut sim = RapierSimulator::new(Vec3::new(0.0, -9.81, 0.0));
        let id = sim.add_body(&ball_at(10.0));
        for _ in 0..30 {
            sim.step(1.0 / 60.0, 2);
        }
        let pose = sim.pose(id).expect("body alive");
        assert!(pose.position.y < 10.0, "ball should have fallen, y={}", pose.position.y);
        assert_eq!(sim.shape_kind(id), Some(ShapeKind::Sphere));
    }

    #[test]
    fn removal_is_idempotent() {
        let mut sim = RapierSimulator::new(Vec3::ZERO);
        let id = sim.add_body(&ball_at(0.0));
        assert_eq!(sim.body_count(), 1);
        assert!(sim.remove_body(id));
        assert!(!sim.remove_body(id));
        assert!(sim.pose(id).is_none());
        assert_eq!(sim.body_count(), 0);
    }

    #[test]
    fn kinematic_bodies_ignore_gravity() {
        let mut sim = RapierSimulator::new(Vec3::new(0.0, -9.81, 0.0));
        let id = sim.add_body(&BodyDescriptor {
            shape: BodyShape::Blade { half_extents: Vec3::new(1.0, 0.05, 0.2) },
            ..ball_at(4.0)
        });
        assert!(sim.set_kinematic(id));
        for _ in 0..10 {
            sim.step(1.0 / 60.0, 1);
        }
        let pose = sim.pose(id).expect("blade alive");
        assert!((pose.position.y - 4.0).abs() < 1e-5);
        assert_eq!(sim.shape_kind(id), Some(ShapeKind::Blade));
    }

    #[test]
    fn sub_steps_drive_the_solver_not_the_pipeline() {
        let mut sim = RapierSimulator::new(Vec3::new(0.0, -9.81, 0.0));
        sim.add_body(&ball_at(10.0));
        sim.step(1.0 / 60.0, 4);
        assert_eq!(sim.integration_parameters.num_solver_iterations.get(), 4);
        assert!((sim.integration_parameters.dt - 1.0 / 60.0).abs() < 1e-7);
        sim.step(1.0 / 60.0, 0);
        assert_eq!(sim.integration_parameters.num_solver_iterations.get(), 1);
    }

    #[test]
    fn body_type_round_trips_through_the_blade_handover() {
        let mut sim = RapierSimulator::new(Vec3::new(0.0, -9.81, 0.0));
        let id = sim.add_body(&ball_at(4.0));
        assert_eq!(sim.body_type(id), Some(BodyType::Dynamic));
        assert!(sim.set_kinematic(id));
        assert_eq!(sim.body_type(id), Some(BodyType::Kinematic));
        assert!(sim.set_body_type(id, BodyType::Dynamic));
        for _ in 0..10 {
            sim.step(1.0 / 60.0, 1);
        }
        assert!(sim.pose(id).expect("body alive").position.y < 4.0);
        assert!(!sim.set_body_type(BodyId(99), BodyType::Fixed));
    }

    #[test]
    fn overlapping_bodies_report_a_started_contact() {
        let mut sim = RapierSimulator::new(Vec3::ZERO);
        let a = sim.add_body(&ball_at(0.0));
        let b = sim.add_body(&ball_at(0.6));
        sim.step(1.0 / 60.0, 1);
        let contacts = sim.drain_collisions();
        assert!(contacts.iter().any(|pair| pair.partner_of(a) == Some(b)), "contacts: {contacts:?}");
        assert!(sim.drain_collisions().is_empty());
    }

    #[test]
    fn partner_lookup_is_symmetric() {
        let pair = ContactPair::new(BodyId(1), BodyId(2));
        assert_eq!(pair.partner_of(BodyId(1)), Some(BodyId(2)));
        assert_eq!(pair.partner_of(BodyId(2)), Some(BodyId(1)));
        assert_eq!(pair.partner_of(BodyId(3)), None);
    }
}
