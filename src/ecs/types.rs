use crate::assets::AssetId;
use crate::ecs::lifecycle::SpawnRequest;
use crate::ecs::physics::{BodyId, BodyType};
use crate::geometry::Bounds3;
use crate::watcher::SubscriptionHandle;
use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};
use serde::Deserialize;

/// Renderable node: which mesh, where, and the mesh's local bounds.
#[derive(Component, Clone, Debug)]
pub struct Visual {
    pub mesh: AssetId,
    pub local_bounds: Bounds3,
    pub scale: f32,
    pub position: Vec3,
    pub orientation: Quat,
}

impl Visual {
    pub fn new(mesh: AssetId, local_bounds: Bounds3, scale: f32) -> Self {
        Self { mesh, local_bounds, scale, position: Vec3::ZERO, orientation: Quat::IDENTITY }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.orientation, self.position)
    }

    /// Axis-aligned box around the node as currently posed.
    pub fn world_bounds(&self) -> Bounds3 {
        self.local_bounds.transformed(self.matrix())
    }
}

/// Simulator half of a tracked object. Every entity with this component also
/// carries a [`Visual`]; the pair is created and destroyed together.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhysicsBody {
    pub id: BodyId,
}

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Filler,
    Cuttable,
    Crate,
    Blade,
    Prop,
    Half,
}

impl ObjectKind {
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Filler => "filler",
            ObjectKind::Cuttable => "cuttable",
            ObjectKind::Crate => "crate",
            ObjectKind::Blade => "blade",
            ObjectKind::Prop => "prop",
            ObjectKind::Half => "half",
        }
    }
}

/// Orientation is scripted; body sync leaves it alone.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Kinematic;

/// Body type to restore once a blade's swing is over.
#[derive(Component, Clone, Copy, Debug)]
pub struct HeldBodyType(pub BodyType);

/// The entity's body vanished from the simulator; already reported.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct BodyMissing;

#[derive(Component, Clone, Copy, Debug)]
pub struct Spin {
    pub speed: f32,
}

#[derive(Component, Clone, Debug)]
pub struct ShowcaseModel {
    pub key: String,
}

/// Reserved slot waiting on its mesh. Dropped slots lost their completion to a
/// stopped viewport and are re-requested on the next start.
#[derive(Component, Clone, Debug)]
pub struct PendingLoad {
    pub request: SpawnRequest,
    pub dropped: bool,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct CutSubscription {
    pub handle: SubscriptionHandle,
}

/// Its world bounds define the recycling region.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct RegionSource;
