use crate::assets::AssetId;
use crate::ecs::lifecycle::{SlotRole, SpawnRequest, TrackedSpec};
use crate::ecs::ObjectKind;
use crate::ecs::Visual;
use crate::geometry::{random_orientation, Bounds3};
use bevy_ecs::prelude::{Entity, Resource};
use glam::{Quat, Vec3};
use rand::Rng;
use serde::Deserialize;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecyclePolicy {
    /// Recycle objects whose reference point enters the region (the salad pot).
    #[default]
    RemoveInside,
    /// Recycle objects whose reference point leaves the region of interest.
    RemoveOutside,
}

/// One entry of a scene's filler pool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FillerSpec {
    pub asset: AssetId,
    #[serde(default = "FillerSpec::default_scale")]
    pub scale: f32,
    #[serde(default = "FillerSpec::default_count")]
    pub count: usize,
}

impl FillerSpec {
    const fn default_scale() -> f32 {
        1.0
    }

    const fn default_count() -> usize {
        1
    }

    pub fn new(asset: impl Into<AssetId>, scale: f32, count: usize) -> Self {
        Self { asset: asset.into(), scale, count }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecycleVerdict {
    pub remove: Vec<Entity>,
    pub spawn_count: usize,
}

/// Region-of-interest recycling for one stage.
#[derive(Resource, Debug, Clone)]
pub struct Recycler {
    region: Option<Bounds3>,
    policy: RecyclePolicy,
    margin: f32,
    spawn_box: Bounds3,
    pool: Vec<FillerSpec>,
    template: TrackedSpec,
    kinds: SmallVec<[ObjectKind; 2]>,
}

impl Default for Recycler {
    fn default() -> Self {
        Self::new(Bounds3::from_center_half(Vec3::ZERO, Vec3::ZERO), RecyclePolicy::default())
    }
}

impl Recycler {
    pub fn new(spawn_box: Bounds3, policy: RecyclePolicy) -> Self {
        let mut kinds = SmallVec::new();
        kinds.push(ObjectKind::Filler);
        Self { region: None, policy, margin: 1.0, spawn_box, pool: Vec::new(), template: TrackedSpec::filler(), kinds }
    }

    pub fn with_region(mut self, region: Bounds3) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_pool(mut self, pool: Vec<FillerSpec>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_template(mut self, template: TrackedSpec) -> Self {
        self.kinds.clear();
        self.kinds.push(template.kind);
        self.template = template;
        self
    }

    pub fn set_region(&mut self, region: Bounds3) {
        self.region = Some(region);
    }

    pub fn region(&self) -> Option<Bounds3> {
        self.region
    }

    pub fn policy(&self) -> RecyclePolicy {
        self.policy
    }

    pub fn spawn_box(&self) -> Bounds3 {
        self.spawn_box
    }

    pub fn recycles(&self, kind: ObjectKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Upper corner of the current world bounds, lifted by the margin.
    pub fn reference_point(&self, visual: &Visual) -> Vec3 {
        visual.world_bounds().max + Vec3::Y * self.margin
    }

    pub fn qualifies(&self, visual: &Visual, region: &Bounds3) -> bool {
        let inside = region.contains_point(self.reference_point(visual));
        match self.policy {
            RecyclePolicy::RemoveInside => inside,
            RecyclePolicy::RemoveOutside => !inside,
        }
    }

    /// Every qualifying object is removed and replaced once; objects are judged independently.
    pub fn evaluate<'a, I>(&self, objects: I, region: &Bounds3) -> RecycleVerdict
    where
        I: IntoIterator<Item = (Entity, ObjectKind, &'a Visual)>,
    {
        let remove: Vec<Entity> = objects
            .into_iter()
            .filter(|(_, kind, visual)| self.recycles(*kind) && self.qualifies(visual, region))
            .map(|(entity, _, _)| entity)
            .collect();
        let spawn_count = remove.len();
        RecycleVerdict { remove, spawn_count }
    }

    pub fn spawn_placement<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec3, Quat) {
        (self.spawn_box.sample_point(rng), random_orientation(rng))
    }

    /// Replacement for a removed object: a random pool entry, or the removed
    /// object's own mesh when the pool is empty.
    pub fn respawn_request<R: Rng + ?Sized>(&self, rng: &mut R, removed: &Visual) -> SpawnRequest {
        let (asset, scale) = if self.pool.is_empty() {
            (removed.mesh.clone(), removed.scale)
        } else {
            let pick = &self.pool[rng.gen_range(0..self.pool.len())];
            (pick.asset.clone(), pick.scale)
        };
        let (position, orientation) = self.spawn_placement(rng);
        SpawnRequest { asset, scale, position, orientation, role: SlotRole::Tracked(self.template.clone()) }
    }
}
