use crate::assets::AssetId;
use crate::cut::CutSettings;
use crate::ecs::{BodyDescriptor, BodyShape, BodyType, CutPlan, ObjectKind, ShapeRecipe, SlotRole, SpawnRequest, StageWorld, TrackedSpec};
use crate::error::StageError;
use crate::geometry::{random_orientation, Bounds3, BoundsConfig};
use crate::recycler::{FillerSpec, RecyclePolicy, Recycler};
use glam::{EulerRot, Quat, Vec3};
use serde::Deserialize;

/// Scene content for one viewport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneBlueprint {
    Showcase(ShowcaseScene),
    Salad(SaladScene),
    Diorama(DioramaScene),
}

impl SceneBlueprint {
    pub fn label(&self) -> &'static str {
        match self {
            SceneBlueprint::Showcase(_) => "showcase",
            SceneBlueprint::Salad(_) => "salad",
            SceneBlueprint::Diorama(_) => "diorama",
        }
    }

    /// Every asset the scene may ask for.
    pub fn assets(&self) -> Vec<AssetId> {
        let mut out = Vec::new();
        match self {
            SceneBlueprint::Showcase(scene) => {
                out.extend(scene.models.iter().map(|m| m.asset.clone()));
                out.extend(scene.props.iter().map(|p| p.asset.clone()));
            }
            SceneBlueprint::Salad(scene) => {
                out.push(scene.pot.asset.clone());
                out.extend(scene.fillers.iter().map(|f| f.asset.clone()));
            }
            SceneBlueprint::Diorama(scene) => {
                out.extend(scene.crates.iter().map(|c| c.prop.asset.clone()));
                for ingredient in &scene.ingredients {
                    out.push(ingredient.prop.asset.clone());
                    if let Some(plan) = &ingredient.cut {
                        out.extend(plan.halves.iter().cloned());
                    }
                }
                out.push(scene.blade.asset.clone());
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Queues every object of the scene. Objects whose meshes are not cached yet
    /// become pending slots.
    pub fn install(&self, stage: &mut StageWorld) {
        match self {
            SceneBlueprint::Showcase(scene) => scene.install(stage),
            SceneBlueprint::Salad(scene) => scene.install(stage),
            SceneBlueprint::Diorama(scene) => scene.install(stage),
        }
        log::info!("[scene] installed {} ({} pending)", self.label(), stage.pending_count());
    }

    pub fn swap_model(&self, stage: &mut StageWorld, key: &str) -> Result<(), StageError> {
        let SceneBlueprint::Showcase(scene) = self else {
            return Err(StageError::UnknownAsset(format!("{key} (scene {} has no models)", self.label())));
        };
        let entry = scene.entry(key)?;
        stage.swap_showcase(key, entry.asset.clone(), entry.scale, scene.spin);
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropPlacement {
    pub asset: AssetId,
    #[serde(default = "PropPlacement::default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler XYZ, radians.
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default)]
    pub spin: f32,
}

impl PropPlacement {
    const fn default_scale() -> f32 {
        1.0
    }

    pub fn new(asset: impl Into<AssetId>, scale: f32, position: [f32; 3]) -> Self {
        Self { asset: asset.into(), scale, position, rotation: [0.0; 3], spin: 0.0 }
    }

    pub fn with_rotation(mut self, rotation: [f32; 3]) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_spin(mut self, spin: f32) -> Self {
        self.spin = spin;
        self
    }

    pub fn orientation(&self) -> Quat {
        let [x, y, z] = self.rotation;
        Quat::from_euler(EulerRot::XYZ, x, y, z)
    }

    fn request(&self, role: SlotRole) -> SpawnRequest {
        SpawnRequest {
            asset: self.asset.clone(),
            scale: self.scale,
            position: Vec3::from_array(self.position),
            orientation: self.orientation(),
            role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowcaseEntry {
    pub key: String,
    pub asset: AssetId,
    #[serde(default = "PropPlacement::default_scale")]
    pub scale: f32,
}

/// Display-only models, slowly spinning. `models` are swappable by key.
#[derive(Debug, Clone, Deserialize)]
pub struct ShowcaseScene {
    #[serde(default)]
    pub models: Vec<ShowcaseEntry>,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default = "ShowcaseScene::default_spin")]
    pub spin: f32,
    #[serde(default)]
    pub props: Vec<PropPlacement>,
}

impl ShowcaseScene {
    const fn default_spin() -> f32 {
        0.004
    }

    pub fn entry(&self, key: &str) -> Result<&ShowcaseEntry, StageError> {
        self.models.iter().find(|m| m.key == key).ok_or_else(|| StageError::UnknownAsset(key.to_string()))
    }

    fn install(&self, stage: &mut StageWorld) {
        for prop in &self.props {
            stage.spawn(prop.request(SlotRole::Display { kind: ObjectKind::Prop, spin: prop.spin }));
        }
        let initial = self.initial.as_deref().or_else(|| self.models.first().map(|m| m.key.as_str()));
        if let Some(entry) = initial.and_then(|key| self.entry(key).ok()) {
            stage.swap_showcase(&entry.key, entry.asset.clone(), entry.scale, self.spin);
        }
    }
}

/// Falling fillers recycled once they drop into the pot.
#[derive(Debug, Clone, Deserialize)]
pub struct SaladScene {
    pub pot: PropPlacement,
    pub fillers: Vec<FillerSpec>,
    #[serde(default = "SaladScene::default_spawn_box")]
    pub spawn_box: BoundsConfig,
    #[serde(default = "SaladScene::default_respawn_box")]
    pub respawn_box: BoundsConfig,
    #[serde(default)]
    pub policy: RecyclePolicy,
    #[serde(default = "SaladScene::default_margin")]
    pub margin: f32,
    #[serde(default = "SaladScene::default_mass")]
    pub mass: f32,
    /// Fixed region; when absent the pot's world bounds are used once loaded.
    #[serde(default)]
    pub region: Option<BoundsConfig>,
}

impl SaladScene {
    const fn default_spawn_box() -> BoundsConfig {
        BoundsConfig::new([-5.0, 10.0, -5.0], [5.0, 60.0, 5.0])
    }

    const fn default_respawn_box() -> BoundsConfig {
        BoundsConfig::new([-5.0, 30.0, -5.0], [5.0, 80.0, 5.0])
    }

    const fn default_margin() -> f32 {
        1.0
    }

    const fn default_mass() -> f32 {
        1.0
    }

    fn filler_spec(&self) -> TrackedSpec {
        TrackedSpec { mass: self.mass, ..TrackedSpec::filler() }
    }

    fn install(&self, stage: &mut StageWorld) {
        let mut recycler = Recycler::new(self.respawn_box.into(), self.policy)
            .with_margin(self.margin)
            .with_pool(self.fillers.clone())
            .with_template(self.filler_spec());
        let pot_role = match self.region {
            Some(region) => {
                recycler = recycler.with_region(region.into());
                SlotRole::Display { kind: ObjectKind::Prop, spin: self.pot.spin }
            }
            None => SlotRole::RegionSource,
        };
        stage.set_recycler(recycler);
        stage.spawn(self.pot.request(pot_role));

        let spawn_box: Bounds3 = self.spawn_box.into();
        let placements = {
            let mut rng = stage.world.resource_mut::<crate::ecs::systems::StageRng>();
            let mut out = Vec::new();
            for filler in &self.fillers {
                for _ in 0..filler.count {
                    out.push((filler.clone(), spawn_box.sample_point(&mut rng.0), random_orientation(&mut rng.0)));
                }
            }
            out
        };
        for (filler, position, orientation) in placements {
            stage.spawn(SpawnRequest::tracked(filler.asset, filler.scale, position, orientation, self.filler_spec()));
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CratePlacement {
    #[serde(flatten)]
    pub prop: PropPlacement,
    #[serde(default)]
    pub lid: bool,
    #[serde(default = "CratePlacement::default_mass")]
    pub mass: f32,
}

impl CratePlacement {
    const fn default_mass() -> f32 {
        1.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientPlacement {
    #[serde(flatten)]
    pub prop: PropPlacement,
    #[serde(default = "IngredientPlacement::default_shape")]
    pub shape: ShapeRecipe,
    #[serde(default = "IngredientPlacement::default_mass")]
    pub mass: f32,
    #[serde(default)]
    pub cut: Option<CutPlan>,
}

impl IngredientPlacement {
    const fn default_shape() -> ShapeRecipe {
        ShapeRecipe::Sphere
    }

    const fn default_mass() -> f32 {
        2.0
    }
}

/// Crates, ingredients and a blade; cuttable ingredients split on blade contact.
#[derive(Debug, Clone, Deserialize)]
pub struct DioramaScene {
    #[serde(default)]
    pub crates: Vec<CratePlacement>,
    #[serde(default)]
    pub ingredients: Vec<IngredientPlacement>,
    pub blade: PropPlacement,
    #[serde(default = "DioramaScene::default_blade_mass")]
    pub blade_mass: f32,
    /// Height of a static floor slab, if any.
    #[serde(default)]
    pub floor: Option<f32>,
    #[serde(default)]
    pub cut: CutSettings,
}

impl DioramaScene {
    const fn default_blade_mass() -> f32 {
        1.0
    }

    fn install(&self, stage: &mut StageWorld) {
        stage.set_cut_settings(self.cut);
        if let Some(y) = self.floor {
            stage.add_static_body(&BodyDescriptor {
                shape: BodyShape::Cuboid { half_extents: Vec3::new(50.0, 0.5, 50.0) },
                mass: 0.0,
                body_type: BodyType::Fixed,
                position: Vec3::new(0.0, y - 0.5, 0.0),
                orientation: Quat::IDENTITY,
            });
        }
        for placement in &self.crates {
            let spec = TrackedSpec {
                kind: ObjectKind::Crate,
                shape: ShapeRecipe::Crate { lid: placement.lid, wall: 0.05, inset: 0.5 },
                mass: placement.mass,
                body_type: BodyType::Dynamic,
                cut: None,
            };
            stage.spawn(placement.prop.request(SlotRole::Tracked(spec)));
        }
        for ingredient in &self.ingredients {
            let kind = if ingredient.cut.is_some() { ObjectKind::Cuttable } else { ObjectKind::Prop };
            let spec = TrackedSpec {
                kind,
                shape: ingredient.shape,
                mass: ingredient.mass,
                body_type: BodyType::Dynamic,
                cut: ingredient.cut.clone(),
            };
            stage.spawn(ingredient.prop.request(SlotRole::Tracked(spec)));
        }
        let blade = TrackedSpec {
            kind: ObjectKind::Blade,
            shape: ShapeRecipe::Blade,
            mass: self.blade_mass,
            body_type: BodyType::Dynamic,
            cut: None,
        };
        stage.spawn(self.blade.request(SlotRole::Tracked(blade)));
    }
}
