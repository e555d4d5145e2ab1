use crate::assets::{AssetCatalog, AssetId, AssetSource};
use crate::camera3d::CameraConfig;
use crate::cut::CutSettings;
use crate::ecs::{CutPlan, ShapeRecipe};
use crate::recycler::{FillerSpec, RecyclePolicy};
use crate::scene::{
    CratePlacement, DioramaScene, IngredientPlacement, PropPlacement, SaladScene, SceneBlueprint, ShowcaseEntry,
    ShowcaseScene,
};
use anyhow::{Context, Result};
use glam::Vec3;
use serde::Deserialize;
use std::f32::consts::FRAC_PI_6;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "PhysicsConfig::default_gravity")]
    pub gravity: [f32; 3],
    #[serde(default = "PhysicsConfig::default_fixed_dt")]
    pub fixed_dt: f32,
    #[serde(default = "PhysicsConfig::default_sub_steps")]
    pub sub_steps: u32,
    /// Fixed steps a single frame may run before backlog is dropped.
    #[serde(default = "PhysicsConfig::default_max_catchup_steps")]
    pub max_catchup_steps: u32,
    #[serde(default = "PhysicsConfig::default_seed")]
    pub seed: u64,
}

impl PhysicsConfig {
    const fn default_gravity() -> [f32; 3] {
        [0.0, -9.81, 0.0]
    }

    fn default_fixed_dt() -> f32 {
        1.0 / 60.0
    }

    const fn default_sub_steps() -> u32 {
        2
    }

    const fn default_max_catchup_steps() -> u32 {
        5
    }

    const fn default_seed() -> u64 {
        0x5EED
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Self::default_gravity(),
            fixed_dt: Self::default_fixed_dt(),
            sub_steps: Self::default_sub_steps(),
            max_catchup_steps: Self::default_max_catchup_steps(),
            seed: Self::default_seed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "AssetsConfig::default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub sources: Vec<AssetSource>,
    #[serde(default = "AssetsConfig::default_workers")]
    pub workers: usize,
}

impl AssetsConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("assets")
    }

    const fn default_workers() -> usize {
        2
    }

    pub fn catalog(&self) -> AssetCatalog {
        AssetCatalog::new(self.sources.iter().cloned())
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        let glb = |id: &str, file: &str, extent: [f32; 3]| AssetSource {
            id: AssetId::new(id),
            path: PathBuf::from(file),
            proxy_extent: extent,
        };
        Self {
            root: Self::default_root(),
            workers: Self::default_workers(),
            sources: vec![
                glb("bank", "bank.glb", [0.4, 0.3, 0.4]),
                glb("fast", "fast.glb", [0.4, 0.3, 0.4]),
                glb("security", "padlock.glb", [0.3, 0.4, 0.1]),
                glb("pepper", "pepper.glb", [1.0, 1.2, 1.0]),
                glb("cherry_tomato", "cherry tomato.glb", [1.0, 1.0, 1.0]),
                glb("carrot", "carrot.glb", [0.4, 2.0, 0.4]),
                glb("pepper_cut", "pepper_cut.glb", [1.0, 0.6, 1.0]),
                glb("tomato_cut", "tomato_cut.glb", [4.0, 2.0, 4.0]),
                glb("carrot_cut", "carrot_cut.glb", [1.0, 1.0, 1.0]),
                glb("pot", "pot.glb", [1.2, 0.8, 1.2]),
                glb("crate", "crate.glb", [3.0, 2.0, 3.0]),
                glb("tomato", "tomato.glb", [1.0, 1.0, 1.0]),
                glb("tomato_half", "tomato_half.glb", [1.0, 0.5, 1.0]),
                glb("knife", "knife.glb", [2.0, 0.1, 0.4]),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportConfig {
    pub name: String,
    #[serde(default = "ViewportConfig::default_width")]
    pub width: u32,
    #[serde(default = "ViewportConfig::default_height")]
    pub height: u32,
    /// Viewports sharing a group occupy the same screen region; one runs at a time.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub camera: CameraConfig,
    pub scene: SceneBlueprint,
}

impl ViewportConfig {
    const fn default_width() -> u32 {
        800
    }

    const fn default_height() -> u32 {
        600
    }

    pub fn new(name: impl Into<String>, camera: CameraConfig, scene: SceneBlueprint) -> Self {
        Self {
            name: name.into(),
            width: Self::default_width(),
            height: Self::default_height(),
            group: None,
            camera,
            scene,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default = "StageConfig::default_viewports")]
    pub viewports: Vec<ViewportConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub assets: Option<PathBuf>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsConfig::default(),
            assets: AssetsConfig::default(),
            viewports: Self::default_viewports(),
        }
    }
}

impl StageConfig {
    fn default_viewports() -> Vec<ViewportConfig> {
        let hover_models = vec![
            ShowcaseEntry { key: "bank".into(), asset: AssetId::new("bank"), scale: 15.0 },
            ShowcaseEntry { key: "fast".into(), asset: AssetId::new("fast"), scale: 15.0 },
            ShowcaseEntry { key: "security".into(), asset: AssetId::new("security"), scale: 15.0 },
        ];
        let hover = |initial: &str| {
            SceneBlueprint::Showcase(ShowcaseScene {
                models: hover_models.clone(),
                initial: Some(initial.to_string()),
                spin: 0.004,
                props: Vec::new(),
            })
        };
        let landing = SceneBlueprint::Showcase(ShowcaseScene {
            models: Vec::new(),
            initial: None,
            spin: 0.004,
            props: vec![
                PropPlacement::new("pepper", 2.5, [0.0, 11.0, 0.0]).with_rotation([0.0, 0.0, FRAC_PI_6]).with_spin(0.004),
                PropPlacement::new("cherry_tomato", 0.5, [0.0, 20.0, 0.0])
                    .with_rotation([0.0, 0.0, FRAC_PI_6])
                    .with_spin(0.004),
                PropPlacement::new("carrot", 1.5, [0.0, 0.0, 0.0]).with_rotation([0.0, 0.0, FRAC_PI_6]).with_spin(0.004),
            ],
        });
        let salad = SceneBlueprint::Salad(SaladScene {
            pot: PropPlacement::new("pot", 10.0, [0.0, 0.0, 0.0]),
            fillers: vec![
                FillerSpec::new("pepper_cut", 3.0, 15),
                FillerSpec::new("tomato_cut", 0.25, 5),
                FillerSpec::new("carrot_cut", 0.5, 5),
            ],
            spawn_box: crate::geometry::BoundsConfig::new([-5.0, 10.0, -5.0], [5.0, 60.0, 5.0]),
            respawn_box: crate::geometry::BoundsConfig::new([-5.0, 30.0, -5.0], [5.0, 80.0, 5.0]),
            policy: RecyclePolicy::RemoveInside,
            margin: 1.0,
            mass: 1.0,
            region: None,
        });
        let diorama = SceneBlueprint::Diorama(DioramaScene {
            crates: vec![
                CratePlacement { prop: PropPlacement::new("crate", 1.0, [0.0, 0.0, 0.0]), lid: false, mass: 1.0 },
                CratePlacement { prop: PropPlacement::new("crate", 1.0, [4.0, 0.0, 0.0]), lid: true, mass: 1.0 },
            ],
            ingredients: vec![
                IngredientPlacement {
                    prop: PropPlacement::new("tomato", 1.0, [0.0, 1.5, 0.0]),
                    shape: ShapeRecipe::Sphere,
                    mass: 2.0,
                    cut: Some(CutPlan {
                        halves: [AssetId::new("tomato_half"), AssetId::new("tomato_half")],
                        scale: 1.0,
                        shape: ShapeRecipe::Sphere,
                        mass: 1.0,
                    }),
                },
                IngredientPlacement {
                    prop: PropPlacement::new("carrot", 1.0, [-3.0, 1.5, 0.0]),
                    shape: ShapeRecipe::Cylinder,
                    mass: 2.0,
                    cut: None,
                },
            ],
            blade: PropPlacement::new("knife", 1.0, [0.0, 4.0, 0.0]),
            blade_mass: 1.0,
            floor: Some(0.0),
            cut: CutSettings::default(),
        });

        vec![
            ViewportConfig::new("hover-primary", CameraConfig::looking_at([0.0, 10.0, 20.0], [0.0; 3]), hover("bank"))
                .in_group("hover"),
            ViewportConfig::new("hover-secondary", CameraConfig::looking_at([5.0, 5.0, 5.0], [0.0; 3]), hover("fast"))
                .in_group("hover"),
            ViewportConfig::new("landing", CameraConfig::looking_at([0.0, 10.0, 20.0], [0.0; 3]), landing),
            ViewportConfig::new("salad", CameraConfig::looking_at([25.0, 12.5, 0.0], [0.0, 12.5, 0.0]), salad),
            ViewportConfig::new("diorama", CameraConfig::looking_at([10.0, 15.0, 10.0], [0.0; 3]), diorama),
        ]
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg =
            serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("[config] {err:#}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    /// Width/height apply to every viewport.
    pub fn apply_overrides(&mut self, overrides: &StageConfigOverrides) {
        for viewport in &mut self.viewports {
            if let Some(width) = overrides.width {
                viewport.width = width;
            }
            if let Some(height) = overrides.height {
                viewport.height = height;
            }
        }
        if let Some(root) = &overrides.assets {
            self.assets.root = root.clone();
        }
    }

    pub fn viewport(&self, name: &str) -> Option<&ViewportConfig> {
        self.viewports.iter().find(|v| v.name == name)
    }
}

impl StageConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.assets.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        if self.assets.is_some() {
            fields.push("assets");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_the_five_viewports() {
        let cfg = StageConfig::default();
        let names: Vec<&str> = cfg.viewports.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["hover-primary", "hover-secondary", "landing", "salad", "diorama"]);
        let catalog = cfg.assets.catalog();
        for viewport in &cfg.viewports {
            for asset in viewport.scene.assets() {
                assert!(catalog.get(&asset).is_some(), "{asset} missing from the default catalog");
            }
        }
        assert_eq!(cfg.physics.sub_steps, 2);
    }

    #[test]
    fn load_fills_missing_sections() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "physics": {{ "sub_steps": 4 }},
                 "viewports": [ {{ "name": "solo", "scene": {{ "kind": "showcase" }} }} ] }}"#
        )
        .expect("write config");
        let cfg = StageConfig::load(file.path()).expect("config loads");
        assert_eq!(cfg.physics.sub_steps, 4);
        assert!((cfg.physics.fixed_dt - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(cfg.viewports.len(), 1);
        assert_eq!(cfg.viewport("solo").map(|v| (v.width, v.height)), Some((800, 600)));
        assert!(!cfg.assets.sources.is_empty(), "asset catalog falls back to defaults");
    }

    #[test]
    fn shipped_config_matches_builtin_layout() {
        let shipped = StageConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/stage.json")).expect("shipped config");
        let builtin = StageConfig::default();
        let names = |cfg: &StageConfig| cfg.viewports.iter().map(|v| v.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&shipped), names(&builtin));
        assert_eq!(shipped.assets.sources.len(), builtin.assets.sources.len());
        for (a, b) in shipped.viewports.iter().zip(&builtin.viewports) {
            assert_eq!(a.group, b.group);
            assert_eq!(a.scene.assets(), b.scene.assets(), "{}", a.name);
            assert_eq!(a.camera, b.camera, "{}", a.name);
        }
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = StageConfig::load_or_default("definitely/not/here.json");
        assert_eq!(cfg.viewports.len(), 5);
    }

    #[test]
    fn overrides_resize_every_viewport() {
        let mut cfg = StageConfig::default();
        let overrides = StageConfigOverrides { width: Some(320), height: None, assets: Some(PathBuf::from("/tmp/glb")) };
        cfg.apply_overrides(&overrides);
        assert!(cfg.viewports.iter().all(|v| v.width == 320 && v.height == 600));
        assert_eq!(cfg.assets.root, PathBuf::from("/tmp/glb"));
        assert_eq!(overrides.applied_fields(), vec!["width", "assets"]);
    }
}
