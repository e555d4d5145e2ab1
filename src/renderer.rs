use crate::assets::AssetId;
use crate::camera3d::Camera3D;
use crate::error::StageError;
use glam::Mat4;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub mesh: AssetId,
    pub model: Mat4,
}

/// Snapshot of a stage's visuals, in entity order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderScene {
    pub nodes: Vec<RenderNode>,
}

impl RenderScene {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub nodes: usize,
    pub visible: usize,
}

pub trait Renderer {
    fn render(&mut self, scene: &RenderScene, camera: &Camera3D);
    fn resize(&mut self, width: u32, height: u32);
    fn size(&self) -> (u32, u32);
    fn stats(&self) -> RenderStats {
        RenderStats::default()
    }
}

/// Counts what would be drawn. Used by the demo binary and tests.
#[derive(Debug)]
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    stats: RenderStats,
}

impl HeadlessRenderer {
    pub fn new(viewport: &str, width: u32, height: u32) -> Result<Self, StageError> {
        if width == 0 || height == 0 {
            return Err(StageError::DimensionFailure { viewport: viewport.to_string(), width, height });
        }
        Ok(Self { width, height, stats: RenderStats::default() })
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, scene: &RenderScene, camera: &Camera3D) {
        let visible = scene.nodes.iter().filter(|node| camera.sees(node.model.w_axis.truncate())).count();
        self.stats = RenderStats { frames: self.stats.frames + 1, nodes: scene.len(), visible };
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("[render] ignoring zero-extent resize {width}x{height}");
            return;
        }
        self.width = width;
        self.height = height;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stats(&self) -> RenderStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera3d::CameraConfig;
    use glam::Vec3;

    #[test]
    fn zero_extent_targets_are_rejected() {
        let err = HeadlessRenderer::new("salad", 0, 480).unwrap_err();
        assert!(matches!(err, StageError::DimensionFailure { width: 0, height: 480, .. }));
    }

    #[test]
    fn render_counts_visible_nodes() {
        let mut renderer = HeadlessRenderer::new("landing", 640, 480).expect("renderer");
        let camera = CameraConfig::default().build(640, 480);
        let scene = RenderScene {
            nodes: vec![
                RenderNode { mesh: AssetId::new("pepper"), model: Mat4::from_translation(Vec3::new(0.0, 11.0, 0.0)) },
                RenderNode { mesh: AssetId::new("carrot"), model: Mat4::from_translation(Vec3::new(0.0, 0.0, 500.0)) },
            ],
        };
        renderer.render(&scene, &camera);
        assert_eq!(renderer.stats(), RenderStats { frames: 1, nodes: 2, visible: 1 });
        renderer.resize(0, 0);
        assert_eq!(renderer.size(), (640, 480));
    }
}
