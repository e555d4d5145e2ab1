use crate::assets::AssetId;
use crate::geometry::Bounds3;
use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use gltf::mesh::Mode;
use std::path::Path;

/// Geometry summary of a loaded model. The orchestrator only needs extents:
/// body shapes and recycling reference points are both derived from them.
#[derive(Clone, Debug)]
pub struct MeshAsset {
    pub id: AssetId,
    pub bounds: MeshBounds,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

impl MeshBounds {
    pub fn from_positions(positions: &[Vec3]) -> Self {
        let Some(aabb) = Bounds3::from_points(positions.iter().copied()) else {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        };
        let center = aabb.center();
        let radius = positions.iter().fold(0.0f32, |r, p| r.max((*p - center).length()));
        MeshBounds { min: aabb.min, max: aabb.max, center, radius }
    }

    pub fn from_extent(extent: Vec3) -> Self {
        let half = extent.abs() * 0.5;
        MeshBounds { min: -half, max: half, center: Vec3::ZERO, radius: half.length() }
    }

    pub fn aabb(&self) -> Bounds3 {
        Bounds3::new(self.min, self.max)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

impl MeshAsset {
    /// Box stand-in used when a model file is unavailable.
    pub fn proxy_box(id: AssetId, extent: Vec3) -> Self {
        Self { id, bounds: MeshBounds::from_extent(extent), vertex_count: 8, triangle_count: 12 }
    }

    /// Reads every triangle primitive of every mesh in the document and merges their extents.
    pub fn load_gltf(id: AssetId, path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let (document, buffers, _images) = gltf::import(path_ref)
            .with_context(|| format!("Failed to import glTF from {}", path_ref.display()))?;

        let mut positions: Vec<Vec3> = Vec::new();
        let mut triangle_count = 0usize;
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                if primitive.mode() != Mode::Triangles {
                    continue;
                }
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
                let Some(read) = reader.read_positions() else {
                    continue;
                };
                let start = positions.len();
                positions.extend(read.map(Vec3::from_array));
                let added = positions.len() - start;
                triangle_count += match reader.read_indices() {
                    Some(indices) => indices.into_u32().count() / 3,
                    None => added / 3,
                };
            }
        }
        if positions.is_empty() {
            return Err(anyhow!("No triangle geometry found in {}", path_ref.display()));
        }
        Ok(Self { id, bounds: MeshBounds::from_positions(&positions), vertex_count: positions.len(), triangle_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "buffers": [{
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAEAAAAAA"
        }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 2.0, 0.0]
        }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "nodes": [{ "mesh": 0 }],
        "scenes": [{ "nodes": [0] }],
        "scene": 0
    }"#;

    #[test]
    fn gltf_import_merges_positions_into_bounds() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("triangle.gltf");
        let mut file = std::fs::File::create(&path).expect("create gltf");
        file.write_all(TRIANGLE_GLTF.as_bytes()).expect("write gltf");

        let mesh = MeshAsset::load_gltf(AssetId::new("triangle"), &path).expect("triangle loads");
        assert_eq!(mesh.vertex_count, 3);
        assert_eq!(mesh.triangle_count, 1);
        assert_eq!(mesh.bounds.min, Vec3::ZERO);
        assert_eq!(mesh.bounds.max, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(mesh.bounds.center, Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = MeshAsset::load_gltf(AssetId::new("nope"), "does/not/exist.glb").unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.glb"));
    }

    #[test]
    fn proxy_box_is_centered() {
        let mesh = MeshAsset::proxy_box(AssetId::new("crate"), Vec3::new(2.0, 1.0, 4.0));
        assert_eq!(mesh.bounds.aabb().size(), Vec3::new(2.0, 1.0, 4.0));
        assert_eq!(mesh.bounds.center, Vec3::ZERO);
    }
}
