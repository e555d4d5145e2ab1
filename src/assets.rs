use crate::error::StageError;
use crate::mesh::MeshAsset;
use bevy_ecs::prelude::Resource;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub mod gltf_loader;
pub mod static_loader;

pub use gltf_loader::GltfLoader;
pub use static_loader::StaticLoader;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub asset: AssetId,
    pub result: Result<MeshAsset, StageError>,
}

/// Asynchronous mesh source. `request` never blocks; results surface through
/// `drain`, which the frame loop calls on its own thread.
pub trait AssetLoader {
    fn request(&mut self, asset: &AssetId) -> LoadTicket;
    fn drain(&mut self) -> Vec<LoadCompletion>;
    fn in_flight(&self) -> usize;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetSource {
    pub id: AssetId,
    pub path: PathBuf,
    /// Extent of the box stand-in used when the file cannot be read.
    #[serde(default = "AssetSource::default_proxy_extent")]
    pub proxy_extent: [f32; 3],
}

impl AssetSource {
    fn default_proxy_extent() -> [f32; 3] {
        [1.0, 1.0, 1.0]
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    sources: HashMap<AssetId, AssetSource>,
}

impl AssetCatalog {
    pub fn new(sources: impl IntoIterator<Item = AssetSource>) -> Self {
        Self { sources: sources.into_iter().map(|s| (s.id.clone(), s)).collect() }
    }

    pub fn get(&self, id: &AssetId) -> Option<&AssetSource> {
        self.sources.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetSource> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

pub enum MeshState {
    Ready(Arc<MeshAsset>),
    Failed,
    Loading,
    Unrequested,
}

/// Per-stage cache of resolved meshes plus the bookkeeping for loads that are
/// wanted, in flight, or known to fail.
#[derive(Resource, Default)]
pub struct MeshLibrary {
    ready: HashMap<AssetId, Arc<MeshAsset>>,
    failed: HashSet<AssetId>,
    in_flight: HashSet<AssetId>,
    wanted: Vec<AssetId>,
}

impl MeshLibrary {
    pub fn state(&self, id: &AssetId) -> MeshState {
        if let Some(mesh) = self.ready.get(id) {
            MeshState::Ready(mesh.clone())
        } else if self.failed.contains(id) {
            MeshState::Failed
        } else if self.in_flight.contains(id) || self.wanted.contains(id) {
            MeshState::Loading
        } else {
            MeshState::Unrequested
        }
    }

    pub fn get(&self, id: &AssetId) -> Option<Arc<MeshAsset>> {
        self.ready.get(id).cloned()
    }

    /// Queues a load unless the mesh is ready, failed, or already on its way.
    pub fn want(&mut self, id: &AssetId) {
        if matches!(self.state(id), MeshState::Unrequested) {
            self.wanted.push(id.clone());
        }
    }

    pub fn take_wanted(&mut self) -> Vec<AssetId> {
        let wanted = std::mem::take(&mut self.wanted);
        self.in_flight.extend(wanted.iter().cloned());
        wanted
    }

    pub fn insert_ready(&mut self, mesh: MeshAsset) -> Arc<MeshAsset> {
        self.in_flight.remove(&mesh.id);
        let mesh = Arc::new(mesh);
        self.ready.insert(mesh.id.clone(), mesh.clone());
        mesh
    }

    pub fn mark_failed(&mut self, id: &AssetId) {
        self.in_flight.remove(id);
        self.failed.insert(id.clone());
    }

    pub fn forget_in_flight(&mut self, id: &AssetId) {
        self.in_flight.remove(id);
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }
}
