use super::{AssetCatalog, AssetId, AssetLoader, LoadCompletion, LoadTicket};
use crate::error::StageError;
use crate::mesh::MeshAsset;
use glam::Vec3;
use std::collections::HashMap;

/// In-memory loader. Each request completes after `latency` further drains,
/// which lets callers model loads that outlive a viewport's active period.
#[derive(Default)]
pub struct StaticLoader {
    meshes: HashMap<AssetId, MeshAsset>,
    failures: HashMap<AssetId, String>,
    latency: u32,
    pending: Vec<(u32, LoadCompletion)>,
    next_ticket: u64,
    requests: usize,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Box proxies for every catalog entry, sized from `proxy_extent`.
    pub fn from_catalog(catalog: &AssetCatalog) -> Self {
        let mut loader = Self::new();
        for source in catalog.iter() {
            loader = loader.with_mesh(MeshAsset::proxy_box(source.id.clone(), Vec3::from_array(source.proxy_extent)));
        }
        loader
    }

    pub fn with_mesh(mut self, mesh: MeshAsset) -> Self {
        self.meshes.insert(mesh.id.clone(), mesh);
        self
    }

    pub fn with_failure(mut self, asset: impl Into<AssetId>, reason: impl Into<String>) -> Self {
        let asset = asset.into();
        self.meshes.remove(&asset);
        self.failures.insert(asset, reason.into());
        self
    }

    pub fn with_latency(mut self, drains: u32) -> Self {
        self.latency = drains;
        self
    }

    /// Total number of requests seen, including re-requests.
    pub fn request_count(&self) -> usize {
        self.requests
    }
}

impl AssetLoader for StaticLoader {
    fn request(&mut self, asset: &AssetId) -> LoadTicket {
        self.next_ticket += 1;
        self.requests += 1;
        let ticket = LoadTicket(self.next_ticket);
        let result = match (self.meshes.get(asset), self.failures.get(asset)) {
            (Some(mesh), _) => Ok(mesh.clone()),
            (None, Some(reason)) => Err(StageError::load_failure(asset, reason.clone())),
            (None, None) => Err(StageError::load_failure(asset, "no mesh registered")),
        };
        self.pending.push((self.latency, LoadCompletion { ticket, asset: asset.clone(), result }));
        ticket
    }

    fn drain(&mut self) -> Vec<LoadCompletion> {
        let mut ready = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for (remaining, completion) in self.pending.drain(..) {
            if remaining == 0 {
                ready.push(completion);
            } else {
                waiting.push((remaining - 1, completion));
            }
        }
        self.pending = waiting;
        ready
    }

    fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_delays_completion_by_whole_drains() {
        let mut loader =
            StaticLoader::new().with_mesh(MeshAsset::proxy_box(AssetId::new("tomato"), Vec3::ONE)).with_latency(2);
        let ticket = loader.request(&AssetId::new("tomato"));
        assert!(loader.drain().is_empty());
        assert!(loader.drain().is_empty());
        let done = loader.drain();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].ticket, ticket);
        assert!(done[0].result.is_ok());
        assert_eq!(loader.in_flight(), 0);
    }

    #[test]
    fn unknown_and_failing_assets_complete_with_errors() {
        let mut loader = StaticLoader::new().with_failure("carrot", "corrupt buffer");
        loader.request(&AssetId::new("carrot"));
        loader.request(&AssetId::new("lettuce"));
        let done = loader.drain();
        assert_eq!(done.len(), 2);
        assert!(done.iter().all(|c| c.result.is_err()));
        assert_eq!(loader.request_count(), 2);
    }
}
