use super::{AssetCatalog, AssetId, AssetLoader, LoadCompletion, LoadTicket};
use crate::error::StageError;
use crate::mesh::MeshAsset;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

struct LoadJob {
    ticket: LoadTicket,
    asset: AssetId,
    path: PathBuf,
}

/// Parses glTF files on a small pool of worker threads. Completions queue on a
/// channel until the frame loop drains them.
pub struct GltfLoader {
    catalog: AssetCatalog,
    root: PathBuf,
    senders: Vec<mpsc::Sender<LoadJob>>,
    next_sender: usize,
    rx: mpsc::Receiver<LoadCompletion>,
    rejected: Vec<LoadCompletion>,
    next_ticket: u64,
    in_flight: usize,
}

impl GltfLoader {
    pub fn new(catalog: AssetCatalog, root: impl AsRef<Path>) -> Result<Self> {
        let worker_count = thread::available_parallelism().map(|n| n.get().clamp(1, 4)).unwrap_or(2);
        Self::with_workers(catalog, root, worker_count)
    }

    pub fn with_workers(catalog: AssetCatalog, root: impl AsRef<Path>, worker_count: usize) -> Result<Self> {
        let worker_count = worker_count.max(1);
        let (result_tx, result_rx) = mpsc::channel();
        let mut senders = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (tx, rx) = mpsc::channel::<LoadJob>();
            let thread_result_tx = result_tx.clone();
            let spawned = thread::Builder::new().name(format!("mesh-load-{index}")).spawn(move || {
                while let Ok(job) = rx.recv() {
                    let result = MeshAsset::load_gltf(job.asset.clone(), &job.path)
                        .map_err(|err| StageError::load_failure(&job.asset, format!("{err:#}")));
                    let completion = LoadCompletion { ticket: job.ticket, asset: job.asset, result };
                    if thread_result_tx.send(completion).is_err() {
                        break;
                    }
                }
            });
            if let Err(err) = spawned {
                log::warn!("[assets] failed to spawn mesh loader worker {index}: {err}");
                continue;
            }
            senders.push(tx);
        }
        if senders.is_empty() {
            bail!("no mesh loader workers could be started");
        }
        Ok(Self {
            catalog,
            root: root.as_ref().to_path_buf(),
            senders,
            next_sender: 0,
            rx: result_rx,
            rejected: Vec::new(),
            next_ticket: 0,
            in_flight: 0,
        })
    }

    fn reject(&mut self, ticket: LoadTicket, asset: &AssetId, reason: &str) {
        self.rejected.push(LoadCompletion {
            ticket,
            asset: asset.clone(),
            result: Err(StageError::load_failure(asset, reason)),
        });
    }
}

impl AssetLoader for GltfLoader {
    fn request(&mut self, asset: &AssetId) -> LoadTicket {
        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        let Some(source) = self.catalog.get(asset) else {
            self.reject(ticket, asset, "asset is not listed in the catalog");
            return ticket;
        };
        let path = self.root.join(&source.path);
        let mut job = LoadJob { ticket, asset: asset.clone(), path };
        for _ in 0..self.senders.len() {
            let index = self.next_sender % self.senders.len();
            self.next_sender = self.next_sender.wrapping_add(1);
            match self.senders[index].send(job) {
                Ok(()) => {
                    self.in_flight += 1;
                    return ticket;
                }
                Err(mpsc::SendError(returned)) => job = returned,
            }
        }
        self.reject(ticket, asset, "mesh loader workers have shut down");
        ticket
    }

    fn drain(&mut self) -> Vec<LoadCompletion> {
        let mut out = std::mem::take(&mut self.rejected);
        while let Ok(completion) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            out.push(completion);
        }
        out
    }

    fn in_flight(&self) -> usize {
        self.in_flight + self.rejected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetSource;
    use std::time::{Duration, Instant};

    fn drain_until(loader: &mut GltfLoader, count: usize) -> Vec<LoadCompletion> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut out = Vec::new();
        while out.len() < count && Instant::now() < deadline {
            out.extend(loader.drain());
            thread::sleep(Duration::from_millis(5));
        }
        out
    }

    #[test]
    fn unreadable_and_uncataloged_assets_fail_softly() {
        let dir = tempfile::tempdir().expect("temp dir");
        let catalog = AssetCatalog::new([AssetSource {
            id: AssetId::new("pot"),
            path: PathBuf::from("pot.glb"),
            proxy_extent: [1.0, 1.0, 1.0],
        }]);
        let mut loader = GltfLoader::new(catalog, dir.path()).expect("loader starts");
        let missing_file = loader.request(&AssetId::new("pot"));
        let not_listed = loader.request(&AssetId::new("bank"));
        assert_ne!(missing_file, not_listed);

        let completions = drain_until(&mut loader, 2);
        assert_eq!(completions.len(), 2);
        for completion in completions {
            match completion.result {
                Err(StageError::LoadFailure { asset, .. }) => assert_eq!(asset, completion.asset),
                other => panic!("expected load failure, got {other:?}"),
            }
        }
        assert_eq!(loader.in_flight(), 0);
    }
}
