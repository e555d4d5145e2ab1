use crate::assets::AssetId;
use thiserror::Error;

/// Failure taxonomy for the stage orchestrator. None of these are fatal to the
/// process: each one degrades a single visual feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    #[error("asset '{asset}' failed to load: {reason}")]
    LoadFailure { asset: AssetId, reason: String },
    #[error("viewport '{viewport}' has zero extent ({width}x{height})")]
    DimensionFailure { viewport: String, width: u32, height: u32 },
    #[error("stale reference: {what}")]
    StaleReference { what: String },
    #[error("unknown viewport '{0}'")]
    UnknownViewport(String),
    #[error("unknown asset '{0}'")]
    UnknownAsset(String),
}

impl StageError {
    pub fn load_failure(asset: &AssetId, reason: impl Into<String>) -> Self {
        StageError::LoadFailure { asset: asset.clone(), reason: reason.into() }
    }

    pub fn stale(what: impl Into<String>) -> Self {
        StageError::StaleReference { what: what.into() }
    }

    /// Stale references are expected during recycling and cuts; callers treat them as no-ops.
    pub fn is_stale(&self) -> bool {
        matches!(self, StageError::StaleReference { .. })
    }
}
