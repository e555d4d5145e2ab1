pub mod lifecycle;
pub mod physics;
mod profiler;
pub mod systems;
mod types;
mod world;

pub use lifecycle::{CutPlan, ShapeRecipe, SlotRole, SpawnRequest, TrackedSpec};
pub use physics::{
    BodyDescriptor, BodyId, BodyIndex, BodyShape, BodyType, ContactPair, PhysicsWorld, Pose, RapierSimulator, ShapeKind,
    Simulator, StepSettings,
};
pub use profiler::{SystemProfiler, SystemTimingSummary};
pub use types::*;
pub use world::StageWorld;
