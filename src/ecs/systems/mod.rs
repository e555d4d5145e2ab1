use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;

mod cut;
mod recycle;
mod showcase;
mod sync;

pub use cut::*;
pub use recycle::*;
pub use showcase::*;
pub use sync::*;

/// Wall-clock seconds since the previous rendered frame.
#[derive(Resource, Clone, Copy)]
pub struct TimeDelta(pub f32);

#[derive(Resource)]
pub struct StageRng(pub StdRng);
