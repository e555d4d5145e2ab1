pub mod app;
pub mod assets;
pub mod camera3d;
pub mod cli;
pub mod config;
pub mod cut;
pub mod ecs;
pub mod error;
pub mod events;
pub mod geometry;
pub mod mesh;
pub mod recycler;
pub mod renderer;
pub mod scene;
pub mod time;
pub mod tween;
pub mod viewport;
pub mod watcher;

pub use config::StageConfig;
pub use error::StageError;
pub use viewport::{HostSignal, ViewportId, ViewportLoopController};

pub(crate) fn wrap_angle(mut radians: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;
    while radians > std::f32::consts::PI {
        radians -= two_pi;
    }
    while radians < -std::f32::consts::PI {
        radians += two_pi;
    }
    radians
}
