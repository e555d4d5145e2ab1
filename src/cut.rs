use crate::tween::{Easing, Tween};
use bevy_ecs::prelude::Resource;
use glam::{Quat, Vec3};
use serde::Deserialize;
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    Animating,
    Replacing,
    Done,
}

#[derive(Resource, Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CutSettings {
    #[serde(default = "CutSettings::default_axis")]
    pub axis: [f32; 3],
    #[serde(default = "CutSettings::default_terminal_angle")]
    pub terminal_angle: f32,
    #[serde(default = "CutSettings::default_duration")]
    pub duration: f32,
    #[serde(default)]
    pub easing: Easing,
    /// Vertical offset applied to both halves.
    #[serde(default = "CutSettings::default_lift")]
    pub lift: f32,
}

impl CutSettings {
    const fn default_axis() -> [f32; 3] {
        [0.0, 0.0, 1.0]
    }

    fn default_terminal_angle() -> f32 {
        -FRAC_PI_2
    }

    const fn default_duration() -> f32 {
        0.6
    }

    const fn default_lift() -> f32 {
        0.25
    }

    pub fn axis(&self) -> Vec3 {
        Vec3::from_array(self.axis).try_normalize().unwrap_or(Vec3::Z)
    }
}

impl Default for CutSettings {
    fn default() -> Self {
        Self {
            axis: Self::default_axis(),
            terminal_angle: Self::default_terminal_angle(),
            duration: Self::default_duration(),
            easing: Easing::default(),
            lift: Self::default_lift(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfPlacement {
    pub position: Vec3,
    pub orientation: Quat,
}

/// One cut: blade swing, then the target is swapped for two halves.
/// `Done` is terminal; a sequence whose target vanished stops at `Replacing`.
#[derive(Debug, Clone)]
pub struct CutSequence {
    settings: CutSettings,
    state: SequenceState,
    tween: Option<Tween>,
    aborted: bool,
}

impl CutSequence {
    pub fn new(settings: CutSettings) -> Self {
        Self { settings, state: SequenceState::Idle, tween: None, aborted: false }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn settings(&self) -> &CutSettings {
        &self.settings
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Nothing left to drive.
    pub fn is_settled(&self) -> bool {
        self.state == SequenceState::Done || self.aborted
    }

    /// `Idle → Animating`, starting the swing from `current_angle`.
    pub fn begin(&mut self, current_angle: f32) -> bool {
        if self.state != SequenceState::Idle {
            return false;
        }
        let s = &self.settings;
        self.tween = Some(Tween::new(current_angle, s.terminal_angle, s.duration, s.easing));
        self.state = SequenceState::Animating;
        true
    }

    /// Advances the swing and returns the blade angle to display. Moves to
    /// `Replacing` once the swing lands on the terminal angle.
    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        if self.state != SequenceState::Animating {
            return None;
        }
        let tween = self.tween.as_mut()?;
        let angle = tween.advance(dt);
        if tween.is_finished() {
            self.state = SequenceState::Replacing;
        }
        Some(angle)
    }

    /// `Replacing → Done`. `target` is the original's last known position, or
    /// `None` if it is already gone, in which case nothing is placed.
    pub fn replace(&mut self, target: Option<Vec3>) -> Vec<HalfPlacement> {
        if self.state != SequenceState::Replacing || self.aborted {
            return Vec::new();
        }
        let Some(origin) = target else {
            self.aborted = true;
            return Vec::new();
        };
        let axis = self.settings.axis();
        let position = origin + Vec3::Y * self.settings.lift;
        self.state = SequenceState::Done;
        vec![
            HalfPlacement { position, orientation: Quat::from_axis_angle(axis, FRAC_PI_2) },
            HalfPlacement { position, orientation: Quat::from_axis_angle(axis, -FRAC_PI_2) },
        ]
    }
}

/// Signed rotation of `orientation` about `axis`, in `(-π, π]`.
pub fn angle_about(orientation: Quat, axis: Vec3) -> f32 {
    let q = orientation.normalize();
    let projected = Vec3::new(q.x, q.y, q.z).dot(axis);
    let angle = 2.0 * projected.atan2(q.w);
    crate::wrap_angle(angle)
}
