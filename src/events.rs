use crate::assets::AssetId;
use crate::ecs::ObjectKind;
use bevy_ecs::prelude::{Entity, Resource};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    ObjectSpawned { entity: Entity, kind: ObjectKind },
    ObjectDespawned { entity: Entity, kind: ObjectKind },
    SlotReserved { entity: Entity, asset: AssetId },
    Recycled { removed: usize, spawned: usize },
    RegionResolved { asset: AssetId },
    CutStarted { target: Entity, blade: Entity },
    CutCompleted { target: Entity, halves: usize },
    CutAborted { target: Entity },
    ModelSwapped { from: Option<String>, to: String },
    LoadFailed { asset: AssetId },
    LoadDiscarded { asset: AssetId },
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageEvent::ObjectSpawned { entity, kind } => {
                write!(f, "ObjectSpawned entity={} kind={}", entity.index(), kind.label())
            }
            StageEvent::ObjectDespawned { entity, kind } => {
                write!(f, "ObjectDespawned entity={} kind={}", entity.index(), kind.label())
            }
            StageEvent::SlotReserved { entity, asset } => {
                write!(f, "SlotReserved entity={} asset={asset}", entity.index())
            }
            StageEvent::Recycled { removed, spawned } => write!(f, "Recycled removed={removed} spawned={spawned}"),
            StageEvent::RegionResolved { asset } => write!(f, "RegionResolved asset={asset}"),
            StageEvent::CutStarted { target, blade } => {
                write!(f, "CutStarted target={} blade={}", target.index(), blade.index())
            }
            StageEvent::CutCompleted { target, halves } => {
                write!(f, "CutCompleted target={} halves={halves}", target.index())
            }
            StageEvent::CutAborted { target } => write!(f, "CutAborted target={}", target.index()),
            StageEvent::ModelSwapped { from, to } => {
                write!(f, "ModelSwapped from={} to={to}", from.as_deref().unwrap_or("-"))
            }
            StageEvent::LoadFailed { asset } => write!(f, "LoadFailed asset={asset}"),
            StageEvent::LoadDiscarded { asset } => write!(f, "LoadDiscarded asset={asset}"),
        }
    }
}

#[derive(Default, Resource)]
pub struct EventBus {
    events: Vec<StageEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<StageEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
