#![allow(dead_code)]

use glam::Vec3;
use harvest_stage::assets::AssetId;
use harvest_stage::ecs::{BodyDescriptor, BodyId, BodyType, ContactPair, Pose, ShapeKind, Simulator, StageWorld};
use harvest_stage::mesh::MeshAsset;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct ScriptedBody {
    pose: Pose,
    kind: ShapeKind,
    body_type: BodyType,
}

/// Contacts queued by a test, reported by the next simulator step.
#[derive(Clone, Default)]
pub struct ContactScript(Arc<Mutex<Vec<ContactPair>>>);

impl ContactScript {
    pub fn touch(&self, a: BodyId, b: BodyId) {
        self.0.lock().expect("contact script lock").push(ContactPair::new(a, b));
    }

    fn take(&self) -> Vec<ContactPair> {
        std::mem::take(&mut *self.0.lock().expect("contact script lock"))
    }
}

/// Simulator without dynamics: bodies stay where they are put and contacts
/// happen only when a test scripts them.
pub struct ScriptedSimulator {
    bodies: HashMap<BodyId, ScriptedBody>,
    next_id: u64,
    script: ContactScript,
    reported: Vec<ContactPair>,
    pub steps: u32,
}

impl ScriptedSimulator {
    pub fn new(script: ContactScript) -> Self {
        Self { bodies: HashMap::new(), next_id: 0, script, reported: Vec::new(), steps: 0 }
    }
}

impl Simulator for ScriptedSimulator {
    fn add_body(&mut self, descriptor: &BodyDescriptor) -> BodyId {
        self.next_id += 1;
        let id = BodyId(self.next_id);
        let pose = Pose { position: descriptor.position, orientation: descriptor.orientation };
        self.bodies.insert(id, ScriptedBody { pose, kind: descriptor.shape.kind(), body_type: descriptor.body_type });
        id
    }

    fn remove_body(&mut self, id: BodyId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    fn step(&mut self, _fixed_delta: f32, _sub_steps: u32) {
        self.steps += 1;
        let contacts = self.script.take();
        self.reported.extend(contacts.into_iter().filter(|c| self.bodies.contains_key(&c.a) && self.bodies.contains_key(&c.b)));
    }

    fn drain_collisions(&mut self) -> Vec<ContactPair> {
        std::mem::take(&mut self.reported)
    }

    fn pose(&self, id: BodyId) -> Option<Pose> {
        self.bodies.get(&id).map(|body| body.pose)
    }

    fn set_pose(&mut self, id: BodyId, pose: Pose) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.pose = pose;
                true
            }
            None => false,
        }
    }

    fn shape_kind(&self, id: BodyId) -> Option<ShapeKind> {
        self.bodies.get(&id).map(|body| body.kind)
    }

    fn body_type(&self, id: BodyId) -> Option<BodyType> {
        self.bodies.get(&id).map(|body| body.body_type)
    }

    fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.body_type = body_type;
                true
            }
            None => false,
        }
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

pub fn scripted_stage(seed: u64) -> (StageWorld, ContactScript) {
    let script = ContactScript::default();
    let stage = StageWorld::new(Box::new(ScriptedSimulator::new(script.clone())), seed);
    (stage, script)
}

/// Unit-sized box mesh named `id`, already cached in the stage.
pub fn preload_box(stage: &mut StageWorld, id: &str, extent: Vec3) -> AssetId {
    let asset = AssetId::new(id);
    stage.preload(MeshAsset::proxy_box(asset.clone(), extent));
    asset
}

pub fn assert_vec3_near(a: Vec3, b: Vec3, epsilon: f32) {
    assert!((a - b).length() <= epsilon, "vectors differed: left={a:?}, right={b:?}, epsilon={epsilon}");
}
