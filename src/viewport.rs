use crate::assets::{AssetId, AssetLoader, LoadTicket};
use crate::camera3d::Camera3D;
use crate::config::{PhysicsConfig, StageConfig, ViewportConfig};
use crate::ecs::{RapierSimulator, Simulator, StageWorld, StepSettings};
use crate::error::StageError;
use crate::events::StageEvent;
use crate::renderer::{HeadlessRenderer, RenderStats, Renderer};
use crate::scene::SceneBlueprint;
use crate::time::LoopClock;
use glam::Vec3;
use std::collections::HashMap;

pub type SimulatorFactory = Box<dyn Fn(Vec3) -> Box<dyn Simulator>>;
pub type RendererFactory = Box<dyn Fn(&str, u32, u32) -> Result<Box<dyn Renderer>, StageError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(usize);

impl ViewportId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Input from the embedding host, addressed by viewport name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    PointerEnter(String),
    PointerLeave(String),
    SwapModel { viewport: String, model: String },
    Resize { width: u32, height: u32 },
}

struct Viewport {
    config: ViewportConfig,
    running: bool,
    stage: Option<StageWorld>,
    renderer: Option<Box<dyn Renderer>>,
    camera: Camera3D,
    clock: LoopClock,
    ticks: u64,
    fixed_steps: u64,
}

impl Viewport {
    fn new(config: ViewportConfig, physics: &PhysicsConfig) -> Self {
        let camera = config.camera.build(config.width, config.height);
        Self {
            config,
            running: false,
            stage: None,
            renderer: None,
            camera,
            clock: LoopClock::new(physics.fixed_dt, physics.max_catchup_steps),
            ticks: 0,
            fixed_steps: 0,
        }
    }
}

/// Owns one simulate-and-render loop per viewport and decides which loops run.
///
/// Each viewport gets its own [`StageWorld`] the first time it starts. Viewports
/// sharing a group occupy the same screen region: starting one stops the rest.
/// Asset completions are routed back to the viewport that requested them; a
/// completion for a stopped viewport is discarded and re-requested on its next start.
pub struct ViewportLoopController {
    viewports: Vec<Viewport>,
    physics: PhysicsConfig,
    loader: Box<dyn AssetLoader>,
    routes: HashMap<LoadTicket, (ViewportId, AssetId)>,
    make_simulator: SimulatorFactory,
    make_renderer: RendererFactory,
}

impl ViewportLoopController {
    pub fn new(config: &StageConfig, loader: Box<dyn AssetLoader>) -> Self {
        let viewports = config.viewports.iter().cloned().map(|v| Viewport::new(v, &config.physics)).collect();
        Self {
            viewports,
            physics: config.physics.clone(),
            loader,
            routes: HashMap::new(),
            make_simulator: Box::new(|gravity| Box::new(RapierSimulator::new(gravity)) as Box<dyn Simulator>),
            make_renderer: Box::new(|name: &str, width: u32, height: u32| {
                HeadlessRenderer::new(name, width, height).map(|r| Box::new(r) as Box<dyn Renderer>)
            }),
        }
    }

    pub fn with_simulator_factory(mut self, factory: impl Fn(Vec3) -> Box<dyn Simulator> + 'static) -> Self {
        self.make_simulator = Box::new(factory);
        self
    }

    pub fn with_renderer_factory(
        mut self,
        factory: impl Fn(&str, u32, u32) -> Result<Box<dyn Renderer>, StageError> + 'static,
    ) -> Self {
        self.make_renderer = Box::new(factory);
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = ViewportId> {
        (0..self.viewports.len()).map(ViewportId)
    }

    pub fn find(&self, name: &str) -> Result<ViewportId, StageError> {
        self.viewports
            .iter()
            .position(|v| v.config.name == name)
            .map(ViewportId)
            .ok_or_else(|| StageError::UnknownViewport(name.to_string()))
    }

    pub fn name(&self, id: ViewportId) -> Option<&str> {
        self.viewports.get(id.0).map(|v| v.config.name.as_str())
    }

    fn viewport(&self, id: ViewportId) -> Result<&Viewport, StageError> {
        self.viewports.get(id.0).ok_or_else(|| StageError::UnknownViewport(format!("#{}", id.0)))
    }

    fn viewport_mut(&mut self, id: ViewportId) -> Result<&mut Viewport, StageError> {
        self.viewports.get_mut(id.0).ok_or_else(|| StageError::UnknownViewport(format!("#{}", id.0)))
    }

    /// Starts the loop. The first successful start builds the stage and installs
    /// its scene; a zero-extent target fails with `DimensionFailure` and leaves
    /// the viewport untouched so a later start can retry. Starting a running
    /// viewport does nothing.
    pub fn start(&mut self, id: ViewportId) -> Result<(), StageError> {
        if self.viewport(id)?.running {
            return Ok(());
        }

        let seed = self.physics.seed.wrapping_add(id.0 as u64);
        let gravity = self.physics.gravity();
        let viewport = &mut self.viewports[id.0];
        if viewport.stage.is_none() {
            let (name, width, height) = (viewport.config.name.clone(), viewport.config.width, viewport.config.height);
            let renderer = (self.make_renderer)(&name, width, height).inspect_err(|err| {
                log::warn!("[viewport] {err}; '{name}' stays uninitialized until the next start");
            })?;
            let mut stage = StageWorld::new((self.make_simulator)(gravity), seed);
            viewport.config.scene.install(&mut stage);
            viewport.camera.set_viewport(width, height);
            viewport.renderer = Some(renderer);
            viewport.stage = Some(stage);
        } else if let Some(stage) = viewport.stage.as_mut() {
            let reissued = stage.reissue_dropped();
            if reissued > 0 {
                log::debug!("[viewport] '{}' re-requesting {reissued} discarded load(s)", viewport.config.name);
            }
        }

        if let Some(group) = self.viewports[id.0].config.group.clone() {
            let rivals: Vec<ViewportId> = self
                .ids()
                .filter(|other| *other != id)
                .filter(|other| {
                    let v = &self.viewports[other.0];
                    v.running && v.config.group.as_deref() == Some(group.as_str())
                })
                .collect();
            for rival in rivals {
                self.stop(rival)?;
            }
        }

        let viewport = &mut self.viewports[id.0];
        viewport.clock.reset();
        viewport.running = true;
        log::info!("[viewport] started '{}' ({})", viewport.config.name, viewport.config.scene.label());
        self.issue_loads(id);
        Ok(())
    }

    /// Cancels the next tick. The stage is kept for the next start.
    pub fn stop(&mut self, id: ViewportId) -> Result<(), StageError> {
        let viewport = self.viewport_mut(id)?;
        if viewport.running {
            viewport.running = false;
            log::info!("[viewport] stopped '{}'", viewport.config.name);
        }
        Ok(())
    }

    pub fn is_running(&self, id: ViewportId) -> bool {
        self.viewports.get(id.0).is_some_and(|v| v.running)
    }

    pub fn running(&self) -> Vec<ViewportId> {
        self.ids().filter(|id| self.is_running(*id)).collect()
    }

    /// One host frame at timestamp `now` (seconds).
    pub fn frame(&mut self, now: f64) {
        self.pump_loads();

        let settings = StepSettings { fixed_dt: self.physics.fixed_dt, sub_steps: self.physics.sub_steps };
        for viewport in self.viewports.iter_mut().filter(|v| v.running) {
            let Some(stage) = viewport.stage.as_mut() else {
                continue;
            };
            let tick = viewport.clock.tick(now);
            if let Some(dropped) = tick.dropped_backlog {
                log::debug!("[viewport] '{}' dropped {:.3}s of simulation backlog", viewport.config.name, dropped);
            }
            while let Some(fixed_dt) = viewport.clock.pop_fixed_step() {
                stage.fixed_step(StepSettings { fixed_dt, ..settings });
                viewport.fixed_steps += 1;
            }
            stage.frame(tick.dt);
            if let Some(renderer) = viewport.renderer.as_mut() {
                renderer.render(&stage.render_scene(), &viewport.camera);
            }
            viewport.ticks += 1;
        }

        for id in self.running() {
            self.issue_loads(id);
        }
    }

    /// Routes finished loads to the stage that asked for them.
    pub fn pump_loads(&mut self) -> usize {
        let completions = self.loader.drain();
        let count = completions.len();
        for completion in completions {
            let Some((id, asset)) = self.routes.remove(&completion.ticket) else {
                log::debug!("[assets] completion for unknown ticket {:?}", completion.ticket);
                continue;
            };
            let Some(viewport) = self.viewports.get_mut(id.0) else {
                continue;
            };
            let running = viewport.running;
            let Some(stage) = viewport.stage.as_mut() else {
                continue;
            };
            if running {
                stage.complete_load(&asset, completion.result);
            } else {
                stage.discard_load(&asset);
            }
        }
        count
    }

    fn issue_loads(&mut self, id: ViewportId) {
        let Some(stage) = self.viewports.get_mut(id.0).and_then(|v| v.stage.as_mut()) else {
            return;
        };
        for asset in stage.take_load_requests() {
            let ticket = self.loader.request(&asset);
            self.routes.insert(ticket, (id, asset));
        }
    }

    pub fn handle(&mut self, signal: HostSignal) -> Result<(), StageError> {
        match signal {
            HostSignal::PointerEnter(name) => {
                let id = self.find(&name)?;
                self.start(id)
            }
            HostSignal::PointerLeave(name) => {
                let id = self.find(&name)?;
                self.stop(id)
            }
            HostSignal::SwapModel { viewport, model } => {
                let id = self.find(&viewport)?;
                self.swap_model(id, &model)
            }
            HostSignal::Resize { width, height } => {
                self.resize(width, height);
                Ok(())
            }
        }
    }

    /// Swaps the showcase model. Before the first start the choice only changes
    /// which model the scene installs with.
    pub fn swap_model(&mut self, id: ViewportId, model: &str) -> Result<(), StageError> {
        let viewport = self.viewport_mut(id)?;
        match viewport.stage.as_mut() {
            Some(stage) => viewport.config.scene.swap_model(stage, model)?,
            None => match &mut viewport.config.scene {
                SceneBlueprint::Showcase(scene) => {
                    scene.entry(model)?;
                    scene.initial = Some(model.to_string());
                }
                other => {
                    return Err(StageError::UnknownAsset(format!("{model} (scene {} has no models)", other.label())));
                }
            },
        }
        if viewport.running {
            self.issue_loads(id);
        }
        Ok(())
    }

    /// Resizes every viewport's target. Uninitialized viewports pick the new
    /// size up on their next start.
    pub fn resize(&mut self, width: u32, height: u32) {
        for viewport in &mut self.viewports {
            viewport.config.width = width;
            viewport.config.height = height;
            viewport.camera.set_viewport(width, height);
            if let Some(renderer) = viewport.renderer.as_mut() {
                renderer.resize(width, height);
            }
        }
    }

    pub fn stage(&self, id: ViewportId) -> Option<&StageWorld> {
        self.viewports.get(id.0).and_then(|v| v.stage.as_ref())
    }

    pub fn stage_mut(&mut self, id: ViewportId) -> Option<&mut StageWorld> {
        self.viewports.get_mut(id.0).and_then(|v| v.stage.as_mut())
    }

    pub fn camera(&self, id: ViewportId) -> Option<&Camera3D> {
        self.viewports.get(id.0).map(|v| &v.camera)
    }

    /// Frames this viewport has rendered.
    pub fn tick_count(&self, id: ViewportId) -> u64 {
        self.viewports.get(id.0).map_or(0, |v| v.ticks)
    }

    pub fn fixed_step_count(&self, id: ViewportId) -> u64 {
        self.viewports.get(id.0).map_or(0, |v| v.fixed_steps)
    }

    pub fn render_stats(&self, id: ViewportId) -> Option<RenderStats> {
        self.viewports.get(id.0).and_then(|v| v.renderer.as_ref()).map(|r| r.stats())
    }

    pub fn drain_events(&mut self, id: ViewportId) -> Vec<StageEvent> {
        self.stage_mut(id).map(|stage| stage.drain_events()).unwrap_or_default()
    }

    pub fn loads_in_flight(&self) -> usize {
        self.routes.len()
    }
}
