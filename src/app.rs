use crate::assets::{AssetLoader, GltfLoader, StaticLoader};
use crate::cli::CliOverrides;
use crate::config::StageConfig;
use crate::renderer::RenderStats;
use crate::viewport::{HostSignal, ViewportLoopController};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

const HOST_FRAME_RATE: f64 = 60.0;

/// Per-viewport totals after a scripted run.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSummary {
    pub name: String,
    pub ticks: u64,
    pub fixed_steps: u64,
    pub render: Option<RenderStats>,
    pub events: BTreeMap<String, usize>,
}

pub fn run_with_overrides(cli: &CliOverrides) -> Result<Vec<ViewportSummary>> {
    let mut config = StageConfig::load_or_default(cli.config_path());
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        log::info!("[config] overrides applied: {}", overrides.applied_fields().join(", "));
    }
    config.apply_overrides(&overrides);
    let loader = build_loader(&config)?;
    let mut loops = ViewportLoopController::new(&config, loader);
    run_script(&mut loops, &demo_script(&config, cli.frames()), cli.frames())
}

/// glTF files when the asset root exists, box proxies otherwise.
pub fn build_loader(config: &StageConfig) -> Result<Box<dyn AssetLoader>> {
    let catalog = config.assets.catalog();
    if config.assets.root.is_dir() {
        let loader = GltfLoader::with_workers(catalog, &config.assets.root, config.assets.workers)
            .with_context(|| format!("Failed to start mesh loader for {}", config.assets.root.display()))?;
        log::info!("[assets] loading {} meshes from {}", config.assets.sources.len(), config.assets.root.display());
        Ok(Box::new(loader))
    } else {
        log::info!("[assets] {} not found; using proxy meshes", config.assets.root.display());
        Ok(Box::new(StaticLoader::from_catalog(&catalog)))
    }
}

/// Pointer traffic a visitor would produce: every ungrouped viewport starts at
/// once, the first member of each group starts, then the pointer wanders
/// between group members and swaps a model.
pub fn demo_script(config: &StageConfig, frames: u32) -> Vec<(u32, HostSignal)> {
    let mut script = Vec::new();
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for viewport in &config.viewports {
        match viewport.group.as_deref() {
            Some(group) => grouped.entry(group).or_default().push(&viewport.name),
            None => script.push((0, HostSignal::PointerEnter(viewport.name.clone()))),
        }
    }
    for members in grouped.values() {
        let Some((first, rest)) = members.split_first() else {
            continue;
        };
        script.push((0, HostSignal::PointerEnter(first.to_string())));
        if let Some(second) = rest.first() {
            script.push((frames / 4, HostSignal::PointerEnter(second.to_string())));
            script.push((frames / 3, HostSignal::SwapModel { viewport: second.to_string(), model: "security".into() }));
            script.push((frames / 2, HostSignal::PointerLeave(second.to_string())));
            script.push((frames / 2, HostSignal::PointerEnter(first.to_string())));
        }
    }
    if let Some(viewport) = config.viewports.first() {
        script.push((frames * 3 / 4, HostSignal::Resize { width: viewport.width * 2, height: viewport.height * 2 }));
    }
    script.sort_by_key(|(frame, _)| *frame);
    script
}

pub fn run_script(
    loops: &mut ViewportLoopController,
    script: &[(u32, HostSignal)],
    frames: u32,
) -> Result<Vec<ViewportSummary>> {
    let ids: Vec<_> = loops.ids().collect();
    let mut events: Vec<BTreeMap<String, usize>> = vec![BTreeMap::new(); ids.len()];
    let mut cursor = 0;
    for frame in 0..frames {
        while let Some((at, signal)) = script.get(cursor) {
            if *at > frame {
                break;
            }
            if let Err(err) = loops.handle(signal.clone()) {
                log::warn!("[host] {signal:?} rejected: {err}");
            }
            cursor += 1;
        }
        loops.frame(frame as f64 / HOST_FRAME_RATE);
        for (slot, id) in ids.iter().enumerate() {
            for event in loops.drain_events(*id) {
                log::debug!("[stage] {}: {event}", loops.name(*id).unwrap_or("?"));
                let label = event.to_string();
                let name = label.split_whitespace().next().unwrap_or_default().to_string();
                *events[slot].entry(name).or_default() += 1;
            }
        }
    }

    let mut summaries = Vec::with_capacity(ids.len());
    for (slot, id) in ids.into_iter().enumerate() {
        let name = loops.name(id).context("viewport vanished during the run")?.to_string();
        if let Some(stage) = loops.stage(id) {
            for timing in stage.profiler_summaries().iter().take(3) {
                log::debug!("[profile] {name}: {timing}");
            }
        }
        summaries.push(ViewportSummary {
            name,
            ticks: loops.tick_count(id),
            fixed_steps: loops.fixed_step_count(id),
            render: loops.render_stats(id),
            events: std::mem::take(&mut events[slot]),
        });
    }
    Ok(summaries)
}
