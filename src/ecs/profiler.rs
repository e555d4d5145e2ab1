use bevy_ecs::prelude::Resource;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct SystemTimingSummary {
    pub name: &'static str,
    pub last_ms: f32,
    pub average_ms: f32,
    pub max_ms: f32,
    pub samples: u64,
}

impl fmt::Display for SystemTimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<28} last {:>7.3}ms avg {:>7.3}ms max {:>7.3}ms ({} runs)",
            self.name, self.last_ms, self.average_ms, self.max_ms, self.samples
        )
    }
}

#[derive(Default)]
struct SystemTiming {
    last_ms: f32,
    total_ms: f32,
    max_ms: f32,
    samples: u64,
}

/// Wall-clock cost per system, accumulated over the life of a stage.
#[derive(Resource, Default)]
pub struct SystemProfiler {
    timings: HashMap<&'static str, SystemTiming>,
}

impl SystemProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&mut self, name: &'static str) -> SystemProfileScope<'_> {
        SystemProfileScope { name, profiler: self, start: Instant::now() }
    }

    fn record(&mut self, name: &'static str, duration_ms: f32) {
        let entry = self.timings.entry(name).or_default();
        entry.last_ms = duration_ms;
        entry.max_ms = entry.max_ms.max(duration_ms);
        entry.total_ms += duration_ms;
        entry.samples += 1;
    }

    pub fn samples(&self, name: &str) -> u64 {
        self.timings.get(name).map(|t| t.samples).unwrap_or(0)
    }

    /// Slowest average first.
    pub fn summaries(&self) -> Vec<SystemTimingSummary> {
        let mut out: Vec<SystemTimingSummary> = self
            .timings
            .iter()
            .map(|(&name, timing)| SystemTimingSummary {
                name,
                last_ms: timing.last_ms,
                average_ms: if timing.samples == 0 { 0.0 } else { timing.total_ms / timing.samples as f32 },
                max_ms: timing.max_ms,
                samples: timing.samples,
            })
            .collect();
        out.sort_by(|a, b| b.average_ms.partial_cmp(&a.average_ms).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    pub fn reset(&mut self) {
        self.timings.clear();
    }
}

pub struct SystemProfileScope<'a> {
    name: &'static str,
    profiler: &'a mut SystemProfiler,
    start: Instant,
}

impl Drop for SystemProfileScope<'_> {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_secs_f32() * 1000.0;
        self.profiler.record(self.name, duration_ms);
    }
}
