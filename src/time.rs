/// Fixed-step accumulator driven by host frame timestamps (seconds).
#[derive(Debug, Clone)]
pub struct LoopClock {
    last: Option<f64>,
    accumulator: f32,
    fixed_dt: f32,
    max_backlog: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopTick {
    pub dt: f32,
    pub dropped_backlog: Option<f32>,
}

impl LoopClock {
    pub fn new(fixed_dt: f32, max_catchup_steps: u32) -> Self {
        let fixed_dt = fixed_dt.max(1e-4);
        Self { last: None, accumulator: 0.0, fixed_dt, max_backlog: fixed_dt * max_catchup_steps.max(1) as f32 }
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Forget the previous timestamp; the next tick counts as one fixed step.
    pub fn reset(&mut self) {
        self.last = None;
        self.accumulator = 0.0;
    }

    pub fn tick(&mut self, now: f64) -> LoopTick {
        let dt = match self.last {
            Some(last) => (now - last).max(0.0) as f32,
            None => self.fixed_dt,
        };
        self.last = Some(now);
        self.accumulator += dt;
        let mut dropped_backlog = None;
        if self.accumulator > self.max_backlog {
            dropped_backlog = Some(self.accumulator - self.max_backlog);
            self.accumulator = self.max_backlog;
        }
        LoopTick { dt, dropped_backlog }
    }

    pub fn pop_fixed_step(&mut self) -> Option<f32> {
        // tolerate float drift from summing frame deltas
        if self.accumulator + self.fixed_dt * 1e-3 >= self.fixed_dt {
            self.accumulator = (self.accumulator - self.fixed_dt).max(0.0);
            Some(self.fixed_dt)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(clock: &mut LoopClock) -> usize {
        std::iter::from_fn(|| clock.pop_fixed_step()).count()
    }

    #[test]
    fn first_tick_runs_one_step() {
        let mut clock = LoopClock::new(1.0 / 60.0, 4);
        let tick = clock.tick(12.5);
        assert!((tick.dt - 1.0 / 60.0).abs() < 1e-6);
        assert_eq!(drain(&mut clock), 1);
    }

    #[test]
    fn steps_follow_wall_clock_not_callbacks() {
        let mut clock = LoopClock::new(1.0 / 60.0, 8);
        clock.tick(0.0);
        drain(&mut clock);
        // a 30 Hz display still simulates at 60 Hz
        let mut steps = 0;
        for frame in 1..=30 {
            clock.tick(frame as f64 / 30.0);
            steps += drain(&mut clock);
        }
        assert_eq!(steps, 60);
    }

    #[test]
    fn backlog_beyond_the_cap_is_dropped() {
        let mut clock = LoopClock::new(0.01, 5);
        clock.tick(0.0);
        drain(&mut clock);
        let tick = clock.tick(1.0);
        assert!((tick.dropped_backlog.unwrap() - 0.95).abs() < 1e-4);
        assert_eq!(drain(&mut clock), 5);
        clock.reset();
        clock.tick(50.0);
        assert_eq!(drain(&mut clock), 1);
    }
}
