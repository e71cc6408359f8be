//! Adaptive performance controller
//!
//! Watches frame times and steps the quality level up or down one notch
//! at a time. Hysteresis bands and a cooldown keep the level from
//! oscillating when the frame rate hovers near the target.

use std::time::Instant;

/// Uncapped instantaneous FPS readings are meaningless above this.
const FPS_CAP: f64 = 144.0;

/// Rolling window length for the FPS average.
const HISTORY_LEN: usize = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLevel {
    Low,
    Medium,
    High,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
        }
    }

    fn step_down(self) -> Self {
        match self {
            QualityLevel::High => QualityLevel::Medium,
            _ => QualityLevel::Low,
        }
    }

    fn step_up(self) -> Self {
        match self {
            QualityLevel::Low => QualityLevel::Medium,
            _ => QualityLevel::High,
        }
    }
}

/// Per-level budget: how many particles may be live, and how much their
/// spawn scale is reduced.
#[derive(Clone, Copy, Debug)]
pub struct QualityTier {
    pub max_particles: usize,
    pub scale_modifier: f32,
}

#[derive(Clone, Debug)]
pub struct PerfConfig {
    pub target_fps: f64,
    /// When false the controller records metrics but never changes level
    pub adaptive: bool,
    /// Frames that must pass between quality changes
    pub cooldown_frames: u32,
    pub high: QualityTier,
    pub medium: QualityTier,
    pub low: QualityTier,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            adaptive: true,
            cooldown_frames: 10,
            high: QualityTier {
                max_particles: 1000,
                scale_modifier: 1.0,
            },
            medium: QualityTier {
                max_particles: 500,
                scale_modifier: 0.75,
            },
            low: QualityTier {
                max_particles: 200,
                scale_modifier: 0.5,
            },
        }
    }
}

/// Point-in-time metrics snapshot.
#[derive(Clone, Debug)]
pub struct PerfMetrics {
    pub fps: f64,
    pub average_fps: f64,
    pub quality: QualityLevel,
    pub active_particles: usize,
    pub pool_size: usize,
    pub dropped_frames: u64,
}

/// Frame-time monitor and quality governor.
pub struct PerformanceController {
    config: PerfConfig,
    quality: QualityLevel,
    history: Vec<f64>,
    history_cursor: usize,
    last_instant: Option<Instant>,
    last_fps: f64,
    frames_since_change: u32,
    dropped_frames: u64,
    active_particles: usize,
    pool_size: usize,
}

impl PerformanceController {
    pub fn new(config: PerfConfig) -> Self {
        Self {
            config,
            quality: QualityLevel::High,
            history: Vec::with_capacity(HISTORY_LEN),
            history_cursor: 0,
            last_instant: None,
            last_fps: 0.0,
            frames_since_change: 0,
            dropped_frames: 0,
            active_particles: 0,
            pool_size: 0,
        }
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    pub fn tier(&self) -> QualityTier {
        match self.quality {
            QualityLevel::High => self.config.high,
            QualityLevel::Medium => self.config.medium,
            QualityLevel::Low => self.config.low,
        }
    }

    /// Scale applied to every spawn under the current level.
    pub fn scale_modifier(&self) -> f32 {
        self.tier().scale_modifier
    }

    /// Whether another particle fits under the current level's budget.
    pub fn should_spawn(&self, active: usize) -> bool {
        active < self.tier().max_particles
    }

    /// Measure the time since the previous call and feed it in. Call
    /// once per engine update.
    pub fn update(&mut self, active_particles: usize, pool_size: usize) {
        let now = Instant::now();
        let elapsed = match self.last_instant {
            Some(prev) => now.duration_since(prev).as_secs_f64(),
            None => 0.0,
        };
        self.last_instant = Some(now);
        if elapsed > 0.0 {
            self.record_frame(elapsed, active_particles, pool_size);
        } else {
            self.active_particles = active_particles;
            self.pool_size = pool_size;
        }
    }

    /// Feed one frame time directly. The clock-free path `update` wraps.
    pub fn record_frame(&mut self, elapsed: f64, active_particles: usize, pool_size: usize) {
        self.active_particles = active_particles;
        self.pool_size = pool_size;

        let fps = (1.0 / elapsed).min(FPS_CAP);
        self.last_fps = fps;

        if elapsed > 1.5 / self.config.target_fps {
            self.dropped_frames += 1;
        }

        if self.history.len() < HISTORY_LEN {
            self.history.push(fps);
        } else {
            self.history[self.history_cursor] = fps;
            self.history_cursor = (self.history_cursor + 1) % HISTORY_LEN;
        }

        self.frames_since_change = self.frames_since_change.saturating_add(1);
        if self.config.adaptive {
            self.adjust_quality();
        }
    }

    pub fn average_fps(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    pub fn metrics(&self) -> PerfMetrics {
        PerfMetrics {
            fps: self.last_fps,
            average_fps: self.average_fps(),
            quality: self.quality,
            active_particles: self.active_particles,
            pool_size: self.pool_size,
            dropped_frames: self.dropped_frames,
        }
    }

    pub fn report(&self) -> String {
        let m = self.metrics();
        format!(
            "fps {:.1} (avg {:.1}) quality {} particles {}/{} dropped {}",
            m.fps,
            m.average_fps,
            m.quality.as_str(),
            m.active_particles,
            m.pool_size,
            m.dropped_frames
        )
    }

    fn adjust_quality(&mut self) {
        // Need a meaningful average before judging
        if self.history.len() < HISTORY_LEN / 2 {
            return;
        }
        if self.frames_since_change < self.config.cooldown_frames {
            return;
        }

        let avg = self.average_fps();
        let target = self.config.target_fps;

        let next = if avg < target * 0.8 {
            self.quality.step_down()
        } else if avg > target * 1.1 {
            let candidate = self.quality.step_up();
            // Re-entering High is gated on particle load so a quiet
            // moment does not bounce us straight back into a spike.
            if candidate == QualityLevel::High
                && self.active_particles
                    >= (self.config.high.max_particles as f32 * 0.7) as usize
            {
                self.quality
            } else {
                candidate
            }
        } else {
            self.quality
        };

        if next != self.quality {
            println!(
                "[perf] quality {} -> {} (avg fps {:.1}, target {:.0})",
                self.quality.as_str(),
                next.as_str(),
                avg,
                target
            );
            self.quality = next;
            self.frames_since_change = 0;
            // Samples taken under the old level no longer reflect frame
            // cost; judge the new level on fresh data only
            self.history.clear();
            self.history_cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PerformanceController {
        PerformanceController::new(PerfConfig::default())
    }

    fn feed(c: &mut PerformanceController, fps: f64, frames: usize, active: usize) {
        for _ in 0..frames {
            c.record_frame(1.0 / fps, active, 100);
        }
    }

    #[test]
    fn starts_at_high() {
        let c = controller();
        assert_eq!(c.quality(), QualityLevel::High);
        assert_eq!(c.scale_modifier(), 1.0);
    }

    #[test]
    fn sustained_low_fps_steps_down_one_level_at_a_time() {
        let mut c = controller();
        feed(&mut c, 40.0, 30, 100);
        assert_eq!(c.quality(), QualityLevel::Medium);

        // Keep starving it and it reaches Low, never skipping a level
        feed(&mut c, 40.0, 30, 100);
        assert_eq!(c.quality(), QualityLevel::Low);
    }

    #[test]
    fn cooldown_spaces_out_transitions() {
        let mut c = PerformanceController::new(PerfConfig {
            cooldown_frames: 30,
            ..PerfConfig::default()
        });
        feed(&mut c, 30.0, 35, 100);
        assert_eq!(c.quality(), QualityLevel::Medium);
        // Within cooldown nothing moves even though fps is still bad
        feed(&mut c, 30.0, 10, 100);
        assert_eq!(c.quality(), QualityLevel::Medium);
    }

    #[test]
    fn fps_at_target_is_stable() {
        let mut c = controller();
        feed(&mut c, 60.0, 200, 100);
        assert_eq!(c.quality(), QualityLevel::High);
    }

    #[test]
    fn recovery_steps_back_up() {
        let mut c = controller();
        feed(&mut c, 30.0, 30, 100);
        assert_eq!(c.quality(), QualityLevel::Medium);

        feed(&mut c, 100.0, 40, 100);
        assert_eq!(c.quality(), QualityLevel::High);
    }

    #[test]
    fn high_reentry_gated_on_particle_load() {
        let mut c = controller();
        feed(&mut c, 30.0, 30, 100);
        assert_eq!(c.quality(), QualityLevel::Medium);

        // Plenty of headroom in fps, but the particle load is at 90% of
        // the High budget, so Medium holds.
        feed(&mut c, 100.0, 40, 900);
        assert_eq!(c.quality(), QualityLevel::Medium);

        // Load drains, High is allowed again
        feed(&mut c, 100.0, 40, 100);
        assert_eq!(c.quality(), QualityLevel::High);
    }

    #[test]
    fn fps_reading_is_capped() {
        let mut c = controller();
        c.record_frame(0.0001, 0, 0);
        assert!(c.metrics().fps <= FPS_CAP);
    }

    #[test]
    fn dropped_frames_counted() {
        let mut c = controller();
        c.record_frame(1.0 / 60.0, 0, 0);
        assert_eq!(c.metrics().dropped_frames, 0);
        c.record_frame(0.1, 0, 0);
        assert_eq!(c.metrics().dropped_frames, 1);
    }

    #[test]
    fn non_adaptive_records_but_never_moves() {
        let mut c = PerformanceController::new(PerfConfig {
            adaptive: false,
            ..PerfConfig::default()
        });
        feed(&mut c, 10.0, 100, 100);
        assert_eq!(c.quality(), QualityLevel::High);
        assert!(c.average_fps() < 15.0);
    }

    #[test]
    fn should_spawn_respects_tier_budget() {
        let mut c = controller();
        assert!(c.should_spawn(999));
        assert!(!c.should_spawn(1000));

        feed(&mut c, 30.0, 40, 100);
        assert_eq!(c.quality(), QualityLevel::Medium);
        assert!(!c.should_spawn(500));
        assert!(c.should_spawn(499));
    }
}
