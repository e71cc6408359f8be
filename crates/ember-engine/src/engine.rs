//! Lifecycle engine: ties pool, store, queue, LOD and perf together
//!
//! The host owns the engine and calls `update` once per frame. Spawn
//! requests go through the effect queue; the engine drains it, drives
//! every active particle, retires the expired ones, and feeds the
//! performance controller.

use std::collections::HashSet;

use crate::clock::FrameClock;
use crate::factory::ParticleFactory;
use crate::lod::SpatialLod;
use crate::perf::{PerfConfig, PerfMetrics, PerformanceController};
use crate::pool::{ParticleConfig, PoolConfig, PoolStats, ResourcePool};
use crate::queue::{EffectQueue, EffectRequest, QueueConfig, QueueStats, QueuedEffect, SpawnOverrides};
use crate::rand::EngineRng;
use crate::store::{AttributeStore, SlotFlags};
use ember_core::{ParticleId, Vec3};
use ember_effects::{AnimationMode, EffectRegistry, PatternGenerator, PhysicsMode, SpawnPoint};

/// Top-level engine configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Hard ceiling on simultaneously live particles
    pub max_particles: usize,
    /// Radius of the spatial LOD falloff around reference points
    pub update_radius: f32,
    /// Particles leaving this box are retired immediately
    pub world_min: Vec3,
    pub world_max: Vec3,
    /// Handles constructed per tick during pool warm-up
    pub warm_up_per_tick: usize,
    pub rng_seed: u32,
    pub pool: PoolConfig,
    pub queue: QueueConfig,
    pub perf: PerfConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_particles: 1000,
            update_radius: 100.0,
            world_min: Vec3::new(-1000.0, -1000.0, -1000.0),
            world_max: Vec3::new(1000.0, 1000.0, 1000.0),
            warm_up_per_tick: 4,
            rng_seed: 1,
            pool: PoolConfig::default(),
            queue: QueueConfig::default(),
            perf: PerfConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from a TOML table. Missing keys keep their defaults,
    /// unknown keys are ignored.
    pub fn from_toml(table: &toml::value::Table) -> Self {
        let mut config = Self::default();

        if let Some(v) = table.get("max_particles") {
            config.max_particles = toml_usize(v, config.max_particles);
        }
        if let Some(v) = table.get("update_radius") {
            config.update_radius = toml_f32(v, config.update_radius);
        }
        if let Some(v) = table.get("world_min") {
            config.world_min = toml_vec3(v, config.world_min);
        }
        if let Some(v) = table.get("world_max") {
            config.world_max = toml_vec3(v, config.world_max);
        }
        if let Some(v) = table.get("warm_up_per_tick") {
            config.warm_up_per_tick = toml_usize(v, config.warm_up_per_tick);
        }
        if let Some(v) = table.get("rng_seed") {
            config.rng_seed = v.as_integer().unwrap_or(1) as u32;
        }

        if let Some(pool) = table.get("pool").and_then(|v| v.as_table()) {
            if let Some(v) = pool.get("size") {
                config.pool.pool_size = toml_usize(v, config.pool.pool_size);
            }
            if let Some(v) = pool.get("growth_factor") {
                config.pool.growth_factor = toml_f32(v, config.pool.growth_factor);
            }
            if let Some(v) = pool.get("settle_delay_ticks") {
                config.pool.settle_delay_ticks =
                    v.as_integer().unwrap_or(2).max(0) as u64;
            }
            if let Some(v) = pool.get("park_delay_ticks") {
                config.pool.park_delay_ticks = v.as_integer().unwrap_or(2).max(0) as u64;
            }
        }

        if let Some(queue) = table.get("queue").and_then(|v| v.as_table()) {
            if let Some(v) = queue.get("max_size") {
                config.queue.max_size = toml_usize(v, config.queue.max_size);
            }
            if let Some(v) = queue.get("batch_size") {
                config.queue.batch_size = toml_usize(v, config.queue.batch_size);
            }
            if let Some(v) = queue.get("max_effects_per_frame") {
                config.queue.max_effects_per_frame =
                    toml_usize(v, config.queue.max_effects_per_frame);
            }
            if let Some(v) = queue.get("default_max_age") {
                config.queue.default_max_age =
                    toml_f32(v, config.queue.default_max_age as f32) as f64;
            }
        }

        if let Some(perf) = table.get("performance").and_then(|v| v.as_table()) {
            if let Some(v) = perf.get("target_fps") {
                config.perf.target_fps = toml_f32(v, config.perf.target_fps as f32) as f64;
            }
            if let Some(v) = perf.get("adaptive") {
                config.perf.adaptive = v.as_bool().unwrap_or(config.perf.adaptive);
            }
            if let Some(v) = perf.get("cooldown_frames") {
                config.perf.cooldown_frames = v.as_integer().unwrap_or(10).max(0) as u32;
            }
        }

        config
    }
}

/// Per-call spawn tweaks. Unset fields fall back to the effect
/// definition and queue defaults.
#[derive(Clone, Debug, Default)]
pub struct SpawnOptions {
    pub priority: Option<i32>,
    pub count: Option<u32>,
    pub scale: Option<f32>,
    pub velocity: Option<Vec3>,
    pub max_age: Option<f64>,
    pub batch_key: Option<String>,
}

/// The particle lifecycle engine.
pub struct ParticleEngine {
    config: EngineConfig,
    clock: FrameClock,
    pool: ResourcePool,
    store: AttributeStore,
    queue: EffectQueue,
    lod: SpatialLod,
    perf: PerformanceController,
    registry: EffectRegistry,
    patterns: Box<dyn PatternGenerator>,
    rng: EngineRng,
    active: Vec<ParticleId>,
}

impl ParticleEngine {
    pub fn new(
        config: EngineConfig,
        registry: EffectRegistry,
        factory: Box<dyn ParticleFactory>,
        patterns: Box<dyn PatternGenerator>,
    ) -> Self {
        let mut pool = ResourcePool::new(config.pool.clone(), factory);
        pool.begin_warm_up(config.pool.pool_size, config.warm_up_per_tick);
        Self {
            store: AttributeStore::new(config.max_particles),
            queue: EffectQueue::new(config.queue.clone()),
            lod: SpatialLod::new(config.update_radius),
            perf: PerformanceController::new(config.perf.clone()),
            rng: EngineRng::new(config.rng_seed),
            clock: FrameClock::new(),
            pool,
            registry,
            patterns,
            config,
            active: Vec::new(),
        }
    }

    /// Queue a spawn request. Returns false when the effect name is
    /// unknown or the queue refuses the entry.
    pub fn spawn(&mut self, effect: &str, position: Vec3, options: SpawnOptions) -> bool {
        let Some(definition) = self.registry.resolve(effect) else {
            eprintln!("[engine] spawn of unknown effect '{effect}' ignored");
            return false;
        };
        let priority = options.priority.unwrap_or(definition.priority);

        let mut request = EffectRequest::new(effect, position).with_priority(priority);
        if let Some(age) = options.max_age {
            request = request.with_max_age(age);
        }
        if let Some(key) = options.batch_key {
            request = request.with_batch_key(key);
        }
        request = request.with_overrides(SpawnOverrides {
            count: options.count,
            scale: options.scale,
            velocity: options.velocity,
        });
        self.queue.enqueue(request, self.clock.total_time)
    }

    /// Advance the whole engine one frame. Errors from the host factory
    /// are absorbed inside the pool; this never fails.
    pub fn update(&mut self) {
        self.clock.tick();
        self.pool.tick(self.clock.tick_index);
        self.process_queue();
        self.advance_particles(self.clock.delta_time as f32);
        self.perf.update(self.active.len(), self.pool.size());
    }

    /// Replace the LOD reference set (camera or player positions).
    pub fn set_reference_positions(&mut self, positions: Vec<Vec3>) {
        self.lod.set_reference_positions(positions);
    }

    /// Pin or unpin a particle to update every tick regardless of tier.
    pub fn set_force_update(&mut self, id: ParticleId, enabled: bool) {
        let Some(slot) = self.pool.handle(id).slot else {
            return;
        };
        let flags = self.store.flags(slot);
        let updated = if enabled {
            flags.union(SlotFlags::FORCE_UPDATE)
        } else {
            SlotFlags(flags.0 & !SlotFlags::FORCE_UPDATE.0)
        };
        self.store.set_flags(slot, updated);
    }

    /// Retire every live particle and drop all queued requests. The pool
    /// keeps its free handles for reuse.
    pub fn despawn_all(&mut self) {
        for id in self.active.drain(..) {
            if let Some(slot) = self.pool.handle(id).slot {
                self.store.release(slot);
            }
        }
        self.pool.clear();
        self.queue.clear();
    }

    /// Tear the engine down. The host drops it afterwards.
    pub fn dispose(&mut self) {
        self.despawn_all();
        println!("[engine] disposed after {} ticks", self.clock.tick_index);
    }

    pub fn active_particles(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> &[ParticleId] {
        &self.active
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn store(&self) -> &AttributeStore {
        &self.store
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn queue_status(&self) -> QueueStats {
        self.queue.stats()
    }

    pub fn metrics(&self) -> PerfMetrics {
        self.perf.metrics()
    }

    pub fn performance_report(&self) -> String {
        self.perf.report()
    }

    fn process_queue(&mut self) {
        let batch = self.queue.dequeue_effects(self.clock.total_time);
        if batch.is_empty() {
            return;
        }

        // Group by batch key, preserving first-seen (priority) order
        let mut groups: Vec<(String, Vec<QueuedEffect>)> = Vec::new();
        for entry in batch {
            match groups.iter_mut().find(|(key, _)| *key == entry.batch_key) {
                Some((_, list)) => list.push(entry),
                None => groups.push((entry.batch_key.clone(), vec![entry])),
            }
        }

        for (_, entries) in groups {
            let first = &entries[0];
            let Some(definition) = self.registry.resolve(&first.effect) else {
                eprintln!("[engine] queued effect '{}' is not registered", first.effect);
                continue;
            };
            let definition = definition.clone();

            let count: u32 = entries
                .iter()
                .map(|e| e.overrides.count.unwrap_or(definition.count))
                .sum();
            let override_scale = entries.iter().find_map(|e| e.overrides.scale).unwrap_or(1.0);
            let extra_velocity = entries
                .iter()
                .find_map(|e| e.overrides.velocity)
                .unwrap_or(Vec3::ZERO);
            let scale = definition.scale * self.perf.scale_modifier() * override_scale;
            let origin = first.position;
            let effect = first.effect.clone();

            let points = self.patterns.generate(&definition, origin, count, scale);
            for point in points {
                if !self.spawn_particle(&definition, &effect, point, extra_velocity, scale) {
                    // Budget or pool exhausted; remaining points are dropped
                    return;
                }
            }
        }
    }

    fn spawn_particle(
        &mut self,
        definition: &ember_effects::EffectDefinition,
        effect: &str,
        point: SpawnPoint,
        extra_velocity: Vec3,
        scale: f32,
    ) -> bool {
        if self.active.len() >= self.config.max_particles {
            return false;
        }
        if !self.perf.should_spawn(self.active.len()) {
            return false;
        }

        let velocity = point.velocity + extra_velocity;
        let config = ParticleConfig {
            effect: effect.to_string(),
            physics: definition.physics,
            animation: definition.animation,
            scale,
        };
        let Some(id) = self
            .pool
            .acquire(config, Some(point.position), velocity, point.angular_velocity)
        else {
            return false;
        };
        let Some(slot) = self.store.allocate() else {
            self.pool.release(id);
            return false;
        };

        self.store.set_velocity(slot, velocity);
        self.store.set_angular_velocity(slot, point.angular_velocity);
        let mut flags = SlotFlags::ACTIVE;
        if matches!(definition.physics, PhysicsMode::Ballistic { .. }) {
            flags = flags.union(SlotFlags::PHYSICS);
        }
        if matches!(definition.animation, AnimationMode::Scaling { .. }) {
            flags = flags.union(SlotFlags::ANIMATED);
        }
        self.store.set_flags(slot, flags);

        let lifetime = self.rng.range(definition.lifetime_min, definition.lifetime_max);
        let handle = self.pool.handle_mut(id);
        handle.slot = Some(slot);
        handle.total_lifetime = lifetime;
        handle.remaining_lifetime = lifetime;
        handle.position = point.position;

        self.active.push(id);
        true
    }

    fn advance_particles(&mut self, dt: f32) {
        let mut expired: HashSet<ParticleId> = HashSet::new();

        for i in 0..self.active.len() {
            let id = self.active[i];
            let (slot, position) = {
                let handle = self.pool.handle(id);
                (handle.slot, handle.position)
            };
            let Some(slot) = slot else {
                expired.insert(id);
                continue;
            };

            let counter = self.store.increment_counter(slot);
            let divisor = self.lod.classify(position).update_divisor();
            let flags = self.store.flags(slot);
            if divisor == 0 && !flags.contains(SlotFlags::FORCE_UPDATE) {
                // Frozen: no motion, no lifetime decay
                continue;
            }
            let divisor = divisor.max(1);
            if counter % divisor != 0 {
                continue;
            }
            // Reduced tiers integrate over the skipped ticks so average
            // motion stays correct
            let step = dt * divisor as f32;

            let (physics, animation) = match &self.pool.handle(id).config {
                Some(c) => (c.physics, c.animation),
                None => (PhysicsMode::Disabled, AnimationMode::Static),
            };

            let mut velocity = self.store.velocity(slot);
            if flags.contains(SlotFlags::PHYSICS) {
                if let PhysicsMode::Ballistic { gravity, damping } = physics {
                    velocity = velocity + gravity * step;
                    if damping > 0.0 {
                        velocity = velocity * (1.0 - damping * step).max(0.0);
                    }
                    self.store.set_velocity(slot, velocity);
                }
            }
            let new_position = position + velocity * step;

            let (remaining, progress) = {
                let handle = self.pool.handle_mut(id);
                handle.position = new_position;
                handle.remaining_lifetime -= step;
                let progress = if handle.total_lifetime > 0.0 {
                    (1.0 - handle.remaining_lifetime / handle.total_lifetime).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                (handle.remaining_lifetime, progress)
            };
            self.store.set_lifetime_progress(slot, progress);

            if flags.contains(SlotFlags::ANIMATED) {
                if let AnimationMode::Scaling { start, end } = animation {
                    self.store.set_scratch(slot, 0, start + (end - start) * progress);
                }
            }

            if remaining <= 0.0 || !self.in_world_bounds(new_position) {
                expired.insert(id);
            }
        }

        if expired.is_empty() {
            return;
        }
        for id in &expired {
            if let Some(slot) = self.pool.handle(*id).slot {
                self.store.release(slot);
            }
            self.pool.release(*id);
        }
        self.active.retain(|id| !expired.contains(id));
    }

    fn in_world_bounds(&self, p: Vec3) -> bool {
        p.x >= self.config.world_min.x
            && p.x <= self.config.world_max.x
            && p.y >= self.config.world_min.y
            && p.y <= self.config.world_max.y
            && p.z >= self.config.world_min.z
            && p.z <= self.config.world_max.z
    }
}

// ── TOML helpers (handle integer/float coercion) ──

fn toml_f32(v: &toml::Value, default: f32) -> f32 {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
        .unwrap_or(default)
}

fn toml_usize(v: &toml::Value, default: usize) -> usize {
    v.as_integer()
        .map(|i| i.max(0) as usize)
        .unwrap_or(default)
}

fn toml_vec3(v: &toml::Value, default: Vec3) -> Vec3 {
    if let Some(arr) = v.as_array() {
        if arr.len() >= 3 {
            return Vec3::new(
                toml_f32(&arr[0], default.x),
                toml_f32(&arr[1], default.y),
                toml_f32(&arr[2], default.z),
            );
        }
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::NullFactory;
    use ember_effects::EffectDefinition;

    /// Emits `count` points at the origin with a fixed upward velocity.
    struct BurstStub;

    impl PatternGenerator for BurstStub {
        fn generate(
            &mut self,
            _definition: &EffectDefinition,
            origin: Vec3,
            count: u32,
            _scale: f32,
        ) -> Vec<SpawnPoint> {
            (0..count)
                .map(|_| SpawnPoint {
                    position: origin,
                    velocity: Vec3::UP,
                    angular_velocity: Vec3::ZERO,
                })
                .collect()
        }
    }

    fn effect(count: u32, lifetime: f32) -> EffectDefinition {
        EffectDefinition {
            count,
            lifetime_min: lifetime,
            lifetime_max: lifetime,
            physics: PhysicsMode::Disabled,
            ..EffectDefinition::default()
        }
    }

    fn engine_with(config: EngineConfig, registry: EffectRegistry) -> ParticleEngine {
        ParticleEngine::new(config, registry, Box::new(NullFactory), Box::new(BurstStub))
    }

    fn default_engine(registry: EffectRegistry) -> ParticleEngine {
        engine_with(EngineConfig::default(), registry)
    }

    #[test]
    fn spawn_unknown_effect_is_rejected() {
        let mut engine = default_engine(EffectRegistry::new());
        assert!(!engine.spawn("nope", Vec3::ZERO, SpawnOptions::default()));
        engine.update();
        assert_eq!(engine.active_particles(), 0);
    }

    #[test]
    fn spawn_then_update_activates_particles() {
        let mut registry = EffectRegistry::new();
        registry.register("spark", effect(4, 100.0));
        let mut engine = default_engine(registry);

        assert!(engine.spawn("spark", Vec3::ZERO, SpawnOptions::default()));
        engine.update();
        assert_eq!(engine.active_particles(), 4);
        assert_eq!(engine.store().in_use_count(), 4);
        assert_eq!(engine.pool_stats().active, 4);
    }

    #[test]
    fn count_override_beats_definition() {
        let mut registry = EffectRegistry::new();
        registry.register("spark", effect(4, 100.0));
        let mut engine = default_engine(registry);

        engine.spawn(
            "spark",
            Vec3::ZERO,
            SpawnOptions {
                count: Some(2),
                ..SpawnOptions::default()
            },
        );
        engine.update();
        assert_eq!(engine.active_particles(), 2);
    }

    #[test]
    fn same_cell_requests_spawn_as_one_batch() {
        let mut registry = EffectRegistry::new();
        registry.register("spark", effect(3, 100.0));
        let mut engine = default_engine(registry);

        engine.spawn("spark", Vec3::new(0.1, 0.0, 0.2), SpawnOptions::default());
        engine.spawn("spark", Vec3::new(0.8, 0.0, 0.9), SpawnOptions::default());
        engine.update();
        assert_eq!(engine.active_particles(), 6);
    }

    #[test]
    fn zero_lifetime_particles_retire_and_free_their_slots() {
        let mut registry = EffectRegistry::new();
        registry.register("flash", effect(5, 0.0));
        let mut engine = default_engine(registry);

        engine.spawn("flash", Vec3::ZERO, SpawnOptions::default());
        engine.update();
        assert_eq!(engine.active_particles(), 0);
        assert_eq!(engine.store().in_use_count(), 0);
        assert_eq!(engine.pool_stats().active, 0);
    }

    #[test]
    fn out_of_radius_particles_freeze() {
        let mut registry = EffectRegistry::new();
        registry.register("flash", effect(2, 0.0));
        let mut engine = default_engine(registry);

        // Reference far away: spawn point is beyond the 100.0 radius
        engine.set_reference_positions(vec![Vec3::new(500.0, 0.0, 0.0)]);
        engine.spawn("flash", Vec3::ZERO, SpawnOptions::default());
        engine.update();
        // Frozen particles never reach the expiry check
        assert_eq!(engine.active_particles(), 2);

        engine.update();
        assert_eq!(engine.active_particles(), 2);

        // Reference returns: particles thaw and expire
        engine.set_reference_positions(vec![Vec3::ZERO]);
        engine.update();
        assert_eq!(engine.active_particles(), 0);
    }

    #[test]
    fn force_update_overrides_frozen_tier() {
        let mut registry = EffectRegistry::new();
        registry.register("flash", effect(1, 0.0));
        let mut engine = default_engine(registry);

        engine.set_reference_positions(vec![Vec3::new(500.0, 0.0, 0.0)]);
        engine.spawn("flash", Vec3::ZERO, SpawnOptions::default());
        engine.update();
        assert_eq!(engine.active_particles(), 1);

        let id = engine.active_ids()[0];
        engine.set_force_update(id, true);
        engine.update();
        assert_eq!(engine.active_particles(), 0);
    }

    #[test]
    fn no_reference_positions_fails_open() {
        let mut registry = EffectRegistry::new();
        registry.register("flash", effect(3, 0.0));
        let mut engine = default_engine(registry);

        // No references at all: everything updates, so these expire
        engine.spawn(
            "flash",
            Vec3::new(900.0, 0.0, 900.0),
            SpawnOptions::default(),
        );
        engine.update();
        assert_eq!(engine.active_particles(), 0);
    }

    #[test]
    fn quality_budget_caps_spawning() {
        let mut registry = EffectRegistry::new();
        registry.register("spark", effect(10, 100.0));
        let mut config = EngineConfig::default();
        config.perf.high.max_particles = 3;
        let mut engine = engine_with(config, registry);

        engine.spawn("spark", Vec3::ZERO, SpawnOptions::default());
        engine.update();
        assert_eq!(engine.active_particles(), 3);
    }

    #[test]
    fn engine_cap_bounds_active_particles() {
        let mut registry = EffectRegistry::new();
        registry.register("spark", effect(50, 100.0));
        let config = EngineConfig {
            max_particles: 8,
            ..EngineConfig::default()
        };
        let mut engine = engine_with(config, registry);

        engine.spawn("spark", Vec3::ZERO, SpawnOptions::default());
        engine.update();
        assert_eq!(engine.active_particles(), 8);
    }

    #[test]
    fn despawn_all_clears_engine_but_keeps_pool_handles() {
        let mut registry = EffectRegistry::new();
        registry.register("spark", effect(4, 100.0));
        let mut engine = default_engine(registry);

        engine.spawn("spark", Vec3::ZERO, SpawnOptions::default());
        engine.update();
        assert_eq!(engine.active_particles(), 4);

        engine.spawn("spark", Vec3::ZERO, SpawnOptions::default());
        engine.despawn_all();
        assert_eq!(engine.active_particles(), 0);
        assert_eq!(engine.store().in_use_count(), 0);
        assert_eq!(engine.pool_stats().active, 0);
        assert!(engine.queue_status().len == 0);

        // Handles survive teardown for reuse
        assert!(engine.pool_stats().available >= 4);
    }

    #[test]
    fn config_parses_from_toml() {
        let toml_str = r#"
max_particles = 300
update_radius = 50.0
world_min = [-10, -10, -10]
world_max = [10, 10, 10]

[pool]
size = 16
growth_factor = 2.0

[queue]
max_size = 64
batch_size = 4

[performance]
target_fps = 30
adaptive = false
"#;
        let table: toml::value::Table = toml::from_str(toml_str).unwrap();
        let config = EngineConfig::from_toml(&table);
        assert_eq!(config.max_particles, 300);
        assert!((config.update_radius - 50.0).abs() < 0.01);
        assert_eq!(config.world_max, Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(config.pool.pool_size, 16);
        assert!((config.pool.growth_factor - 2.0).abs() < 0.01);
        assert_eq!(config.queue.max_size, 64);
        assert_eq!(config.queue.batch_size, 4);
        assert!((config.perf.target_fps - 30.0).abs() < 0.01);
        assert!(!config.perf.adaptive);
    }

    #[test]
    fn update_with_empty_queue_is_harmless() {
        let mut engine = default_engine(EffectRegistry::new());
        for _ in 0..5 {
            engine.update();
        }
        assert_eq!(engine.active_particles(), 0);
    }
}
