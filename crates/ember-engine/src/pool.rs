//! Resource pool: reusable particle handles with deferred settle/park
//!
//! Handles are slab entries reused indefinitely. A handle is in exactly one
//! of four states: free, pending settle (freshly constructed, not yet safe
//! to hand out), active, or parked (released, waiting to rejoin the free
//! list). Settle and park transitions are deferred by a fixed number of
//! ticks and drained at the top of each engine update, so they never block
//! the tick that scheduled them.

use crate::factory::ParticleFactory;
use ember_core::{ParticleId, Vec3};
use ember_effects::{AnimationMode, PhysicsMode};

/// Per-particle configuration carried by an active handle
#[derive(Debug, Clone)]
pub struct ParticleConfig {
    pub effect: String,
    pub physics: PhysicsMode,
    pub animation: AnimationMode,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Free,
    PendingSettle,
    Active,
    Parked,
    Retired,
}

/// One reusable particle handle
pub struct ParticleHandle {
    pub id: ParticleId,
    /// Attribute-store slot, None while unallocated
    pub slot: Option<usize>,
    pub config: Option<ParticleConfig>,
    pub spawned_tick: u64,
    pub total_lifetime: f32,
    pub remaining_lifetime: f32,
    pub position: Vec3,
    state: HandleState,
}

impl ParticleHandle {
    fn new(id: ParticleId) -> Self {
        Self {
            id,
            slot: None,
            config: None,
            spawned_tick: 0,
            total_lifetime: 0.0,
            remaining_lifetime: 0.0,
            position: Vec3::ZERO,
            state: HandleState::Free,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == HandleState::Active
    }
}

/// Pool sizing and scheduling knobs
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Steady-state pool size the warm-up aims for
    pub pool_size: usize,
    /// Active handles may grow to `pool_size * growth_factor`
    pub growth_factor: f32,
    /// Ticks between constructing a handle and it becoming acquirable
    pub settle_delay_ticks: u64,
    /// Ticks between releasing a handle and it rejoining the free list
    pub park_delay_ticks: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 64,
            growth_factor: 1.5,
            settle_delay_ticks: 2,
            park_delay_ticks: 2,
        }
    }
}

/// Pool observability snapshot
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub available: usize,
    pub active: usize,
    pub pending_settle: usize,
    pub total_created: u64,
    pub destroyed: u64,
    /// (active + available) / total_created; trends toward 1 once the
    /// pool stops net-creating objects
    pub efficiency: f32,
}

struct SettleTask {
    id: ParticleId,
    due_tick: u64,
}

struct ParkTask {
    id: ParticleId,
    due_tick: u64,
}

struct ActivationTask {
    id: ParticleId,
    position: Vec3,
    velocity: Vec3,
    angular_velocity: Vec3,
    due_tick: u64,
}

/// Owns the set of reusable particle handles.
pub struct ResourcePool {
    config: PoolConfig,
    handles: Vec<ParticleHandle>,
    free: Vec<ParticleId>,
    pending_settle: Vec<SettleTask>,
    pending_park: Vec<ParkTask>,
    deferred_activations: Vec<ActivationTask>,
    /// Slab slots of destroyed handles, reused by the next construction
    retired: Vec<ParticleId>,
    factory: Box<dyn ParticleFactory>,
    total_created: u64,
    destroyed: u64,
    active_count: usize,
    warm_target: usize,
    warm_per_tick: usize,
    current_tick: u64,
}

impl ResourcePool {
    pub fn new(config: PoolConfig, factory: Box<dyn ParticleFactory>) -> Self {
        Self {
            config,
            handles: Vec::new(),
            free: Vec::new(),
            pending_settle: Vec::new(),
            pending_park: Vec::new(),
            deferred_activations: Vec::new(),
            retired: Vec::new(),
            factory,
            total_created: 0,
            destroyed: 0,
            active_count: 0,
            warm_target: 0,
            warm_per_tick: 0,
            current_tick: 0,
        }
    }

    fn cap(&self) -> usize {
        (self.config.pool_size as f32 * self.config.growth_factor) as usize
    }

    /// Handles that currently exist (all states but retired)
    pub fn size(&self) -> usize {
        self.handles.len() - self.retired.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn handle(&self, id: ParticleId) -> &ParticleHandle {
        &self.handles[id.index()]
    }

    pub fn handle_mut(&mut self, id: ParticleId) -> &mut ParticleHandle {
        &mut self.handles[id.index()]
    }

    /// Hand out a usable handle, preferring reuse over construction.
    ///
    /// Free handles have completed their settle delay and are activated in
    /// place immediately when a position is supplied. A freshly constructed
    /// handle is returned right away, but its host-side activation is
    /// deferred until the settle delay elapses. Returns None at capacity.
    pub fn acquire(
        &mut self,
        config: ParticleConfig,
        position: Option<Vec3>,
        velocity: Vec3,
        angular_velocity: Vec3,
    ) -> Option<ParticleId> {
        if let Some(id) = self.free.pop() {
            let tick = self.current_tick;
            {
                let handle = &mut self.handles[id.index()];
                handle.state = HandleState::Active;
                handle.config = Some(config);
                handle.spawned_tick = tick;
                if let Some(pos) = position {
                    handle.position = pos;
                }
            }
            self.active_count += 1;
            if let Some(pos) = position {
                if let Err(e) = self.factory.activate(id, pos, velocity, angular_velocity) {
                    eprintln!("[pool] activate failed for {id}: {e}");
                }
            }
            return Some(id);
        }

        if self.active_count >= self.cap() {
            return None;
        }

        let id = self.construct_handle();
        let due_tick = self.current_tick + self.config.settle_delay_ticks;
        {
            let handle = &mut self.handles[id.index()];
            handle.state = HandleState::Active;
            handle.config = Some(config);
            handle.spawned_tick = self.current_tick;
            if let Some(pos) = position {
                handle.position = pos;
            }
        }
        self.active_count += 1;
        if let Some(pos) = position {
            self.deferred_activations.push(ActivationTask {
                id,
                position: pos,
                velocity,
                angular_velocity,
                due_tick,
            });
        }
        Some(id)
    }

    /// Park an active handle for reuse.
    ///
    /// The handle is deactivated now; it rejoins the free list only after
    /// the park delay, and only if the free list is not saturated at that
    /// point (otherwise the underlying object is destroyed). Releasing a
    /// handle that is not active is a logged no-op.
    pub fn release(&mut self, id: ParticleId) {
        if self.handles[id.index()].state != HandleState::Active {
            eprintln!("[pool] release of handle {id} that is not active");
            return;
        }
        {
            let handle = &mut self.handles[id.index()];
            handle.state = HandleState::Parked;
            handle.config = None;
            handle.slot = None;
        }
        self.active_count -= 1;
        if let Err(e) = self.factory.park(id) {
            eprintln!("[pool] park failed for {id}: {e}");
        }
        self.pending_park.push(ParkTask {
            id,
            due_tick: self.current_tick + self.config.park_delay_ticks,
        });
    }

    /// Start background warm-up toward `target_size` handles, constructing
    /// at most `per_tick_spawn` per tick.
    pub fn begin_warm_up(&mut self, target_size: usize, per_tick_spawn: usize) {
        self.warm_target = target_size;
        self.warm_per_tick = per_tick_spawn;
    }

    /// Advance the pool one tick: drain due settle/park/activation tasks,
    /// then run one warm-up step. Each task re-checks capacity at run time,
    /// since capacity may have changed while the delay was pending.
    pub fn tick(&mut self, tick_index: u64) {
        self.current_tick = tick_index;
        self.drain_settled();
        self.drain_parked();
        self.drain_activations();
        self.warm_up_step();
    }

    fn drain_settled(&mut self) {
        let current = self.current_tick;
        let mut due = Vec::new();
        self.pending_settle.retain(|task| {
            if task.due_tick <= current {
                due.push(task.id);
                false
            } else {
                true
            }
        });
        for id in due {
            if self.handles[id.index()].state != HandleState::PendingSettle {
                continue;
            }
            if self.free.len() < self.cap() {
                self.handles[id.index()].state = HandleState::Free;
                self.free.push(id);
            } else {
                self.destroy(id);
            }
        }
    }

    fn drain_parked(&mut self) {
        let current = self.current_tick;
        let mut due = Vec::new();
        self.pending_park.retain(|task| {
            if task.due_tick <= current {
                due.push(task.id);
                false
            } else {
                true
            }
        });
        for id in due {
            if self.handles[id.index()].state != HandleState::Parked {
                continue;
            }
            if self.free.len() < self.cap() {
                self.handles[id.index()].state = HandleState::Free;
                self.free.push(id);
            } else {
                self.destroy(id);
            }
        }
    }

    fn drain_activations(&mut self) {
        let current = self.current_tick;
        let mut due = Vec::new();
        self.deferred_activations.retain(|task| {
            if task.due_tick <= current {
                due.push((task.id, task.position, task.velocity, task.angular_velocity));
                false
            } else {
                true
            }
        });
        for (id, position, velocity, angular_velocity) in due {
            // The handle may have been released while the delay was pending
            if self.handles[id.index()].state != HandleState::Active {
                continue;
            }
            if let Err(e) = self.factory.activate(id, position, velocity, angular_velocity) {
                eprintln!("[pool] deferred activate failed for {id}: {e}");
            }
        }
    }

    fn warm_up_step(&mut self) {
        if self.warm_target == 0 {
            return;
        }
        if self.size() >= self.warm_target {
            println!("[pool] warm-up complete ({} handles)", self.size());
            self.warm_target = 0;
            return;
        }
        let mut spawned = 0;
        while self.size() < self.warm_target
            && spawned < self.warm_per_tick
            && self.free.len() + self.pending_settle.len() < self.cap()
        {
            let id = self.construct_handle();
            self.handles[id.index()].state = HandleState::PendingSettle;
            if let Err(e) = self.factory.park(id) {
                eprintln!("[pool] warm-up park failed for {id}: {e}");
            }
            self.pending_settle.push(SettleTask {
                id,
                due_tick: self.current_tick + self.config.settle_delay_ticks,
            });
            spawned += 1;
        }
    }

    /// Synchronously deactivate every active handle. Free handles are kept;
    /// they remain valid for reuse by a restarted engine.
    pub fn clear(&mut self) {
        let active_ids: Vec<ParticleId> = self
            .handles
            .iter()
            .filter(|h| h.state == HandleState::Active)
            .map(|h| h.id)
            .collect();
        for id in active_ids {
            {
                let handle = &mut self.handles[id.index()];
                handle.state = HandleState::Free;
                handle.config = None;
                handle.slot = None;
            }
            if let Err(e) = self.factory.park(id) {
                eprintln!("[pool] park failed for {id}: {e}");
            }
            self.free.push(id);
        }
        self.active_count = 0;

        // In-flight transitions complete immediately on teardown
        let parked: Vec<ParticleId> = self.pending_park.drain(..).map(|t| t.id).collect();
        let settling: Vec<ParticleId> = self.pending_settle.drain(..).map(|t| t.id).collect();
        for id in parked.into_iter().chain(settling) {
            let handle = &mut self.handles[id.index()];
            if handle.state == HandleState::Parked || handle.state == HandleState::PendingSettle {
                handle.state = HandleState::Free;
                self.free.push(id);
            }
        }
        self.deferred_activations.clear();
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.free.len();
        let pending = self.pending_settle.len() + self.pending_park.len();
        let efficiency = if self.total_created == 0 {
            1.0
        } else {
            (self.active_count + available) as f32 / self.total_created as f32
        };
        PoolStats {
            available,
            active: self.active_count,
            pending_settle: pending,
            total_created: self.total_created,
            destroyed: self.destroyed,
            efficiency,
        }
    }

    fn construct_handle(&mut self) -> ParticleId {
        let id = if let Some(id) = self.retired.pop() {
            self.handles[id.index()] = ParticleHandle::new(id);
            id
        } else {
            let id = ParticleId::from_raw(self.handles.len() as u32);
            self.handles.push(ParticleHandle::new(id));
            id
        };
        self.total_created += 1;
        if let Err(e) = self.factory.construct(id) {
            eprintln!("[pool] construct failed for {id}: {e}");
        }
        id
    }

    fn destroy(&mut self, id: ParticleId) {
        if let Err(e) = self.factory.despawn(id) {
            eprintln!("[pool] despawn failed for {id}: {e}");
        }
        self.handles[id.index()].state = HandleState::Retired;
        self.retired.push(id);
        self.destroyed += 1;
    }
}
