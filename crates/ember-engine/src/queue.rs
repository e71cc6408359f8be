//! Effect queue: priority-ordered, batched, staleness-evicting
//!
//! Spawn requests are buffered here instead of hitting the pool directly.
//! The queue keeps entries sorted by priority (stable within equal
//! priority), drops entries that sit too long, and hands the engine a
//! bounded batch each frame.

use std::collections::{BTreeMap, HashMap};

use ember_core::Vec3;

/// Optional per-request tweaks applied on top of the effect definition.
#[derive(Clone, Debug, Default)]
pub struct SpawnOverrides {
    pub count: Option<u32>,
    pub scale: Option<f32>,
    pub velocity: Option<Vec3>,
}

impl SpawnOverrides {
    pub fn is_empty(&self) -> bool {
        self.count.is_none() && self.scale.is_none() && self.velocity.is_none()
    }
}

/// A spawn request as submitted by the host.
#[derive(Clone, Debug)]
pub struct EffectRequest {
    pub effect: String,
    pub position: Vec3,
    pub overrides: SpawnOverrides,
    pub priority: i32,
    /// Seconds the request may wait before it is dropped. Zero or
    /// negative means use the queue default.
    pub max_age: f64,
    /// Requests sharing a batch key are merged into one pattern
    /// generation. Empty means derive from effect name and cell.
    pub batch_key: String,
}

impl EffectRequest {
    pub fn new(effect: impl Into<String>, position: Vec3) -> Self {
        Self {
            effect: effect.into(),
            position,
            overrides: SpawnOverrides::default(),
            priority: 0,
            max_age: 0.0,
            batch_key: String::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_age(mut self, max_age: f64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_batch_key(mut self, key: impl Into<String>) -> Self {
        self.batch_key = key.into();
        self
    }

    pub fn with_overrides(mut self, overrides: SpawnOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// A queued entry. `seq` preserves arrival order among equal priorities.
#[derive(Clone, Debug)]
pub struct QueuedEffect {
    pub effect: String,
    pub position: Vec3,
    pub overrides: SpawnOverrides,
    pub priority: i32,
    pub enqueued_at: f64,
    pub max_age: f64,
    pub batch_key: String,
    seq: u64,
}

impl QueuedEffect {
    pub fn age(&self, now: f64) -> f64 {
        now - self.enqueued_at
    }

    pub fn is_expired(&self, now: f64) -> bool {
        self.age(now) > self.max_age
    }
}

#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Hard cap on queued entries
    pub max_size: usize,
    /// Max entries per batch key handed out in one dequeue
    pub batch_size: usize,
    /// Max entries handed out per dequeue across all keys
    pub max_effects_per_frame: usize,
    /// Staleness budget for requests that do not set their own
    pub default_max_age: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 256,
            batch_size: 16,
            max_effects_per_frame: 32,
            default_max_age: 0.5,
        }
    }
}

/// Snapshot of queue composition for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct QueueStats {
    pub len: usize,
    pub by_priority: BTreeMap<i32, usize>,
    pub by_effect: HashMap<String, usize>,
}

/// Priority queue of pending spawn requests.
///
/// Entries are kept sorted by descending priority; among equal
/// priorities, earlier arrivals come first. Both insert and dequeue
/// preserve this order.
pub struct EffectQueue {
    config: QueueConfig,
    entries: Vec<QueuedEffect>,
    next_seq: u64,
    dropped_overflow: u64,
    dropped_stale: u64,
}

impl EffectQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            next_seq: 0,
            dropped_overflow: 0,
            dropped_stale: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dropped_overflow(&self) -> u64 {
        self.dropped_overflow
    }

    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale
    }

    /// Enqueue a request at `now` seconds. Returns false when the queue
    /// is saturated even after pruning.
    pub fn enqueue(&mut self, request: EffectRequest, now: f64) -> bool {
        if self.entries.len() >= self.config.max_size {
            self.prune_expired(now);
        }
        if self.entries.len() >= self.config.max_size {
            // Still full: truncate the low-priority tail to 80% and
            // admit the new entry into the freed space.
            let keep = (self.config.max_size * 4) / 5;
            let cut = self.entries.len() - keep;
            self.entries.truncate(keep);
            self.dropped_overflow += cut as u64;
            println!(
                "[queue] overflow: dropped {cut} low-priority entries ({keep} kept)"
            );
        }
        if self.entries.len() >= self.config.max_size {
            self.dropped_overflow += 1;
            return false;
        }

        let max_age = if request.max_age > 0.0 {
            request.max_age
        } else {
            self.config.default_max_age
        };
        let batch_key = if request.batch_key.is_empty() {
            Self::derive_batch_key(&request.effect, request.position)
        } else {
            request.batch_key
        };

        let entry = QueuedEffect {
            effect: request.effect,
            position: request.position,
            overrides: request.overrides,
            priority: request.priority,
            enqueued_at: now,
            max_age,
            batch_key,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        // Insert after all entries with priority >= ours, keeping the
        // list sorted descending and stable among equals.
        let at = self
            .entries
            .partition_point(|e| e.priority >= entry.priority);
        self.entries.insert(at, entry);
        true
    }

    /// Remove and return the entries to process this frame, in priority
    /// order. Applies the per-key batch cap and the global per-frame
    /// cap; expired entries encountered along the way are discarded.
    pub fn dequeue_effects(&mut self, now: f64) -> Vec<QueuedEffect> {
        let mut selected: Vec<QueuedEffect> = Vec::new();
        let mut retained: Vec<QueuedEffect> = Vec::new();
        let mut per_key: HashMap<String, usize> = HashMap::new();

        for entry in self.entries.drain(..) {
            if entry.is_expired(now) {
                self.dropped_stale += 1;
                continue;
            }
            if selected.len() >= self.config.max_effects_per_frame {
                retained.push(entry);
                continue;
            }
            let taken = per_key.entry(entry.batch_key.clone()).or_insert(0);
            if *taken >= self.config.batch_size {
                retained.push(entry);
                continue;
            }
            *taken += 1;
            selected.push(entry);
        }

        self.entries = retained;
        selected
    }

    /// Drop all entries older than their staleness budget.
    pub fn prune_expired(&mut self, now: f64) {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired(now));
        self.dropped_stale += (before - self.entries.len()) as u64;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            len: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            *stats.by_priority.entry(entry.priority).or_insert(0) += 1;
            *stats.by_effect.entry(entry.effect.clone()).or_insert(0) += 1;
        }
        stats
    }

    /// Same-effect requests landing in the same unit cell share a key,
    /// so a burst of hits on one spot becomes one pattern generation.
    fn derive_batch_key(effect: &str, position: Vec3) -> String {
        format!(
            "{}@{},{},{}",
            effect,
            position.x.floor() as i32,
            position.y.floor() as i32,
            position.z.floor() as i32
        )
    }
}
