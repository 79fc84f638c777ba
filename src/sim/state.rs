//! Bullet and execution-context types
//!
//! Everything a running pattern reads or writes besides its own task tree lives
//! here: the bullets themselves and the [`PatternContext`] shared by every fire
//! in one manager.

use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::task::TaskId;
use crate::heading;
use crate::pattern::{EvalScope, Pattern};

/// A handle to a bullet in a [`BulletManager`](super::BulletManager).
///
/// Slots are recycled; the generation counter makes handles to vanished
/// bullets detectably stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BulletId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl BulletId {
    /// Raw slot index (for diagnostics only)
    #[inline]
    pub const fn index(self) -> u32 {
        self.idx
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for BulletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BulletId({}@gen{})", self.idx, self.generation)
    }
}

/// A live bullet
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: BulletId,
    pub pos: Vec2,
    /// Radians, 0 = up, clockwise
    pub direction: f32,
    /// Pixels per frame at the reference rate
    pub speed: f32,
    /// Velocity added on top of direction/speed (driven by `<accel>`)
    pub extra_velocity: Vec2,
    /// Root tasks driving this bullet
    pub tasks: Vec<TaskId>,
    /// Frames this bullet has been ticked
    pub age: u32,
    pattern: Option<Arc<Pattern>>,
    vanished: bool,
}

impl Bullet {
    pub fn new(id: BulletId) -> Self {
        Self {
            id,
            pos: Vec2::ZERO,
            direction: 0.0,
            speed: 0.0,
            extra_velocity: Vec2::ZERO,
            tasks: Vec::new(),
            age: 0,
            pattern: None,
            vanished: false,
        }
    }

    /// Direction in degrees (the unit pattern expressions work in)
    pub fn direction_degrees(&self) -> f32 {
        self.direction.to_degrees()
    }

    /// Displacement per reference frame
    pub fn velocity(&self) -> Vec2 {
        heading(self.direction) * self.speed + self.extra_velocity
    }

    pub fn pattern(&self) -> Option<&Arc<Pattern>> {
        self.pattern.as_ref()
    }

    pub(crate) fn set_pattern(&mut self, pattern: Arc<Pattern>) {
        self.pattern = Some(pattern);
    }

    /// Mark for recycling at the end of the current frame
    pub fn vanish(&mut self) {
        self.vanished = true;
    }

    pub fn is_vanished(&self) -> bool {
        self.vanished
    }

    /// True once no root task is left to run
    pub fn tasks_finished(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn snapshot(&self) -> BulletSnapshot {
        BulletSnapshot {
            id: self.id,
            pos: self.pos,
            direction: self.direction,
            speed: self.speed,
        }
    }
}

/// Render-facing copy of a bullet's kinematic state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub id: BulletId,
    pub pos: Vec2,
    pub direction: f32,
    pub speed: f32,
}

/// Last fired direction (degrees) and speed, read by `sequence` mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceState {
    pub last_direction: f32,
    pub last_speed: f32,
}

impl SequenceState {
    pub fn record(&mut self, direction: f32, speed: f32) {
        self.last_direction = direction;
        self.last_speed = speed;
    }
}

/// Spawn bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnStats {
    /// Bullets created by fire tasks
    pub fired: u64,
    /// Fires that found the pool full
    pub dropped: u64,
    /// Bullets recycled (vanish, cull or capacity pressure)
    pub recycled: u64,
}

/// Execution context shared by every task in one manager
#[derive(Debug, Clone)]
pub struct PatternContext {
    pub sequence: SequenceState,
    /// Difficulty in [0, 1], read as `$rank`
    pub rank: f32,
    /// Aim point for `aim` mode
    pub target: Vec2,
    pub stats: SpawnStats,
    rng: Pcg32,
}

impl PatternContext {
    pub fn new(seed: u64, rank: f32) -> Self {
        Self {
            sequence: SequenceState::default(),
            rank: rank.clamp(0.0, 1.0),
            target: Vec2::ZERO,
            stats: SpawnStats::default(),
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Expression scope for a task with `params` running on `bullet`
    pub fn scope<'a>(&'a mut self, params: &'a [f32], bullet: &Bullet) -> EvalScope<'a> {
        EvalScope {
            params,
            rank: self.rank,
            rng: &mut self.rng,
            direction: bullet.direction_degrees(),
            speed: bullet.speed,
        }
    }
}
