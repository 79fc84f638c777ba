//! Bullet pool and manager
//!
//! [`BulletPool`] is fixed-capacity slot storage with generation-checked handles
//! and a creation-order list. [`BulletManager`] owns the pool together with the
//! task arena and the shared [`PatternContext`], and is the host-facing API.

use std::sync::Arc;

use glam::Vec2;

use super::interp::Interpreter;
use super::state::{Bullet, BulletId, BulletSnapshot, PatternContext, SequenceState, SpawnStats};
use super::task::{TaskArena, TaskId};
use crate::error::{PatternError, Result};
use crate::pattern::Pattern;
use crate::settings::{Bounds, Settings};

/// Bullet storage with a hard capacity
#[derive(Debug, Default)]
pub struct BulletPool {
    slots: Vec<Option<Bullet>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    /// Live bullets in creation order
    order: Vec<BulletId>,
    capacity: usize,
}

impl BulletPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Live bullets (including ones marked vanished this frame)
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.order.len() >= self.capacity
    }

    /// Allocate a fresh bullet, or `None` at capacity
    pub fn create_bullet(&mut self) -> Option<BulletId> {
        if self.is_full() {
            return None;
        }
        let id = if let Some(idx) = self.free_list.pop() {
            BulletId {
                idx,
                generation: self.generation[idx as usize],
            }
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(None);
            self.generation.push(0);
            BulletId { idx, generation: 0 }
        };
        self.slots[id.idx as usize] = Some(Bullet::new(id));
        self.order.push(id);
        Some(id)
    }

    fn is_current(&self, id: BulletId) -> bool {
        self.generation.get(id.idx as usize) == Some(&id.generation)
    }

    pub fn get(&self, id: BulletId) -> Option<&Bullet> {
        if !self.is_current(id) {
            return None;
        }
        self.slots[id.idx as usize].as_ref()
    }

    pub fn get_mut(&mut self, id: BulletId) -> Option<&mut Bullet> {
        if !self.is_current(id) {
            return None;
        }
        self.slots[id.idx as usize].as_mut()
    }

    /// Id of the `i`-th live bullet in creation order
    pub fn id_at(&self, i: usize) -> Option<BulletId> {
        self.order.get(i).copied()
    }

    /// Live bullets in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Bullet> + '_ {
        self.order.iter().filter_map(|&id| self.get(id))
    }

    /// Move a bullet out of its slot while it runs; the slot stays reserved
    pub(crate) fn take(&mut self, id: BulletId) -> Option<Bullet> {
        if !self.is_current(id) {
            return None;
        }
        self.slots[id.idx as usize].take()
    }

    /// Put a bullet back into its reserved slot
    pub(crate) fn place(&mut self, bullet: Bullet) {
        let id = bullet.id;
        if self.is_current(id) {
            self.slots[id.idx as usize] = Some(bullet);
        }
    }

    /// Free a slot, returning its bullet. Invalidates every handle to it.
    pub fn remove(&mut self, id: BulletId) -> Option<Bullet> {
        if !self.is_current(id) {
            return None;
        }
        let bullet = self.slots[id.idx as usize].take();
        self.generation[id.idx as usize] = self.generation[id.idx as usize].wrapping_add(1);
        self.free_list.push(id.idx);
        self.order.retain(|&live| live != id);
        bullet
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }
}

/// Runs bullet patterns: owns every bullet, every task and the shared context
#[derive(Debug)]
pub struct BulletManager {
    pub(super) pool: BulletPool,
    pub(super) tasks: TaskArena,
    pub(super) context: PatternContext,
    /// Bullets leaving these bounds (plus margin) are culled
    pub(super) cull: Option<Bounds>,
    pub(super) cull_margin: f32,
    pub(super) frame: u64,
}

impl BulletManager {
    pub fn new(settings: &Settings) -> Self {
        let capacity = settings.max_bullets();
        let rank = settings.effective_rank();
        log::info!(
            "Bullet manager: {} slots, rank {:.2}, difficulty {}",
            capacity,
            rank,
            settings.difficulty.as_str()
        );
        Self {
            pool: BulletPool::with_capacity(capacity),
            tasks: TaskArena::new(),
            context: PatternContext::new(settings.seed, rank),
            cull: settings.playfield,
            cull_margin: settings.cull_margin,
            frame: 0,
        }
    }

    /// Create a plain bullet with no pattern (host-driven).
    /// Returns `None` when the pool is full.
    pub fn create_bullet(&mut self, pos: Vec2, direction: f32, speed: f32) -> Option<BulletId> {
        let id = self.pool.create_bullet()?;
        if let Some(bullet) = self.pool.get_mut(id) {
            bullet.pos = pos;
            bullet.direction = direction;
            bullet.speed = speed;
        }
        Some(id)
    }

    /// Start a pattern on a new emitter bullet at `pos`.
    ///
    /// Every `top*` action becomes a root task of the emitter. Returns
    /// `Ok(None)` when the pool is full; structural errors leave nothing behind.
    pub fn spawn_pattern(&mut self, pattern: &Arc<Pattern>, pos: Vec2) -> Result<Option<BulletId>> {
        let tops = pattern.top_actions();
        if tops.is_empty() {
            return Err(PatternError::NoTopAction(pattern.name().to_string()));
        }

        let Some(id) = self.pool.create_bullet() else {
            self.context.stats.dropped += 1;
            log::debug!("{}: pool full, emitter not spawned", pattern.name());
            return Ok(None);
        };
        let Some(mut emitter) = self.pool.take(id) else {
            return Ok(None);
        };
        emitter.pos = pos;
        emitter.set_pattern(Arc::clone(pattern));

        let mut interp = Interpreter {
            tasks: &mut self.tasks,
            pool: &mut self.pool,
            ctx: &mut self.context,
            pattern: pattern.as_ref(),
        };
        let mut roots: Vec<TaskId> = Vec::new();
        for top in tops {
            match interp.parse_tasks(top, None, Vec::new(), &emitter) {
                Ok(Some(root)) => roots.push(root),
                Ok(None) => {}
                Err(e) => {
                    for root in roots {
                        interp.tasks.release(root);
                    }
                    self.pool.remove(id);
                    log::warn!("{}: activation failed: {}", pattern.name(), e);
                    return Err(e);
                }
            }
        }

        log::info!(
            "{}: spawned at ({:.1}, {:.1}) with {} root task(s)",
            pattern.name(),
            pos.x,
            pos.y,
            roots.len()
        );
        emitter.tasks = roots;
        self.pool.place(emitter);
        Ok(Some(id))
    }

    /// Recycle a bullet immediately, releasing its tasks.
    /// Returns false for stale handles.
    pub fn vanish(&mut self, id: BulletId) -> bool {
        let Some(bullet) = self.pool.remove(id) else {
            return false;
        };
        for task in bullet.tasks {
            self.tasks.release(task);
        }
        self.context.stats.recycled += 1;
        true
    }

    /// Drop every bullet and task
    pub fn clear(&mut self) {
        let ids: Vec<BulletId> = self.pool.order.clone();
        for id in ids {
            self.vanish(id);
        }
    }

    pub fn get(&self, id: BulletId) -> Option<&Bullet> {
        self.pool.get(id)
    }

    pub fn get_mut(&mut self, id: BulletId) -> Option<&mut Bullet> {
        self.pool.get_mut(id)
    }

    /// Live bullets in creation order
    pub fn bullets(&self) -> impl Iterator<Item = &Bullet> + '_ {
        self.pool.iter()
    }

    pub fn snapshots(&self) -> Vec<BulletSnapshot> {
        self.pool.iter().map(Bullet::snapshot).collect()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Change the pool capacity, recycling the oldest bullets beyond it
    pub fn set_capacity(&mut self, capacity: usize) {
        self.pool.set_capacity(capacity);
        let excess = self.pool.len().saturating_sub(capacity);
        if excess > 0 {
            log::debug!("Capacity {}: recycling {} oldest bullet(s)", capacity, excess);
        }
        for _ in 0..excess {
            let Some(oldest) = self.pool.id_at(0) else {
                break;
            };
            self.vanish(oldest);
        }
    }

    /// Live task count across all bullets
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn rank(&self) -> f32 {
        self.context.rank
    }

    pub fn set_rank(&mut self, rank: f32) {
        self.context.rank = rank.clamp(0.0, 1.0);
    }

    pub fn target(&self) -> Vec2 {
        self.context.target
    }

    /// Point that `aim` mode fires at
    pub fn set_target(&mut self, target: Vec2) {
        self.context.target = target;
    }

    pub fn sequence(&self) -> SequenceState {
        self.context.sequence
    }

    pub fn stats(&self) -> SpawnStats {
        self.context.stats
    }

    /// Frames processed by [`update`](Self::update)
    pub fn frame(&self) -> u64 {
        self.frame
    }
}
