//! Runtime tasks and their arena
//!
//! Every running pattern instance is a tree of [`Task`]s. Tasks live in a single
//! [`TaskArena`] owned by the bullet manager and refer to each other by
//! [`TaskId`]: `children` are owning edges, `owner` is a plain back-link that may
//! go stale once the owning bullet is recycled.

use std::fmt;

use glam::Vec2;

use super::fire::FireTask;
use crate::pattern::NodeId;

/// A handle to a task in a [`TaskArena`]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    idx: u32,
    generation: u32,
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}@gen{})", self.idx, self.generation)
    }
}

/// Result of running a task for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Still active, but later siblings may run this frame
    Continue,
    /// Blocked until a later frame
    Paused,
    /// Done; never runs again
    End,
}

/// Lifecycle of a task (only moves forward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPhase {
    Parsed,
    Running,
    Finished,
}

/// A per-frame change spread over `term` frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp<T> {
    pub delta: T,
    pub term: u32,
    pub elapsed: u32,
}

impl<T: Copy> Ramp<T> {
    pub fn new(delta: T, term: u32) -> Self {
        Self {
            delta,
            term: term.max(1),
            elapsed: 0,
        }
    }

    /// Advance one frame, returning the delta to apply and whether the ramp is done
    pub fn step(&mut self) -> (T, bool) {
        self.elapsed += 1;
        (self.delta, self.elapsed >= self.term)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepeatTask {
    /// Evaluated on first run
    pub times: Option<u32>,
    /// Completed iterations
    pub done: u32,
    /// Binding depth, reused for each fresh body
    pub depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WaitTask {
    pub remaining: Option<u32>,
}

/// `<changeDirection>` or `<changeSpeed>`
#[derive(Debug, Clone)]
pub struct ChangeTask {
    /// The `<direction>` or `<speed>` child
    pub value: NodeId,
    pub term: NodeId,
    pub ramp: Option<Ramp<f32>>,
}

#[derive(Debug, Clone)]
pub struct AccelTask {
    pub horizontal: Option<NodeId>,
    pub vertical: Option<NodeId>,
    pub term: NodeId,
    pub ramp: Option<Ramp<Vec2>>,
}

/// Kind-specific task state
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Runs children in order (`<action>`, `<actionRef>`)
    Action,
    /// A fire's bound `<bullet>`, holding the new bullet's actions until fired
    Bullet,
    /// Re-instantiates its single body child
    Repeat(RepeatTask),
    Fire(FireTask),
    ChangeDirection(ChangeTask),
    ChangeSpeed(ChangeTask),
    Accel(AccelTask),
    Wait(WaitTask),
    Vanish,
}

/// Copyable discriminant of [`TaskKind`], used for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTag {
    Action,
    Bullet,
    Repeat,
    Fire,
    ChangeDirection,
    ChangeSpeed,
    Accel,
    Wait,
    Vanish,
}

impl TaskKind {
    pub fn tag(&self) -> TaskTag {
        match self {
            TaskKind::Action => TaskTag::Action,
            TaskKind::Bullet => TaskTag::Bullet,
            TaskKind::Repeat(_) => TaskTag::Repeat,
            TaskKind::Fire(_) => TaskTag::Fire,
            TaskKind::ChangeDirection(_) => TaskTag::ChangeDirection,
            TaskKind::ChangeSpeed(_) => TaskTag::ChangeSpeed,
            TaskKind::Accel(_) => TaskTag::Accel,
            TaskKind::Wait(_) => TaskTag::Wait,
            TaskKind::Vanish => TaskTag::Vanish,
        }
    }
}

/// One runtime interpreter unit bound to a pattern node
#[derive(Debug, Clone)]
pub struct Task {
    pub node: NodeId,
    /// Task this one executes under (non-owning)
    pub owner: Option<TaskId>,
    pub children: Vec<TaskId>,
    pub params: Vec<f32>,
    pub kind: TaskKind,
    phase: TaskPhase,
}

impl Task {
    pub fn new(node: NodeId, owner: Option<TaskId>, params: Vec<f32>, kind: TaskKind) -> Self {
        Self {
            node,
            owner,
            children: Vec::new(),
            params,
            kind,
            phase: TaskPhase::Parsed,
        }
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == TaskPhase::Finished
    }

    /// Advance the lifecycle; never moves backwards
    pub fn advance(&mut self, phase: TaskPhase) {
        self.phase = self.phase.max(phase);
    }
}

/// Generational slot storage for tasks
#[derive(Debug, Default)]
pub struct TaskArena {
    slots: Vec<Option<Task>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    live: usize,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tasks
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, task: Task) -> TaskId {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            // Generation was bumped on release
            self.slots[idx as usize] = Some(task);
            TaskId {
                idx,
                generation: self.generation[idx as usize],
            }
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Some(task));
            self.generation.push(0);
            TaskId { idx, generation: 0 }
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        if self.generation.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        self.slots[id.idx as usize].as_ref()
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        if self.generation.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        self.slots[id.idx as usize].as_mut()
    }

    /// The `i`-th child of a task, if both exist
    pub fn child(&self, id: TaskId, i: usize) -> Option<TaskId> {
        self.get(id)?.children.get(i).copied()
    }

    pub fn is_finished(&self, id: TaskId) -> bool {
        self.get(id).is_none_or(Task::is_finished)
    }

    /// Force-finish and free a task and its whole subtree.
    /// Returns how many tasks were released.
    pub fn release(&mut self, id: TaskId) -> usize {
        let mut released = 0;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(mut task) = self.take(id) else {
                continue;
            };
            task.advance(TaskPhase::Finished);
            stack.append(&mut task.children);
            released += 1;
        }
        released
    }

    fn take(&mut self, id: TaskId) -> Option<Task> {
        if self.generation.get(id.idx as usize) != Some(&id.generation) {
            return None;
        }
        let task = self.slots[id.idx as usize].take()?;
        self.generation[id.idx as usize] = self.generation[id.idx as usize].wrapping_add(1);
        self.free_list.push(id.idx);
        self.live -= 1;
        Some(task)
    }
}
