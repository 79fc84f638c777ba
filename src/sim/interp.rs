//! Task-tree interpreter
//!
//! [`Interpreter`] borrows everything one bullet's tasks can touch during a frame
//! (the task arena, the bullet pool and the shared [`PatternContext`]) and drives
//! the two task operations:
//!
//! - `parse_tasks`: one-time binding of a node subtree into tasks
//! - `run`: one frame of work, returning a [`RunStatus`]
//!
//! Composite tasks run their unfinished children in order. `End` moves on to the
//! next child, `Continue` (a change still ramping) keeps going but marks the parent
//! unfinished, and `Paused` stops the walk until the next frame.

use super::manager::BulletPool;
use super::state::{Bullet, PatternContext};
use super::task::{
    AccelTask, ChangeTask, Ramp, RepeatTask, RunStatus, Task, TaskArena, TaskId, TaskKind,
    TaskPhase, TaskTag, WaitTask,
};
use super::value::{direction_ramp, linear_ramp};
use crate::aim_degrees;
use crate::consts::{MAX_NEST_DEPTH, MAX_REPEAT};
use crate::error::{PatternError, Result};
use crate::pattern::{EvalScope, NodeId, NodeName, Pattern};

/// Round an evaluated count to whole frames (negative and NaN become 0)
pub(crate) fn whole_frames(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

/// Evaluate a node's own expression (0 when it has none)
pub(crate) fn eval_node(pattern: &Pattern, node: NodeId, scope: &mut EvalScope<'_>) -> f32 {
    pattern.node(node).expr.as_ref().map_or(0.0, |e| e.eval(scope))
}

pub(crate) struct Interpreter<'a> {
    pub(crate) tasks: &'a mut TaskArena,
    pub(crate) pool: &'a mut BulletPool,
    pub(crate) ctx: &'a mut PatternContext,
    pub(crate) pattern: &'a Pattern,
}

impl<'a> Interpreter<'a> {
    // -- Binding --

    /// Bind `node` (and everything under it) into a task tree.
    ///
    /// Returns `None` for nodes that are not tasks on their own (`direction`,
    /// `speed`, `term`, ...). On error nothing stays allocated in the arena.
    pub(crate) fn parse_tasks(
        &mut self,
        node: NodeId,
        owner: Option<TaskId>,
        params: Vec<f32>,
        bullet: &Bullet,
    ) -> Result<Option<TaskId>> {
        self.parse_node(node, owner, params, bullet, 0)
    }

    pub(crate) fn parse_node(
        &mut self,
        node: NodeId,
        owner: Option<TaskId>,
        params: Vec<f32>,
        bullet: &Bullet,
        depth: usize,
    ) -> Result<Option<TaskId>> {
        if depth > MAX_NEST_DEPTH {
            return Err(PatternError::RecursionLimit(MAX_NEST_DEPTH));
        }

        let pattern = self.pattern;
        let id = match pattern.node(node).name {
            NodeName::Action => self.parse_action(node, owner, params, bullet, depth)?,
            NodeName::ActionRef => {
                let target = pattern.resolve(node)?;
                let bound = self.bind_params(node, &params, bullet);
                self.parse_action(target, owner, bound, bullet, depth + 1)?
            }
            NodeName::Fire | NodeName::FireRef => {
                self.parse_fire(node, owner, params, bullet, depth)?
            }
            NodeName::Repeat => self.parse_repeat(node, owner, params, bullet, depth)?,
            NodeName::Wait => self.insert(node, owner, params, TaskKind::Wait(WaitTask::default())),
            NodeName::Vanish => self.insert(node, owner, params, TaskKind::Vanish),
            NodeName::ChangeDirection => {
                let change = ChangeTask {
                    value: self.required(node, NodeName::Direction)?,
                    term: self.required(node, NodeName::Term)?,
                    ramp: None,
                };
                self.insert(node, owner, params, TaskKind::ChangeDirection(change))
            }
            NodeName::ChangeSpeed => {
                let change = ChangeTask {
                    value: self.required(node, NodeName::Speed)?,
                    term: self.required(node, NodeName::Term)?,
                    ramp: None,
                };
                self.insert(node, owner, params, TaskKind::ChangeSpeed(change))
            }
            NodeName::Accel => {
                let accel = AccelTask {
                    horizontal: pattern.child(node, NodeName::Horizontal),
                    vertical: pattern.child(node, NodeName::Vertical),
                    term: self.required(node, NodeName::Term)?,
                    ramp: None,
                };
                self.insert(node, owner, params, TaskKind::Accel(accel))
            }
            _ => return Ok(None),
        };
        Ok(Some(id))
    }

    pub(crate) fn insert(
        &mut self,
        node: NodeId,
        owner: Option<TaskId>,
        params: Vec<f32>,
        kind: TaskKind,
    ) -> TaskId {
        self.tasks.insert(Task::new(node, owner, params, kind))
    }

    fn required(&self, node: NodeId, child: NodeName) -> Result<NodeId> {
        self.pattern
            .child(node, child)
            .ok_or(PatternError::MissingChild {
                node,
                parent: self.pattern.node(node).name,
                child,
            })
    }

    /// Evaluate the `<param>` children of a `*Ref` node in the caller's scope
    pub(crate) fn bind_params(
        &mut self,
        node: NodeId,
        params: &[f32],
        bullet: &Bullet,
    ) -> Vec<f32> {
        let pattern = self.pattern;
        pattern
            .children_named(node, NodeName::Param)
            .map(|p| eval_node(pattern, p, &mut self.ctx.scope(params, bullet)))
            .collect()
    }

    /// Parse every task child of `node` under `parent`, releasing `parent` on failure
    pub(crate) fn parse_children(
        &mut self,
        parent: TaskId,
        node: NodeId,
        params: &[f32],
        bullet: &Bullet,
        depth: usize,
    ) -> Result<()> {
        let pattern = self.pattern;
        for &child in pattern.children(node) {
            match self.parse_node(child, Some(parent), params.to_vec(), bullet, depth + 1) {
                Ok(Some(task)) => {
                    if let Some(p) = self.tasks.get_mut(parent) {
                        p.children.push(task);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.tasks.release(parent);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn parse_action(
        &mut self,
        node: NodeId,
        owner: Option<TaskId>,
        params: Vec<f32>,
        bullet: &Bullet,
        depth: usize,
    ) -> Result<TaskId> {
        let id = self.insert(node, owner, params.clone(), TaskKind::Action);
        self.parse_children(id, node, &params, bullet, depth)?;
        Ok(id)
    }

    fn parse_repeat(
        &mut self,
        node: NodeId,
        owner: Option<TaskId>,
        params: Vec<f32>,
        bullet: &Bullet,
        depth: usize,
    ) -> Result<TaskId> {
        self.required(node, NodeName::Times)?;
        let id = self.insert(
            node,
            owner,
            params.clone(),
            TaskKind::Repeat(RepeatTask {
                depth,
                ..RepeatTask::default()
            }),
        );
        match self.parse_repeat_body(node, id, &params, bullet, depth) {
            Ok(body) => {
                if let Some(task) = self.tasks.get_mut(id) {
                    task.children.push(body);
                }
                Ok(id)
            }
            Err(e) => {
                self.tasks.release(id);
                Err(e)
            }
        }
    }

    /// Fresh task tree for one iteration of a `<repeat>`
    fn parse_repeat_body(
        &mut self,
        node: NodeId,
        repeat: TaskId,
        params: &[f32],
        bullet: &Bullet,
        depth: usize,
    ) -> Result<TaskId> {
        let pattern = self.pattern;
        let body = pattern
            .child(node, NodeName::Action)
            .or_else(|| pattern.child(node, NodeName::ActionRef))
            .ok_or(PatternError::MissingChild {
                node,
                parent: NodeName::Repeat,
                child: NodeName::Action,
            })?;
        self.parse_node(body, Some(repeat), params.to_vec(), bullet, depth + 1)?
            .ok_or(PatternError::MissingChild {
                node,
                parent: NodeName::Repeat,
                child: NodeName::Action,
            })
    }

    // -- Running --

    /// Run one task for this frame
    pub(crate) fn run(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
        if task.is_finished() {
            return Ok(RunStatus::End);
        }
        task.advance(TaskPhase::Running);

        let status = match task.kind.tag() {
            TaskTag::Action | TaskTag::Bullet => self.run_sequence(id, bullet)?,
            TaskTag::Repeat => self.run_repeat(id, bullet)?,
            TaskTag::Fire => self.run_fire(id, bullet)?,
            TaskTag::Wait => self.run_wait(id, bullet)?,
            TaskTag::ChangeDirection => self.run_change_direction(id, bullet)?,
            TaskTag::ChangeSpeed => self.run_change_speed(id, bullet)?,
            TaskTag::Accel => self.run_accel(id, bullet)?,
            TaskTag::Vanish => {
                bullet.vanish();
                RunStatus::End
            }
        };

        if status == RunStatus::End {
            if let Some(task) = self.tasks.get_mut(id) {
                task.advance(TaskPhase::Finished);
            }
        }
        Ok(status)
    }

    fn run_sequence(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let mut status = RunStatus::End;
        let mut i = 0;
        while let Some(child) = self.tasks.child(id, i) {
            i += 1;
            if self.tasks.is_finished(child) {
                continue;
            }
            match self.run(child, bullet)? {
                RunStatus::End => {}
                RunStatus::Continue => status = RunStatus::Continue,
                RunStatus::Paused => return Ok(RunStatus::Paused),
            }
            if bullet.is_vanished() {
                return Ok(RunStatus::End);
            }
        }
        Ok(status)
    }

    fn run_repeat(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let pattern = self.pattern;
        let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
        let TaskKind::Repeat(repeat) = &mut task.kind else {
            return Ok(RunStatus::End);
        };
        if repeat.times.is_none() {
            let raw = pattern.child(task.node, NodeName::Times).map_or(0.0, |times| {
                eval_node(pattern, times, &mut self.ctx.scope(&task.params, bullet))
            });
            let times = whole_frames(raw);
            if times > MAX_REPEAT {
                log::warn!(
                    "{}: <repeat> {} clamps {} iterations to {}",
                    pattern.name(),
                    task.node,
                    times,
                    MAX_REPEAT
                );
            }
            repeat.times = Some(times.min(MAX_REPEAT));
        }

        loop {
            let task = self.tasks.get(id).ok_or(PatternError::StaleTask(id))?;
            let TaskKind::Repeat(repeat) = &task.kind else {
                return Ok(RunStatus::End);
            };
            let times = repeat.times.unwrap_or(0);
            let body = task.children.first().copied();

            if repeat.done >= times {
                if let Some(body) = body {
                    self.tasks.release(body);
                }
                return Ok(RunStatus::End);
            }
            let Some(body) = body else {
                return Ok(RunStatus::End);
            };

            match self.run(body, bullet)? {
                RunStatus::End => {
                    self.tasks.release(body);
                    let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
                    task.children.clear();
                    let TaskKind::Repeat(repeat) = &mut task.kind else {
                        return Ok(RunStatus::End);
                    };
                    repeat.done += 1;
                    if repeat.done >= times || bullet.is_vanished() {
                        return Ok(RunStatus::End);
                    }
                    let depth = repeat.depth;
                    let node = task.node;
                    let params = task.params.clone();
                    let fresh = self.parse_repeat_body(node, id, &params, bullet, depth)?;
                    if let Some(task) = self.tasks.get_mut(id) {
                        task.children.push(fresh);
                    }
                }
                status => return Ok(status),
            }
        }
    }

    fn run_wait(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let pattern = self.pattern;
        let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
        let TaskKind::Wait(wait) = &mut task.kind else {
            return Ok(RunStatus::End);
        };
        let remaining = match wait.remaining {
            Some(r) => r,
            None => whole_frames(eval_node(
                pattern,
                task.node,
                &mut self.ctx.scope(&task.params, bullet),
            )),
        };
        if remaining == 0 {
            wait.remaining = Some(0);
            return Ok(RunStatus::End);
        }
        wait.remaining = Some(remaining - 1);
        Ok(RunStatus::Paused)
    }

    fn run_change_direction(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let pattern = self.pattern;
        let aim = aim_degrees(bullet.pos, self.ctx.target);
        let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
        let TaskKind::ChangeDirection(change) = &mut task.kind else {
            return Ok(RunStatus::End);
        };
        if change.ramp.is_none() {
            let mut scope = self.ctx.scope(&task.params, bullet);
            let value = eval_node(pattern, change.value, &mut scope);
            let term = whole_frames(eval_node(pattern, change.term, &mut scope));
            let mode = pattern.node(change.value).mode;
            let delta = direction_ramp(mode, value, bullet.direction_degrees(), aim, term);
            change.ramp = Some(Ramp::new(delta, term));
        }
        let Some(ramp) = change.ramp.as_mut() else {
            return Ok(RunStatus::End);
        };
        let (delta, done) = ramp.step();
        bullet.direction += delta.to_radians();
        Ok(if done { RunStatus::End } else { RunStatus::Continue })
    }

    fn run_change_speed(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let pattern = self.pattern;
        let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
        let TaskKind::ChangeSpeed(change) = &mut task.kind else {
            return Ok(RunStatus::End);
        };
        if change.ramp.is_none() {
            let mut scope = self.ctx.scope(&task.params, bullet);
            let value = eval_node(pattern, change.value, &mut scope);
            let term = whole_frames(eval_node(pattern, change.term, &mut scope));
            let mode = pattern.node(change.value).mode;
            change.ramp = Some(Ramp::new(linear_ramp(mode, value, bullet.speed, term), term));
        }
        let Some(ramp) = change.ramp.as_mut() else {
            return Ok(RunStatus::End);
        };
        let (delta, done) = ramp.step();
        bullet.speed += delta;
        Ok(if done { RunStatus::End } else { RunStatus::Continue })
    }

    fn run_accel(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let pattern = self.pattern;
        let task = self.tasks.get_mut(id).ok_or(PatternError::StaleTask(id))?;
        let TaskKind::Accel(accel) = &mut task.kind else {
            return Ok(RunStatus::End);
        };
        if accel.ramp.is_none() {
            let current = bullet.extra_velocity;
            let mut scope = self.ctx.scope(&task.params, bullet);
            let term = whole_frames(eval_node(pattern, accel.term, &mut scope));
            let mut axis = |node: Option<NodeId>, current: f32| {
                node.map_or(0.0, |n| {
                    let value = eval_node(pattern, n, &mut scope);
                    linear_ramp(pattern.node(n).mode, value, current, term)
                })
            };
            let delta = glam::Vec2::new(
                axis(accel.horizontal, current.x),
                axis(accel.vertical, current.y),
            );
            accel.ramp = Some(Ramp::new(delta, term));
        }
        let Some(ramp) = accel.ramp.as_mut() else {
            return Ok(RunStatus::End);
        };
        let (delta, done) = ramp.step();
        bullet.extra_velocity += delta;
        Ok(if done { RunStatus::End } else { RunStatus::Continue })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::state::BulletId;

    /// Everything an interpreter borrows, owned in one place for tests
    pub(crate) struct Rig {
        pub tasks: TaskArena,
        pub pool: BulletPool,
        pub ctx: PatternContext,
        pub pattern: Arc<Pattern>,
        pub bullet: Bullet,
    }

    impl Rig {
        pub fn new(xml: &str, capacity: usize) -> Self {
            let pattern = Pattern::from_xml_str("rig", xml).expect("rig pattern loads");
            Self::from_pattern(pattern, capacity)
        }

        /// Rig for a tree built in code (skips document validation)
        pub fn from_pattern(pattern: Pattern, capacity: usize) -> Self {
            let pattern = Arc::new(pattern);
            let mut bullet = Bullet::new(BulletId {
                idx: u32::MAX,
                generation: 0,
            });
            bullet.set_pattern(Arc::clone(&pattern));
            Self {
                tasks: TaskArena::new(),
                pool: BulletPool::with_capacity(capacity),
                ctx: PatternContext::new(3, 0.5),
                pattern,
                bullet,
            }
        }

        pub fn interp(&mut self) -> (Interpreter<'_>, &mut Bullet) {
            (
                Interpreter {
                    tasks: &mut self.tasks,
                    pool: &mut self.pool,
                    ctx: &mut self.ctx,
                    pattern: &self.pattern,
                },
                &mut self.bullet,
            )
        }

        /// Bind the pattern's first top action
        pub fn activate(&mut self) -> TaskId {
            let top = self.pattern.top_actions()[0];
            let (mut interp, bullet) = self.interp();
            interp
                .parse_tasks(top, None, Vec::new(), bullet)
                .expect("top action binds")
                .expect("action is a task")
        }

        pub fn step(&mut self, root: TaskId) -> RunStatus {
            let (mut interp, bullet) = self.interp();
            interp.run(root, bullet).expect("runs")
        }
    }

    #[test]
    fn test_wait_pauses_for_n_frames() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <wait>3</wait>
                <changeSpeed><speed>5</speed><term>1</term></changeSpeed>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        for _ in 0..3 {
            assert_eq!(rig.step(root), RunStatus::Paused);
            assert_eq!(rig.bullet.speed, 0.0);
        }
        assert_eq!(rig.step(root), RunStatus::End);
        assert_eq!(rig.bullet.speed, 5.0);
        assert!(rig.tasks.is_finished(root));
    }

    #[test]
    fn test_repeat_runs_body_n_times() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <repeat><times>4</times><action>
                    <changeSpeed><speed type="relative">1</speed><term>1</term></changeSpeed>
                    <wait>1</wait>
                </action></repeat>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        let mut frames = 0;
        while rig.step(root) != RunStatus::End {
            frames += 1;
            assert!(frames < 20, "repeat never ended");
        }
        assert_eq!(rig.bullet.speed, 4.0);
        // Each iteration pauses once
        assert_eq!(frames, 4);
        // Finished iterations are released rather than reset
        assert_eq!(rig.tasks.len(), 2);
    }

    #[test]
    fn test_repeat_zero_times() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <repeat><times>$rank - 1</times><action><vanish/></action></repeat>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        assert_eq!(rig.step(root), RunStatus::End);
        assert!(!rig.bullet.is_vanished());
    }

    #[test]
    fn test_change_direction_over_term() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <changeDirection><direction type="absolute">90</direction><term>10</term></changeDirection>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        for _ in 0..9 {
            assert_eq!(rig.step(root), RunStatus::Continue);
        }
        assert_eq!(rig.step(root), RunStatus::End);
        assert!((rig.bullet.direction_degrees() - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_change_does_not_block_siblings() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <changeSpeed><speed>2</speed><term>4</term></changeSpeed>
                <accel><horizontal>1</horizontal><term>2</term></accel>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        assert_eq!(rig.step(root), RunStatus::Continue);
        assert!((rig.bullet.speed - 0.5).abs() < 0.0001);
        assert!((rig.bullet.extra_velocity.x - 0.5).abs() < 0.0001);
        assert_eq!(rig.step(root), RunStatus::Continue);
        assert!((rig.bullet.extra_velocity.x - 1.0).abs() < 0.0001);
        assert_eq!(rig.step(root), RunStatus::Continue);
        assert_eq!(rig.step(root), RunStatus::End);
        assert!((rig.bullet.speed - 2.0).abs() < 0.0001);
        assert!((rig.bullet.extra_velocity.x - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_vanish_stops_sequence() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <vanish/>
                <changeSpeed><speed>9</speed><term>1</term></changeSpeed>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        assert_eq!(rig.step(root), RunStatus::End);
        assert!(rig.bullet.is_vanished());
        assert_eq!(rig.bullet.speed, 0.0);
    }

    #[test]
    fn test_action_ref_binds_params() {
        let mut rig = Rig::new(
            r#"<bulletml>
                <action label="top">
                    <actionRef label="accelerate"><param>2 + 1</param><param>$rank * 4</param></actionRef>
                </action>
                <action label="accelerate">
                    <changeSpeed><speed>$1 * $2</speed><term>1</term></changeSpeed>
                </action>
            </bulletml>"#,
            8,
        );
        let root = rig.activate();
        let bound = rig.tasks.child(root, 0).expect("bound actionRef");
        assert_eq!(rig.tasks.get(bound).expect("task").params, vec![3.0, 2.0]);
        assert_eq!(rig.step(root), RunStatus::End);
        assert_eq!(rig.bullet.speed, 6.0);
    }

    #[test]
    fn test_recursive_action_ref_is_bounded() {
        let mut pattern = Pattern::new("loop");
        let root = pattern.root();
        let top = pattern.add_node(root, NodeName::Action);
        pattern.set_label(top, "top");
        let again = pattern.add_node(top, NodeName::ActionRef);
        pattern.set_label(again, "top");

        let mut arena = TaskArena::new();
        let mut pool = BulletPool::with_capacity(1);
        let mut ctx = PatternContext::new(0, 0.0);
        let bullet = Bullet::new(BulletId {
            idx: 0,
            generation: 0,
        });
        let mut interp = Interpreter {
            tasks: &mut arena,
            pool: &mut pool,
            ctx: &mut ctx,
            pattern: &pattern,
        };
        let err = interp.parse_tasks(top, None, Vec::new(), &bullet).unwrap_err();
        assert_eq!(err, PatternError::RecursionLimit(MAX_NEST_DEPTH));
        assert!(arena.is_empty(), "failed activation must not leak tasks");
    }

    #[test]
    fn test_deep_plain_nesting_is_bounded() {
        let mut pattern = Pattern::new("deep");
        let root = pattern.root();
        let top = pattern.add_node(root, NodeName::Action);
        pattern.set_label(top, "top");
        let mut parent = top;
        for _ in 0..5_000 {
            parent = pattern.add_node(parent, NodeName::Action);
        }
        pattern.add_node(parent, NodeName::Vanish);

        let mut rig = Rig::from_pattern(pattern, 4);
        let (mut interp, bullet) = rig.interp();
        let err = interp.parse_tasks(top, None, Vec::new(), bullet).unwrap_err();
        assert_eq!(err, PatternError::RecursionLimit(MAX_NEST_DEPTH));
        assert!(rig.tasks.is_empty());
    }

    #[test]
    fn test_repeat_count_is_capped() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top">
                <repeat><times>25000</times><action>
                    <changeSpeed><speed type="relative">1</speed><term>1</term></changeSpeed>
                </action></repeat>
            </action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        assert_eq!(rig.step(root), RunStatus::End);
        assert_eq!(rig.bullet.speed, MAX_REPEAT as f32);
    }

    #[test]
    fn test_stale_task_is_contract_error() {
        let mut rig = Rig::new(
            r#"<bulletml><action label="top"><wait>1</wait></action></bulletml>"#,
            8,
        );
        let root = rig.activate();
        rig.tasks.release(root);
        let (mut interp, bullet) = rig.interp();
        assert_eq!(interp.run(root, bullet), Err(PatternError::StaleTask(root)));
    }
}
