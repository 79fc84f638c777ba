//! Fire tasks: spawning new bullets
//!
//! Binding a `<fire>` resolves its bullet definition and remembers where its
//! direction and speed come from, but does not bind the new bullet's actions.
//! Those are bound when the fire runs, against the freshly created bullet, so
//! self-referencing patterns never recurse at bind time.

use std::sync::Arc;

use super::interp::{Interpreter, eval_node};
use super::state::Bullet;
use super::task::{RunStatus, Task, TaskId, TaskKind};
use super::value::{FireInputs, resolve_direction, resolve_speed};
use crate::aim_degrees;
use crate::consts::MAX_NEST_DEPTH;
use crate::error::{PatternError, Result};
use crate::pattern::{NodeId, NodeName};

/// Where a fire's `<direction>` or `<speed>` was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSource {
    pub node: NodeId,
    /// Declared on the `<bullet>` rather than the `<fire>` (evaluated with the
    /// bullet's params)
    pub from_bullet: bool,
}

#[derive(Debug, Clone)]
pub struct FireTask {
    /// Resolved `<bullet>` definition
    pub bullet: NodeId,
    pub direction: Option<ValueSource>,
    pub speed: Option<ValueSource>,
}

impl<'a> Interpreter<'a> {
    /// Bind a `<fire>` or `<fireRef>`.
    ///
    /// The fire task gets a single `Bullet` child carrying the bullet's bound
    /// params; the new bullet's actions are bound under it at fire time.
    pub(crate) fn parse_fire(
        &mut self,
        node: NodeId,
        owner: Option<TaskId>,
        params: Vec<f32>,
        bullet: &Bullet,
        depth: usize,
    ) -> Result<TaskId> {
        let pattern = self.pattern;
        let (fire_node, fire_params, depth) = if pattern.node(node).name == NodeName::FireRef {
            let target = pattern.resolve(node)?;
            let bound = self.bind_params(node, &params, bullet);
            (target, bound, depth + 1)
        } else {
            (node, params, depth)
        };
        if depth > MAX_NEST_DEPTH {
            return Err(PatternError::RecursionLimit(MAX_NEST_DEPTH));
        }

        let inline = pattern.child(fire_node, NodeName::Bullet);
        let (bullet_node, bullet_params) = match inline {
            Some(inline) => (inline, fire_params.clone()),
            None => {
                let bullet_ref = pattern
                    .child(fire_node, NodeName::BulletRef)
                    .ok_or(PatternError::MissingBullet(fire_node))?;
                let target = pattern.resolve(bullet_ref)?;
                (target, self.bind_params(bullet_ref, &fire_params, bullet))
            }
        };

        let locate = |name: NodeName| {
            pattern
                .child(fire_node, name)
                .map(|node| ValueSource {
                    node,
                    from_bullet: false,
                })
                .or_else(|| {
                    pattern.child(bullet_node, name).map(|node| ValueSource {
                        node,
                        from_bullet: true,
                    })
                })
        };
        let fire = FireTask {
            bullet: bullet_node,
            direction: locate(NodeName::Direction),
            speed: locate(NodeName::Speed),
        };

        let id = self.insert(fire_node, owner, fire_params, TaskKind::Fire(fire));
        let nested = self
            .tasks
            .insert(Task::new(bullet_node, Some(id), bullet_params, TaskKind::Bullet));
        if let Some(task) = self.tasks.get_mut(id) {
            task.children.push(nested);
        }
        Ok(id)
    }

    /// Spawn one bullet.
    ///
    /// A full pool drops the shot: the fire still ends and the pattern carries on.
    pub(crate) fn run_fire(&mut self, id: TaskId, bullet: &mut Bullet) -> Result<RunStatus> {
        let pattern = self.pattern;
        let task = self.tasks.get(id).ok_or(PatternError::StaleTask(id))?;
        let TaskKind::Fire(fire) = &task.kind else {
            return Ok(RunStatus::End);
        };
        let fire = fire.clone();
        let fire_node = task.node;
        let fire_params = task.params.clone();
        let nested = task
            .children
            .first()
            .copied()
            .ok_or(PatternError::StaleTask(id))?;
        let bullet_params = self
            .tasks
            .get(nested)
            .ok_or(PatternError::StaleTask(nested))?
            .params
            .clone();

        let Some(shot_id) = self.pool.create_bullet() else {
            self.ctx.stats.dropped += 1;
            log::trace!(
                "{}: pool full ({} bullets), fire {} dropped",
                pattern.name(),
                self.pool.capacity(),
                fire_node
            );
            return Ok(RunStatus::End);
        };

        let mut eval = |source: Option<ValueSource>| {
            source.map(|src| {
                let params = if src.from_bullet { &bullet_params } else { &fire_params };
                eval_node(pattern, src.node, &mut self.ctx.scope(params, bullet))
            })
        };
        let direction_value = eval(fire.direction);
        let speed_value = eval(fire.speed);

        let inputs = FireInputs {
            direction: bullet.direction_degrees(),
            speed: bullet.speed,
            aim: aim_degrees(bullet.pos, self.ctx.target),
            sequence: self.ctx.sequence,
        };
        let mode_of = |source: Option<ValueSource>| source.and_then(|s| pattern.node(s.node).mode);
        let direction = resolve_direction(mode_of(fire.direction), direction_value, &inputs);
        let speed = resolve_speed(mode_of(fire.speed), speed_value, &inputs);

        let mut shot = Bullet::new(shot_id);
        shot.pos = bullet.pos;
        shot.direction = direction.to_radians();
        shot.speed = speed;
        if let Some(source) = bullet.pattern() {
            shot.set_pattern(Arc::clone(source));
        }

        match self.bind_shot(nested, fire.bullet, &bullet_params, &shot) {
            Ok(roots) => {
                for &root in &roots {
                    if let Some(task) = self.tasks.get_mut(root) {
                        task.owner = Some(id);
                    }
                }
                shot.tasks = roots;
                self.pool.place(shot);
                self.ctx.sequence.record(direction, speed);
                self.ctx.stats.fired += 1;
                Ok(RunStatus::End)
            }
            Err(e) => {
                self.pool.remove(shot_id);
                Err(e)
            }
        }
    }

    /// Bind the `<bullet>`'s actions for a new bullet and hand them over as its roots
    fn bind_shot(
        &mut self,
        nested: TaskId,
        bullet_node: NodeId,
        params: &[f32],
        shot: &Bullet,
    ) -> Result<Vec<TaskId>> {
        let pattern = self.pattern;
        let mut roots = Vec::new();
        for &child in pattern.children(bullet_node) {
            if !matches!(pattern.node(child).name, NodeName::Action | NodeName::ActionRef) {
                continue;
            }
            match self.parse_node(child, Some(nested), params.to_vec(), shot, 0) {
                Ok(Some(root)) => roots.push(root),
                Ok(None) => {}
                Err(e) => {
                    for root in roots {
                        self.tasks.release(root);
                    }
                    return Err(e);
                }
            }
        }
        Ok(roots)
    }
}
