//! Per-frame update
//!
//! One call to [`BulletManager::update`] is one interpreter frame: every bullet
//! live at the start of the frame runs its root tasks, moves, ages and is
//! culled, in creation order. Bullets fired during the frame start running on
//! the next one.

use super::interp::Interpreter;
use super::manager::BulletManager;
use super::state::{Bullet, BulletId};
use super::task::RunStatus;
use crate::consts::REFERENCE_FPS;

impl BulletManager {
    /// Advance every bullet by one frame of `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.frame += 1;
        let scale = dt * REFERENCE_FPS;

        let live = self.pool.len();
        for i in 0..live {
            let Some(id) = self.pool.id_at(i) else {
                break;
            };
            let Some(mut bullet) = self.pool.take(id) else {
                continue;
            };

            if !bullet.is_vanished() {
                self.run_tasks(&mut bullet);
            }

            bullet.pos += bullet.velocity() * scale;
            bullet.age += 1;
            if let Some(bounds) = &self.cull {
                if !bounds.contains(bullet.pos, self.cull_margin) {
                    bullet.vanish();
                }
            }
            self.pool.place(bullet);
        }

        self.sweep();
    }

    /// Run a bullet's root tasks, dropping the ones that end
    fn run_tasks(&mut self, bullet: &mut Bullet) {
        let Some(pattern) = bullet.pattern().cloned() else {
            return;
        };
        let mut interp = Interpreter {
            tasks: &mut self.tasks,
            pool: &mut self.pool,
            ctx: &mut self.context,
            pattern: &pattern,
        };

        let mut i = 0;
        while i < bullet.tasks.len() {
            let root = bullet.tasks[i];
            match interp.run(root, bullet) {
                Ok(RunStatus::End) => {
                    interp.tasks.release(root);
                    bullet.tasks.remove(i);
                }
                Ok(_) => i += 1,
                Err(e) => {
                    log::error!(
                        "{}: bullet {:?} stopped running its pattern: {}",
                        pattern.name(),
                        bullet.id,
                        e
                    );
                    for task in bullet.tasks.drain(..) {
                        interp.tasks.release(task);
                    }
                    break;
                }
            }
            if bullet.is_vanished() {
                break;
            }
        }
    }

    /// Recycle every bullet marked vanished this frame
    fn sweep(&mut self) {
        let vanished: Vec<BulletId> = self
            .bullets()
            .filter(|bullet| bullet.is_vanished())
            .map(|bullet| bullet.id)
            .collect();
        for id in vanished {
            self.vanish(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec2;

    use crate::consts::FRAME_DT;
    use crate::pattern::Pattern;
    use crate::settings::{Bounds, Settings};
    use crate::sim::BulletManager;

    fn manager(max: usize, playfield: Option<Bounds>) -> BulletManager {
        BulletManager::new(&Settings {
            max_bullets: Some(max),
            playfield,
            ..Settings::default()
        })
    }

    fn pattern(xml: &str) -> Arc<Pattern> {
        Arc::new(Pattern::from_xml_str("test", xml).expect("pattern loads"))
    }

    #[test]
    fn test_motion_at_reference_rate() {
        let mut m = manager(4, None);
        let id = m
            .create_bullet(Vec2::ZERO, std::f32::consts::FRAC_PI_2, 2.0)
            .expect("room");
        m.update(FRAME_DT);
        m.update(FRAME_DT);
        let pos = m.get(id).expect("live").pos;
        assert!((pos - Vec2::new(4.0, 0.0)).length() < 1e-4);
        assert_eq!(m.get(id).expect("live").age, 2);
        assert_eq!(m.frame(), 2);

        // Half the frame time, half the distance
        m.update(FRAME_DT * 0.5);
        let pos = m.get(id).expect("live").pos;
        assert!((pos - Vec2::new(5.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_new_bullets_start_next_frame() {
        let mut m = manager(16, None);
        let p = pattern(
            r#"<bulletml><action label="top">
                <fire><direction type="absolute">180</direction><speed>1</speed>
                    <bullet><action><changeSpeed><speed>5</speed><term>1</term></changeSpeed></action></bullet>
                </fire>
                <wait>100</wait>
            </action></bulletml>"#,
        );
        let emitter = m.spawn_pattern(&p, Vec2::new(0.0, 0.0)).expect("spawns").expect("room");

        m.update(FRAME_DT);
        let shots: Vec<_> = m.bullets().filter(|b| b.id != emitter).cloned().collect();
        assert_eq!(shots.len(), 1);
        let shot = &shots[0];
        // Neither ticked nor moved in the frame it was fired
        assert_eq!(shot.age, 0);
        assert_eq!(shot.pos, Vec2::ZERO);
        assert_eq!(shot.speed, 1.0);

        m.update(FRAME_DT);
        let shot = m.get(shot.id).expect("still live");
        assert_eq!(shot.age, 1);
        assert_eq!(shot.speed, 5.0);
        // 180 degrees points down the screen
        assert!((shot.pos - Vec2::new(0.0, 5.0)).length() < 1e-4);
        assert!(shot.tasks_finished());
    }

    #[test]
    fn test_bullets_listed_in_creation_order() {
        let mut m = manager(16, None);
        let p = pattern(
            r#"<bulletml><action label="top">
                <repeat><times>3</times><action>
                    <fire><direction type="sequence">90</direction><speed>1</speed><bullet/></fire>
                </action></repeat>
            </action></bulletml>"#,
        );
        let emitter = m.spawn_pattern(&p, Vec2::ZERO).expect("spawns").expect("room");
        m.update(FRAME_DT);

        let directions: Vec<f32> = m
            .bullets()
            .filter(|b| b.id != emitter)
            .map(|b| b.direction_degrees())
            .collect();
        assert_eq!(directions.len(), 3);
        for (got, want) in directions.iter().zip([90.0, 180.0, 270.0]) {
            assert!((got - want).abs() < 1e-3, "{got} vs {want}");
        }
        assert!((m.sequence().last_direction - 270.0).abs() < 1e-3);
    }

    #[test]
    fn test_sequence_chains_across_bullets() {
        let mut m = manager(16, None);
        let first = pattern(
            r#"<bulletml><action label="top">
                <fire><direction type="absolute">30</direction><speed>1</speed><bullet/></fire>
                <wait>100</wait>
            </action></bulletml>"#,
        );
        let second = pattern(
            r#"<bulletml><action label="top">
                <fire><direction type="sequence">10</direction><speed>1</speed><bullet/></fire>
                <wait>100</wait>
            </action></bulletml>"#,
        );
        let a = m.spawn_pattern(&first, Vec2::ZERO).expect("spawns").expect("room");
        let b = m
            .spawn_pattern(&second, Vec2::new(50.0, 0.0))
            .expect("spawns")
            .expect("room");
        m.update(FRAME_DT);

        let directions: Vec<f32> = m
            .bullets()
            .filter(|bullet| bullet.id != a && bullet.id != b)
            .map(|bullet| bullet.direction_degrees())
            .collect();
        assert_eq!(directions.len(), 2);
        assert!((directions[0] - 30.0).abs() < 1e-3);
        assert!((directions[1] - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_vanish_recycles_at_end_of_frame() {
        let mut m = manager(16, None);
        let p = pattern(r#"<bulletml><action label="top"><wait>1</wait><vanish/></action></bulletml>"#);
        let id = m.spawn_pattern(&p, Vec2::ZERO).expect("spawns").expect("room");

        m.update(FRAME_DT);
        assert!(m.get(id).is_some());
        m.update(FRAME_DT);
        assert!(m.get(id).is_none());
        assert!(m.is_empty());
        assert_eq!(m.task_count(), 0);
        assert_eq!(m.stats().recycled, 1);
    }

    #[test]
    fn test_cull_outside_playfield() {
        let bounds = Bounds::new(Vec2::ZERO, Vec2::new(100.0, 100.0));
        let mut m = BulletManager::new(&Settings {
            max_bullets: Some(4),
            playfield: Some(bounds),
            cull_margin: 10.0,
            ..Settings::default()
        });
        // Heading up at 5 px/frame from y = 2
        let id = m.create_bullet(Vec2::new(50.0, 2.0), 0.0, 5.0).expect("room");
        m.update(FRAME_DT);
        m.update(FRAME_DT);
        assert!(m.get(id).is_some(), "still inside the margin");
        m.update(FRAME_DT);
        assert!(m.get(id).is_none());
    }

    #[test]
    fn test_pool_exhaustion_is_counted() {
        let mut m = manager(3, None);
        let p = pattern(
            r#"<bulletml><action label="top">
                <repeat><times>5</times><action><fire><speed>1</speed><bullet/></fire></action></repeat>
            </action></bulletml>"#,
        );
        m.spawn_pattern(&p, Vec2::ZERO).expect("spawns");
        m.update(FRAME_DT);
        assert_eq!(m.len(), 3);
        assert_eq!(m.stats().fired, 2);
        assert_eq!(m.stats().dropped, 3);
    }

    #[test]
    fn test_determinism() {
        // Same seed, same pattern, same frames: identical bullets
        let p = pattern(
            r#"<bulletml><action label="top">
                <repeat><times>20</times><action>
                    <fire><direction type="absolute">$rand * 360</direction><speed>1 + $rand</speed><bullet/></fire>
                    <wait>1</wait>
                </action></repeat>
            </action></bulletml>"#,
        );
        let run = || {
            let mut m = manager(64, None);
            m.spawn_pattern(&p, Vec2::ZERO).expect("spawns");
            for _ in 0..30 {
                m.update(FRAME_DT);
            }
            m.snapshots()
        };
        let a = run();
        let b = run();
        assert_eq!(a.len(), 21);
        assert_eq!(a, b);
    }
}
