//! Pattern interpreter and bullet simulation
//!
//! Frame-synchronous and deterministic:
//! - One `update` call is one frame; bullets run in creation order
//! - Seeded RNG only (`$rand`)
//! - No rendering or platform dependencies

pub mod fire;
pub mod interp;
pub mod manager;
pub mod state;
pub mod task;
pub mod tick;
pub mod value;

pub use fire::{FireTask, ValueSource};
pub use manager::{BulletManager, BulletPool};
pub use state::{Bullet, BulletId, BulletSnapshot, PatternContext, SequenceState, SpawnStats};
pub use task::{RunStatus, Task, TaskArena, TaskId, TaskKind, TaskPhase};
pub use value::{FireInputs, resolve_direction, resolve_speed};
