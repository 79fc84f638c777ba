//! Danmaku - BulletML pattern interpreter
//!
//! Core modules:
//! - `pattern`: Immutable node trees parsed from pattern documents
//! - `sim`: Frame-synchronous task interpreter, bullets and the bullet pool
//! - `settings`: Difficulty presets and runtime configuration
//! - `error`: Structural and contract errors

pub mod error;
pub mod pattern;
pub mod settings;
pub mod sim;

pub use error::{PatternError, Result};
pub use pattern::{Pattern, PatternLibrary};
pub use settings::{Difficulty, Settings};
pub use sim::{Bullet, BulletId, BulletManager, BulletSnapshot};

use glam::Vec2;

/// Interpreter configuration constants
pub mod consts {
    /// Frame rate pattern speeds are authored against (speed = pixels per frame)
    pub const REFERENCE_FPS: f32 = 60.0;
    /// One interpreter frame at the reference rate
    pub const FRAME_DT: f32 = 1.0 / REFERENCE_FPS;

    /// Speeds with a smaller magnitude are treated as zero
    pub const SPEED_EPSILON: f32 = 1e-4;

    /// Maximum element nesting in a pattern document, and maximum depth of one bound
    /// task tree (each `*Ref` hop counts as a level)
    pub const MAX_NEST_DEPTH: usize = 128;
    /// Maximum parenthesis/unary nesting in a value expression
    pub const MAX_EXPR_DEPTH: usize = 32;
    /// Maximum operator count in a value expression
    pub const MAX_EXPR_OPS: usize = 256;
    /// Upper bound on a single `<repeat>` count
    pub const MAX_REPEAT: u32 = 10_000;

    /// Pool capacity when no preset or override applies
    pub const DEFAULT_MAX_BULLETS: usize = 512;
}

/// Normalized angle in degrees to (-180, 180]
#[inline]
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Unit heading for a direction in radians (0 = up, clockwise, screen coordinates)
#[inline]
pub fn heading(direction: f32) -> Vec2 {
    Vec2::new(direction.sin(), -direction.cos())
}

/// Direction in degrees from `from` toward `to`, same convention as [`heading`]
#[inline]
pub fn aim_degrees(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.x.atan2(-d.y).to_degrees()
}
