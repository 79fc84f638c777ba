//! Runtime settings
//!
//! Difficulty presets plus the knobs a host can override. Persisted as JSON.

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_MAX_BULLETS;

/// Difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
    Lunatic,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Lunatic => "Lunatic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "norm" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            "lunatic" => Some(Difficulty::Lunatic),
            _ => None,
        }
    }

    /// `$rank` seen by patterns
    pub fn rank(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.25,
            Difficulty::Normal => 0.5,
            Difficulty::Hard => 0.75,
            Difficulty::Lunatic => 1.0,
        }
    }

    /// Bullet pool size for this preset
    pub fn max_bullets(&self) -> usize {
        match self {
            Difficulty::Easy => DEFAULT_MAX_BULLETS / 2,
            Difficulty::Normal => DEFAULT_MAX_BULLETS,
            Difficulty::Hard => DEFAULT_MAX_BULLETS * 2,
            Difficulty::Lunatic => DEFAULT_MAX_BULLETS * 4,
        }
    }
}

/// Axis-aligned playfield rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Whether `pos` lies inside, allowing `margin` pixels of overshoot
    pub fn contains(&self, pos: Vec2, margin: f32) -> bool {
        pos.cmpge(self.min - margin).all() && pos.cmple(self.max + margin).all()
    }
}

/// Bullet manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Difficulty preset
    pub difficulty: Difficulty,

    // === Overrides ===
    /// Rank in [0, 1]; replaces the preset's rank
    pub rank: Option<f32>,
    /// Pool capacity; replaces the preset's
    pub max_bullets: Option<usize>,

    /// Seed for `$rand`
    pub seed: u64,

    // === Playfield ===
    /// Bullets leaving the playfield are culled (None disables culling)
    pub playfield: Option<Bounds>,
    /// Distance past the playfield edge before culling
    pub cull_margin: f32,

    /// Directory holding `<name>.xml` pattern files
    pub pattern_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,

            rank: None,
            max_bullets: None,

            seed: 0x5EED,

            playfield: Some(Bounds::new(Vec2::ZERO, Vec2::new(480.0, 640.0))),
            cull_margin: 32.0,

            pattern_dir: PathBuf::from("patterns"),
        }
    }
}

impl Settings {
    /// Create settings from a difficulty preset
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Switch preset, dropping overrides that would mask it
    pub fn apply_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.rank = None;
        self.max_bullets = None;
    }

    /// Rank actually used (override, else preset), clamped to [0, 1]
    pub fn effective_rank(&self) -> f32 {
        self.rank
            .unwrap_or_else(|| self.difficulty.rank())
            .clamp(0.0, 1.0)
    }

    /// Pool capacity actually used
    pub fn max_bullets(&self) -> usize {
        self.max_bullets
            .unwrap_or_else(|| self.difficulty.max_bullets())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        if let Ok(json) = std::fs::read_to_string(path) {
            match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(e) => log::warn!("Ignoring {}: {}", path.display(), e),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings as pretty-printed JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
