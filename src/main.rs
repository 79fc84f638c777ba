//! Danmaku headless runner
//!
//! Loads a named pattern, runs it for a number of frames and prints a JSON
//! summary of the surviving bullets.
//!
//! ```text
//! danmaku <pattern-name> [frames]
//! ```

use std::path::Path;
use std::process::ExitCode;

use glam::Vec2;
use serde::Serialize;

use danmaku::consts::FRAME_DT;
use danmaku::pattern::{DirectorySource, PatternLibrary};
use danmaku::sim::SpawnStats;
use danmaku::{BulletManager, BulletSnapshot, Result, Settings};

const SETTINGS_FILE: &str = "danmaku.json";
const DEFAULT_FRAMES: u64 = 600;

#[derive(Debug, Serialize)]
struct Summary {
    pattern: String,
    frames: u64,
    rank: f32,
    stats: SpawnStats,
    bullets: Vec<BulletSnapshot>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<()> {
    let settings = Settings::load(Path::new(SETTINGS_FILE));
    let mut library = PatternLibrary::new(DirectorySource::new(&settings.pattern_dir));

    let Some(name) = args.first() else {
        println!("usage: danmaku <pattern-name> [frames]");
        println!("patterns in {}:", library.source().root().display());
        for name in library.available()? {
            println!("  {}", name);
        }
        return Ok(());
    };
    let frames = match args.get(1) {
        Some(arg) => arg.parse::<u64>().unwrap_or_else(|_| {
            log::warn!("Invalid frame count '{}', using {}", arg, DEFAULT_FRAMES);
            DEFAULT_FRAMES
        }),
        None => DEFAULT_FRAMES,
    };

    let pattern = library.load(name)?;
    let mut manager = BulletManager::new(&settings);

    let (origin, target) = match settings.playfield {
        Some(field) => (
            Vec2::new(field.center().x, field.min.y + field.size().y * 0.2),
            Vec2::new(field.center().x, field.min.y + field.size().y * 0.85),
        ),
        None => (Vec2::ZERO, Vec2::new(0.0, 400.0)),
    };
    manager.set_target(target);
    manager.spawn_pattern(&pattern, origin)?;

    for _ in 0..frames {
        manager.update(FRAME_DT);
        if manager.frame() % 60 == 0 {
            let stats = manager.stats();
            log::info!(
                "frame {}: {} live, {} tasks, fired {}, dropped {}, recycled {}",
                manager.frame(),
                manager.len(),
                manager.task_count(),
                stats.fired,
                stats.dropped,
                stats.recycled
            );
        }
    }

    let summary = Summary {
        pattern: pattern.name().to_string(),
        frames: manager.frame(),
        rank: manager.rank(),
        stats: manager.stats(),
        bullets: manager.snapshots(),
    };
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize summary: {}", e),
    }
    Ok(())
}
