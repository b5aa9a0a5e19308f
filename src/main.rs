//! Headless table runner
//!
//! Plays the table with the autopilot and logs what happened. Usage:
//!
//! ```text
//! cyber-pinball [--seed N] [--frames N] [--tuning FILE] [--table FILE] [--mobile]
//! ```

use std::env;
use std::fs;
use std::process::ExitCode;

use cyber_pinball::sim::{
    CollisionKind, EventLog, GamePhase, GameState, TableLayout, TickInput, tick,
};
use cyber_pinball::{DeviceProfile, Tuning};

/// One minute of play at 60 fps
const DEFAULT_FRAMES: u64 = 3600;

#[derive(Debug)]
struct Options {
    seed: u64,
    frames: u64,
    tuning_path: Option<String>,
    table_path: Option<String>,
    profile: DeviceProfile,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seed: 1,
            frames: DEFAULT_FRAMES,
            tuning_path: None,
            table_path: None,
            profile: DeviceProfile::Desktop,
        }
    }
}

fn parse_args() -> Result<Options, String> {
    let mut opts = Options::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => {
                let v = args.next().ok_or("--seed needs a value")?;
                opts.seed = v.parse().map_err(|e| format!("bad seed `{v}`: {e}"))?;
            }
            "--frames" => {
                let v = args.next().ok_or("--frames needs a value")?;
                opts.frames = v.parse().map_err(|e| format!("bad frame count `{v}`: {e}"))?;
            }
            "--tuning" => opts.tuning_path = Some(args.next().ok_or("--tuning needs a path")?),
            "--table" => opts.table_path = Some(args.next().ok_or("--table needs a path")?),
            "--mobile" => opts.profile = DeviceProfile::Mobile,
            other => return Err(format!("unknown argument `{other}`")),
        }
    }
    Ok(opts)
}

fn load_tuning(opts: &Options) -> Result<Tuning, String> {
    let mut tuning = match &opts.tuning_path {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            Tuning::from_json(&json).map_err(|e| format!("{path}: {e}"))?
        }
        None => Tuning::default(),
    };
    tuning.apply_device(opts.profile);
    Ok(tuning)
}

fn load_table(opts: &Options) -> Result<TableLayout, String> {
    match &opts.table_path {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            TableLayout::from_json(&json).map_err(|e| format!("{path}: {e}"))
        }
        None => Ok(TableLayout::default()),
    }
}

fn run(opts: &Options) -> Result<(), String> {
    let tuning = load_tuning(opts)?;
    let layout = load_table(opts)?;
    let mut state = GameState::with_table(opts.seed, layout, tuning);
    let mut log = EventLog::new();

    let start = TickInput {
        start: true,
        idle_mode: true,
        ..Default::default()
    };
    let play = TickInput {
        idle_mode: true,
        ..Default::default()
    };

    tick(&mut state, &start, &mut log);
    for _ in 1..opts.frames {
        tick(&mut state, &play, &mut log);
        if state.phase == GamePhase::GameOver {
            log::info!("Game over after {} ticks", state.time_ticks);
            break;
        }
    }

    for kind in [
        CollisionKind::Flipper,
        CollisionKind::Bumper,
        CollisionKind::Target,
        CollisionKind::DropTarget,
        CollisionKind::Spinner,
        CollisionKind::Wall,
    ] {
        log::debug!("{:>12}: {}", kind.as_str(), log.count(kind));
    }
    log::info!(
        "Seed {} finished: score {} (best {}), {} balls left, {} collisions",
        opts.seed,
        state.score,
        state.best_score,
        state.balls_left,
        log.collisions.len()
    );
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Cyber Pinball (headless) starting...");

    let result = parse_args().and_then(|opts| run(&opts));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Hosts embed the library directly on wasm
}
