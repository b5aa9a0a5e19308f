//! Fixed timestep simulation tick
//!
//! Reference host loop: flippers, then every ball, then end-of-frame
//! bookkeeping, then ball-lost / respawn / multiball handling.

use super::engine::BallOutcome;
use super::events::{EventSink, ScoreTally};
use super::state::{GameAction, GamePhase, GameState};
use crate::ms_to_frames;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Left flipper button held
    pub left_flipper: bool,
    /// Right flipper button held
    pub right_flipper: bool,
    /// Launcher released after charging this long (ms)
    pub launch_charge_ms: Option<f32>,
    /// Start a new game
    pub start: bool,
    /// Pause toggle
    pub pause: bool,
    /// Idle/demo mode - autopilot plays the table
    pub idle_mode: bool,
}

/// Charge the autopilot uses for its plunger shots
const AUTOPILOT_CHARGE_MS: f32 = 1800.0;
/// Autopilot flips when a falling ball is below this line
const AUTOPILOT_FLIP_Y: f32 = 620.0;

/// Simple autopilot: plunge any waiting ball and flip at balls falling toward a flipper
fn autopilot(state: &GameState, input: &mut TickInput) {
    if state.ball_in_launcher().is_some() {
        input.launch_charge_ms = Some(AUTOPILOT_CHARGE_MS);
    }
    let centre = (state.flippers.left.pivot.x + state.flippers.right.pivot.x) / 2.0;
    for ball in state.balls.iter().filter(|b| b.launched) {
        if ball.pos.y > AUTOPILOT_FLIP_Y && ball.vel.y > 0.0 {
            if ball.pos.x < centre {
                input.left_flipper = true;
            } else {
                input.right_flipper = true;
            }
        }
    }
}

/// Advance the game state by one frame
pub fn tick<S: EventSink + ?Sized>(state: &mut GameState, input: &TickInput, sink: &mut S) {
    if input.start && matches!(state.phase, GamePhase::Attract | GamePhase::GameOver) {
        state.start();
    }

    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                return;
            }
            GamePhase::Paused => state.phase = GamePhase::Playing,
            _ => {}
        }
    }

    // Don't tick if paused or game over
    if matches!(state.phase, GamePhase::Paused | GamePhase::GameOver) {
        return;
    }

    let mut input = input.clone();
    if input.idle_mode {
        autopilot(state, &mut input);
    }

    // Flippers move before the ball is integrated
    if input.left_flipper {
        state.flippers.left.activate();
    } else {
        state.flippers.left.deactivate();
    }
    if input.right_flipper {
        state.flippers.right.activate();
    } else {
        state.flippers.right.deactivate();
    }
    state.flippers.update(state.physics.tuning.flipper.blend);

    if let Some(charge) = input.launch_charge_ms {
        if let Some(ball) = state.balls.iter_mut().find(|b| !b.launched) {
            state.physics.launch_with_charge(ball, charge);
            log::debug!("Ball {} launched after {:.0}ms charge", ball.id, charge);
        }
    }

    let mut lost = Vec::new();
    let mut locked = Vec::new();
    let released = {
        let mut tally = ScoreTally::new(&mut state.score, sink);
        for ball in state.balls.iter_mut() {
            match state
                .physics
                .step_ball(ball, &state.flippers, &mut state.obstacles, &mut tally)
            {
                BallOutcome::InPlay => {}
                BallOutcome::Lost => lost.push(ball.id),
                BallOutcome::Locked { .. } => locked.push(ball.id),
            }
        }
        state
            .physics
            .finish_frame(&mut state.obstacles, &mut tally)
            .released
    };

    // Locked balls go back to the launcher (unless one is already waiting)
    for id in locked {
        let waiting = state.balls.iter().any(|b| !b.launched && b.id != id);
        if waiting {
            state.balls.retain(|b| b.id != id);
        } else if let Some(ball) = state.balls.iter_mut().find(|b| b.id == id) {
            ball.reset(state.layout.launcher);
        }
    }

    // Multiball: release the locked balls one after another
    let stagger = ms_to_frames(state.physics.tuning.game.multiball_stagger_ms);
    for (k, pos) in released.into_iter().enumerate() {
        let due = state.time_ticks + stagger * (k as u64 + 1);
        state
            .schedule
            .schedule(due, state.epoch, GameAction::ReleaseBall { pos });
    }

    if !lost.is_empty() {
        state.balls.retain(|b| !lost.contains(&b.id));
        let releasing = state
            .schedule
            .any_pending(state.epoch, |a| matches!(a, GameAction::ReleaseBall { .. }));
        if state.balls.is_empty() && !releasing {
            ball_drained(state);
        }
    }

    for action in state.schedule.drain_due(state.time_ticks, state.epoch) {
        match action {
            GameAction::RespawnBall => state.spawn_ball(),
            GameAction::ReleaseBall { pos } => state.release_ball(pos),
        }
    }

    state.time_ticks += 1;
}

/// Last ball in play is gone
fn ball_drained(state: &mut GameState) {
    let respawn = state.time_ticks + ms_to_frames(state.physics.tuning.game.ball_respawn_ms);
    match state.phase {
        GamePhase::Playing => {
            state.balls_left = state.balls_left.saturating_sub(1);
            log::info!("Ball lost, {} left", state.balls_left);
            if state.balls_left == 0 {
                state.game_over();
            } else {
                state
                    .schedule
                    .schedule(respawn, state.epoch, GameAction::RespawnBall);
            }
        }
        // Attract mode plays forever
        _ => state
            .schedule
            .schedule(respawn, state.epoch, GameAction::RespawnBall),
    }
}
