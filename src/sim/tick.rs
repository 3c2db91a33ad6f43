//! Fixed timestep session tick
//!
//! One call advances the session by `SIM_DT_MS`. Order within a tick matters:
//! due one-shots fire first (they run on the wall clock, pause or not), then
//! the pause gate, then countdown, train motion, integration, and collision
//! resolution. Collision application and the completion check happen inside
//! the same tick, so no observer ever sees a half-updated hit table.

use rand::Rng;

use super::collision::{self, Landing};
use super::spawner;
use super::state::{Balloon, FallingBox, HitTable, LevelPhase, SessionEvent, SessionState, TrainPhase};
use super::timer::TimerEffect;
use crate::consts::*;

/// Advance the session by one fixed timestep
pub fn tick(state: &mut SessionState) {
    state.wall_ms += SIM_DT_MS;

    // Scheduled one-shots are unaffected by pause; stale generations are
    // dropped by the wheel.
    for effect in state.timers.fire_due(state.wall_ms, state.generation) {
        apply_effect(state, effect);
    }

    if state.paused {
        return;
    }

    advance_countdown(state);
    move_train(state);
    integrate_falling(state);
    resolve_collisions(state);
}

/// (Re-)enter play for `state.level`: fresh hit table, full clock, train
/// rolling in from off-screen, spawn schedule queued under a new generation.
pub fn enter_level(state: &mut SessionState) {
    assert!(
        state.level >= 1 && state.level <= state.max_levels,
        "level out of range"
    );

    // New generation: every pending emission and level-advance dies with it
    state.generation += 1;

    state.balloons.clear();
    state.falling.clear();
    state.hits = HitTable::new(state.level as usize);
    state.time_left = LEVEL_TIME_SECS;
    state.countdown_acc_ms = 0.0;
    state.train_phase = TrainPhase::Entering;
    state.train_x = state.train_spawn_x();
    state.level_phase = LevelPhase::Playing;
    state.level_completed = false;
    state.countdown_played = false;
    state.game_over = false;
    state.victory = false;

    spawner::schedule_spawns(state);
    state.push_event(SessionEvent::LevelStarted { level: state.level });
}

/// Force re-entry into the current level regardless of phase, cancelling any
/// pending completion delay and in-flight spawn emissions.
pub fn restart_level(state: &mut SessionState) {
    enter_level(state);
}

/// Pop balloon `id` at the given screen position, dropping its box.
///
/// Unknown ids are ignored: a pop racing a level reset must not conjure a box
/// into the new level. Pops are also ignored while paused or after the run
/// has ended.
pub fn drop_balloon(state: &mut SessionState, id: u32, x: f32, y: f32) {
    if state.paused || state.terminal() {
        return;
    }
    let Some(index) = state.balloons.iter().position(|b| b.id == id) else {
        return;
    };
    let balloon = state.balloons.remove(index);
    let box_id = state.next_entity_id();
    state.falling.push(FallingBox::new(box_id, x, y, balloon.value));
    state.push_event(SessionEvent::BalloonPopped {
        id,
        value: balloon.value,
    });
}

fn apply_effect(state: &mut SessionState, effect: TimerEffect) {
    match effect {
        TimerEffect::EmitBalloon { id, value } => {
            // Emissions racing a game-over screen are dropped
            if state.terminal() {
                return;
            }
            state.balloons.push(Balloon { id, value });
            state.push_event(SessionEvent::BalloonSpawned { id, value });
        }
        TimerEffect::AdvanceLevel => {
            if state.terminal() {
                return;
            }
            // Exactly +1 per completion, however late the tick arrives
            state.level = (state.level + 1).min(state.max_levels);
            enter_level(state);
        }
    }
}

fn advance_countdown(state: &mut SessionState) {
    if state.time_left == 0 || state.terminal() {
        return;
    }

    state.countdown_acc_ms += SIM_DT_MS;
    while state.countdown_acc_ms >= 1000.0 && state.time_left > 0 {
        state.countdown_acc_ms -= 1000.0;
        state.time_left -= 1;

        if state.time_left == COUNTDOWN_AT_SECS && !state.countdown_played {
            state.countdown_played = true;
            state.push_event(SessionEvent::CountdownStarted);
        }

        if state.time_left == 0 {
            time_out(state);
        }
    }
}

fn time_out(state: &mut SessionState) {
    // Only an active, unfinished level can time out
    if state.level_completed || state.level_phase == LevelPhase::Completing || state.terminal() {
        return;
    }
    state.game_over = true;
    state.push_event(SessionEvent::TimedOut);
}

fn move_train(state: &mut SessionState) {
    match state.train_phase {
        TrainPhase::Entering => {
            let center = state.train_center();
            state.train_x -= TRAIN_ENTER_SPEED;
            if state.train_x <= center {
                state.train_x = center;
                state.train_phase = TrainPhase::Idle;
            }
        }
        TrainPhase::Idle => {}
        TrainPhase::Exiting => {
            let target = state.train_exit_target();
            if state.train_x > target {
                state.train_x -= TRAIN_EXIT_SPEED;
            }
        }
    }
}

fn integrate_falling(state: &mut SessionState) {
    for bx in &mut state.falling {
        bx.velocity += GRAVITY;
        bx.pos.y += bx.velocity;
    }

    // Boxes past the visible range resolve nowhere; cull them silently (the
    // resolver already cued any real miss at the wagon band)
    let cull_y = state.viewport.height - BOX_EXIT_MARGIN;
    state.falling.retain(|bx| bx.pos.y < cull_y);
}

fn resolve_collisions(state: &mut SessionState) {
    // Scoring is dead once the level is completing or the run has ended; a
    // box in flight must not re-trigger a finished level.
    if state.level_phase != LevelPhase::Playing || state.terminal() {
        return;
    }

    let wagons = state.hits.len();
    let train_x = state.train_x;
    let viewport = state.viewport;

    let boxes = std::mem::take(&mut state.falling);
    let mut remain = Vec::with_capacity(boxes.len());
    for bx in boxes {
        match collision::classify(&bx, train_x, wagons, &viewport) {
            None => remain.push(bx),
            Some(Landing::Wagon(index)) if bx.value as usize == index + 1 => {
                // Latching: repeat hits leave the table untouched but still cue
                state.hits.record(index);
                state.push_event(SessionEvent::BoxLanded {
                    wagon: index,
                    value: bx.value,
                });
            }
            Some(_) => {
                state.push_event(SessionEvent::BoxMissed { value: bx.value });
            }
        }
    }
    state.falling = remain;

    if state.hits.all_filled() && !state.level_completed {
        complete_level(state);
    }
}

fn complete_level(state: &mut SessionState) {
    state.level_completed = true;
    state.balloons.clear();
    spawn_flourish(state);
    state.level_phase = LevelPhase::Completing;

    if state.level >= state.max_levels {
        state.victory = true;
        state.push_event(SessionEvent::Victory);
    } else {
        state.push_event(SessionEvent::LevelCleared { level: state.level });
        state.train_phase = TrainPhase::Exiting;
        state.timers.schedule(
            state.wall_ms + LEVEL_ADVANCE_DELAY_MS,
            state.generation,
            TimerEffect::AdvanceLevel,
        );
    }
}

/// A handful of synthetic boxes rain down for visual closure. They spawn into
/// the completing phase, so they never score; they fall and cull.
fn spawn_flourish(state: &mut SessionState) {
    let mut rng = state.rng_state.for_generation(state.generation, 1);
    let value = state.level.min(state.max_levels);
    for _ in 0..FLOURISH_BOXES {
        let id = state.next_entity_id();
        let x = rng.random_range(0.0..state.viewport.width);
        let y = 60.0 + rng.random_range(0.0..80.0);
        state.falling.push(FallingBox::new(id, x, y, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Viewport;

    fn new_session(max_levels: u32) -> SessionState {
        let mut state = SessionState::new(12345, max_levels, 5, Viewport::default());
        enter_level(&mut state);
        state
    }

    fn run_ticks(state: &mut SessionState, n: u32) {
        for _ in 0..n {
            tick(state);
        }
    }

    fn ticks_for_ms(ms: f64) -> u32 {
        (ms / SIM_DT_MS).ceil() as u32 + 1
    }

    /// Tick until the train settles at its idle center
    fn settle_train(state: &mut SessionState) {
        while state.train_phase != TrainPhase::Idle {
            tick(state);
        }
    }

    fn inject_box(state: &mut SessionState, x: f32, y: f32, value: u32) {
        let id = state.next_entity_id();
        state.falling.push(FallingBox::new(id, x, y, value));
    }

    /// Inject a box just above the wagon band, centered on `wagon`'s zone
    fn inject_box_over_wagon(state: &mut SessionState, wagon: usize, value: u32) {
        let x = collision::wagon_left(state.train_x, wagon) + WAGON_WIDTH / 2.0;
        let y = collision::wagon_band_top(&state.viewport) - 1.0;
        inject_box(state, x, y, value);
    }

    #[test]
    fn matching_box_fills_wagon_and_completes_level() {
        // Level 1 of 5: one wagon demanding value 1
        let mut state = new_session(5);
        settle_train(&mut state);
        state.drain_events();

        inject_box_over_wagon(&mut state, 0, 1);
        run_ticks(&mut state, 5);

        assert!(state.hits.filled(0));
        assert_eq!(state.level_phase, LevelPhase::Completing);
        assert_eq!(state.train_phase, TrainPhase::Exiting);
        let events = state.drain_events();
        assert!(events.contains(&SessionEvent::BoxLanded { wagon: 0, value: 1 }));
        assert!(events.contains(&SessionEvent::LevelCleared { level: 1 }));

        // After the completion delay the next level starts
        run_ticks(&mut state, ticks_for_ms(LEVEL_ADVANCE_DELAY_MS));
        assert_eq!(state.level, 2);
        assert_eq!(state.level_phase, LevelPhase::Playing);
        assert_eq!(state.hits.len(), 2);
        assert_eq!(state.time_left, LEVEL_TIME_SECS);
        assert!(state.drain_events().contains(&SessionEvent::LevelStarted { level: 2 }));
    }

    #[test]
    fn wrong_value_is_a_miss_and_changes_nothing() {
        let mut state = new_session(5);
        settle_train(&mut state);
        state.drain_events();

        inject_box_over_wagon(&mut state, 0, 3);
        run_ticks(&mut state, 5);

        assert!(!state.hits.filled(0));
        assert_eq!(state.level_phase, LevelPhase::Playing);
        let events = state.drain_events();
        assert!(events.contains(&SessionEvent::BoxMissed { value: 3 }));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::BoxLanded { .. })));
    }

    #[test]
    fn timeout_sets_game_over_and_freezes_the_clock() {
        let mut state = new_session(5);

        run_ticks(&mut state, ticks_for_ms(60_000.0));
        assert!(state.game_over);
        assert!(!state.victory);
        assert_eq!(state.time_left, 0);
        assert!(state.drain_events().contains(&SessionEvent::TimedOut));

        // Nothing moves the clock afterwards, and no balloons arrive
        let balloons = state.balloons.len();
        run_ticks(&mut state, ticks_for_ms(5_000.0));
        assert_eq!(state.time_left, 0);
        assert_eq!(state.balloons.len(), balloons);
        assert!(!state.drain_events().contains(&SessionEvent::TimedOut));
    }

    #[test]
    fn final_level_completion_is_victory_not_advance() {
        let mut state = new_session(1);
        settle_train(&mut state);
        state.drain_events();

        inject_box_over_wagon(&mut state, 0, 1);
        run_ticks(&mut state, 5);

        assert!(state.victory);
        assert!(!state.game_over);
        assert_eq!(state.level, 1);
        // Victory holds the train; only exit takes over from here
        assert_eq!(state.train_phase, TrainPhase::Idle);
        let events = state.drain_events();
        assert!(events.contains(&SessionEvent::Victory));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::LevelCleared { .. })));

        // No pending advance: the level never increments past the last
        run_ticks(&mut state, ticks_for_ms(LEVEL_ADVANCE_DELAY_MS * 2.0));
        assert_eq!(state.level, 1);
        assert!(state.victory);
    }

    #[test]
    fn completion_fires_exactly_once_under_simultaneous_hits() {
        // Level 2: two wagons, filled in the same tick, with duplicates
        let mut state = new_session(5);
        state.level = 2;
        enter_level(&mut state);
        settle_train(&mut state);
        state.drain_events();

        inject_box_over_wagon(&mut state, 0, 1);
        inject_box_over_wagon(&mut state, 0, 1);
        inject_box_over_wagon(&mut state, 1, 2);
        inject_box_over_wagon(&mut state, 1, 2);
        run_ticks(&mut state, 5);

        let events = state.drain_events();
        let cleared = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::LevelCleared { .. }))
            .count();
        assert_eq!(cleared, 1);

        // Only one advance is queued; 5 s later we are on level 3, not 4
        run_ticks(&mut state, ticks_for_ms(LEVEL_ADVANCE_DELAY_MS * 3.0));
        assert_eq!(state.level, 3);
    }

    #[test]
    fn pause_freezes_physics_clock_and_train() {
        let mut state = new_session(5);
        run_ticks(&mut state, 10);

        // High above the band so it is still in flight when we pause
        inject_box(&mut state, 500.0, 100.0, 1);
        run_ticks(&mut state, 3);

        state.paused = true;
        let frozen_box = state.falling[0];
        let frozen_x = state.train_x;
        let frozen_time = state.time_left;

        run_ticks(&mut state, ticks_for_ms(10_000.0));
        assert_eq!(state.falling[0], frozen_box);
        assert_eq!(state.train_x, frozen_x);
        assert_eq!(state.time_left, frozen_time);

        // Resume continues from the exact pause instant
        state.paused = false;
        tick(&mut state);
        assert!(state.falling[0].pos.y > frozen_box.pos.y);
        assert_eq!(state.falling[0].velocity, frozen_box.velocity + GRAVITY);
    }

    #[test]
    fn spawn_stagger_keeps_running_through_pause() {
        let mut state = new_session(5);
        state.paused = true;

        run_ticks(&mut state, ticks_for_ms(20_000.0));
        // Level 1 plan: 1 * 3 + 5 balloons, all emitted despite the pause
        assert_eq!(state.balloons.len(), 8);
    }

    #[test]
    fn restart_reproduces_a_fresh_level() {
        let mut state = new_session(5);
        run_ticks(&mut state, ticks_for_ms(3_000.0));

        // Disturb everything restart must undo
        let popped: Vec<_> = state.balloons.iter().map(|b| b.id).collect();
        for id in popped {
            drop_balloon(&mut state, id, 500.0, 100.0);
        }
        assert!(!state.falling.is_empty());

        restart_level(&mut state);
        assert_eq!(state.time_left, LEVEL_TIME_SECS);
        assert_eq!(state.hits.len(), 1);
        assert!(!state.hits.all_filled());
        assert!(state.balloons.is_empty());
        assert!(state.falling.is_empty());
        assert_eq!(state.train_phase, TrainPhase::Entering);
        assert_eq!(state.train_x, state.train_spawn_x());
        assert_eq!(state.level_phase, LevelPhase::Playing);
    }

    #[test]
    fn restart_supersedes_in_flight_emissions() {
        let mut state = new_session(5);
        run_ticks(&mut state, 2);
        assert!(!state.balloons.is_empty());

        restart_level(&mut state);
        run_ticks(&mut state, ticks_for_ms(20_000.0));

        // Only the new generation's plan arrives, never a stale balloon
        assert_eq!(state.balloons.len(), 8);
    }

    #[test]
    fn restart_cancels_pending_level_advance() {
        let mut state = new_session(5);
        settle_train(&mut state);
        inject_box_over_wagon(&mut state, 0, 1);
        run_ticks(&mut state, 5);
        assert_eq!(state.level_phase, LevelPhase::Completing);

        restart_level(&mut state);
        run_ticks(&mut state, ticks_for_ms(LEVEL_ADVANCE_DELAY_MS * 2.0));
        // The 5 s advance scheduled before the restart must not fire
        assert_eq!(state.level, 1);
        assert_eq!(state.level_phase, LevelPhase::Playing);
    }

    #[test]
    fn countdown_cue_fires_once_per_level() {
        let mut state = new_session(5);
        run_ticks(&mut state, ticks_for_ms(51_000.0));

        let countdowns = state
            .drain_events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::CountdownStarted))
            .count();
        assert_eq!(countdowns, 1);
        assert!(state.time_left <= COUNTDOWN_AT_SECS);
    }

    #[test]
    fn boxes_in_flight_cannot_rescore_a_completing_level() {
        let mut state = new_session(5);
        settle_train(&mut state);

        // First box completes the level; the second is still in the air
        inject_box_over_wagon(&mut state, 0, 1);
        run_ticks(&mut state, 5);
        assert_eq!(state.level_phase, LevelPhase::Completing);
        state.drain_events();

        inject_box_over_wagon(&mut state, 0, 1);
        run_ticks(&mut state, ticks_for_ms(2_000.0));

        let events = state.drain_events();
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::BoxLanded { .. })));
        // It fell off the bottom without a cue
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::BoxMissed { .. })));
    }

    #[test]
    fn stale_pop_after_restart_is_ignored() {
        let mut state = new_session(5);
        run_ticks(&mut state, 2);
        let stale_id = state.balloons[0].id;

        restart_level(&mut state);
        drop_balloon(&mut state, stale_id, 500.0, 100.0);
        assert!(state.falling.is_empty());
    }

    #[test]
    fn train_enters_settles_then_exits_off_screen() {
        let mut state = new_session(5);
        let start_x = state.train_x;
        tick(&mut state);
        assert!(state.train_x < start_x);

        settle_train(&mut state);
        assert_eq!(state.train_x, state.train_center());

        inject_box_over_wagon(&mut state, 0, 1);
        run_ticks(&mut state, 5);
        assert_eq!(state.train_phase, TrainPhase::Exiting);

        // Long before the advance fires, every wagon has left the screen
        run_ticks(&mut state, ticks_for_ms(4_500.0));
        assert!(state.train_x <= state.train_exit_target() + TRAIN_EXIT_SPEED);
    }

    #[test]
    fn determinism_same_seed_same_run() {
        let mut a = new_session(5);
        let mut b = new_session(5);

        run_ticks(&mut a, 600);
        run_ticks(&mut b, 600);

        assert_eq!(a.balloons, b.balloons);
        assert_eq!(a.train_x, b.train_x);
        assert_eq!(a.time_left, b.time_left);
    }
}
