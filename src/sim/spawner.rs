//! Balloon population for a level
//!
//! Fairness rule: every value a wagon demands must show up often enough that
//! a level is always completable, plus a handful of random fillers to keep
//! the player scanning. The multiset is shuffled, then released one balloon
//! at a time on a staggered schedule so the sky fills up gradually.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::state::SessionState;
use super::timer::TimerEffect;
use crate::consts::*;

/// Build the value multiset for `level`: every value in `[1, level]` at least
/// `min_per_number` times, plus `extra_random` fillers drawn uniformly from
/// `[1, min(level, max_value)]`, shuffled.
pub fn build_spawn_values(
    level: u32,
    max_value: u32,
    min_per_number: u32,
    extra_random: u32,
    rng: &mut Pcg32,
) -> Vec<u32> {
    assert!(level >= 1, "level must be >= 1");

    let mut values = Vec::with_capacity((level * min_per_number + extra_random) as usize);
    for num in 1..=level {
        for _ in 0..min_per_number {
            values.push(num);
        }
    }

    // max_value caps only the fillers; the fairness floor above must still
    // cover every wagon or the level could not be completed.
    let filler_max = level.min(max_value.max(1));
    for _ in 0..extra_random {
        values.push(rng.random_range(1..=filler_max));
    }

    values.shuffle(rng);
    values
}

/// Schedule the level's balloon emissions on the timer wheel.
///
/// The first balloon is due immediately; each subsequent one follows the
/// previous after a fresh uniform `[400, 1000)` ms delay. Entries carry the
/// current generation, so a restart or level change supersedes them wholesale.
pub fn schedule_spawns(state: &mut SessionState) {
    let mut rng = state.rng_state.for_generation(state.generation, 0);
    let values = build_spawn_values(
        state.level,
        state.max_value,
        MIN_BALLOONS_PER_NUMBER,
        EXTRA_RANDOM_BALLOONS,
        &mut rng,
    );

    let mut due_ms = state.wall_ms;
    for (i, value) in values.into_iter().enumerate() {
        if i > 0 {
            due_ms += rng.random_range(SPAWN_DELAY_MIN_MS..SPAWN_DELAY_MAX_MS);
        }
        let id = state.next_entity_id();
        state
            .timers
            .schedule(due_ms, state.generation, TimerEffect::EmitBalloon { id, value });
    }
}
