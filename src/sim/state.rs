//! Session state and core simulation types
//!
//! Everything that must be persisted to snapshot/resume a session lives here.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::timer::TimerWheel;
use crate::consts::*;

/// Motion state of the train/wagon formation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainPhase {
    /// Rolling in from off-screen right toward the idle center
    Entering,
    /// Holding at the idle center
    Idle,
    /// Rolling out left until the last wagon clears the screen
    Exiting,
}

/// Sub-state of a level distinguishing active play from its completion transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelPhase {
    /// Balloons spawn, boxes score
    Playing,
    /// All wagons fed; collision scoring is off while the train leaves
    Completing,
}

/// A numbered balloon waiting to be popped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balloon {
    pub id: u32,
    /// Target number the balloon carries
    pub value: u32,
}

/// A box dropped from a popped balloon, falling toward the train
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallingBox {
    pub id: u32,
    /// Horizontal position is fixed at spawn; only `pos.y` integrates
    pub pos: Vec2,
    pub value: u32,
    /// Vertical velocity, accumulates under gravity each tick
    pub velocity: f32,
}

impl FallingBox {
    pub fn new(id: u32, x: f32, y: f32, value: u32) -> Self {
        Self {
            id,
            pos: Vec2::new(x, y),
            value,
            velocity: 0.0,
        }
    }
}

/// Per-wagon hit table: slot `i` belongs to the wagon demanding value `i + 1`.
///
/// A slot latches once filled; repeated correct hits are no-ops so a flurry of
/// boxes cannot change the completion outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitTable {
    slots: Vec<u32>,
}

impl HitTable {
    pub fn new(wagons: usize) -> Self {
        Self {
            slots: vec![0; wagons],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Record a correct hit on `wagon`. Returns true if the slot was newly filled.
    pub fn record(&mut self, wagon: usize) -> bool {
        assert!(wagon < self.slots.len(), "wagon index out of range");
        if self.slots[wagon] == 0 {
            self.slots[wagon] = 1;
            true
        } else {
            false
        }
    }

    pub fn filled(&self, wagon: usize) -> bool {
        self.slots.get(wagon).is_some_and(|h| *h >= 1)
    }

    /// Level completes once every slot has been hit at least once
    pub fn all_filled(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(|h| *h >= 1)
    }

    pub fn slots(&self) -> &[u32] {
        &self.slots
    }
}

/// Host viewport in pixels; drop-zone geometry derives from the height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT_W,
            height: DEFAULT_VIEWPORT_H,
        }
    }
}

/// Discrete things that happened during a tick, drained by the facade.
///
/// This is the engine's only channel to the outside: the presentation layer
/// renders from them, the audio mixer turns them into cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A level (re-)entered play; the train starts rolling in
    LevelStarted { level: u32 },
    /// The spawner released a balloon
    BalloonSpawned { id: u32, value: u32 },
    /// The player popped a balloon; a box is now falling
    BalloonPopped { id: u32, value: u32 },
    /// A box landed in the wagon demanding its value
    BoxLanded { wagon: usize, value: u32 },
    /// A box landed in the wrong wagon, on the locomotive, or on the rails
    BoxMissed { value: u32 },
    /// Ten seconds left for the first time this level
    CountdownStarted,
    /// Every wagon fed on a non-final level; the train is leaving
    LevelCleared { level: u32 },
    /// The clock ran out mid-level
    TimedOut,
    /// Every wagon fed on the final level
    Victory,
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Derive a generator for one level generation. `salt` separates streams
    /// used within the same generation (spawn plan vs flourish placement).
    pub fn for_generation(&self, generation: u64, salt: u64) -> Pcg32 {
        Pcg32::seed_from_u64(
            self.seed ^ generation.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ salt,
        )
    }
}

/// Complete session state (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng_state: RngState,
    /// Current level, 1-based
    pub level: u32,
    /// Config-derived level count, clamped to `[1, MAX_LEVELS_CAP]`
    pub max_levels: u32,
    /// Config-derived cap on random filler balloon values
    pub max_value: u32,
    /// Seconds remaining on the level clock, never negative
    pub time_left: u32,
    pub paused: bool,
    /// Terminal flags; mutually exclusive by construction
    pub game_over: bool,
    pub victory: bool,
    pub train_phase: TrainPhase,
    pub level_phase: LevelPhase,
    /// Balloons currently afloat
    pub balloons: Vec<Balloon>,
    /// Boxes currently falling
    pub falling: Vec<FallingBox>,
    /// One slot per wagon, length == `level`
    pub hits: HitTable,
    /// Leftmost x of the locomotive; wagon zones derive from this every pass
    pub train_x: f32,
    pub viewport: Viewport,
    /// Advances every tick, pause or not; one-shot deadlines measure against it
    pub wall_ms: f64,
    /// Sub-second remainder of the 1 Hz countdown
    pub countdown_acc_ms: f64,
    /// One-shot latch: the completion transition fires at most once per level
    pub level_completed: bool,
    /// One-shot latch: the countdown cue fires at most once per level
    pub countdown_played: bool,
    /// Level generation; bumped on every entry/restart to kill stale timers
    pub generation: u64,
    pub timers: TimerWheel,
    /// Events produced since the last drain
    #[serde(skip)]
    pub events: Vec<SessionEvent>,
    /// Next entity ID
    next_id: u32,
}

impl SessionState {
    /// Create a session at level 1. The caller must invoke
    /// [`super::tick::enter_level`] to start play.
    pub fn new(seed: u64, max_levels: u32, max_value: u32, viewport: Viewport) -> Self {
        let max_levels = max_levels.clamp(1, MAX_LEVELS_CAP);
        Self {
            seed,
            rng_state: RngState::new(seed),
            level: 1,
            max_levels,
            max_value: max_value.max(1),
            time_left: LEVEL_TIME_SECS,
            paused: false,
            game_over: false,
            victory: false,
            train_phase: TrainPhase::Entering,
            level_phase: LevelPhase::Playing,
            balloons: Vec::new(),
            falling: Vec::new(),
            hits: HitTable::new(1),
            train_x: viewport.width,
            viewport,
            wall_ms: 0.0,
            countdown_acc_ms: 0.0,
            level_completed: false,
            countdown_played: false,
            generation: 0,
            timers: TimerWheel::default(),
            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push_event(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    /// Take all events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// True once the run has ended either way
    pub fn terminal(&self) -> bool {
        self.game_over || self.victory
    }

    /// Idle resting x for the current level's formation
    pub fn train_center(&self) -> f32 {
        let base = self.viewport.width / 2.0 - BASE_CENTER_OFFSET;
        (base - (self.level - 1) as f32 * PER_LEVEL_SHIFT).max(MIN_CENTER_X)
    }

    /// Off-screen start x for the current level's formation
    pub fn train_spawn_x(&self) -> f32 {
        self.viewport.width + self.level as f32 * TRAIN_SPAWN_STEP + TRAIN_SPAWN_MARGIN
    }

    /// Off-screen exit target; past this every wagon has cleared the screen
    pub fn train_exit_target(&self) -> f32 {
        -(self.level as f32 * TRAIN_SPAWN_STEP + TRAIN_EXIT_MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_table_latches() {
        let mut hits = HitTable::new(3);
        assert!(!hits.all_filled());

        assert!(hits.record(1));
        assert!(hits.filled(1));
        // Second correct hit on the same wagon is a no-op
        assert!(!hits.record(1));
        assert_eq!(hits.slots(), &[0, 1, 0]);

        assert!(hits.record(0));
        assert!(hits.record(2));
        assert!(hits.all_filled());
    }

    #[test]
    #[should_panic(expected = "wagon index out of range")]
    fn hit_table_rejects_out_of_range() {
        let mut hits = HitTable::new(2);
        hits.record(2);
    }

    #[test]
    fn max_levels_clamped() {
        let state = SessionState::new(1, 99, 5, Viewport::default());
        assert_eq!(state.max_levels, 5);
        let state = SessionState::new(1, 0, 5, Viewport::default());
        assert_eq!(state.max_levels, 1);
    }

    #[test]
    fn train_center_shifts_left_per_level() {
        let mut state = SessionState::new(1, 5, 5, Viewport::default());
        let c1 = state.train_center();
        state.level = 2;
        let c2 = state.train_center();
        assert_eq!(c1 - c2, PER_LEVEL_SHIFT);

        // Floor kicks in for long formations on narrow viewports
        state.viewport.width = 800.0;
        state.level = 5;
        assert_eq!(state.train_center(), MIN_CENTER_X);
    }
}
