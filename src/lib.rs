//! Balloon Train - a number-train balloon arcade game engine
//!
//! Core modules:
//! - `sim`: Deterministic session simulation (spawning, physics, collisions, level FSM)
//! - `audio`: Event-to-cue mixer with debounce and overlap caps
//! - `backend`: Game config fetch and play-count telemetry
//! - `session`: Facade composing the above into one per-session object

pub mod audio;
pub mod backend;
pub mod session;
pub mod sim;

pub use audio::{AudioCommand, AudioMixer, Cue};
pub use backend::{Backend, BackendError, GameConfig, HttpBackend, OfflineBackend};
pub use session::Session;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep in milliseconds (60 Hz)
    pub const SIM_DT_MS: f64 = 1000.0 / 60.0;
    /// Maximum substeps per `advance` call to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Fallback viewport when the host reports none
    pub const DEFAULT_VIEWPORT_W: f32 = 1920.0;
    pub const DEFAULT_VIEWPORT_H: f32 = 1080.0;

    /// Falling-box velocity gain per tick
    pub const GRAVITY: f32 = 0.4;
    /// Boxes are culled once below `viewport_h - BOX_EXIT_MARGIN`
    pub const BOX_EXIT_MARGIN: f32 = 60.0;

    /// Wagon drop-zone band starts at `viewport_h - WAGON_BAND_OFFSET`
    pub const WAGON_BAND_OFFSET: f32 = 220.0;
    /// First wagon's left edge relative to the locomotive's `train_x`
    pub const WAGON_OFFSET_X: f32 = 320.0;
    /// Horizontal pitch between wagons
    pub const WAGON_SPACING: f32 = 300.0;
    /// Width of one wagon's drop zone
    pub const WAGON_WIDTH: f32 = 280.0;

    /// Locomotive body extent (boxes landing on the engine are misses)
    pub const TRAIN_WIDTH: f32 = 320.0;
    pub const TRAIN_HEIGHT: f32 = 120.0;
    pub const TRAIN_BOTTOM_MARGIN: f32 = 40.0;

    /// Train horizontal speed per tick while entering / exiting
    pub const TRAIN_ENTER_SPEED: f32 = 4.0;
    pub const TRAIN_EXIT_SPEED: f32 = 10.0;
    /// Idle center = `viewport_w / 2 - BASE_CENTER_OFFSET - (level-1) * PER_LEVEL_SHIFT`,
    /// floored at MIN_CENTER_X so long formations still fit on screen
    pub const BASE_CENTER_OFFSET: f32 = 300.0;
    pub const PER_LEVEL_SHIFT: f32 = 125.0;
    pub const MIN_CENTER_X: f32 = -300.0;
    /// Entry start = `viewport_w + level * TRAIN_SPAWN_STEP + TRAIN_SPAWN_MARGIN`
    pub const TRAIN_SPAWN_STEP: f32 = 300.0;
    pub const TRAIN_SPAWN_MARGIN: f32 = 600.0;
    /// Exit target = `-(level * TRAIN_SPAWN_STEP + TRAIN_EXIT_MARGIN)`,
    /// scaling with train length so every wagon clears the screen
    pub const TRAIN_EXIT_MARGIN: f32 = 800.0;

    /// Per-level time budget in seconds
    pub const LEVEL_TIME_SECS: u32 = 60;
    /// Countdown cue fires when the clock reaches this many seconds
    pub const COUNTDOWN_AT_SECS: u32 = 10;

    /// Spawner fairness floor: every value appears at least this often
    pub const MIN_BALLOONS_PER_NUMBER: u32 = 3;
    /// Uniformly random filler balloons per level
    pub const EXTRA_RANDOM_BALLOONS: u32 = 5;
    /// Inter-arrival stagger for balloon emission, `[min, max)` ms
    pub const SPAWN_DELAY_MIN_MS: f64 = 400.0;
    pub const SPAWN_DELAY_MAX_MS: f64 = 1000.0;

    /// Delay between level completion and the next level's entry
    pub const LEVEL_ADVANCE_DELAY_MS: f64 = 5000.0;
    /// Cosmetic boxes dropped when a level completes
    pub const FLOURISH_BOXES: u32 = 6;

    /// Hard ceiling on the configured level count
    pub const MAX_LEVELS_CAP: u32 = 5;
}

/// Balloon rise speed used by the presentation layer, in px/tick
#[inline]
pub fn balloon_rise_speed(level: u32) -> f32 {
    (2.0 + level.saturating_sub(1) as f32 * 0.5).min(6.0)
}
