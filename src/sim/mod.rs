//! Deterministic session simulation
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - One logical thread of control; transition order within a tick is fixed
//! - No rendering, audio, or network dependencies

pub mod collision;
pub mod spawner;
pub mod state;
pub mod tick;
pub mod timer;

pub use collision::{Landing, classify, wagon_band_top, wagon_left, wagon_slot_at};
pub use spawner::build_spawn_values;
pub use state::{
    Balloon, FallingBox, HitTable, LevelPhase, SessionEvent, SessionState, TrainPhase, Viewport,
};
pub use tick::{drop_balloon, enter_level, restart_level, tick};
pub use timer::{TimerEffect, TimerWheel};
