//! Drop-zone geometry and landing classification
//!
//! Wagon zones are always recomputed from the train's current `train_x`;
//! caching them would mis-score boxes while the formation is still moving.

use crate::consts::*;

use super::state::{FallingBox, Viewport};

/// Where a falling box ended up once it reached the wagon band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// Inside wagon `index`'s drop zone (value match not yet checked)
    Wagon(usize),
    /// On the locomotive body
    Locomotive,
    /// Past the wagons, onto the rails
    Ground,
}

/// Top of the wagon drop band; boxes above it are still in flight
#[inline]
pub fn wagon_band_top(viewport: &Viewport) -> f32 {
    viewport.height - WAGON_BAND_OFFSET
}

/// Left edge of wagon `index`'s drop zone for the current train position
#[inline]
pub fn wagon_left(train_x: f32, index: usize) -> f32 {
    train_x + WAGON_OFFSET_X + index as f32 * WAGON_SPACING
}

/// Map a horizontal position to a wagon slot. Zones are checked in index
/// order, so if rounding ever made two zones overlap, the lowest index wins.
pub fn wagon_slot_at(train_x: f32, wagons: usize, x: f32) -> Option<usize> {
    (0..wagons).find(|&i| {
        let left = wagon_left(train_x, i);
        x >= left && x <= left + WAGON_WIDTH
    })
}

/// Classify a box that has reached the wagon band. Returns `None` while the
/// box is still above the band and should keep falling.
pub fn classify(
    bx: &FallingBox,
    train_x: f32,
    wagons: usize,
    viewport: &Viewport,
) -> Option<Landing> {
    if bx.pos.y < wagon_band_top(viewport) {
        return None;
    }

    if let Some(index) = wagon_slot_at(train_x, wagons, bx.pos.x) {
        return Some(Landing::Wagon(index));
    }

    let train_top = viewport.height - (TRAIN_BOTTOM_MARGIN + TRAIN_HEIGHT);
    if bx.pos.x >= train_x && bx.pos.x <= train_x + TRAIN_WIDTH && bx.pos.y >= train_top {
        return Some(Landing::Locomotive);
    }

    Some(Landing::Ground)
}
