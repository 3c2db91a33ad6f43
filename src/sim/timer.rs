//! Generation-keyed one-shot scheduler
//!
//! Every scheduled effect is tied to the level generation that created it.
//! Entering or restarting a level bumps the generation, so callbacks from the
//! previous life of the session are discarded when they come due instead of
//! firing into a level they don't belong to.

use serde::{Deserialize, Serialize};

/// Deferred effect applied by the tick when its deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerEffect {
    /// Release the next staggered balloon
    EmitBalloon { id: u32, value: u32 },
    /// Completion delay elapsed; move to the next level
    AdvanceLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Entry {
    deadline_ms: f64,
    generation: u64,
    effect: TimerEffect,
}

/// Pending one-shot callbacks, ordered by deadline when fired
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerWheel {
    entries: Vec<Entry>,
}

impl TimerWheel {
    pub fn schedule(&mut self, deadline_ms: f64, generation: u64, effect: TimerEffect) {
        self.entries.push(Entry {
            deadline_ms,
            generation,
            effect,
        });
    }

    /// Remove and return all effects due at `now_ms` that still belong to
    /// `current_generation`, in deadline order. Stale entries are dropped.
    pub fn fire_due(&mut self, now_ms: f64, current_generation: u64) -> Vec<TimerEffect> {
        let mut due: Vec<Entry> = Vec::new();
        self.entries.retain(|entry| {
            if entry.deadline_ms <= now_ms {
                due.push(*entry);
                false
            } else {
                entry.generation == current_generation
            }
        });

        due.sort_by(|a, b| a.deadline_ms.total_cmp(&b.deadline_ms));
        due.into_iter()
            .filter(|entry| entry.generation == current_generation)
            .map(|entry| entry.effect)
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }
}
