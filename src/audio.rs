//! Audio orchestration
//!
//! The engine never touches an audio device. This mixer turns session events
//! into play/stop commands for whatever actually owns the speakers, while
//! enforcing the rules that keep rapid gameplay from degenerating into noise:
//! an 80 ms per-cue debounce and a cap of two overlapping instances per cue.
//! Game-over and victory are exclusive and silence everything else first.

use std::collections::HashMap;

use crate::sim::SessionEvent;

/// Same cue re-requested inside this window is dropped (phasing artifacts)
const DEBOUNCE_MS: f64 = 80.0;
/// At most this many overlapping instances per cue; extras are dropped, not queued
const MAX_CONCURRENT_PER_CUE: usize = 2;

/// Sound cue keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Balloon popped
    Pop,
    /// Box landed in the right wagon
    Land,
    /// Box landed anywhere else
    Miss,
    /// Ten seconds left
    Countdown,
    /// Level cleared, more to come
    Success,
    /// Train rolling in for a new level
    Train,
    /// Clock ran out
    GameOver,
    /// Final level cleared
    Victory,
}

impl Cue {
    /// Nominal clip length, used to age out concurrency bookkeeping
    fn nominal_len_ms(self) -> f64 {
        match self {
            Cue::Pop => 300.0,
            Cue::Land => 400.0,
            Cue::Miss => 500.0,
            Cue::Countdown => 10_000.0,
            Cue::Success => 2_000.0,
            Cue::Train => 2_500.0,
            Cue::GameOver => 3_000.0,
            Cue::Victory => 4_000.0,
        }
    }

    /// Exclusive cues silence everything else before playing
    pub fn exclusive(self) -> bool {
        matches!(self, Cue::GameOver | Cue::Victory)
    }
}

/// Command for the presentation layer's actual audio backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    Play(Cue),
    StopAll,
}

/// Per-session cue mixer; owned by the facade, never a process-wide singleton
#[derive(Debug, Clone)]
pub struct AudioMixer {
    /// Last time each cue passed the debounce gate
    last_request: HashMap<Cue, f64>,
    /// (cue, nominal end time) for instances assumed still audible
    playing: Vec<(Cue, f64)>,
    master_volume: f32,
    muted: bool,
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioMixer {
    pub fn new() -> Self {
        Self {
            last_request: HashMap::new(),
            playing: Vec::new(),
            master_volume: 1.0,
            muted: false,
        }
    }

    /// Set master volume (0.0 - 1.0); at zero nothing is emitted
    pub fn set_master_volume(&mut self, vol: f32) {
        self.master_volume = vol.clamp(0.0, 1.0);
    }

    /// Mute/unmute all cue emission
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Map one session event to its cue, if any, and request it
    pub fn handle_event(&mut self, event: &SessionEvent, now_ms: f64, out: &mut Vec<AudioCommand>) {
        if let Some(cue) = cue_for(event) {
            self.request(cue, now_ms, out);
        }
    }

    /// Request a cue, subject to debounce, the overlap cap, and exclusivity
    pub fn request(&mut self, cue: Cue, now_ms: f64, out: &mut Vec<AudioCommand>) {
        if self.muted || self.master_volume <= 0.0 {
            return;
        }

        let last = self
            .last_request
            .get(&cue)
            .copied()
            .unwrap_or(f64::NEG_INFINITY);
        if now_ms - last < DEBOUNCE_MS {
            return;
        }
        // Requests that fail the cap below still arm the debounce window
        self.last_request.insert(cue, now_ms);

        self.playing.retain(|(_, ends_at)| *ends_at > now_ms);

        if cue.exclusive() {
            out.push(AudioCommand::StopAll);
            self.playing.clear();
        } else if self
            .playing
            .iter()
            .filter(|(playing, _)| *playing == cue)
            .count()
            >= MAX_CONCURRENT_PER_CUE
        {
            return;
        }

        self.playing.push((cue, now_ms + cue.nominal_len_ms()));
        out.push(AudioCommand::Play(cue));
    }

    /// Silence everything (session exit)
    pub fn stop_all(&mut self, out: &mut Vec<AudioCommand>) {
        self.playing.clear();
        out.push(AudioCommand::StopAll);
    }
}

fn cue_for(event: &SessionEvent) -> Option<Cue> {
    match event {
        SessionEvent::LevelStarted { .. } => Some(Cue::Train),
        SessionEvent::BalloonSpawned { .. } => None,
        SessionEvent::BalloonPopped { .. } => Some(Cue::Pop),
        SessionEvent::BoxLanded { .. } => Some(Cue::Land),
        SessionEvent::BoxMissed { .. } => Some(Cue::Miss),
        SessionEvent::CountdownStarted => Some(Cue::Countdown),
        SessionEvent::LevelCleared { .. } => Some(Cue::Success),
        SessionEvent::TimedOut => Some(Cue::GameOver),
        SessionEvent::Victory => Some(Cue::Victory),
    }
}
