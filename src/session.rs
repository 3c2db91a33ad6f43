//! Session facade
//!
//! One value per active game run. Composes the deterministic simulation, the
//! audio mixer, and the backend collaborator; the presentation layer drives
//! it with `advance`/`drop_balloon`/`toggle_pause` and drains typed events
//! and audio commands back out. No callbacks cross this boundary.

use crate::audio::{AudioCommand, AudioMixer};
use crate::backend::{Backend, GameConfig};
use crate::consts::*;
use crate::sim::{self, SessionEvent, SessionState, Viewport};

pub struct Session {
    state: SessionState,
    mixer: AudioMixer,
    backend: Box<dyn Backend>,
    game_id: Option<String>,
    /// Telemetry latch: a session reports at most one play
    play_count_sent: bool,
    accumulator_ms: f64,
    last_now_ms: Option<f64>,
    events: Vec<SessionEvent>,
    audio_out: Vec<AudioCommand>,
}

impl Session {
    /// Build a session and enter level 1.
    ///
    /// Config is fetched once up front; any failure falls back to defaults
    /// with a warning and never blocks play.
    pub fn new(
        backend: Box<dyn Backend>,
        game_id: Option<String>,
        viewport: Viewport,
        seed: u64,
    ) -> Self {
        let config = match &game_id {
            Some(id) => backend.fetch_config(id).unwrap_or_else(|err| {
                log::warn!("config fetch failed, falling back to defaults: {err}");
                GameConfig::default()
            }),
            None => GameConfig::default(),
        };
        log::info!(
            "starting session: levels={} max_value={}",
            config.levels,
            config.max_value
        );

        let mut state = SessionState::new(seed, config.levels, config.max_value, viewport);
        sim::enter_level(&mut state);

        let mut session = Self {
            state,
            mixer: AudioMixer::new(),
            backend,
            game_id,
            play_count_sent: false,
            accumulator_ms: 0.0,
            last_now_ms: None,
            events: Vec::new(),
            audio_out: Vec::new(),
        };
        session.pump();
        session
    }

    /// Advance the simulation to `now_ms` (host milliseconds, monotonic).
    ///
    /// Real time accumulates into fixed steps; a late frame runs several, a
    /// very late one is capped at `MAX_SUBSTEPS` rather than spiraling.
    pub fn advance(&mut self, now_ms: f64) {
        let last = self.last_now_ms.replace(now_ms).unwrap_or(now_ms);
        let dt = (now_ms - last).clamp(0.0, 100.0);
        self.accumulator_ms += dt;

        let mut substeps = 0;
        while self.accumulator_ms >= SIM_DT_MS && substeps < MAX_SUBSTEPS {
            sim::tick(&mut self.state);
            self.accumulator_ms -= SIM_DT_MS;
            substeps += 1;
        }

        self.pump();
    }

    /// Pop balloon `id` at the given position, dropping its numbered box
    pub fn drop_balloon(&mut self, id: u32, x: f32, y: f32) {
        sim::drop_balloon(&mut self.state, id, x, y);
        self.pump();
    }

    pub fn toggle_pause(&mut self) {
        self.state.paused = !self.state.paused;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    /// Re-enter the current level from scratch, whatever the current phase
    pub fn restart_level(&mut self) {
        sim::restart_level(&mut self.state);
        self.pump();
    }

    /// Leave the game: report the play (if not already reported) and silence
    /// every cue. The host owns what happens on screen next.
    pub fn exit(&mut self) {
        self.send_play_count();
        self.mixer.stop_all(&mut self.audio_out);
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mixer_mut(&mut self) -> &mut AudioMixer {
        &mut self.mixer
    }

    /// Rise speed the presentation applies to balloons this level, px/tick
    pub fn balloon_rise_speed(&self) -> f32 {
        crate::balloon_rise_speed(self.state.level)
    }

    /// Take all session events since the last drain
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take all pending audio commands since the last drain
    pub fn drain_audio(&mut self) -> Vec<AudioCommand> {
        std::mem::take(&mut self.audio_out)
    }

    /// Route freshly produced simulation events through telemetry and audio
    fn pump(&mut self) {
        let now_ms = self.state.wall_ms;
        for event in self.state.drain_events() {
            if event == SessionEvent::Victory {
                self.send_play_count();
            }
            self.mixer.handle_event(&event, now_ms, &mut self.audio_out);
            self.events.push(event);
        }
    }

    fn send_play_count(&mut self) {
        if self.play_count_sent {
            return;
        }
        let Some(game_id) = &self.game_id else {
            return;
        };
        self.play_count_sent = true;
        if let Err(err) = self.backend.post_play_count(game_id) {
            log::warn!("play-count post failed (ignored): {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, OfflineBackend};
    use crate::sim::{LevelPhase, TrainPhase, collision};
    use std::sync::Arc;

    struct FailingBackend;

    impl Backend for FailingBackend {
        fn fetch_config(&self, _game_id: &str) -> Result<GameConfig, BackendError> {
            Err(BackendError::Decode(std::io::Error::other("boom")))
        }

        fn post_play_count(&self, _game_id: &str) -> Result<(), BackendError> {
            Err(BackendError::Decode(std::io::Error::other("boom")))
        }
    }

    fn offline(levels: u32) -> Arc<OfflineBackend> {
        Arc::new(OfflineBackend::new(GameConfig {
            levels,
            max_value: 5,
        }))
    }

    fn new_session(backend: Arc<OfflineBackend>) -> Session {
        Session::new(
            Box::new(backend),
            Some("counting-dots".into()),
            Viewport::default(),
            7,
        )
    }

    /// Step the session one fixed tick at a time
    fn run_ticks(session: &mut Session, n: u32) {
        let start = session.last_now_ms.unwrap_or(0.0);
        for i in 1..=n {
            session.advance(start + i as f64 * SIM_DT_MS);
        }
    }

    /// Drive an honest win of the current (single-wagon) level
    fn play_to_victory(session: &mut Session) {
        while session.state().train_phase != TrainPhase::Idle {
            run_ticks(session, 1);
        }
        loop {
            let target = session
                .state()
                .balloons
                .iter()
                .find(|b| b.value == 1)
                .copied();
            if let Some(balloon) = target {
                let x = collision::wagon_left(session.state().train_x, 0) + 140.0;
                let y = collision::wagon_band_top(&session.state().viewport) - 1.0;
                session.drop_balloon(balloon.id, x, y);
                run_ticks(session, 5);
                break;
            }
            run_ticks(session, 30);
        }
        assert!(session.state().victory);
    }

    #[test]
    fn config_failure_falls_back_to_defaults() {
        let session = Session::new(
            Box::new(FailingBackend),
            Some("counting-dots".into()),
            Viewport::default(),
            7,
        );
        assert_eq!(session.state().max_levels, 5);
        assert_eq!(session.state().level, 1);
        assert_eq!(session.state().level_phase, LevelPhase::Playing);
    }

    #[test]
    fn config_seeds_the_session() {
        let session = new_session(offline(2));
        assert_eq!(session.state().max_levels, 2);
    }

    #[test]
    fn session_start_cues_the_train() {
        let mut session = new_session(offline(5));
        assert!(session
            .drain_events()
            .contains(&SessionEvent::LevelStarted { level: 1 }));
        assert_eq!(
            session.drain_audio(),
            vec![AudioCommand::Play(crate::audio::Cue::Train)]
        );
    }

    #[test]
    fn victory_posts_play_count_once_even_after_exit() {
        let backend = offline(1);
        let mut session = new_session(backend.clone());

        play_to_victory(&mut session);
        assert_eq!(backend.play_count(), 1);

        // Exiting after winning must not double-report
        session.exit();
        assert_eq!(backend.play_count(), 1);
    }

    #[test]
    fn exit_posts_play_count_and_silences_audio() {
        let backend = offline(5);
        let mut session = new_session(backend.clone());
        run_ticks(&mut session, 60);
        session.drain_audio();

        session.exit();
        assert_eq!(backend.play_count(), 1);
        assert_eq!(session.drain_audio(), vec![AudioCommand::StopAll]);
    }

    #[test]
    fn no_game_id_means_no_telemetry() {
        let backend = offline(5);
        let mut session = Session::new(Box::new(backend.clone()), None, Viewport::default(), 7);
        session.exit();
        assert_eq!(backend.play_count(), 0);
    }

    #[test]
    fn telemetry_failure_is_swallowed() {
        let mut session = Session::new(
            Box::new(FailingBackend),
            Some("counting-dots".into()),
            Viewport::default(),
            7,
        );
        // Must not panic or surface anything
        session.exit();
    }

    #[test]
    fn pause_is_a_toggle() {
        let mut session = new_session(offline(5));
        session.toggle_pause();
        assert!(session.state().paused);
        session.toggle_pause();
        assert!(!session.state().paused);
    }

    #[test]
    fn rise_speed_scales_with_level_and_caps() {
        assert_eq!(crate::balloon_rise_speed(1), 2.0);
        assert_eq!(crate::balloon_rise_speed(3), 3.0);
        assert_eq!(crate::balloon_rise_speed(20), 6.0);
    }
}
