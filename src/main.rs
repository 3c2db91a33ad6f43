//! Balloon Train entry point
//!
//! Headless demo: runs a complete session at 60 Hz with a simple autoplayer
//! that feeds each unfilled wagon a balloon carrying its number. Useful for
//! watching the engine's event stream end to end without a frontend.
//!
//! Set `BALLOON_BACKEND_URL` (and optionally `BALLOON_GAME_ID`) to run
//! against a real backend; otherwise an offline stand-in is used.

use balloon_train::consts::*;
use balloon_train::sim::{LevelPhase, TrainPhase, Viewport, collision};
use balloon_train::{Backend, GameConfig, HttpBackend, OfflineBackend, Session};

fn main() {
    env_logger::init();

    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0xBA11_0095);

    let backend: Box<dyn Backend> = match std::env::var("BALLOON_BACKEND_URL") {
        Ok(url) => Box::new(HttpBackend::new(url)),
        Err(_) => Box::new(OfflineBackend::new(GameConfig::default())),
    };
    let game_id = std::env::var("BALLOON_GAME_ID").ok();

    let mut session = Session::new(backend, game_id, Viewport::default(), seed);

    let mut now_ms = 0.0;
    // Safety stop well past five full level budgets plus transitions
    for tick_no in 0u64..200_000 {
        now_ms += SIM_DT_MS;
        session.advance(now_ms);

        for event in session.drain_events() {
            log::info!("event: {event:?}");
        }
        for command in session.drain_audio() {
            log::debug!("audio: {command:?}");
        }

        let (terminal, pop) = {
            let state = session.state();
            let mut pop = None;
            // Once the train settles, pop a matching balloon for the first
            // unfilled wagon every half second
            if state.train_phase == TrainPhase::Idle
                && state.level_phase == LevelPhase::Playing
                && tick_no % 30 == 0
            {
                if let Some(wagon) = (0..state.hits.len()).find(|i| !state.hits.filled(*i)) {
                    let value = (wagon + 1) as u32;
                    if let Some(balloon) = state.balloons.iter().find(|b| b.value == value) {
                        let x = collision::wagon_left(state.train_x, wagon) + WAGON_WIDTH / 2.0;
                        pop = Some((balloon.id, x));
                    }
                }
            }
            (state.terminal(), pop)
        };

        if terminal {
            break;
        }
        if let Some((id, x)) = pop {
            session.drop_balloon(id, x, 0.0);
        }
    }

    let state = session.state();
    if state.victory {
        log::info!("run complete: victory after level {}", state.level);
    } else if state.game_over {
        log::info!("run complete: out of time on level {}", state.level);
    } else {
        log::warn!("run stopped before reaching a terminal state");
    }
    session.exit();
}
