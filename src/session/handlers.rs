//! Inbound event dispatch
//!
//! Host-only commands are authorized here before they reach the engine.

use super::{SessionEngine, SessionError, SessionResult};
use crate::protocol::ClientMessage;

/// Return early unless `$from` is the current host
macro_rules! check_host {
    ($engine:expr, $from:expr) => {
        if !$engine.is_host($from) {
            return Err(SessionError::Unauthorized);
        }
    };
}

pub(super) fn dispatch(engine: &mut SessionEngine, from: &str, msg: ClientMessage) -> SessionResult {
    match msg {
        ClientMessage::HostHello => {
            engine.host_hello(from);
            Ok(())
        }

        ClientMessage::HostStart => {
            check_host!(engine, from);
            engine.start_game()
        }

        ClientMessage::HostNext => {
            check_host!(engine, from);
            engine.host_next()
        }

        ClientMessage::HostPause => {
            check_host!(engine, from);
            engine.pause()
        }

        ClientMessage::HostResume => {
            check_host!(engine, from);
            engine.resume()
        }

        ClientMessage::HostResetPin => {
            check_host!(engine, from);
            engine.reset_pin();
            Ok(())
        }

        ClientMessage::HostLoadSample => {
            check_host!(engine, from);
            engine.load_sample(from);
            Ok(())
        }

        ClientMessage::HostKick { target_id } => {
            check_host!(engine, from);
            engine.kick(&target_id);
            Ok(())
        }

        ClientMessage::HostSetSettings(patch) => {
            check_host!(engine, from);
            engine.set_settings(patch);
            Ok(())
        }

        ClientMessage::PlayerJoin { name, code, team } => {
            engine.join(from, &name, &code, team.as_deref())
        }

        ClientMessage::PlayerAnswer { choice_index } => engine.submit_answer(from, choice_index),
    }
}
