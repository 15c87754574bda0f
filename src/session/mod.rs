//! The quiz session engine
//!
//! One [`SessionEngine`] owns every piece of mutable game state and processes
//! [`Command`]s one at a time from an unbounded channel. Sockets, timers, and
//! HTTP handlers only ever talk to it through that channel, so no two
//! mutations interleave and no locking is needed.

mod bank;
mod error;
mod export;
mod handlers;
mod leaderboard;
mod registry;
mod round;
mod scoring;
mod settings;

pub use bank::{
    BankError, FileQuestionSource, QuestionBank, QuestionInput, QuestionSource,
    DEFAULT_QUESTION_SECONDS,
};
pub use error::{SessionError, SessionResult, StaleReason};
pub use export::{ExportSnapshot, LobbyInfo};
pub use leaderboard::{leaderboard, team_leaderboard, LEADERBOARD_LIMIT};
pub use registry::{PlayerRegistry, MAX_NAME_CHARS};
pub use round::CloseReason;
pub use settings::{clamp_base_duration, Settings, SettingsPatch};

use crate::broadcast::{Broadcaster, ConnectionHub, ConnectionSink};
use crate::config::SessionConfig;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Round-scoped state. Replaced wholesale on every reset.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub status: GameStatus,
    pub current_index: Option<usize>,
    pub display: Option<RoundDisplay>,
    /// Set iff a round is in progress and not paused
    pub deadline: Option<Instant>,
    pub paused: bool,
    /// Time left on the clock, only while paused
    pub remaining: Option<Duration>,
    pub fastest_correct: Option<FastestCorrect>,
    pub counts: [u32; 4],
    /// Players present at round start; later joins never count here
    pub round_participants: HashSet<PlayerId>,
    pub history: Vec<RoundStats>,
    pub answers: Vec<AnswerRecord>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            status: GameStatus::Idle,
            current_index: None,
            display: None,
            deadline: None,
            paused: false,
            remaining: None,
            fastest_correct: None,
            counts: [0; 4],
            round_participants: HashSet::new(),
            history: Vec::new(),
            answers: Vec::new(),
        }
    }
}

/// Everything the engine reacts to.
///
/// `round` fields carry the round sequence number that armed the trigger.
/// Sequence numbers grow across resets, so a trigger left over from an
/// earlier round or game never matches.
#[derive(Debug)]
pub enum Command {
    Connect {
        id: ConnectionId,
        sink: ConnectionSink,
    },
    Disconnect {
        id: ConnectionId,
    },
    Client {
        from: ConnectionId,
        msg: ClientMessage,
    },
    DeadlineElapsed {
        round: u64,
    },
    Watchdog {
        round: u64,
    },
    AdvanceAfterResults {
        round: u64,
    },
    BankLoaded {
        requested_by: ConnectionId,
        result: Result<QuestionBank, BankError>,
    },
    ReplaceBank {
        questions: Vec<QuestionInput>,
        reply: oneshot::Sender<Result<usize, BankError>>,
    },
    Questions {
        reply: oneshot::Sender<Vec<Question>>,
    },
    Lobby {
        reply: oneshot::Sender<LobbyInfo>,
    },
    Export {
        reply: oneshot::Sender<ExportSnapshot>,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("Session engine is not running")]
pub struct SessionClosed;

/// Cloneable sender side of the engine's command stream
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self { tx }
    }

    pub fn send(&self, cmd: Command) -> Result<(), SessionClosed> {
        self.tx.send(cmd).map_err(|_| SessionClosed)
    }

    pub async fn replace_bank(
        &self,
        questions: Vec<QuestionInput>,
    ) -> Result<Result<usize, BankError>, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReplaceBank { questions, reply })?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn questions(&self) -> Result<Vec<Question>, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Questions { reply })?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn lobby(&self) -> Result<LobbyInfo, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Lobby { reply })?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn export(&self) -> Result<ExportSnapshot, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Export { reply })?;
        rx.await.map_err(|_| SessionClosed)
    }
}

/// Start an engine on its own task and return a handle to it
pub fn spawn(config: SessionConfig, source: Arc<dyn QuestionSource>) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = SessionEngine::new(config, Box::new(ConnectionHub::new()), source, tx.clone());
    tokio::spawn(engine.run(rx));
    SessionHandle::new(tx)
}

pub struct SessionEngine {
    config: SessionConfig,
    session: GameSession,
    registry: PlayerRegistry,
    bank: QuestionBank,
    settings: Settings,
    lobby_code: String,
    host: Option<ConnectionId>,
    hub: Box<dyn Broadcaster>,
    source: Arc<dyn QuestionSource>,
    /// Our own inbox, used by timers to feed commands back in
    commands: mpsc::UnboundedSender<Command>,
    round_seq: u64,
    watchdog: Option<JoinHandle<()>>,
    /// Choice shuffling
    rng: StdRng,
}

impl SessionEngine {
    pub fn new(
        config: SessionConfig,
        hub: Box<dyn Broadcaster>,
        source: Arc<dyn QuestionSource>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        let settings = config.initial_settings.clone();
        Self {
            config,
            session: GameSession::default(),
            registry: PlayerRegistry::new(),
            bank: QuestionBank::default(),
            settings,
            lobby_code: generate_join_code(),
            host: None,
            hub,
            source,
            commands,
            round_seq: 0,
            watchdog: None,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Process commands until every sender is gone
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        tracing::info!("Session engine started (join code {})", self.lobby_code);
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        self.cancel_watchdog();
        tracing::info!("Session engine stopped");
    }

    pub fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { id, sink } => {
                tracing::debug!("Connection {} attached", id);
                self.hub.attach(id, sink);
            }
            Command::Disconnect { id } => self.disconnect(&id),
            Command::Client { from, msg } => {
                let result = handlers::dispatch(self, &from, msg);
                self.report(&from, result);
            }
            Command::DeadlineElapsed { round } => self.on_deadline(round, CloseReason::Timeout),
            Command::Watchdog { round } => self.on_deadline(round, CloseReason::Watchdog),
            Command::AdvanceAfterResults { round } => self.on_auto_advance(round),
            Command::BankLoaded {
                requested_by,
                result,
            } => match result {
                Ok(bank) => self.install_bank(bank),
                Err(e) => self.report(&requested_by, Err(SessionError::Bank(e))),
            },
            Command::ReplaceBank { questions, reply } => {
                let result = self.replace_bank(questions);
                let _ = reply.send(result);
            }
            Command::Questions { reply } => {
                let _ = reply.send(self.bank.questions().to_vec());
            }
            Command::Lobby { reply } => {
                let _ = reply.send(self.lobby_info());
            }
            Command::Export { reply } => {
                let _ = reply.send(self.export_snapshot());
            }
        }
    }

    /// Surface an error to whoever should see it; everything else is logged
    fn report(&self, from: &str, result: SessionResult) {
        let Err(err) = result else {
            return;
        };
        match err {
            SessionError::Validation(message) => {
                tracing::info!("Rejected request from {}: {}", from, message);
                self.hub.send_to(from, ServerMessage::PlayerError { message });
            }
            SessionError::Unauthorized => {
                tracing::debug!("Ignoring host command from non-host {}", from);
            }
            SessionError::Stale(reason) => {
                tracing::debug!("Ignoring stale action from {}: {}", from, reason);
            }
            err @ (SessionError::EmptyBank | SessionError::Bank(_)) => {
                tracing::warn!("Host request from {} failed: {}", from, err);
                self.hub.send_to(
                    from,
                    ServerMessage::HostError {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    // ----- read access -----

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn status(&self) -> GameStatus {
        self.session.status
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn lobby_code(&self) -> &str {
        &self.lobby_code
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.host.as_deref() == Some(id)
    }

    pub fn round_progress(&self) -> RoundProgress {
        let Some(index) = self.session.current_index else {
            return RoundProgress {
                answered: 0,
                total: self.session.round_participants.len(),
            };
        };
        let answered = self
            .session
            .round_participants
            .iter()
            .filter(|id| {
                self.registry
                    .get(id.as_str())
                    .is_some_and(|p| p.has_answered(index))
            })
            .count();
        RoundProgress {
            answered,
            total: self.session.round_participants.len(),
        }
    }

    pub fn lobby_info(&self) -> LobbyInfo {
        LobbyInfo {
            code: self.lobby_code.clone(),
            addresses: self.config.lobby_addresses.clone(),
            port: self.config.port,
        }
    }

    // ----- bank replacement -----

    /// Validate and swap in a new bank. The session is reset either way the
    /// old bank was in use.
    pub fn replace_bank(&mut self, questions: Vec<QuestionInput>) -> Result<usize, BankError> {
        let bank = QuestionBank::from_inputs(questions)?;
        let count = bank.len();
        self.install_bank(bank);
        Ok(count)
    }

    fn install_bank(&mut self, bank: QuestionBank) {
        tracing::info!("Question bank replaced ({} questions)", bank.len());
        self.bank = bank;
        self.reset_session();
        self.hub.broadcast(ServerMessage::QuestionsLoaded {
            count: self.bank.len(),
        });
        self.broadcast_game_state();
    }

    fn load_sample(&self, requested_by: &str) {
        let source = Arc::clone(&self.source);
        let commands = self.commands.clone();
        let requested_by = requested_by.to_string();
        tracing::info!("Loading sample questions from {}", source.describe());
        tokio::spawn(async move {
            let result = source.load().await;
            let _ = commands.send(Command::BankLoaded {
                requested_by,
                result,
            });
        });
    }

    /// Fresh session state, zeroed scores, no pending watchdog
    fn reset_session(&mut self) {
        self.cancel_watchdog();
        self.session = GameSession::default();
        self.registry.reset_scores();
    }

    // ----- connections and lobby -----

    fn host_hello(&mut self, from: &str) {
        tracing::info!("Host identified as {}", from);
        self.host = Some(from.to_string());

        let info = self.lobby_info();
        self.hub.send_to(
            from,
            ServerMessage::LobbyUpdate {
                code: info.code,
                addresses: info.addresses,
                port: info.port,
            },
        );
        self.hub.send_to(
            from,
            ServerMessage::QuestionsLoaded {
                count: self.bank.len(),
            },
        );
        self.hub.send_to(from, self.game_state_message());
        self.hub
            .send_to(from, ServerMessage::SettingsUpdate(self.settings.clone()));
        self.hub.send_to(
            from,
            ServerMessage::LobbyPlayers {
                list: self.registry.infos(),
            },
        );
    }

    fn reset_pin(&mut self) {
        self.lobby_code = generate_join_code();
        tracing::info!("Join code regenerated");
        let info = self.lobby_info();
        self.hub.broadcast(ServerMessage::LobbyUpdate {
            code: info.code,
            addresses: info.addresses,
            port: info.port,
        });
    }

    fn join(
        &mut self,
        from: &str,
        name: &str,
        code: &str,
        team: Option<&str>,
    ) -> SessionResult {
        if code.trim() != self.lobby_code {
            return Err(SessionError::Validation("Wrong join code".to_string()));
        }
        if let Some(existing) = self.registry.get(from) {
            let name = existing.name.clone();
            self.hub.send_to(from, ServerMessage::PlayerJoined { name });
            return Ok(());
        }
        if self.registry.len() >= self.config.max_players {
            return Err(SessionError::Validation(format!(
                "Room is full (max {})",
                self.config.max_players
            )));
        }

        let player = self
            .registry
            .join(from.to_string(), name, team, self.settings.team_mode);
        let name = player.name.clone();
        tracing::info!("Player {} joined as {:?} (team {:?})", from, name, player.team);

        self.hub.send_to(from, ServerMessage::PlayerJoined { name });
        self.broadcast_players();
        Ok(())
    }

    /// Socket closed or player kicked. A departing snapshot participant
    /// shrinks the progress denominator, which can close the round.
    fn disconnect(&mut self, id: &str) {
        self.hub.detach(id);
        if self.is_host(id) {
            tracing::info!("Host {} disconnected", id);
            self.host = None;
        }

        let Some(player) = self.registry.remove(id) else {
            return;
        };
        tracing::info!("Player {} ({}) left", player.name, id);

        if self.session.round_participants.remove(id)
            && self.session.status == GameStatus::InProgress
        {
            self.hub
                .broadcast(ServerMessage::RoundProgress(self.round_progress()));
            self.close_if_everyone_answered();
        }
        self.broadcast_players();
    }

    fn kick(&mut self, target: &str) {
        tracing::info!("Host kicked {}", target);
        self.disconnect(target);
    }

    fn set_settings(&mut self, patch: SettingsPatch) {
        self.settings.apply(patch);
        tracing::info!("Settings updated: {:?}", self.settings);
        self.hub
            .broadcast(ServerMessage::SettingsUpdate(self.settings.clone()));
    }

    // ----- broadcast helpers -----

    fn game_state_message(&self) -> ServerMessage {
        ServerMessage::GameState {
            status: self.session.status,
            index: self.session.current_index,
            total: self.bank.len(),
        }
    }

    fn broadcast_game_state(&self) {
        self.hub.broadcast(self.game_state_message());
    }

    fn broadcast_players(&self) {
        self.hub.broadcast(ServerMessage::LobbyPlayers {
            list: self.registry.infos(),
        });
    }
}

/// Six-digit numeric join code
fn generate_join_code() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

/// Wall-clock epoch milliseconds `from_now` in the future
fn epoch_ms_after(from_now: Duration) -> i64 {
    let offset = i64::try_from(from_now.as_millis()).unwrap_or(i64::MAX);
    chrono::Utc::now().timestamp_millis().saturating_add(offset)
}
