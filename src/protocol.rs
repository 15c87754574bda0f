use crate::session::{Settings, SettingsPatch};
use crate::types::*;
use serde::{Deserialize, Deserializer, Serialize};

/// Inbound events. Every event a connection can send is a variant here, so
/// dispatch is an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "host:hello")]
    HostHello,
    #[serde(rename = "host:start")]
    HostStart,
    #[serde(rename = "host:next")]
    HostNext,
    #[serde(rename = "host:pause")]
    HostPause,
    #[serde(rename = "host:resume")]
    HostResume,
    #[serde(rename = "host:reset-pin")]
    HostResetPin,
    #[serde(rename = "host:load-sample")]
    HostLoadSample,
    #[serde(rename = "host:kick")]
    HostKick { target_id: ConnectionId },
    #[serde(rename = "host:set-settings")]
    HostSetSettings(SettingsPatch),
    #[serde(rename = "player:join")]
    PlayerJoin {
        #[serde(default)]
        name: String,
        /// Join codes arrive as either strings or numbers from browser forms
        #[serde(deserialize_with = "string_or_number")]
        code: String,
        #[serde(default)]
        team: Option<String>,
    },
    #[serde(rename = "player:answer")]
    PlayerAnswer { choice_index: usize },
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(u64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(s) => s.trim().to_string(),
        Code::Number(n) => n.to_string(),
    })
}

/// Outbound events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "lobby:update")]
    LobbyUpdate {
        code: String,
        addresses: Vec<String>,
        port: u16,
    },
    #[serde(rename = "lobby:players")]
    LobbyPlayers { list: Vec<PlayerInfo> },
    #[serde(rename = "questions:loaded")]
    QuestionsLoaded { count: usize },
    #[serde(rename = "game:state")]
    GameState {
        status: GameStatus,
        /// Current question index, `None` before the first round
        index: Option<usize>,
        total: usize,
    },
    #[serde(rename = "settings:update")]
    SettingsUpdate(Settings),
    #[serde(rename = "round:start")]
    RoundStart {
        index: usize,
        total: usize,
        question: PublicQuestion,
        /// Deadline as epoch milliseconds
        ends_at: i64,
    },
    #[serde(rename = "round:progress")]
    RoundProgress(RoundProgress),
    #[serde(rename = "round:counts")]
    RoundCounts { counts: [u32; 4] },
    #[serde(rename = "round:paused")]
    RoundPaused,
    #[serde(rename = "round:resumed")]
    RoundResumed { ends_at: i64 },
    #[serde(rename = "round:end")]
    RoundEnd {
        index: usize,
        correct_index: usize,
        fastest_correct: Option<FastestCorrect>,
        leaderboard: Vec<LeaderboardEntry>,
        teamboard: Option<Vec<TeamStanding>>,
        counts: [u32; 4],
    },
    #[serde(rename = "game:final")]
    GameFinal { leaderboard: Vec<LeaderboardEntry> },
    #[serde(rename = "player:joined")]
    PlayerJoined { name: String },
    #[serde(rename = "player:error")]
    PlayerError { message: String },
    #[serde(rename = "host:error")]
    HostError { message: String },
    /// Malformed frames that could not be parsed into a [`ClientMessage`]
    #[serde(rename = "error")]
    Error { code: String, message: String },
}

impl ServerMessage {
    /// Wire name of the event, used in logs
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::LobbyUpdate { .. } => "lobby:update",
            ServerMessage::LobbyPlayers { .. } => "lobby:players",
            ServerMessage::QuestionsLoaded { .. } => "questions:loaded",
            ServerMessage::GameState { .. } => "game:state",
            ServerMessage::SettingsUpdate(_) => "settings:update",
            ServerMessage::RoundStart { .. } => "round:start",
            ServerMessage::RoundProgress(_) => "round:progress",
            ServerMessage::RoundCounts { .. } => "round:counts",
            ServerMessage::RoundPaused => "round:paused",
            ServerMessage::RoundResumed { .. } => "round:resumed",
            ServerMessage::RoundEnd { .. } => "round:end",
            ServerMessage::GameFinal { .. } => "game:final",
            ServerMessage::PlayerJoined { .. } => "player:joined",
            ServerMessage::PlayerError { .. } => "player:error",
            ServerMessage::HostError { .. } => "host:error",
            ServerMessage::Error { .. } => "error",
        }
    }
}
