use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign};
use tokio::time::Instant;

/// Opaque per-connection id (a ULID string). Players are keyed by the
/// connection they joined from.
pub type ConnectionId = String;
pub type PlayerId = ConnectionId;
pub type QuestionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GameStatus {
    Idle,
    InProgress,
    ShowingResults,
    Finished,
}

/// Fixed-point score counted in half points, so `1.5` is stored as `3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(u32);

impl Score {
    pub const ZERO: Score = Score(0);
    pub const HALF: Score = Score(1);
    pub const POINT: Score = Score(2);

    pub const fn from_half_points(half_points: u32) -> Self {
        Self(half_points)
    }

    pub const fn half_points(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }
}

impl Add for Score {
    type Output = Score;

    fn add(self, rhs: Score) -> Score {
        Score(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Score {
    fn sum<I: Iterator<Item = Score>>(iter: I) -> Score {
        iter.fold(Score::ZERO, Add::add)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}.5", self.0 / 2)
        }
    }
}

// Clients see plain numbers (`1.5`), never the half-point representation.
impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom("score must be a non-negative number"));
        }
        Ok(Score((value * 2.0).round() as u32))
    }
}

/// The four fixed team labels, in tie-breaking order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
    Green,
    Yellow,
}

impl Team {
    pub const ALL: [Team; 4] = [Team::Red, Team::Blue, Team::Green, Team::Yellow];

    pub fn index(self) -> usize {
        match self {
            Team::Red => 0,
            Team::Blue => 1,
            Team::Green => 2,
            Team::Yellow => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
            Team::Green => "green",
            Team::Yellow => "yellow",
        }
    }

    pub fn from_label(label: &str) -> Option<Team> {
        Team::ALL
            .into_iter()
            .find(|team| team.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// A canonical question. Never mutated once it is in the bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub choices: [String; 4],
    pub correct_index: usize,
    pub duration_seconds: u32,
}

/// The per-round rendering of a question (possibly shuffled).
#[derive(Debug, Clone, PartialEq)]
pub struct RoundDisplay {
    pub text: String,
    pub choices: [String; 4],
    pub correct_index: usize,
    pub duration_seconds: u32,
}

/// What participants see of a round; `correct_index` stays server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub text: String,
    pub choices: [String; 4],
    pub duration_seconds: u32,
}

impl From<&RoundDisplay> for PublicQuestion {
    fn from(display: &RoundDisplay) -> Self {
        Self {
            text: display.text.clone(),
            choices: display.choices.clone(),
            duration_seconds: display.duration_seconds,
        }
    }
}

/// Marks that a player answered; cleared at every round start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerMark {
    pub round_index: usize,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: Score,
    pub team: Option<Team>,
    pub streak: u32,
    pub answered: Option<AnswerMark>,
}

impl Player {
    pub fn has_answered(&self, round_index: usize) -> bool {
        self.answered
            .is_some_and(|mark| mark.round_index == round_index)
    }
}

/// Public player info for lobby lists and exports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub score: Score,
    pub team: Option<Team>,
    pub streak: u32,
}

impl From<&Player> for PlayerInfo {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            team: p.team,
            streak: p.streak,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FastestCorrect {
    pub player_id: PlayerId,
    pub name: String,
    pub elapsed_ms: u64,
}

/// Write-once record of a scored answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_index: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub choice_index: usize,
    pub correct: bool,
    pub elapsed_ms: u64,
    pub team: Option<Team>,
}

/// Per-round statistics appended when a round closes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundStats {
    pub index: usize,
    pub correct_index: usize,
    pub counts: [u32; 4],
    pub fastest_correct: Option<FastestCorrect>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: PlayerId,
    pub name: String,
    pub score: Score,
    pub team: Option<Team>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
    pub team: Team,
    pub score: Score,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoundProgress {
    pub answered: usize,
    pub total: usize,
}
