//! Read-only snapshots for outside collaborators.
//!
//! The tabular exporter and the lobby page work off these copies; nothing
//! handed out here can mutate the session.

use super::SessionEngine;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LobbyInfo {
    pub code: String,
    pub addresses: Vec<String>,
    pub port: u16,
}

/// Players, answer log, and round history at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    /// RFC 3339 timestamp
    pub exported_at: String,
    pub status: GameStatus,
    pub total_questions: usize,
    pub players: Vec<PlayerInfo>,
    pub answers: Vec<AnswerRecord>,
    pub history: Vec<RoundStats>,
}

impl ExportSnapshot {
    /// Answers for one player, indexed by question. Unanswered questions are `None`.
    pub fn answers_for(&self, player_id: &str) -> Vec<Option<&AnswerRecord>> {
        let mut row = vec![None; self.total_questions];
        for answer in self.answers.iter().filter(|a| a.player_id == player_id) {
            if let Some(slot) = row.get_mut(answer.question_index) {
                *slot = Some(answer);
            }
        }
        row
    }
}

impl SessionEngine {
    pub fn export_snapshot(&self) -> ExportSnapshot {
        ExportSnapshot {
            exported_at: chrono::Utc::now().to_rfc3339(),
            status: self.session.status,
            total_questions: self.bank.len(),
            players: self.registry.infos(),
            answers: self.session.answers.clone(),
            history: self.session.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question_index: usize, player_id: &str, choice_index: usize) -> AnswerRecord {
        AnswerRecord {
            question_index,
            player_id: player_id.to_string(),
            name: player_id.to_uppercase(),
            choice_index,
            correct: choice_index == 1,
            elapsed_ms: 1000,
            team: None,
        }
    }

    #[test]
    fn test_answers_for_builds_per_question_row() {
        let snapshot = ExportSnapshot {
            exported_at: chrono::Utc::now().to_rfc3339(),
            status: GameStatus::Finished,
            total_questions: 3,
            players: vec![],
            answers: vec![record(0, "a", 1), record(0, "b", 2), record(2, "a", 0)],
            history: vec![],
        };

        let row = snapshot.answers_for("a");
        assert_eq!(row.len(), 3);
        assert_eq!(row[0].map(|a| a.choice_index), Some(1));
        assert!(row[1].is_none());
        assert_eq!(row[2].map(|a| a.choice_index), Some(0));

        assert!(snapshot.answers_for("nobody").iter().all(Option::is_none));
    }

    #[test]
    fn test_snapshot_wire_fields_are_camel_case() {
        let snapshot = ExportSnapshot {
            exported_at: "2024-01-01T00:00:00+00:00".to_string(),
            status: GameStatus::Idle,
            total_questions: 0,
            players: vec![],
            answers: vec![record(0, "a", 1)],
            history: vec![],
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["totalQuestions"], 0);
        assert_eq!(value["answers"][0]["questionIndex"], 0);
        assert_eq!(value["answers"][0]["elapsedMs"], 1000);
    }
}
