//! Answer intake and scoring

use super::{SessionEngine, SessionError, SessionResult, StaleReason};
use crate::protocol::ServerMessage;
use crate::types::*;
use std::time::Duration;
use tokio::time::Instant;

/// Streak length from which every further correct answer earns a half point
pub const STREAK_BONUS_THRESHOLD: u32 = 3;

impl SessionEngine {
    /// `player:answer`. Every rejection is a stale action: no broadcast, no
    /// reply, nothing recorded.
    pub(super) fn submit_answer(&mut self, player_id: &str, choice_index: usize) -> SessionResult {
        let stale = |reason| Err(SessionError::Stale(reason));

        if !self.registry.contains(player_id) {
            return stale(StaleReason::UnknownPlayer);
        }
        let (Some(display), Some(index)) = (&self.session.display, self.session.current_index)
        else {
            return stale(StaleReason::NoActiveRound);
        };
        if self.session.paused {
            return stale(StaleReason::Paused);
        }
        let now = Instant::now();
        let Some(deadline) = self.session.deadline.filter(|&deadline| now <= deadline) else {
            return stale(StaleReason::PastDeadline);
        };
        if self.session.status != GameStatus::InProgress {
            return stale(StaleReason::WrongStatus);
        }
        if self
            .registry
            .get(player_id)
            .is_some_and(|p| p.has_answered(index))
        {
            return stale(StaleReason::AlreadyAnswered);
        }
        if choice_index >= 4 {
            return stale(StaleReason::ChoiceOutOfRange);
        }

        let correct = choice_index == display.correct_index;
        let duration = Duration::from_secs(u64::from(display.duration_seconds));
        let remaining = deadline.saturating_duration_since(now);
        let elapsed_ms = duration.saturating_sub(remaining).as_millis() as u64;

        let Some(player) = self.registry.get_mut(player_id) else {
            return stale(StaleReason::UnknownPlayer);
        };
        player.answered = Some(AnswerMark {
            round_index: index,
            at: now,
        });
        if correct {
            player.streak += 1;
            player.score += Score::POINT;
            if player.streak >= STREAK_BONUS_THRESHOLD {
                player.score += Score::HALF;
            }
        } else {
            player.streak = 0;
        }

        let record = AnswerRecord {
            question_index: index,
            player_id: player.id.clone(),
            name: player.name.clone(),
            choice_index,
            correct,
            elapsed_ms,
            team: player.team,
        };
        tracing::debug!(
            "{} answered {} ({}) after {}ms, streak {}",
            player.name,
            choice_index,
            if correct { "correct" } else { "wrong" },
            elapsed_ms,
            player.streak
        );

        // Strictly faster only: on an exact tie the earlier submission keeps it
        if correct
            && self
                .session
                .fastest_correct
                .as_ref()
                .map_or(true, |fastest| elapsed_ms < fastest.elapsed_ms)
        {
            self.session.fastest_correct = Some(FastestCorrect {
                player_id: record.player_id.clone(),
                name: record.name.clone(),
                elapsed_ms,
            });
        }

        self.session.counts[choice_index] += 1;
        self.session.answers.push(record);

        self.hub
            .broadcast(ServerMessage::RoundProgress(self.round_progress()));
        self.hub.broadcast(ServerMessage::RoundCounts {
            counts: self.session.counts,
        });

        self.close_if_everyone_answered();
        Ok(())
    }
}
