//! Round state machine: start, close, pause/resume, and the timers that
//! drive them.
//!
//! Closing is funneled through [`SessionEngine::end_round`], which only acts
//! while a round is in progress. The one-shot deadline timer, the watchdog
//! poll, the all-answered check, and `host:next` can all call it; whichever
//! arrives first closes the round and the rest are no-ops.

use super::{epoch_ms_after, leaderboard, team_leaderboard, SessionEngine, SessionError};
use super::{Command, SessionResult, Settings, StaleReason};
use crate::protocol::ServerMessage;
use crate::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Why a round closed, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Timeout,
    Watchdog,
    AllAnswered,
    Skipped,
}

impl RoundDisplay {
    /// Render a question for one round. With shuffling on, the four
    /// positions are permuted uniformly and `correct_index` follows the
    /// correct choice to its new slot.
    pub fn build<R: Rng + ?Sized>(question: &Question, settings: &Settings, rng: &mut R) -> Self {
        let mut order = [0usize, 1, 2, 3];
        if settings.shuffle_choices {
            order.shuffle(rng);
        }

        let choices = order.map(|i| question.choices[i].clone());
        let correct_index = order
            .iter()
            .position(|&i| i == question.correct_index)
            .unwrap_or(question.correct_index);

        Self {
            text: question.text.clone(),
            choices,
            correct_index,
            duration_seconds: settings.duration_for(question.duration_seconds),
        }
    }
}

impl SessionEngine {
    /// `host:start`: reset everything and open the first question
    pub(super) fn start_game(&mut self) -> SessionResult {
        if self.bank.is_empty() {
            return Err(SessionError::EmptyBank);
        }

        tracing::info!("Starting game with {} questions", self.bank.len());
        self.reset_session();
        self.session.status = GameStatus::InProgress;
        self.broadcast_game_state();
        self.start_round(0);
        Ok(())
    }

    /// `host:next`. Skipping an open round still closes it properly first.
    pub(super) fn host_next(&mut self) -> SessionResult {
        match self.session.status {
            GameStatus::ShowingResults => {
                self.advance();
                Ok(())
            }
            GameStatus::InProgress => {
                self.end_round(CloseReason::Skipped);
                self.advance();
                Ok(())
            }
            GameStatus::Idle | GameStatus::Finished => Err(SessionError::Stale(StaleReason::WrongStatus)),
        }
    }

    fn advance(&mut self) {
        let next = self.session.current_index.map_or(0, |i| i + 1);
        self.start_round(next);
    }

    fn start_round(&mut self, index: usize) {
        let Some(question) = self.bank.get(index) else {
            self.finish();
            return;
        };

        let round_display = RoundDisplay::build(question, &self.settings, &mut self.rng);
        let duration = Duration::from_secs(u64::from(round_display.duration_seconds));
        let now = Instant::now();

        self.round_seq += 1;
        let round = self.round_seq;

        let session = &mut self.session;
        session.status = GameStatus::InProgress;
        session.current_index = Some(index);
        session.deadline = Some(now + duration);
        session.paused = false;
        session.remaining = None;
        session.fastest_correct = None;
        session.counts = [0; 4];
        session.round_participants = self.registry.ids().into_iter().collect();
        self.registry.clear_round_marks();

        tracing::info!(
            "Round {} started: question {}/{} for {}s with {} participants",
            round,
            index + 1,
            self.bank.len(),
            round_display.duration_seconds,
            self.session.round_participants.len()
        );

        self.hub.broadcast(ServerMessage::RoundStart {
            index,
            total: self.bank.len(),
            question: PublicQuestion::from(&round_display),
            ends_at: epoch_ms_after(duration),
        });
        self.session.display = Some(round_display);
        self.hub
            .broadcast(ServerMessage::RoundProgress(self.round_progress()));

        self.arm_deadline_timer(round, duration + self.config.deadline_grace);
        self.arm_watchdog(round);
    }

    /// Close the current round. Returns false (and does nothing) unless a
    /// round is in progress.
    pub(super) fn end_round(&mut self, reason: CloseReason) -> bool {
        if self.session.status != GameStatus::InProgress {
            tracing::debug!("Ignoring {:?} close: no round in progress", reason);
            return false;
        }
        let (Some(index), Some(correct_index)) = (
            self.session.current_index,
            self.session.display.as_ref().map(|d| d.correct_index),
        ) else {
            return false;
        };

        self.cancel_watchdog();

        if let Some(fastest) = &self.session.fastest_correct {
            if let Some(player) = self.registry.get_mut(&fastest.player_id) {
                player.score += Score::HALF;
            }
        }
        self.session.history.push(RoundStats {
            index,
            correct_index,
            counts: self.session.counts,
            fastest_correct: self.session.fastest_correct.clone(),
        });

        self.session.status = GameStatus::ShowingResults;
        self.session.deadline = None;
        self.session.paused = false;
        self.session.remaining = None;

        tracing::info!(
            "Round {} closed ({:?}), {} answers",
            self.round_seq,
            reason,
            self.session.counts.iter().sum::<u32>()
        );

        let teamboard = self
            .settings
            .team_mode
            .then(|| team_leaderboard(&self.registry));
        self.hub.broadcast(ServerMessage::RoundEnd {
            index,
            correct_index,
            fastest_correct: self.session.fastest_correct.clone(),
            leaderboard: leaderboard(&self.registry),
            teamboard,
            counts: self.session.counts,
        });

        self.schedule_advance(self.round_seq);
        true
    }

    fn finish(&mut self) {
        self.cancel_watchdog();
        self.session.status = GameStatus::Finished;
        self.session.display = None;
        self.session.deadline = None;
        self.session.paused = false;
        self.session.remaining = None;

        tracing::info!("Game finished after {} rounds", self.session.history.len());
        self.broadcast_game_state();
        self.hub.broadcast(ServerMessage::GameFinal {
            leaderboard: leaderboard(&self.registry),
        });
    }

    pub(super) fn pause(&mut self) -> SessionResult {
        if self.session.status != GameStatus::InProgress {
            return Err(SessionError::Stale(StaleReason::WrongStatus));
        }
        if self.session.paused {
            return Err(SessionError::Stale(StaleReason::Paused));
        }

        let now = Instant::now();
        let remaining = self
            .session
            .deadline
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or_default();

        self.session.paused = true;
        self.session.remaining = Some(remaining);
        self.session.deadline = None;

        tracing::info!("Round paused with {}ms left", remaining.as_millis());
        self.hub.broadcast(ServerMessage::RoundPaused);
        Ok(())
    }

    pub(super) fn resume(&mut self) -> SessionResult {
        if self.session.status != GameStatus::InProgress || !self.session.paused {
            return Err(SessionError::Stale(StaleReason::NotPaused));
        }

        let remaining = self.session.remaining.take().unwrap_or_default();
        self.session.deadline = Some(Instant::now() + remaining);
        self.session.paused = false;

        tracing::info!("Round resumed with {}ms left", remaining.as_millis());
        self.hub.broadcast(ServerMessage::RoundResumed {
            ends_at: epoch_ms_after(remaining),
        });
        self.hub
            .broadcast(ServerMessage::RoundProgress(self.round_progress()));

        self.arm_deadline_timer(self.round_seq, remaining + self.config.deadline_grace);
        Ok(())
    }

    /// Early close once every snapshot participant still present has answered
    pub(super) fn close_if_everyone_answered(&mut self) {
        if self.session.status != GameStatus::InProgress {
            return;
        }
        let progress = self.round_progress();
        if progress.total > 0 && progress.answered >= progress.total {
            self.end_round(CloseReason::AllAnswered);
        }
    }

    /// Shared body of the one-shot timer and the watchdog poll
    pub(super) fn on_deadline(&mut self, round: u64, reason: CloseReason) {
        if round != self.round_seq
            || self.session.status != GameStatus::InProgress
            || self.session.paused
        {
            return;
        }
        if self
            .session
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            self.end_round(reason);
        }
    }

    pub(super) fn on_auto_advance(&mut self, round: u64) {
        if round == self.round_seq && self.session.status == GameStatus::ShowingResults {
            self.advance();
        }
    }

    // ----- timers -----

    fn arm_deadline_timer(&self, round: u64, after: Duration) {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = commands.send(Command::DeadlineElapsed { round });
        });
    }

    fn arm_watchdog(&mut self, round: u64) {
        self.cancel_watchdog();
        let commands = self.commands.clone();
        let period = self.config.watchdog_interval;
        self.watchdog = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if commands.send(Command::Watchdog { round }).is_err() {
                    break;
                }
            }
        }));
    }

    pub(super) fn cancel_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }

    fn schedule_advance(&self, round: u64) {
        let commands = self.commands.clone();
        let delay = self.config.results_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(Command::AdvanceAfterResults { round });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question() -> Question {
        Question {
            id: "q1".to_string(),
            text: "2+2?".to_string(),
            choices: ["3".into(), "4".into(), "5".into(), "6".into()],
            correct_index: 1,
            duration_seconds: 10,
        }
    }

    #[test]
    fn test_display_without_shuffle_keeps_order() {
        let settings = Settings {
            shuffle_choices: false,
            ..Settings::default()
        };
        let display = RoundDisplay::build(&question(), &settings, &mut StdRng::seed_from_u64(1));

        assert_eq!(display.choices, question().choices);
        assert_eq!(display.correct_index, 1);
        assert_eq!(display.duration_seconds, 10);
    }

    #[test]
    fn test_shuffle_is_a_bijection_tracking_the_correct_choice() {
        let settings = Settings::default();
        let q = question();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let display = RoundDisplay::build(&q, &settings, &mut rng);

            let mut sorted = display.choices.clone();
            sorted.sort();
            let mut expected = q.choices.clone();
            expected.sort();
            assert_eq!(sorted, expected);

            assert_eq!(display.choices[display.correct_index], "4");
        }
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        let settings = Settings::default();
        let q = question();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 4];

        for _ in 0..200 {
            seen[RoundDisplay::build(&q, &settings, &mut rng).correct_index] = true;
        }
        assert_eq!(seen, [true; 4]);
    }

    #[test]
    fn test_display_uses_base_duration_override() {
        let settings = Settings {
            base_duration: Some(45),
            ..Settings::default()
        };
        let display = RoundDisplay::build(&question(), &settings, &mut StdRng::seed_from_u64(3));
        assert_eq!(display.duration_seconds, 45);
    }
}
