//! Connected participants and their per-session state

use crate::types::{Player, PlayerId, PlayerInfo, Score, Team};
use std::collections::HashSet;

pub const MAX_NAME_CHARS: usize = 20;

/// Players in join order. Join order is what keeps leaderboard ties stable.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    team_counts: [usize; 4],
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    pub fn infos(&self) -> Vec<PlayerInfo> {
        self.players.iter().map(PlayerInfo::from).collect()
    }

    /// Number of players currently on each team, indexed by [`Team::index`]
    pub fn team_counts(&self) -> [usize; 4] {
        self.team_counts
    }

    /// Add a player. The name is cleaned and made unique, and a team is
    /// picked when team mode is on.
    pub fn join(
        &mut self,
        id: PlayerId,
        requested_name: &str,
        requested_team: Option<&str>,
        team_mode: bool,
    ) -> &Player {
        let name = self.unique_name(requested_name);
        let team = if team_mode {
            Some(self.pick_team(requested_team))
        } else {
            None
        };

        if let Some(team) = team {
            self.team_counts[team.index()] += 1;
        }

        self.players.push(Player {
            id,
            name,
            score: Score::ZERO,
            team,
            streak: 0,
            answered: None,
        });
        let index = self.players.len() - 1;
        &self.players[index]
    }

    pub fn remove(&mut self, id: &str) -> Option<Player> {
        let pos = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(pos);
        if let Some(team) = player.team {
            self.team_counts[team.index()] -= 1;
        }
        Some(player)
    }

    fn unique_name(&self, requested: &str) -> String {
        let trimmed: String = requested.trim().chars().take(MAX_NAME_CHARS).collect();
        let base = if trimmed.is_empty() {
            format!("Player {}", self.players.len() + 1)
        } else {
            trimmed
        };

        let taken: HashSet<&str> = self.players.iter().map(|p| p.name.as_str()).collect();
        if !taken.contains(base.as_str()) {
            return base;
        }

        (2..)
            .map(|i| format!("{} ({})", base, i))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or(base)
    }

    /// Honor a valid requested label, otherwise the least-populated team.
    /// Ties go to the earliest label in [`Team::ALL`].
    fn pick_team(&self, requested: Option<&str>) -> Team {
        if let Some(team) = requested.and_then(Team::from_label) {
            return team;
        }

        let mut best = Team::ALL[0];
        for team in Team::ALL {
            if self.team_counts[team.index()] < self.team_counts[best.index()] {
                best = team;
            }
        }
        best
    }

    /// Zero scores and streaks for a fresh game
    pub fn reset_scores(&mut self) {
        for player in &mut self.players {
            player.score = Score::ZERO;
            player.streak = 0;
            player.answered = None;
        }
    }

    pub fn clear_round_marks(&mut self) {
        for player in &mut self.players {
            player.answered = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let mut registry = PlayerRegistry::new();
        registry.join("a".into(), "Alice", None, false);
        let second = registry.join("b".into(), "Alice", None, false).name.clone();
        let third = registry.join("c".into(), "  Alice ", None, false).name.clone();

        assert_eq!(second, "Alice (2)");
        assert_eq!(third, "Alice (3)");
    }

    #[test]
    fn test_empty_name_gets_default_and_long_name_is_truncated() {
        let mut registry = PlayerRegistry::new();
        let name = registry.join("a".into(), "   ", None, false).name.clone();
        assert_eq!(name, "Player 1");

        let long = "abcdefghijklmnopqrstuvwxyz";
        let name = registry.join("b".into(), long, None, false).name.clone();
        assert_eq!(name.chars().count(), MAX_NAME_CHARS);
        assert_eq!(name, "abcdefghijklmnopqrst");
    }

    #[test]
    fn test_team_mode_off_assigns_no_team() {
        let mut registry = PlayerRegistry::new();
        let player = registry.join("a".into(), "Alice", Some("red"), false);
        assert_eq!(player.team, None);
        assert_eq!(registry.team_counts(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_requested_team_is_honored() {
        let mut registry = PlayerRegistry::new();
        registry.join("a".into(), "A", Some("yellow"), true);
        registry.join("b".into(), "B", Some("yellow"), true);
        assert_eq!(registry.team_counts(), [0, 0, 0, 2]);
    }

    #[test]
    fn test_auto_balance_fills_smallest_team_in_label_order() {
        let mut registry = PlayerRegistry::new();
        let teams: Vec<Team> = (0..6)
            .map(|i| {
                registry
                    .join(format!("p{}", i), "P", None, true)
                    .team
                    .unwrap()
            })
            .collect();

        assert_eq!(
            teams,
            vec![
                Team::Red,
                Team::Blue,
                Team::Green,
                Team::Yellow,
                Team::Red,
                Team::Blue
            ]
        );
    }

    #[test]
    fn test_unknown_label_falls_back_to_balancer() {
        let mut registry = PlayerRegistry::new();
        registry.join("a".into(), "A", Some("red"), true);
        let team = registry.join("b".into(), "B", Some("purple"), true).team;
        assert_eq!(team, Some(Team::Blue));
    }

    #[test]
    fn test_remove_updates_team_counts() {
        let mut registry = PlayerRegistry::new();
        registry.join("a".into(), "A", Some("green"), true);
        registry.join("b".into(), "B", None, true);

        let removed = registry.remove("a").unwrap();
        assert_eq!(removed.name, "A");
        assert_eq!(registry.team_counts(), [1, 0, 0, 0]);
        assert!(registry.remove("a").is_none());

        // Blue and green are both empty; blue comes first in label order
        let team = registry.join("c".into(), "C", None, true).team;
        assert_eq!(team, Some(Team::Blue));
    }

    #[test]
    fn test_reset_scores() {
        let mut registry = PlayerRegistry::new();
        registry.join("a".into(), "A", None, false);
        {
            let player = registry.get_mut("a").unwrap();
            player.score = Score::from_half_points(7);
            player.streak = 4;
        }

        registry.reset_scores();
        let player = registry.get("a").unwrap();
        assert_eq!(player.score, Score::ZERO);
        assert_eq!(player.streak, 0);
    }
}
