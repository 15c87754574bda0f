use super::registry::PlayerRegistry;
use crate::types::{LeaderboardEntry, Score, Team, TeamStanding};

pub const LEADERBOARD_LIMIT: usize = 50;

/// Players by score descending. The sort is stable, so tied players keep
/// their join order.
pub fn leaderboard(registry: &PlayerRegistry) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = registry
        .iter()
        .map(|p| LeaderboardEntry {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            team: p.team,
        })
        .collect();

    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries.truncate(LEADERBOARD_LIMIT);
    entries
}

/// Summed score per team, descending. Teams without members are left out.
pub fn team_leaderboard(registry: &PlayerRegistry) -> Vec<TeamStanding> {
    let mut sums: [Option<Score>; 4] = [None; 4];
    for player in registry.iter() {
        if let Some(team) = player.team {
            let slot = &mut sums[team.index()];
            *slot = Some(slot.unwrap_or(Score::ZERO) + player.score);
        }
    }

    let mut standings: Vec<TeamStanding> = Team::ALL
        .into_iter()
        .filter_map(|team| {
            sums[team.index()].map(|score| TeamStanding { team, score })
        })
        .collect();

    standings.sort_by(|a, b| b.score.cmp(&a.score));
    standings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_scores(scores: &[u32]) -> PlayerRegistry {
        let mut registry = PlayerRegistry::new();
        for (i, half_points) in scores.iter().enumerate() {
            let id = format!("p{}", i);
            registry.join(id.clone(), &format!("P{}", i), None, false);
            registry.get_mut(&id).unwrap().score = Score::from_half_points(*half_points);
        }
        registry
    }

    #[test]
    fn test_sorted_descending_and_stable_on_ties() {
        let registry = registry_with_scores(&[2, 6, 2, 3, 6]);
        let board = leaderboard(&registry);

        let ids: Vec<&str> = board.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p4", "p3", "p0", "p2"]);
    }

    #[test]
    fn test_capped_at_limit() {
        let scores: Vec<u32> = (0..60).collect();
        let registry = registry_with_scores(&scores);
        let board = leaderboard(&registry);

        assert_eq!(board.len(), LEADERBOARD_LIMIT);
        assert_eq!(board[0].score, Score::from_half_points(59));
        assert!(board.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_team_leaderboard_sums_members() {
        let mut registry = PlayerRegistry::new();
        registry.join("a".into(), "A", Some("blue"), true);
        registry.join("b".into(), "B", Some("blue"), true);
        registry.join("c".into(), "C", Some("red"), true);
        registry.get_mut("a").unwrap().score = Score::from_half_points(2);
        registry.get_mut("b").unwrap().score = Score::from_half_points(3);
        registry.get_mut("c").unwrap().score = Score::from_half_points(4);

        let standings = team_leaderboard(&registry);
        assert_eq!(
            standings,
            vec![
                TeamStanding {
                    team: Team::Blue,
                    score: Score::from_half_points(5)
                },
                TeamStanding {
                    team: Team::Red,
                    score: Score::from_half_points(4)
                },
            ]
        );
    }

    #[test]
    fn test_team_leaderboard_empty_without_teams() {
        let registry = registry_with_scores(&[4, 2]);
        assert!(team_leaderboard(&registry).is_empty());
    }
}
