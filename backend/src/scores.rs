use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-game high-score tables. One row per player per game, holding their
/// best score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leaderboards {
    games: HashMap<String, HashMap<String, i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreEntry {
    pub name: String,
    pub score: i64,
}

impl Leaderboards {
    /// Record a score, keeping the player's existing entry when it is higher.
    /// Returns the score now on the board.
    pub fn submit(&mut self, game: &str, name: &str, score: i64) -> i64 {
        let best = self
            .games
            .entry(game.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert(score);
        if score > *best {
            *best = score;
        }
        *best
    }

    /// Scores for a game, highest first, ties broken by name.
    pub fn top(&self, game: &str) -> Vec<ScoreEntry> {
        let mut rows: Vec<ScoreEntry> = self
            .games
            .get(game)
            .map(|table| {
                table
                    .iter()
                    .map(|(name, score)| ScoreEntry {
                        name: name.clone(),
                        score: *score,
                    })
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        rows
    }

    pub fn reset(&mut self, game: &str) {
        self.games.remove(game);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_keeps_single_entry_and_upgrades() {
        let mut boards = Leaderboards::default();
        assert_eq!(boards.submit("forste-advent", "testuser", 5), 5);
        // lower score does not downgrade
        assert_eq!(boards.submit("forste-advent", "testuser", 3), 5);
        assert_eq!(boards.submit("forste-advent", "testuser", 9), 9);

        let top = boards.top("forste-advent");
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "testuser");
        assert_eq!(top[0].score, 9);
    }

    #[test]
    fn top_sorts_descending_with_name_tiebreak() {
        let mut boards = Leaderboards::default();
        boards.submit("snake", "carol", 4);
        boards.submit("snake", "alice", 7);
        boards.submit("snake", "bob", 4);

        let top = boards.top("snake");
        let names: Vec<&str> = top.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn games_are_independent_and_resettable() {
        let mut boards = Leaderboards::default();
        boards.submit("snake", "alice", 7);
        boards.submit("rush", "alice", 2);

        boards.reset("snake");
        assert!(boards.top("snake").is_empty());
        assert_eq!(boards.top("rush").len(), 1);
        assert!(boards.top("never-played").is_empty());
    }
}
