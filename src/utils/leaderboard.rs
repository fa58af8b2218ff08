use crate::models::{Pick, User};
use serde::Serialize;
use std::collections::HashMap;

/// One row of the season standings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub total_points: u32,
    pub total_picks: u32,
    pub correct_picks: u32,
    pub best_bets_total: u32,
    pub best_bets_correct: u32,
}

impl LeaderboardEntry {
    /// Share of the season's picks that were correct. Ungraded picks count
    /// against the rate until their games go final.
    pub fn win_rate(&self) -> f64 {
        if self.total_picks == 0 {
            0.0
        } else {
            self.correct_picks as f64 / self.total_picks as f64
        }
    }

    /// Format the entry as a readable string
    pub fn format(&self) -> String {
        format!(
            "{} ({}) | {} pts | {}/{} correct ({:.1}%) | Best bets: {}/{}",
            self.display_name,
            self.username,
            self.total_points,
            self.correct_picks,
            self.total_picks,
            self.win_rate() * 100.0,
            self.best_bets_correct,
            self.best_bets_total
        )
    }
}

/// Aggregate a season's picks per user
///
/// Points come from `points_earned` on each pick, so the standings reflect the
/// last grading pass. Picks whose user no longer exists are dropped.
pub fn build_leaderboard(picks: &[Pick], users: &[User], season: i32) -> Vec<LeaderboardEntry> {
    let users_by_id: HashMap<&str, &User> = users.iter().map(|u| (u.id.as_str(), u)).collect();
    let mut entries: HashMap<&str, LeaderboardEntry> = HashMap::new();

    for pick in picks.iter().filter(|p| p.season == season) {
        let Some(user) = users_by_id.get(pick.user_id.as_str()) else {
            continue;
        };

        let entry = entries
            .entry(user.id.as_str())
            .or_insert_with(|| LeaderboardEntry {
                user_id: user.id.clone(),
                username: user.username.clone(),
                display_name: user.display_name.clone(),
                total_points: 0,
                total_picks: 0,
                correct_picks: 0,
                best_bets_total: 0,
                best_bets_correct: 0,
            });

        let correct = pick.is_correct == Some(true);
        entry.total_points += pick.points_earned;
        entry.total_picks += 1;
        if correct {
            entry.correct_picks += 1;
        }
        if pick.is_best_bet {
            entry.best_bets_total += 1;
            if correct {
                entry.best_bets_correct += 1;
            }
        }
    }

    let mut leaderboard: Vec<LeaderboardEntry> = entries.into_values().collect();

    // Sort by points, then correct picks (descending); username keeps ties stable
    leaderboard.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(b.correct_picks.cmp(&a.correct_picks))
            .then(a.username.cmp(&b.username))
    });

    leaderboard
}
