use crate::models::{Game, GameStatus, Pick, PickSelection, Role, Team, User, WeekSettings};
use crate::utils::data::{load_from_cache, save_to_cache};
use crate::utils::spread_grader::{
    apply_user_totals, grade_all_final_games, recompute_user_totals, GradingSummary,
};
use crate::utils::submission::{validate_selections, validate_submission, SubmissionError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Game {0} not found")]
    GameNotFound(String),
    #[error("User {0} not found")]
    UserNotFound(String),
    #[error("Pick {0} not found")]
    PickNotFound(String),
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Username must not be empty")]
    EmptyUsername,
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Everything the service persists, kept as one JSON document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PickemStore {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub week_settings: Vec<WeekSettings>,
}

/// Usernames are case-insensitive and double as user ids
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl PickemStore {
    /// Load the store, starting empty when the file does not exist yet
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No data file yet, starting with an empty store");
            return Ok(Self::default());
        }
        load_from_cache(path)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_to_cache(self, path)
    }

    pub fn game(&self, game_id: &str) -> Option<&Game> {
        self.games.iter().find(|g| g.id == game_id)
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    /// Games for a week, earliest kick-off first
    pub fn games_for_week(&self, week: u32, season: i32) -> Vec<&Game> {
        let mut games: Vec<&Game> = self
            .games
            .iter()
            .filter(|g| g.week == week && g.season == season)
            .collect();
        games.sort_by_key(|g| g.game_time);
        games
    }

    pub fn week_settings(&self, week: u32, season: i32) -> Option<&WeekSettings> {
        self.week_settings
            .iter()
            .find(|s| s.week == week && s.season == season)
    }

    pub fn user_picks_for_week(&self, user_id: &str, week: u32, season: i32) -> Vec<&Pick> {
        self.picks
            .iter()
            .filter(|p| p.user_id == user_id && p.week == week && p.season == season)
            .collect()
    }

    /// Users sorted by display name
    pub fn users_by_name(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.iter().collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        users
    }

    pub fn add_user(&mut self, username: &str, display_name: &str) -> Result<&User, StoreError> {
        let id = normalize_username(username);
        if id.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        if self.user(&id).is_some() {
            return Err(StoreError::UsernameTaken);
        }

        let display_name = match display_name.trim() {
            "" => username.trim(),
            name => name,
        };

        self.users.push(User {
            id: id.clone(),
            username: id,
            display_name: display_name.to_string(),
            role: Role::User,
            total_points: 0,
        });
        info!(username = %username.trim(), "Registered user");
        Ok(&self.users[self.users.len() - 1])
    }

    pub fn set_role(&mut self, user_id: &str, role: Role) -> Result<&User, StoreError> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        user.role = role;
        Ok(user)
    }

    /// Remove a user along with all of their picks
    pub fn delete_user(&mut self, user_id: &str) -> Result<User, StoreError> {
        let index = self
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        self.picks.retain(|p| p.user_id != user_id);
        Ok(self.users.remove(index))
    }

    /// A user's own submission: the week must be open and the picks well formed
    pub fn submit_picks(
        &mut self,
        user_id: &str,
        week: u32,
        season: i32,
        selections: &[PickSelection],
        now: DateTime<Utc>,
    ) -> Result<Vec<Pick>, StoreError> {
        if self.user(user_id).is_none() {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }
        validate_submission(
            selections,
            &self.games,
            self.week_settings(week, season),
            week,
            season,
            now,
        )?;
        Ok(self.replace_weekly_picks(user_id, week, season, selections))
    }

    /// Admin submission on a user's behalf. Ignores locks and deadlines and
    /// regrades straight away so back-filled weeks score immediately.
    pub fn admin_submit_picks(
        &mut self,
        user_id: &str,
        week: u32,
        season: i32,
        selections: &[PickSelection],
    ) -> Result<Vec<Pick>, StoreError> {
        if self.user(user_id).is_none() {
            return Err(StoreError::UserNotFound(user_id.to_string()));
        }
        validate_selections(selections, &self.games, week, season)?;
        self.replace_weekly_picks(user_id, week, season, selections);
        self.run_grading_pass();

        Ok(self
            .user_picks_for_week(user_id, week, season)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Drop the user's picks for the week and store the new ones. Old picks
    /// must be gone before totals are recomputed.
    pub fn replace_weekly_picks(
        &mut self,
        user_id: &str,
        week: u32,
        season: i32,
        selections: &[PickSelection],
    ) -> Vec<Pick> {
        self.picks
            .retain(|p| !(p.user_id == user_id && p.week == week && p.season == season));

        let new_picks: Vec<Pick> = selections
            .iter()
            .map(|s| Pick::new(user_id, &s.game_id, week, season, s))
            .collect();
        self.picks.extend(new_picks.iter().cloned());

        info!(user_id, week, season, picks = new_picks.len(), "Stored weekly picks");
        new_picks
    }

    /// Manual override of a single pick's result. Points follow the result;
    /// the next grading pass recomputes it if the game is final.
    pub fn update_pick_result(&mut self, pick_id: &str, is_correct: bool) -> Result<&Pick, StoreError> {
        let pick = self
            .picks
            .iter_mut()
            .find(|p| p.id == pick_id)
            .ok_or_else(|| StoreError::PickNotFound(pick_id.to_string()))?;
        pick.is_correct = Some(is_correct);
        pick.points_earned = if is_correct { pick.points } else { 0 };
        Ok(pick)
    }

    /// Change a game's spread. Returns the regrade summary when the game is
    /// already final.
    pub fn update_spread(
        &mut self,
        game_id: &str,
        home_spread: f64,
        away_spread: f64,
        is_locked: bool,
    ) -> Result<Option<GradingSummary>, StoreError> {
        let game = self
            .games
            .iter_mut()
            .find(|g| g.id == game_id)
            .ok_or_else(|| StoreError::GameNotFound(game_id.to_string()))?;
        game.home_spread = home_spread;
        game.away_spread = away_spread;
        game.is_spread_locked = is_locked;

        if game.status == GameStatus::Final {
            Ok(Some(self.run_grading_pass()))
        } else {
            Ok(None)
        }
    }

    /// Lock or unlock every spread in a week, returning how many games changed
    pub fn lock_spreads(&mut self, week: u32, season: i32, is_locked: bool) -> usize {
        let mut changed = 0;
        for game in self
            .games
            .iter_mut()
            .filter(|g| g.week == week && g.season == season)
        {
            if game.is_spread_locked != is_locked {
                game.is_spread_locked = is_locked;
                changed += 1;
            }
        }
        changed
    }

    /// Post a final score and regrade
    pub fn set_final_score(
        &mut self,
        game_id: &str,
        home_score: u32,
        away_score: u32,
    ) -> Result<GradingSummary, StoreError> {
        let game = self
            .games
            .iter_mut()
            .find(|g| g.id == game_id)
            .ok_or_else(|| StoreError::GameNotFound(game_id.to_string()))?;
        game.home_score = Some(home_score);
        game.away_score = Some(away_score);
        game.status = GameStatus::Final;

        Ok(self.run_grading_pass())
    }

    fn week_settings_mut(&mut self, week: u32, season: i32) -> &mut WeekSettings {
        let index = match self
            .week_settings
            .iter()
            .position(|s| s.week == week && s.season == season)
        {
            Some(index) => index,
            None => {
                self.week_settings.push(WeekSettings {
                    week,
                    season,
                    deadline: None,
                    is_locked: false,
                });
                self.week_settings.len() - 1
            }
        };
        &mut self.week_settings[index]
    }

    pub fn lock_week(&mut self, week: u32, season: i32, is_locked: bool) -> &WeekSettings {
        let settings = self.week_settings_mut(week, season);
        settings.is_locked = is_locked;
        settings
    }

    pub fn set_deadline(&mut self, week: u32, season: i32, deadline: DateTime<Utc>) -> &WeekSettings {
        let settings = self.week_settings_mut(week, season);
        settings.deadline = Some(deadline);
        settings
    }

    /// Insert or update a team keyed by its API id
    pub fn upsert_team(&mut self, team: Team) -> String {
        match self.teams.iter_mut().find(|t| t.api_id == team.api_id) {
            Some(existing) => {
                let id = existing.id.clone();
                *existing = Team { id: id.clone(), ..team };
                id
            }
            None => {
                let id = team.id.clone();
                self.teams.push(team);
                id
            }
        }
    }

    /// Insert or update a game keyed by its API id. Keeps the stored id, and
    /// keeps the stored spread while it is locked.
    pub fn upsert_game(&mut self, game: Game) -> String {
        match self.games.iter_mut().find(|g| g.api_id == game.api_id) {
            Some(existing) => {
                let (home_spread, away_spread) = if existing.is_spread_locked {
                    (existing.home_spread, existing.away_spread)
                } else {
                    (game.home_spread, game.away_spread)
                };
                // A final result is never rolled back by a feed that lags behind
                let (status, home_score, away_score) =
                    if existing.status == GameStatus::Final && !game.is_gradable() {
                        (existing.status, existing.home_score, existing.away_score)
                    } else {
                        (game.status, game.home_score, game.away_score)
                    };
                let id = existing.id.clone();
                *existing = Game {
                    id: id.clone(),
                    home_spread,
                    away_spread,
                    status,
                    home_score,
                    away_score,
                    is_spread_locked: existing.is_spread_locked,
                    ..game
                };
                id
            }
            None => {
                let id = game.id.clone();
                self.games.push(game);
                id
            }
        }
    }

    /// Recompute every user's total from all stored picks
    pub fn update_user_totals(&mut self) -> BTreeMap<String, u32> {
        let totals = recompute_user_totals(&self.picks);
        apply_user_totals(&mut self.users, &totals);
        totals
    }

    /// Grade every final game, then recompute all user totals
    pub fn run_grading_pass(&mut self) -> GradingSummary {
        let summary = grade_all_final_games(&self.games, &mut self.picks);
        self.update_user_totals();
        info!(
            games = summary.games_graded,
            picks = summary.picks_graded,
            missing_scores = summary.games_missing_scores,
            "Grading pass complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;
    use chrono::Duration;

    fn game(id: &str, week: u32, home_spread: f64, kickoff_hours: i64) -> Game {
        Game {
            id: id.to_string(),
            api_id: format!("api-{}", id),
            week,
            season: 2025,
            home_team: "h".to_string(),
            away_team: "a".to_string(),
            game_time: DateTime::from_timestamp(1_757_000_000 + kickoff_hours * 3600, 0).unwrap(),
            home_spread,
            away_spread: -home_spread,
            public_consensus: Default::default(),
            status: GameStatus::Scheduled,
            home_score: None,
            away_score: None,
            is_spread_locked: false,
        }
    }

    fn selection(game_id: &str, side: Side, best_bet: bool) -> PickSelection {
        PickSelection {
            game_id: game_id.to_string(),
            team_picked: side,
            is_best_bet: best_bet,
        }
    }

    fn store() -> PickemStore {
        let mut store = PickemStore {
            games: vec![
                game("g2", 3, 3.5, 5),
                game("g1", 3, -3.5, 1),
                game("g3", 3, -7.0, 9),
                game("g4", 4, -1.0, 200),
            ],
            ..Default::default()
        };
        store.add_user("Alice", "Alice A").unwrap();
        store.add_user("bob", "").unwrap();
        store
    }

    fn week3_picks() -> Vec<PickSelection> {
        vec![
            selection("g1", Side::Home, true),
            selection("g2", Side::Away, false),
            selection("g3", Side::Away, false),
        ]
    }

    #[test]
    fn test_add_user_normalizes_and_rejects_duplicates() {
        let mut store = store();
        assert_eq!(store.user("alice").unwrap().display_name, "Alice A");
        assert_eq!(store.user("bob").unwrap().display_name, "bob");
        assert_eq!(store.add_user(" ALICE ", "x").unwrap_err(), StoreError::UsernameTaken);
        assert_eq!(store.add_user("   ", "x").unwrap_err(), StoreError::EmptyUsername);
    }

    #[test]
    fn test_games_for_week_sorted_by_kickoff() {
        let store = store();
        let ids: Vec<&str> = store.games_for_week(3, 2025).iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["g1", "g2", "g3"]);
    }

    #[test]
    fn test_resubmission_replaces_week() {
        let mut store = store();
        let now = Utc::now();
        store.submit_picks("alice", 3, 2025, &week3_picks(), now).unwrap();

        let mut second = week3_picks();
        second[0].is_best_bet = false;
        second[2].is_best_bet = true;
        store.submit_picks("alice", 3, 2025, &second, now).unwrap();

        let picks = store.user_picks_for_week("alice", 3, 2025);
        assert_eq!(picks.len(), 3);
        let best: Vec<&str> = picks
            .iter()
            .filter(|p| p.is_best_bet)
            .map(|p| p.game_id.as_str())
            .collect();
        assert_eq!(best, vec!["g3"]);
        assert_eq!(picks.iter().map(|p| p.points).sum::<u32>(), 5);
    }

    #[test]
    fn test_submit_respects_lock_and_unknown_user() {
        let mut store = store();
        store.lock_week(3, 2025, true);
        assert_eq!(
            store.submit_picks("alice", 3, 2025, &week3_picks(), Utc::now()),
            Err(StoreError::Submission(SubmissionError::WeekLocked))
        );
        assert_eq!(
            store.submit_picks("nobody", 3, 2025, &week3_picks(), Utc::now()),
            Err(StoreError::UserNotFound("nobody".to_string()))
        );

        // Admins can still submit, even after the deadline
        store.set_deadline(3, 2025, Utc::now() - Duration::days(1));
        assert_eq!(store.admin_submit_picks("alice", 3, 2025, &week3_picks()).unwrap().len(), 3);
    }

    #[test]
    fn test_final_score_grades_and_totals() {
        let mut store = store();
        store.submit_picks("alice", 3, 2025, &week3_picks(), Utc::now()).unwrap();

        // g1: home -3.5 wins 31-27, alice's best bet on home covers
        let summary = store.set_final_score("g1", 31, 27).unwrap();
        assert_eq!(summary.games_graded, 1);
        assert_eq!(summary.picks_graded, 1);
        assert_eq!(store.user("alice").unwrap().total_points, 3);

        // g2: home +3.5 loses 20-25, alice's away pick covers
        store.set_final_score("g2", 20, 25).unwrap();
        assert_eq!(store.user("alice").unwrap().total_points, 4);
        assert_eq!(store.user("bob").unwrap().total_points, 0);

        // Moving g1's line past the margin flips the best bet
        let regraded = store.update_spread("g1", -4.5, 4.5, true).unwrap();
        assert!(regraded.is_some());
        assert_eq!(store.user("alice").unwrap().total_points, 1);

        // Scheduled game: no regrade
        assert_eq!(store.update_spread("g3", -6.5, 6.5, false).unwrap(), None);
    }

    #[test]
    fn test_delete_user_removes_picks() {
        let mut store = store();
        store.submit_picks("bob", 3, 2025, &week3_picks(), Utc::now()).unwrap();
        store.delete_user("bob").unwrap();
        assert!(store.picks.is_empty());
        assert!(store.user("bob").is_none());
    }

    #[test]
    fn test_upsert_game_keeps_locked_spread() {
        let mut store = store();
        store.update_spread("g1", -6.0, 6.0, true).unwrap();

        let mut incoming = game("other-id", 3, -2.0, 1);
        incoming.api_id = "api-g1".to_string();
        incoming.status = GameStatus::Live;
        let id = store.upsert_game(incoming);

        assert_eq!(id, "g1");
        let stored = store.game("g1").unwrap();
        assert_eq!(stored.home_spread, -6.0);
        assert_eq!(stored.status, GameStatus::Live);
        assert!(stored.is_spread_locked);
        assert_eq!(store.games.len(), 4);
    }

    #[test]
    fn test_upsert_game_keeps_final_result() {
        let mut store = store();
        store.submit_picks("alice", 3, 2025, &week3_picks(), Utc::now()).unwrap();
        store.set_final_score("g1", 31, 27).unwrap();
        assert_eq!(store.user("alice").unwrap().total_points, 3);

        // Feed still has the game as not started
        let mut incoming = game("g1", 3, -3.5, 1);
        incoming.api_id = "api-g1".to_string();
        store.upsert_game(incoming);
        store.run_grading_pass();

        let stored = store.game("g1").unwrap();
        assert_eq!(stored.status, GameStatus::Final);
        assert_eq!((stored.home_score, stored.away_score), (Some(31), Some(27)));
        assert_eq!(store.user("alice").unwrap().total_points, 3);

        // A later final score from the feed does replace it
        let mut corrected = game("g1", 3, -3.5, 1);
        corrected.api_id = "api-g1".to_string();
        corrected.status = GameStatus::Final;
        corrected.home_score = Some(30);
        corrected.away_score = Some(27);
        store.upsert_game(corrected);
        store.run_grading_pass();
        assert_eq!(store.game("g1").unwrap().home_score, Some(30));
        assert_eq!(store.user("alice").unwrap().total_points, 0);
    }

    #[test]
    fn test_pick_override_points_follow_result() {
        let mut store = store();
        store.submit_picks("alice", 3, 2025, &week3_picks(), Utc::now()).unwrap();

        let pick = store.update_pick_result("alice:g2", true).unwrap();
        assert_eq!((pick.is_correct, pick.points_earned), (Some(true), 1));
        let pick = store.update_pick_result("alice:g1", true).unwrap();
        assert_eq!(pick.points_earned, 3);
        let pick = store.update_pick_result("alice:g2", false).unwrap();
        assert_eq!(pick.points_earned, 0);

        store.update_user_totals();
        assert_eq!(store.user("alice").unwrap().total_points, 3);
        assert_eq!(
            store.update_pick_result("alice:nope", true).unwrap_err(),
            StoreError::PickNotFound("alice:nope".to_string())
        );
    }

    #[test]
    fn test_lock_spreads_counts_changes() {
        let mut store = store();
        store.update_spread("g1", -3.5, 3.5, true).unwrap();
        assert_eq!(store.lock_spreads(3, 2025, true), 2);
        assert_eq!(store.lock_spreads(3, 2025, true), 0);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("pickem-store-{}.json", std::process::id()));
        let mut store = store();
        store.submit_picks("alice", 3, 2025, &week3_picks(), Utc::now()).unwrap();
        store.save(&path).unwrap();

        let loaded = PickemStore::load(&path).unwrap();
        assert_eq!(loaded.picks, store.picks);
        assert_eq!(loaded.users.len(), 2);
        std::fs::remove_file(&path).ok();

        let missing = PickemStore::load(std::env::temp_dir().join("pickem-missing-file.json")).unwrap();
        assert!(missing.games.is_empty());
    }
}
