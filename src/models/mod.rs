use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Points for the week's single best bet
pub const BEST_BET_POINTS: u32 = 3;
/// Points for a standard pick
pub const STANDARD_POINTS: u32 = 1;

/// One side of a matchup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Scheduled,
    Live,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// Share of public money on each side, in percent
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PublicConsensus {
    pub home: f64,
    pub away: f64,
}

/// An NFL team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub api_id: String,
    pub name: String,
    pub abbreviation: String, // Short display name, e.g. "CHIEFS"
    pub city: String,
    #[serde(default)]
    pub logo: Option<String>,
}

/// A scheduled game and its posted spread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub api_id: String,
    pub week: u32,
    pub season: i32,
    pub home_team: String, // Team id
    pub away_team: String, // Team id
    pub game_time: DateTime<Utc>,
    pub home_spread: f64, // Negative = home favored
    pub away_spread: f64, // Negative = away favored
    #[serde(default)]
    pub public_consensus: PublicConsensus,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub is_spread_locked: bool,
}

impl Game {
    /// Final with both scores posted, so eligible for grading
    pub fn is_gradable(&self) -> bool {
        self.status == GameStatus::Final && self.home_score.is_some() && self.away_score.is_some()
    }
}

/// A user's pick on one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    pub user_id: String,
    pub game_id: String,
    pub week: u32,
    pub season: i32,
    pub team_picked: Side,
    pub points: u32, // 1 or 3
    pub is_best_bet: bool,
    #[serde(default)]
    pub is_correct: Option<bool>, // None until graded
    #[serde(default)]
    pub points_earned: u32,
}

impl Pick {
    pub fn new(user_id: &str, game_id: &str, week: u32, season: i32, selection: &PickSelection) -> Self {
        let points = if selection.is_best_bet {
            BEST_BET_POINTS
        } else {
            STANDARD_POINTS
        };

        Self {
            id: pick_id(user_id, game_id),
            user_id: user_id.to_string(),
            game_id: game_id.to_string(),
            week,
            season,
            team_picked: selection.team_picked,
            points,
            is_best_bet: selection.is_best_bet,
            is_correct: None,
            points_earned: 0,
        }
    }
}

/// Picks are unique per (user, game), so the pair doubles as the id
pub fn pick_id(user_id: &str, game_id: &str) -> String {
    format!("{}:{}", user_id, game_id)
}

/// A pick as submitted, before it is stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickSelection {
    pub game_id: String,
    pub team_picked: Side,
    #[serde(default)]
    pub is_best_bet: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub total_points: u32,
}

/// Lock state and deadline for one week of picks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekSettings {
    pub week: u32,
    pub season: i32,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_locked: bool,
}
