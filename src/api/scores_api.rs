use crate::models::{GameStatus, Team};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://v1.american-football.api-sports.io";
const API_HOST: &str = "v1.american-football.api-sports.io";
const NFL_LEAGUE_ID: &str = "1";

#[derive(Debug, Deserialize)]
struct ApiSportsResponse {
    response: Vec<ScheduledGame>,
}

/// A game as reported by API-Sports
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduledGame {
    pub game: GameInfo,
    pub teams: Matchup,
    #[serde(default)]
    pub scores: Option<Scores>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameInfo {
    pub id: i64,
    pub date: GameDate,
    pub status: GameStatusInfo,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameDate {
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GameStatusInfo {
    pub short: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Matchup {
    pub home: ApiTeam,
    pub away: ApiTeam,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiTeam {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Scores {
    pub home: ScoreLine,
    pub away: ScoreLine,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScoreLine {
    #[serde(default)]
    pub total: Option<u32>,
}

impl ScheduledGame {
    pub fn api_id(&self) -> String {
        self.game.id.to_string()
    }

    pub fn kickoff(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.game.date.timestamp, 0).unwrap_or_default()
    }

    pub fn status(&self) -> GameStatus {
        game_status(&self.game.status.short)
    }

    pub fn home_score(&self) -> Option<u32> {
        self.scores.as_ref().and_then(|s| s.home.total)
    }

    pub fn away_score(&self) -> Option<u32> {
        self.scores.as_ref().and_then(|s| s.away.total)
    }
}

impl ApiTeam {
    /// "Kansas City Chiefs" -> city "Kansas City", short name "CHIEFS"
    ///
    /// The feed carries no team code, so `abbreviation` holds the upper-cased
    /// nickname.
    pub fn to_team(&self) -> Team {
        let name = self.name.trim();
        let (city, nickname) = match name.rsplit_once(' ') {
            Some((city, nickname)) => (city.trim(), nickname),
            None => ("", name),
        };

        Team {
            id: self.id.to_string(),
            api_id: self.id.to_string(),
            name: name.to_string(),
            abbreviation: nickname.to_uppercase(),
            city: city.to_string(),
            logo: self.logo.clone(),
        }
    }
}

/// Map API-Sports short status codes onto our game status
pub fn game_status(short: &str) -> GameStatus {
    match short {
        "NS" => GameStatus::Scheduled,
        "LIVE" | "1Q" | "2Q" | "3Q" | "4Q" | "OT" | "HT" => GameStatus::Live,
        "FT" | "AOT" => GameStatus::Final,
        _ => GameStatus::Scheduled,
    }
}

pub struct ScoresApiClient {
    client: Client,
    api_key: String,
}

impl ScoresApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    /// Fetch every NFL game for a season week
    pub async fn fetch_week_games(&self, season: i32, week: u32) -> Result<Vec<ScheduledGame>> {
        let url = format!("{}/games", BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("league", NFL_LEAGUE_ID.to_string()),
                ("season", season.to_string()),
                ("week", week.to_string()),
            ])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", API_HOST)
            .send()
            .await
            .context("Failed to fetch games from API-Sports")?;

        if !response.status().is_success() {
            anyhow::bail!("API-Sports returned error: {}", response.status());
        }

        let results: ApiSportsResponse = response
            .json()
            .await
            .context("Failed to parse API-Sports response")?;
        Ok(results.response)
    }
}
