use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const SPORT_KEY: &str = "americanfootball_nfl";

/// Response from The Odds API for a single game
#[derive(Debug, Deserialize)]
struct OddsApiGame {
    #[allow(dead_code)]
    id: String,
    #[allow(dead_code)]
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    bookmakers: Vec<OddsApiBookmaker>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    title: String,
    markets: Vec<OddsApiMarket>,
}

/// Market data (e.g., moneyline, spread) from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    outcomes: Vec<OddsApiOutcome>,
}

/// Outcome data for a specific team
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    #[serde(default)]
    point: Option<f64>,
}

/// Posted spread for one game, from the home and away perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSpread {
    pub home_team: String,
    pub away_team: String,
    pub bookmaker: String,
    pub home_spread: f64,
    pub away_spread: f64,
}

pub struct OddsApiClient {
    api_key: String,
    client: reqwest::Client,
}

impl OddsApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the current spread for every upcoming NFL game
    pub async fn fetch_spreads(&self) -> Result<Vec<GameSpread>> {
        let url = format!("{}/sports/{}/odds", ODDS_API_BASE_URL, SPORT_KEY);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", "us"),
                ("markets", "spreads"),
                ("oddsFormat", "american"),
            ])
            .send()
            .await
            .context("Failed to fetch spreads from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        let api_games: Vec<OddsApiGame> = response
            .json()
            .await
            .context("Failed to parse Odds API response")?;

        Ok(spreads_from_games(api_games))
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<()> {
        let url = format!("{}/sports", ODDS_API_BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string()
        };
        info!(
            remaining = %header("x-requests-remaining"),
            used = %header("x-requests-used"),
            "Odds API usage"
        );

        Ok(())
    }
}

/// Take the first bookmaker that posts a spread for each game. Each side's
/// point is read on its own; a missing side mirrors the other.
fn spreads_from_games(api_games: Vec<OddsApiGame>) -> Vec<GameSpread> {
    api_games
        .into_iter()
        .filter_map(|game| {
            game.bookmakers.iter().find_map(|bookmaker| {
                let market = bookmaker.markets.iter().find(|m| m.key == "spreads")?;
                let point_for = |team: &str| {
                    market
                        .outcomes
                        .iter()
                        .find(|o| o.name == team)
                        .and_then(|o| o.point)
                };

                let (home_spread, away_spread) =
                    match (point_for(&game.home_team), point_for(&game.away_team)) {
                        (Some(home), Some(away)) => (home, away),
                        (Some(home), None) => (home, -home),
                        (None, Some(away)) => (-away, away),
                        (None, None) => return None,
                    };

                Some(GameSpread {
                    home_team: game.home_team.clone(),
                    away_team: game.away_team.clone(),
                    bookmaker: bookmaker.title.clone(),
                    home_spread,
                    away_spread,
                })
            })
        })
        .collect()
}

/// Find the spread for a matchup by team names
pub fn find_spread<'a>(spreads: &'a [GameSpread], home_team: &str, away_team: &str) -> Option<&'a GameSpread> {
    spreads.iter().find(|s| {
        s.home_team.eq_ignore_ascii_case(home_team) && s.away_team.eq_ignore_ascii_case(away_team)
    })
}
