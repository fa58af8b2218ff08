pub mod api;
pub mod config;
pub mod models;
pub mod store;
pub mod utils;

pub use api::*;
pub use models::*;
pub use store::{PickemStore, StoreError};
pub use utils::*;

use anyhow::{Context, Result};
use api::odds_api::{find_spread, GameSpread, OddsApiClient};
use api::scores_api::{ScheduledGame, ScoresApiClient};
use chrono::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use utils::spread_grader::GradingSummary;

/// Last week of the regular season
pub const LAST_WEEK: u32 = 18;

/// Scores and spreads pulled for one week
#[derive(Debug, Clone)]
pub struct WeekData {
    pub season: i32,
    pub week: u32,
    pub games: Vec<ScheduledGame>,
    pub spreads: Vec<GameSpread>,
}

/// What a refresh changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub games_updated: usize,
    pub games_without_spread: usize,
    pub grading: GradingSummary,
}

pub fn current_season(now: DateTime<Utc>) -> i32 {
    now.year()
}

/// Weeks elapsed since September 1st, counting from week 1, capped to the
/// regular season
pub fn current_week(now: DateTime<Utc>) -> u32 {
    let season_start = Utc
        .with_ymd_and_hms(now.year(), 9, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let weeks = (now - season_start).num_weeks() + 1;
    weeks.clamp(1, LAST_WEEK as i64) as u32
}

/// Fetch a week of games and the current spreads. A failed odds fetch is not
/// fatal: games still update, spreads stay as stored.
pub async fn fetch_week_data(
    scores_client: &ScoresApiClient,
    odds_client: &OddsApiClient,
    season: i32,
    week: u32,
) -> Result<WeekData> {
    let games = scores_client
        .fetch_week_games(season, week)
        .await
        .context("Failed to fetch games")?;

    let spreads = match odds_client.fetch_spreads().await {
        Ok(spreads) => spreads,
        Err(e) => {
            warn!(error = %e, "Failed to fetch spreads, keeping stored lines");
            Vec::new()
        }
    };

    info!(season, week, games = games.len(), spreads = spreads.len(), "Fetched week data");
    Ok(WeekData {
        season,
        week,
        games,
        spreads,
    })
}

/// Upsert teams and games from a fetched week, then run a grading pass
///
/// Games without a posted line keep their stored spread, or 0 / 0 when new.
pub fn apply_week_data(store: &mut PickemStore, data: &WeekData) -> RefreshSummary {
    let mut summary = RefreshSummary::default();

    for scheduled in &data.games {
        let home = scheduled.teams.home.to_team();
        let away = scheduled.teams.away.to_team();

        let existing = store
            .games
            .iter()
            .find(|g| g.api_id == scheduled.api_id())
            .map(|g| (g.home_spread, g.away_spread, g.public_consensus));

        let (home_spread, away_spread) = match find_spread(&data.spreads, &home.name, &away.name) {
            Some(spread) => (spread.home_spread, spread.away_spread),
            None => {
                summary.games_without_spread += 1;
                existing.map(|(h, a, _)| (h, a)).unwrap_or((0.0, 0.0))
            }
        };

        let home_team = store.upsert_team(home);
        let away_team = store.upsert_team(away);

        store.upsert_game(Game {
            id: scheduled.api_id(),
            api_id: scheduled.api_id(),
            week: data.week,
            season: data.season,
            home_team,
            away_team,
            game_time: scheduled.kickoff(),
            home_spread,
            away_spread,
            public_consensus: existing.map(|(_, _, c)| c).unwrap_or_default(),
            status: scheduled.status(),
            home_score: scheduled.home_score(),
            away_score: scheduled.away_score(),
            is_spread_locked: false,
        });
        summary.games_updated += 1;
    }

    summary.grading = store.run_grading_pass();
    summary
}
