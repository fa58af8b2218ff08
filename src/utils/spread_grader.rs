use crate::models::{Game, GameStatus, Pick, Side, User};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum GradingError {
    #[error("game {game_id} has no final score")]
    MissingScore { game_id: String },
}

/// Which side covered the spread. There is no push: a margin landing exactly
/// on the number goes to the underdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpreadOutcome {
    HomeCovers,
    AwayCovers,
}

impl SpreadOutcome {
    pub fn home_covers(&self) -> bool {
        matches!(self, SpreadOutcome::HomeCovers)
    }

    pub fn away_covers(&self) -> bool {
        matches!(self, SpreadOutcome::AwayCovers)
    }

    pub fn covering_side(&self) -> Side {
        match self {
            SpreadOutcome::HomeCovers => Side::Home,
            SpreadOutcome::AwayCovers => Side::Away,
        }
    }
}

/// Decide which side covered
///
/// The branch depends only on the sign of `home_spread`:
/// - home_spread < 0: home is favored and must win by MORE than |home_spread|
/// - otherwise: away is treated as favored, and covers if the home margin is
///   below away_spread (e.g. away_spread = -5.5 means away must win by 6+)
///
/// A pick'em line (0 / 0) takes the second branch, so away covers only by
/// winning outright and a tie goes to home.
pub fn grade_game(home_score: u32, away_score: u32, home_spread: f64, away_spread: f64) -> SpreadOutcome {
    let actual_margin = (home_score as i64 - away_score as i64) as f64;

    if home_spread < 0.0 {
        if actual_margin > home_spread.abs() {
            SpreadOutcome::HomeCovers
        } else {
            SpreadOutcome::AwayCovers
        }
    } else if actual_margin < away_spread {
        SpreadOutcome::AwayCovers
    } else {
        SpreadOutcome::HomeCovers
    }
}

/// Grade a game straight off its stored scores and spreads
pub fn grade_final_game(game: &Game) -> Result<SpreadOutcome, GradingError> {
    match (game.home_score, game.away_score) {
        (Some(home_score), Some(away_score)) => Ok(grade_game(
            home_score,
            away_score,
            game.home_spread,
            game.away_spread,
        )),
        _ => Err(GradingError::MissingScore {
            game_id: game.id.clone(),
        }),
    }
}

/// Write `is_correct` / `points_earned` onto every pick for this game
///
/// Picks on other games are skipped. Returns how many picks were graded.
pub fn grade_picks_for_game<'a, I>(game: &Game, picks: I) -> Result<usize, GradingError>
where
    I: IntoIterator<Item = &'a mut Pick>,
{
    let outcome = grade_final_game(game)?;
    let covering = outcome.covering_side();

    let mut graded = 0;
    for pick in picks.into_iter().filter(|p| p.game_id == game.id) {
        settle_pick(pick, covering);
        graded += 1;
    }

    Ok(graded)
}

/// Correct iff the pick is on the covering side; points are all or nothing
fn settle_pick(pick: &mut Pick, covering: Side) {
    let is_correct = pick.team_picked == covering;
    pick.is_correct = Some(is_correct);
    pick.points_earned = if is_correct { pick.points } else { 0 };
}

/// Counts from one grading pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradingSummary {
    pub games_graded: usize,
    pub picks_graded: usize,
    pub games_missing_scores: usize,
}

/// Grade every final game. Games are independent so order does not matter.
pub fn grade_all_final_games(games: &[Game], picks: &mut [Pick]) -> GradingSummary {
    let mut picks_by_game: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, pick) in picks.iter().enumerate() {
        picks_by_game.entry(pick.game_id.clone()).or_default().push(i);
    }

    let mut summary = GradingSummary::default();

    for game in games.iter().filter(|g| g.status == GameStatus::Final) {
        let outcome = match grade_final_game(game) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Skipping final game without scores");
                summary.games_missing_scores += 1;
                continue;
            }
        };

        let covering = outcome.covering_side();
        let indices = picks_by_game.get(&game.id).map(Vec::as_slice).unwrap_or(&[]);
        for &i in indices {
            settle_pick(&mut picks[i], covering);
        }

        debug!(game_id = %game.id, ?outcome, picks = indices.len(), "Graded game");
        summary.games_graded += 1;
        summary.picks_graded += indices.len();
    }

    summary
}

/// Sum `points_earned` per user across every pick
pub fn recompute_user_totals(picks: &[Pick]) -> BTreeMap<String, u32> {
    let mut totals = BTreeMap::new();
    for pick in picks {
        *totals.entry(pick.user_id.clone()).or_insert(0) += pick.points_earned;
    }
    totals
}

/// Overwrite every user's total. Users with no picks drop to 0.
pub fn apply_user_totals(users: &mut [User], totals: &BTreeMap<String, u32>) {
    for user in users {
        user.total_points = totals.get(&user.id).copied().unwrap_or(0);
    }
}
