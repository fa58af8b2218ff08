use crate::models::{Game, PickSelection, WeekSettings};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Picks required each week
pub const PICKS_PER_WEEK: usize = 3;
/// Best bets required each week
pub const BEST_BETS_PER_WEEK: usize = 1;

#[derive(Debug, Error, PartialEq)]
pub enum SubmissionError {
    #[error("This week is locked for picks")]
    WeekLocked,
    #[error("Deadline has passed for this week")]
    DeadlinePassed,
    #[error("Must submit exactly {} picks, got {0}", PICKS_PER_WEEK)]
    WrongPickCount(usize),
    #[error("Must have exactly {} best bet (3 points), got {0}", BEST_BETS_PER_WEEK)]
    BestBetCount(usize),
    #[error("More than one pick on game {0}")]
    DuplicateGame(String),
    #[error("Game {0} not found")]
    UnknownGame(String),
    #[error("Game {game_id} is not part of week {week}")]
    GameNotInWeek { game_id: String, week: u32 },
}

/// Check that the week is still open for picks
pub fn check_week_open(
    settings: Option<&WeekSettings>,
    now: DateTime<Utc>,
) -> Result<(), SubmissionError> {
    let Some(settings) = settings else {
        return Ok(());
    };

    if settings.is_locked {
        return Err(SubmissionError::WeekLocked);
    }

    match settings.deadline {
        Some(deadline) if now > deadline => Err(SubmissionError::DeadlinePassed),
        _ => Ok(()),
    }
}

/// Check the shape of a weekly submission: 3 picks on distinct games of this
/// week, exactly one of them the best bet
pub fn validate_selections(
    selections: &[PickSelection],
    games: &[Game],
    week: u32,
    season: i32,
) -> Result<(), SubmissionError> {
    if selections.len() != PICKS_PER_WEEK {
        return Err(SubmissionError::WrongPickCount(selections.len()));
    }

    let best_bets = selections.iter().filter(|s| s.is_best_bet).count();
    if best_bets != BEST_BETS_PER_WEEK {
        return Err(SubmissionError::BestBetCount(best_bets));
    }

    let mut seen = HashSet::new();
    for selection in selections {
        if !seen.insert(selection.game_id.as_str()) {
            return Err(SubmissionError::DuplicateGame(selection.game_id.clone()));
        }

        let game = games
            .iter()
            .find(|g| g.id == selection.game_id)
            .ok_or_else(|| SubmissionError::UnknownGame(selection.game_id.clone()))?;

        if game.week != week || game.season != season {
            return Err(SubmissionError::GameNotInWeek {
                game_id: game.id.clone(),
                week,
            });
        }
    }

    Ok(())
}

/// Full check for a user's own submission
pub fn validate_submission(
    selections: &[PickSelection],
    games: &[Game],
    settings: Option<&WeekSettings>,
    week: u32,
    season: i32,
    now: DateTime<Utc>,
) -> Result<(), SubmissionError> {
    check_week_open(settings, now)?;
    validate_selections(selections, games, week, season)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameStatus, Side};
    use chrono::Duration;

    fn game(id: &str, week: u32) -> Game {
        Game {
            id: id.to_string(),
            api_id: id.to_string(),
            week,
            season: 2025,
            home_team: "h".to_string(),
            away_team: "a".to_string(),
            game_time: Utc::now(),
            home_spread: -3.0,
            away_spread: 3.0,
            public_consensus: Default::default(),
            status: GameStatus::Scheduled,
            home_score: None,
            away_score: None,
            is_spread_locked: false,
        }
    }

    fn selection(game_id: &str, best_bet: bool) -> PickSelection {
        PickSelection {
            game_id: game_id.to_string(),
            team_picked: Side::Home,
            is_best_bet: best_bet,
        }
    }

    fn games() -> Vec<Game> {
        vec![game("g1", 3), game("g2", 3), game("g3", 3), game("g4", 4)]
    }

    #[test]
    fn test_valid_submission() {
        let picks = vec![selection("g1", true), selection("g2", false), selection("g3", false)];
        assert_eq!(
            validate_submission(&picks, &games(), None, 3, 2025, Utc::now()),
            Ok(())
        );
    }

    #[test]
    fn test_pick_count_and_best_bets() {
        let two = vec![selection("g1", true), selection("g2", false)];
        assert_eq!(
            validate_selections(&two, &games(), 3, 2025),
            Err(SubmissionError::WrongPickCount(2))
        );

        let no_best = vec![selection("g1", false), selection("g2", false), selection("g3", false)];
        assert_eq!(
            validate_selections(&no_best, &games(), 3, 2025),
            Err(SubmissionError::BestBetCount(0))
        );

        let two_best = vec![selection("g1", true), selection("g2", true), selection("g3", false)];
        assert_eq!(
            validate_selections(&two_best, &games(), 3, 2025),
            Err(SubmissionError::BestBetCount(2))
        );
    }

    #[test]
    fn test_games_must_be_distinct_and_in_week() {
        let dup = vec![selection("g1", true), selection("g1", false), selection("g3", false)];
        assert_eq!(
            validate_selections(&dup, &games(), 3, 2025),
            Err(SubmissionError::DuplicateGame("g1".to_string()))
        );

        let unknown = vec![selection("g1", true), selection("g9", false), selection("g3", false)];
        assert_eq!(
            validate_selections(&unknown, &games(), 3, 2025),
            Err(SubmissionError::UnknownGame("g9".to_string()))
        );

        let wrong_week = vec![selection("g1", true), selection("g4", false), selection("g3", false)];
        assert_eq!(
            validate_selections(&wrong_week, &games(), 3, 2025),
            Err(SubmissionError::GameNotInWeek {
                game_id: "g4".to_string(),
                week: 3
            })
        );
    }

    #[test]
    fn test_locked_week_and_deadline() {
        let now = Utc::now();
        let mut settings = WeekSettings {
            week: 3,
            season: 2025,
            deadline: Some(now + Duration::hours(1)),
            is_locked: false,
        };
        assert_eq!(check_week_open(Some(&settings), now), Ok(()));

        settings.deadline = Some(now - Duration::minutes(1));
        assert_eq!(
            check_week_open(Some(&settings), now),
            Err(SubmissionError::DeadlinePassed)
        );

        settings.deadline = None;
        settings.is_locked = true;
        assert_eq!(
            check_week_open(Some(&settings), now),
            Err(SubmissionError::WeekLocked)
        );
    }
}
