use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pickem::config::DEFAULT_DATA_FILE;
use pickem::data::save_leaderboard_to_csv;
use pickem::leaderboard::build_leaderboard;
use pickem::odds_api::OddsApiClient;
use pickem::scores_api::ScoresApiClient;
use pickem::spread_grader::grade_game;
use pickem::{apply_week_data, current_season, current_week, fetch_week_data, PickemStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pickem", about = "NFL pick'em spread grading")]
struct Cli {
    /// JSON data file holding games, picks and users
    #[arg(long, env = "PICKEM_DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    data_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Grade every final game and recompute user totals
    Grade,
    /// Print the season leaderboard
    Leaderboard {
        #[arg(long)]
        season: Option<i32>,
        /// Also write the leaderboard to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show which side covers for a final score
    CheckSpread {
        #[arg(long)]
        home_score: u32,
        #[arg(long)]
        away_score: u32,
        #[arg(long, allow_hyphen_values = true)]
        home_spread: f64,
        /// Defaults to the negated home spread
        #[arg(long, allow_hyphen_values = true)]
        away_spread: Option<f64>,
    },
    /// Pull scores and spreads for a week, then grade
    Refresh {
        #[arg(long)]
        season: Option<i32>,
        #[arg(long)]
        week: Option<u32>,
    },
    /// Register a user
    AddUser {
        username: String,
        #[arg(long, default_value = "")]
        display_name: String,
    },
    /// Enter a final score by hand, then grade
    SetScore {
        game_id: String,
        home_score: u32,
        away_score: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Grade => {
            let mut store = PickemStore::load(&cli.data_file)?;
            let summary = store.run_grading_pass();
            store.save(&cli.data_file)?;

            println!(
                "Graded {} games ({} picks), {} final games missing scores",
                summary.games_graded, summary.picks_graded, summary.games_missing_scores
            );
            for user in store.users_by_name() {
                println!("  {}: {} pts", user.display_name, user.total_points);
            }
        }
        Command::Leaderboard { season, csv } => {
            let store = PickemStore::load(&cli.data_file)?;
            let season = season.unwrap_or_else(|| current_season(Utc::now()));
            let leaderboard = build_leaderboard(&store.picks, &store.users, season);

            println!("{} LEADERBOARD\n", season);
            if leaderboard.is_empty() {
                println!("No graded picks for this season.");
            }
            for (i, entry) in leaderboard.iter().enumerate() {
                println!("{}. {}", i + 1, entry.format());
            }

            if let Some(csv) = csv {
                save_leaderboard_to_csv(&leaderboard, &csv)?;
                println!("\nSaved leaderboard to {}", csv.display());
            }
        }
        Command::CheckSpread {
            home_score,
            away_score,
            home_spread,
            away_spread,
        } => {
            let away_spread = away_spread.unwrap_or(-home_spread);
            let outcome = grade_game(home_score, away_score, home_spread, away_spread);
            println!(
                "Home {} ({:+.1}) - Away {} ({:+.1})",
                home_score, home_spread, away_score, away_spread
            );
            println!("Home covers: {}", outcome.home_covers());
            println!("Away covers: {}", outcome.away_covers());
        }
        Command::Refresh { season, week } => {
            let odds_api_key =
                std::env::var("ODDS_API_KEY").context("ODDS_API_KEY not set in .env file")?;
            let api_sports_key =
                std::env::var("API_SPORTS_KEY").context("API_SPORTS_KEY not set in .env file")?;

            let now = Utc::now();
            let season = season.unwrap_or_else(|| current_season(now));
            let week = week.unwrap_or_else(|| current_week(now));

            let scores_client = ScoresApiClient::new(api_sports_key);
            let odds_client = OddsApiClient::new(odds_api_key);

            println!("Fetching week {} of {}...\n", week, season);
            let data = fetch_week_data(&scores_client, &odds_client, season, week).await?;

            let mut store = PickemStore::load(&cli.data_file)?;
            let summary = apply_week_data(&mut store, &data);
            store.save(&cli.data_file)?;

            println!(
                "Updated {} games ({} without a posted spread)",
                summary.games_updated, summary.games_without_spread
            );
            println!(
                "Graded {} games ({} picks)",
                summary.grading.games_graded, summary.grading.picks_graded
            );

            // Check API usage
            odds_client.check_usage().await?;
        }
        Command::AddUser {
            username,
            display_name,
        } => {
            let mut store = PickemStore::load(&cli.data_file)?;
            let user = store.add_user(&username, &display_name)?.clone();
            store.save(&cli.data_file)?;
            println!("Added user {} ({})", user.display_name, user.id);
        }
        Command::SetScore {
            game_id,
            home_score,
            away_score,
        } => {
            let mut store = PickemStore::load(&cli.data_file)?;
            let summary = store.set_final_score(&game_id, home_score, away_score)?;
            store.save(&cli.data_file)?;
            println!(
                "Game {} final {}-{}; graded {} games ({} picks)",
                game_id, home_score, away_score, summary.games_graded, summary.picks_graded
            );
        }
    }

    Ok(())
}
