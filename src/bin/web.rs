use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use pickem::config::Config;
use pickem::leaderboard::{build_leaderboard, LeaderboardEntry};
use pickem::odds_api::OddsApiClient;
use pickem::scores_api::ScoresApiClient;
use pickem::spread_grader::GradingSummary;
use pickem::{
    apply_week_data, current_season, current_week, fetch_week_data, Game, Pick, PickSelection,
    PickemStore, Role, StoreError, Team, User, WeekSettings,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Shared state: the store plus where to persist it
#[derive(Clone)]
struct AppState {
    store: Arc<RwLock<PickemStore>>,
    data_file: Arc<PathBuf>,
}

impl AppState {
    fn new(store: PickemStore, data_file: PathBuf) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            data_file: Arc::new(data_file),
        }
    }
}

/// Error body is always `{"message": "..."}`
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GameNotFound(_) | StoreError::UserNotFound(_) | StoreError::PickNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::UsernameTaken | StoreError::EmptyUsername | StoreError::Submission(_) => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(err) => {
                error!(error = ?err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn persist(state: &AppState, store: &PickemStore) -> std::result::Result<(), ApiError> {
    store.save(state.data_file.as_path())?;
    Ok(())
}

#[derive(Deserialize)]
struct SeasonQuery {
    season: Option<i32>,
}

impl SeasonQuery {
    fn season(&self) -> i32 {
        self.season.unwrap_or_else(|| current_season(Utc::now()))
    }
}

/// A game with its teams resolved
#[derive(Serialize)]
struct GameView {
    #[serde(flatten)]
    game: Game,
    home_team_info: Option<Team>,
    away_team_info: Option<Team>,
}

fn game_views(store: &PickemStore, week: u32, season: i32) -> Vec<GameView> {
    store
        .games_for_week(week, season)
        .into_iter()
        .map(|game| GameView {
            game: game.clone(),
            home_team_info: store.team(&game.home_team).cloned(),
            away_team_info: store.team(&game.away_team).cloned(),
        })
        .collect()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK", "timestamp": Utc::now() }))
}

// Games

async fn games_for_week(
    State(state): State<AppState>,
    Path(week): Path<u32>,
    Query(query): Query<SeasonQuery>,
) -> ApiResult<Vec<GameView>> {
    let store = state.store.read().await;
    Ok(Json(game_views(&store, week, query.season())))
}

#[derive(Serialize)]
struct CurrentWeekResponse {
    week: u32,
    season: i32,
    games: Vec<GameView>,
}

async fn current_games(State(state): State<AppState>) -> ApiResult<CurrentWeekResponse> {
    let now = Utc::now();
    let (week, season) = (current_week(now), current_season(now));
    let store = state.store.read().await;
    Ok(Json(CurrentWeekResponse {
        week,
        season,
        games: game_views(&store, week, season),
    }))
}

#[derive(Deserialize)]
struct UpdateSpreadRequest {
    game_id: String,
    home_spread: f64,
    away_spread: f64,
    #[serde(default)]
    is_locked: bool,
}

#[derive(Serialize)]
struct UpdateSpreadResponse {
    game: Game,
    regraded: Option<GradingSummary>,
}

async fn update_spread(
    State(state): State<AppState>,
    Json(req): Json<UpdateSpreadRequest>,
) -> ApiResult<UpdateSpreadResponse> {
    let mut store = state.store.write().await;
    let regraded = store.update_spread(&req.game_id, req.home_spread, req.away_spread, req.is_locked)?;
    persist(&state, &store)?;

    info!(
        game_id = %req.game_id,
        home_spread = req.home_spread,
        away_spread = req.away_spread,
        "Spread updated"
    );
    let game = store
        .game(&req.game_id)
        .cloned()
        .ok_or_else(|| StoreError::GameNotFound(req.game_id.clone()))?;
    Ok(Json(UpdateSpreadResponse { game, regraded }))
}

#[derive(Deserialize)]
struct WeekLockRequest {
    week: u32,
    season: i32,
    is_locked: bool,
}

async fn lock_spreads(
    State(state): State<AppState>,
    Json(req): Json<WeekLockRequest>,
) -> ApiResult<serde_json::Value> {
    let mut store = state.store.write().await;
    let changed = store.lock_spreads(req.week, req.season, req.is_locked);
    persist(&state, &store)?;

    let verb = if req.is_locked { "Locked" } else { "Unlocked" };
    Ok(Json(json!({
        "message": format!("{} spreads for {} games in week {}", verb, changed, req.week),
        "games_updated": changed,
    })))
}

#[derive(Deserialize)]
struct FinalScoreRequest {
    game_id: String,
    home_score: u32,
    away_score: u32,
}

async fn final_score(
    State(state): State<AppState>,
    Json(req): Json<FinalScoreRequest>,
) -> ApiResult<GradingSummary> {
    let mut store = state.store.write().await;
    let summary = store.set_final_score(&req.game_id, req.home_score, req.away_score)?;
    persist(&state, &store)?;
    Ok(Json(summary))
}

// Users

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    #[serde(default)]
    display_name: String,
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> std::result::Result<(StatusCode, Json<User>), ApiError> {
    let mut store = state.store.write().await;
    let user = store.add_user(&req.username, &req.display_name)?.clone();
    persist(&state, &store)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let store = state.store.read().await;
    Ok(Json(store.users_by_name().into_iter().cloned().collect()))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<User> {
    let mut store = state.store.write().await;
    let user = store.delete_user(&user_id)?;
    store.update_user_totals();
    persist(&state, &store)?;
    Ok(Json(user))
}

#[derive(Deserialize)]
struct UpdateRoleRequest {
    user_id: String,
    role: Role,
}

async fn update_role(
    State(state): State<AppState>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<User> {
    let mut store = state.store.write().await;
    let user = store.set_role(&req.user_id, req.role)?.clone();
    persist(&state, &store)?;
    Ok(Json(user))
}

// Picks

async fn user_picks_for_week(
    State(state): State<AppState>,
    Path((user_id, week)): Path<(String, u32)>,
    Query(query): Query<SeasonQuery>,
) -> ApiResult<Vec<Pick>> {
    let store = state.store.read().await;
    if store.user(&user_id).is_none() {
        return Err(StoreError::UserNotFound(user_id).into());
    }
    let picks = store
        .user_picks_for_week(&user_id, week, query.season())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(picks))
}

#[derive(Deserialize)]
struct SubmitPicksRequest {
    week: u32,
    season: i32,
    picks: Vec<PickSelection>,
}

async fn submit_picks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<SubmitPicksRequest>,
) -> ApiResult<Vec<Pick>> {
    let mut store = state.store.write().await;
    let picks = store.submit_picks(&user_id, req.week, req.season, &req.picks, Utc::now())?;
    persist(&state, &store)?;
    Ok(Json(picks))
}

#[derive(Deserialize)]
struct AdminSubmitRequest {
    user_id: String,
    week: u32,
    season: i32,
    picks: Vec<PickSelection>,
}

async fn admin_submit_for_user(
    State(state): State<AppState>,
    Json(req): Json<AdminSubmitRequest>,
) -> ApiResult<Vec<Pick>> {
    let mut store = state.store.write().await;
    let picks = store.admin_submit_picks(&req.user_id, req.week, req.season, &req.picks)?;
    persist(&state, &store)?;

    info!(user_id = %req.user_id, week = req.week, "Admin submitted picks");
    Ok(Json(picks))
}

#[derive(Deserialize)]
struct PickResultRequest {
    pick_id: String,
    is_correct: bool,
}

async fn update_pick_result(
    State(state): State<AppState>,
    Json(req): Json<PickResultRequest>,
) -> ApiResult<Pick> {
    let mut store = state.store.write().await;
    let pick = store
        .update_pick_result(&req.pick_id, req.is_correct)?
        .clone();
    store.update_user_totals();
    persist(&state, &store)?;
    Ok(Json(pick))
}

async fn lock_week(
    State(state): State<AppState>,
    Json(req): Json<WeekLockRequest>,
) -> ApiResult<WeekSettings> {
    let mut store = state.store.write().await;
    let settings = store.lock_week(req.week, req.season, req.is_locked).clone();
    persist(&state, &store)?;
    Ok(Json(settings))
}

#[derive(Deserialize)]
struct DeadlineRequest {
    week: u32,
    season: i32,
    deadline: DateTime<Utc>,
}

async fn set_deadline(
    State(state): State<AppState>,
    Json(req): Json<DeadlineRequest>,
) -> ApiResult<WeekSettings> {
    let mut store = state.store.write().await;
    let settings = store.set_deadline(req.week, req.season, req.deadline).clone();
    persist(&state, &store)?;
    Ok(Json(settings))
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<SeasonQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let store = state.store.read().await;
    Ok(Json(build_leaderboard(&store.picks, &store.users, query.season())))
}

async fn recalculate_all(State(state): State<AppState>) -> ApiResult<GradingSummary> {
    let mut store = state.store.write().await;
    let summary = store.run_grading_pass();
    persist(&state, &store)?;
    Ok(Json(summary))
}

async fn update_user_points(State(state): State<AppState>) -> ApiResult<BTreeMap<String, u32>> {
    let mut store = state.store.write().await;
    let totals = store.update_user_totals();
    persist(&state, &store)?;
    Ok(Json(totals))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/games/week/:week", get(games_for_week))
        .route("/games/current", get(current_games))
        .route("/games/admin/update-spread", put(update_spread))
        .route("/games/admin/lock-spreads", put(lock_spreads))
        .route("/games/admin/final-score", put(final_score))
        .route("/users", post(create_user).get(list_users))
        .route("/users/update-role", put(update_role))
        .route("/users/:user_id", delete(delete_user))
        .route("/users/:user_id/picks", post(submit_picks))
        .route("/users/:user_id/picks/week/:week", get(user_picks_for_week))
        .route("/picks/admin/submit-for-user", post(admin_submit_for_user))
        .route("/picks/admin/update-pick-result", put(update_pick_result))
        .route("/picks/admin/lock-week", post(lock_week))
        .route("/picks/admin/deadline", post(set_deadline))
        .route("/picks/leaderboard", get(leaderboard))
        .route("/picks/recalculate-all", post(recalculate_all))
        .route("/picks/update-user-points", post(update_user_points))
}

fn app(state: AppState, static_dir: PathBuf) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Pull the current week on a timer. The network fetch runs without the
/// store lock; only the apply step takes it.
async fn refresh_loop(state: AppState, scores_client: ScoresApiClient, odds_client: OddsApiClient, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;

        let now = Utc::now();
        let (season, week) = (current_season(now), current_week(now));
        let data = match fetch_week_data(&scores_client, &odds_client, season, week).await {
            Ok(data) => data,
            Err(e) => {
                error!(error = ?e, season, week, "Scheduled refresh failed");
                continue;
            }
        };

        let mut store = state.store.write().await;
        let summary = apply_week_data(&mut store, &data);
        if let Err(e) = store.save(state.data_file.as_path()) {
            error!(error = ?e, "Failed to save store after refresh");
        }
        info!(
            season,
            week,
            games_updated = summary.games_updated,
            picks_graded = summary.grading.picks_graded,
            "Scheduled refresh complete"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let store = PickemStore::load(&config.data_file)?;
    info!(
        games = store.games.len(),
        users = store.users.len(),
        picks = store.picks.len(),
        "Loaded store from {}",
        config.data_file.display()
    );
    let state = AppState::new(store, config.data_file.clone());

    match (&config.api_sports_key, &config.odds_api_key) {
        (Some(sports_key), Some(odds_key)) if config.refresh_enabled() => {
            let every = config.refresh_interval();
            info!("Refreshing scores and spreads every {} minutes", config.refresh_interval_minutes);
            tokio::spawn(refresh_loop(
                state.clone(),
                ScoresApiClient::new(sports_key.clone()),
                OddsApiClient::new(odds_key.clone()),
                every,
            ));
        }
        _ => info!("API keys not set, scheduled refresh disabled"),
    }

    let app = app(state, config.static_dir.clone());

    // Run server
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
