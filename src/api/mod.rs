use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::error::DataError;
use crate::models::{
    ApiResponse, ClassificationAggregate, HeatmapPanel, JoinedRecord, Metric, PostYearSection,
    SeasonList, SeedAggregate, SeedLeaderboard, SuccessFactorsView, TeamSeasonRecord,
};
use crate::services::playback::{spawn_driver, Frame, PlaybackCommand, PlaybackHandle};
use crate::services::posts::{filter_posts, PostQuery};
use crate::services::{
    classification_best_teams, heatmap_panels, join_classifications, race_frames, seed_best_teams,
    success_factors, AppContext,
};

const UNAVAILABLE_MESSAGE: &str = "Failed to load visualization. Please try again later.";

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    pub default_year: i32,
    pub playback: Result<PlaybackHandle, DataError>,
}

pub async fn serve(port: u16, config: Config) -> anyhow::Result<()> {
    let ctx = AppContext::load(&config).await;
    let app = create_router(Arc::new(ctx), &config);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("BracketLens API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router. Spawns the shared playback driver, so this must run
/// inside a tokio runtime.
pub fn create_router(ctx: Arc<AppContext>, config: &Config) -> Router {
    let playback = ctx
        .playback()
        .map(|playback| spawn_driver(playback, config.playback_cadence).0);
    let state = AppState {
        ctx,
        default_year: config.default_year,
        playback,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/seasons", get(seasons_handler))
        .route("/seeds", get(seeds_handler))
        .route("/race", get(race_handler))
        .route("/classifications", get(classifications_handler))
        .route("/classifications/best", get(classification_best_handler))
        .route("/heatmaps", get(heatmaps_handler))
        .route("/success-factors", get(success_factors_handler))
        .route("/posts", get(posts_handler))
        .route("/playback", get(playback_status_handler))
        .route("/playback/play", post(playback_play_handler))
        .route("/playback/pause", post(playback_pause_handler))
        .route("/playback/toggle", post(playback_toggle_handler))
        .route("/playback/reset", post(playback_reset_handler))
        .route("/playback/select", post(playback_select_handler))
        .fallback_service(ServeDir::new(&config.site_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Error half of every handler: a status plus an `ApiResponse` error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Unavailable { .. } => {
                tracing::error!("{}", err);
                ApiError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: UNAVAILABLE_MESSAGE.to_string(),
                }
            }
            DataError::EmptySeason(_) => ApiError {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            DataError::InvalidQuery(message) => ApiError {
                status: StatusCode::BAD_REQUEST,
                message,
            },
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// Numbers arrive as strings so a malformed value still gets an `ApiResponse` body.
#[derive(Debug, Default, Deserialize)]
struct SeasonQuery {
    year: Option<String>,
    metric: Option<String>,
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, DataError> {
    raw.trim()
        .parse()
        .map_err(|_| DataError::InvalidQuery(format!("invalid {} '{}'", name, raw)))
}

impl SeasonQuery {
    fn year(&self, state: &AppState) -> Result<i32, DataError> {
        match self.year.as_deref().map(str::trim) {
            None | Some("") => Ok(state.default_year),
            Some(raw) => parse_param("year", raw),
        }
    }

    fn metric(&self, default: Metric) -> Result<Metric, DataError> {
        match self.metric.as_deref() {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse().map_err(DataError::InvalidQuery),
        }
    }
}

fn season_records(teams: &[TeamSeasonRecord], year: i32) -> impl Iterator<Item = &TeamSeasonRecord> {
    teams.iter().filter(move |r| r.season == year)
}

// GET /health
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("BracketLens API is running"))
}

// GET /seasons
async fn seasons_handler(State(state): State<AppState>) -> ApiResult<SeasonList> {
    ok(state.ctx.seasons()?)
}

// GET /seeds?year=&metric=
async fn seeds_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<Vec<SeedAggregate>> {
    let metric = params.metric(Metric::NetRating)?;
    let year = params.year(&state)?;
    let teams = state.ctx.teams()?;
    ok(seed_best_teams(season_records(&teams, year), metric))
}

// GET /race
async fn race_handler(State(state): State<AppState>) -> ApiResult<BTreeMap<i32, Vec<SeedLeaderboard>>> {
    let teams = state.ctx.teams()?;
    ok(race_frames(&teams, state.ctx.skip_seasons()))
}

// GET /classifications?year=
async fn classifications_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<Vec<JoinedRecord>> {
    let year = params.year(&state)?;
    let teams = state.ctx.teams()?;
    let classifications = state.ctx.classifications()?;
    let participants = season_records(&teams, year).filter(|r| r.seed.is_some());
    ok(join_classifications(participants, &classifications))
}

// GET /classifications/best?year=&metric=
async fn classification_best_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<Vec<ClassificationAggregate>> {
    let metric = params.metric(Metric::NetRating)?;
    let year = params.year(&state)?;
    let teams = state.ctx.teams()?;
    let classifications = state.ctx.classifications()?;
    let participants = season_records(&teams, year).filter(|r| r.seed.is_some());
    let joined = join_classifications(participants, &classifications);
    ok(classification_best_teams(&joined, metric))
}

// GET /heatmaps?year=
async fn heatmaps_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<Vec<HeatmapPanel>> {
    let year = params.year(&state)?;
    let teams = state.ctx.teams()?;
    let classifications = state.ctx.classifications()?;
    ok(heatmap_panels(&teams, &classifications, year)?)
}

// GET /success-factors?year=&metric=
async fn success_factors_handler(
    State(state): State<AppState>,
    Query(params): Query<SeasonQuery>,
) -> ApiResult<SuccessFactorsView> {
    let metric = params.metric(Metric::AdjustedOffense)?;
    let year = params.year(&state)?;
    let teams = state.ctx.teams()?;
    ok(success_factors(&teams, year, metric))
}

#[derive(Serialize)]
struct PostsResponse {
    total: usize,
    sections: Vec<PostYearSection>,
}

// GET /posts?q=&tag=
async fn posts_handler(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> ApiResult<PostsResponse> {
    let posts = state.ctx.posts()?;
    let sections = filter_posts(&posts, &query);
    ok(PostsResponse {
        total: sections.iter().map(|s| s.posts.len()).sum(),
        sections,
    })
}

#[derive(Serialize)]
struct PlaybackStatus {
    years: Vec<i32>,
    frame: Frame,
}

fn playback_status(state: &AppState, frame: Frame) -> ApiResult<PlaybackStatus> {
    let years = state.ctx.playback()?.years().to_vec();
    ok(PlaybackStatus { years, frame })
}

async fn apply_playback(state: &AppState, command: PlaybackCommand) -> ApiResult<PlaybackStatus> {
    let handle = state.playback.as_ref().map_err(Clone::clone)?;
    let frame = handle.send(command).await?;
    playback_status(state, frame)
}

// GET /playback
async fn playback_status_handler(State(state): State<AppState>) -> ApiResult<PlaybackStatus> {
    let frame = state.playback.as_ref().map_err(Clone::clone)?.current();
    playback_status(&state, frame)
}

// POST /playback/play
async fn playback_play_handler(State(state): State<AppState>) -> ApiResult<PlaybackStatus> {
    apply_playback(&state, PlaybackCommand::Play).await
}

// POST /playback/pause
async fn playback_pause_handler(State(state): State<AppState>) -> ApiResult<PlaybackStatus> {
    apply_playback(&state, PlaybackCommand::Pause).await
}

// POST /playback/toggle
async fn playback_toggle_handler(State(state): State<AppState>) -> ApiResult<PlaybackStatus> {
    apply_playback(&state, PlaybackCommand::Toggle).await
}

// POST /playback/reset
async fn playback_reset_handler(State(state): State<AppState>) -> ApiResult<PlaybackStatus> {
    apply_playback(&state, PlaybackCommand::Reset).await
}

#[derive(Debug, Deserialize)]
struct SelectQuery {
    index: Option<String>,
}

// POST /playback/select?index=
async fn playback_select_handler(
    State(state): State<AppState>,
    Query(params): Query<SelectQuery>,
) -> ApiResult<PlaybackStatus> {
    let raw = params
        .index
        .ok_or_else(|| DataError::InvalidQuery("missing season index".to_string()))?;
    let index: usize = parse_param("season index", &raw)?;
    apply_playback(&state, PlaybackCommand::Select(index)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, ClassificationRecord, MetricValues, Post, Seed};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use serde_json::Value;
    use tower::ServiceExt;

    fn team(season: i32, name: &str, seed: u8, net: f64) -> TeamSeasonRecord {
        TeamSeasonRecord {
            season,
            team: name.to_string(),
            conference: Some("Big 12".to_string()),
            short_conference: None,
            coach: None,
            postseason: Some("March Madness".to_string()),
            seed: Seed::new(seed),
            metrics: MetricValues {
                net_rating: Some(net),
                adjusted_offense: Some(110.0 + net),
                adjusted_defense: Some(100.0 - net),
                adjusted_tempo: Some(68.0),
                experience: Some(net / 10.0),
            },
        }
    }

    fn context() -> AppContext {
        let teams = vec![
            team(2024, "Houston", 1, 30.0),
            team(2024, "Purdue", 1, 31.0),
            team(2024, "Iowa St.", 2, 28.0),
            team(2023, "Alabama", 1, 27.0),
        ];
        let classifications = vec![ClassificationRecord {
            year: 2024,
            team: "Purdue".to_string(),
            classification: Classification::FinalFour,
        }];
        let posts = vec![Post {
            slug: "bracket".to_string(),
            title: "Bracket notes".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
            description: "Seeds".to_string(),
            tags: vec!["ncaa".to_string()],
        }];
        AppContext::from_parts(
            Ok(Arc::from(teams)),
            Ok(Arc::from(classifications)),
            Ok(Arc::from(posts)),
            vec![2020, 2025],
        )
    }

    fn router(ctx: AppContext) -> Router {
        let config = Config {
            site_dir: std::env::temp_dir().join("bracketlens-missing-site"),
            ..Config::default()
        };
        create_router(Arc::new(ctx), &config)
    }

    async fn send_json(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        send_json(app, "GET", uri).await
    }

    #[tokio::test]
    async fn test_seeds_endpoint() {
        let (status, body) = get_json(router(context()), "/seeds?year=2024&metric=net").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["seed"], 1);
        assert_eq!(data[0]["team"], "Purdue");
        assert_eq!(data[1]["team"], "Iowa St.");
    }

    #[tokio::test]
    async fn test_invalid_metric_is_bad_request() {
        let (status, body) = get_json(router(context()), "/seeds?metric=wingspan").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unavailable_data_returns_503() {
        let ctx = AppContext::from_parts(
            Err(DataError::unavailable("team season data", "timed out")),
            Ok(Arc::from(Vec::new())),
            Ok(Arc::from(Vec::new())),
            Vec::new(),
        );

        let (status, body) = get_json(router(ctx.clone()), "/heatmaps?year=2024").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], UNAVAILABLE_MESSAGE);

        // posts are an independent source
        let (status, _) = get_json(router(ctx), "/posts").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_classification_best() {
        let (status, body) = get_json(router(context()), "/classifications/best?year=2024").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        let teams: Vec<&str> = data.iter().map(|d| d["team"].as_str().unwrap()).collect();
        assert!(teams.contains(&"Purdue"));
        assert!(teams.contains(&"Houston"));
    }

    #[tokio::test]
    async fn test_race_and_seasons() {
        let (status, body) = get_json(router(context()), "/race").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["2023"].is_array());
        assert!(body["data"]["2024"].is_array());

        let (_, body) = get_json(router(context()), "/seasons").await;
        assert_eq!(body["data"]["playback"], serde_json::json!([2023, 2024]));
    }

    #[tokio::test]
    async fn test_posts_filter() {
        let (_, body) = get_json(router(context()), "/posts?q=bracket&tag=ncaa").await;
        assert_eq!(body["data"]["total"], 1);

        let (_, body) = get_json(router(context()), "/posts?q=nothing").await;
        assert_eq!(body["data"]["total"], 0);
    }

    #[tokio::test]
    async fn test_empty_season_heatmaps() {
        let (status, _) = get_json(router(context()), "/heatmaps?year=1999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(router(context()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_classifications_keep_every_seeded_team() {
        let (status, body) = get_json(router(context()), "/classifications?year=2024").await;
        assert_eq!(status, StatusCode::OK);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);

        let purdue = data.iter().find(|d| d["team"] == "Purdue").unwrap();
        assert_eq!(purdue["classification"], "Final Four");
        let unmatched = data.iter().filter(|d| d["classification"] == "Other").count();
        assert_eq!(unmatched, 2);
    }

    #[tokio::test]
    async fn test_success_factors_endpoint() {
        let (status, body) = get_json(router(context()), "/success-factors?year=2024&metric=tempo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["points"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"]["conferences"], serde_json::json!(["Big 12"]));
        assert_eq!(body["data"]["y_extent"], serde_json::json!([28.0, 31.0]));
    }

    #[tokio::test]
    async fn test_malformed_year_is_json_bad_request() {
        let (status, body) = get_json(router(context()), "/seeds?year=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "invalid year 'abc'");

        let (status, _) = get_json(router(context()), "/heatmaps?year=20x4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_playback_controls() {
        let app = router(context());

        let (status, body) = get_json(app.clone(), "/playback").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["years"], serde_json::json!([2023, 2024]));
        assert_eq!(body["data"]["frame"]["index"], 0);

        let (_, body) = send_json(app.clone(), "POST", "/playback/play").await;
        assert_eq!(body["data"]["frame"]["playing"], true);

        let (_, body) = send_json(app.clone(), "POST", "/playback/pause").await;
        assert_eq!(body["data"]["frame"]["playing"], false);

        let (_, body) = send_json(app.clone(), "POST", "/playback/toggle").await;
        assert_eq!(body["data"]["frame"]["playing"], true);

        // selecting a season halts playback
        let (status, body) = send_json(app.clone(), "POST", "/playback/select?index=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["frame"]["year"], 2024);
        assert_eq!(body["data"]["frame"]["playing"], false);

        // nothing left to play from the last season
        let (_, body) = send_json(app.clone(), "POST", "/playback/toggle").await;
        assert_eq!(body["data"]["frame"]["playing"], false);

        let (status, body) = send_json(app.clone(), "POST", "/playback/select?index=5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send_json(app.clone(), "POST", "/playback/select?index=last").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send_json(app.clone(), "POST", "/playback/reset").await;
        assert_eq!(body["data"]["frame"]["index"], 0);
        assert_eq!(body["data"]["frame"]["year"], 2023);
    }

    #[tokio::test]
    async fn test_playback_unavailable_without_teams() {
        let ctx = AppContext::from_parts(
            Err(DataError::unavailable("team season data", "timed out")),
            Ok(Arc::from(Vec::new())),
            Ok(Arc::from(Vec::new())),
            Vec::new(),
        );
        let (status, body) = send_json(router(ctx), "POST", "/playback/play").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], UNAVAILABLE_MESSAGE);
    }
}
