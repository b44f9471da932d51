//! HTTP control surface for a running encounter.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    arena::PlayerId,
    encounter::{EncounterSnapshot, KillOutcome},
    loot::{ContainerOpen, ContainerOutcome},
    reward::KillEvent,
    scores::Standing,
    service::{EncounterService, ReloadSummary},
};

pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
    pub tick: Duration,
}

type AppState = Arc<EncounterService>;

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl ToString) -> Self {
        Self {
            status,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            error: String,
        }
        (self.status, Json(Body { error: self.message })).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub started: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct LootReloadResponse {
    pub reloaded: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeathReport {
    pub player: PlayerId,
}

#[derive(Debug, Serialize)]
pub struct DeathResponse {
    pub player: PlayerId,
    pub deaths: u32,
}

#[derive(Debug, Serialize)]
pub struct PlayerPoints {
    pub player: PlayerId,
    pub points: u32,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStarted {
    pub name: String,
    pub archived: usize,
}

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/api/state", get(state))
        .route("/api/events", get(stream_events))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/leaderboard/reset", post(reset_leaderboard))
        .route("/api/players/:player/points", get(player_points))
        .route("/api/sessions", get(list_sessions).post(start_session))
        .route("/api/sessions/:name", get(view_session))
        .route("/api/waves/start", post(start_waves))
        .route("/api/waves/stop", post(stop_waves))
        .route("/api/reload", post(reload_config))
        .route("/api/loot/reload", post(reload_loot))
        .route("/api/kills", post(report_kill))
        .route("/api/deaths", post(report_death))
        .route("/api/containers/open", post(open_container))
        .with_state(service)
}

/// Serves the control surface until Ctrl-C, ticking the encounter meanwhile.
pub async fn run(service: Arc<EncounterService>, config: WebServerConfig) -> Result<()> {
    let WebServerConfig { host, port, tick } = config;
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let driver = service.spawn_driver(tick);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, tick_ms = tick.as_millis() as u64, "encounter control surface listening");

    axum::serve(listener, router(Arc::clone(&service)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown();
    if let Err(err) = driver.await {
        warn!("driver task failed: {err}");
    }
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down control surface");
}

async fn state(State(service): State<AppState>) -> Json<EncounterSnapshot> {
    Json(service.with_controller(|c| c.snapshot()))
}

async fn leaderboard(State(service): State<AppState>) -> Json<Vec<Standing>> {
    Json(service.with_controller(|c| c.leaderboard()))
}

async fn reset_leaderboard(State(service): State<AppState>) -> Json<Vec<Standing>> {
    Json(service.with_controller(|c| {
        c.reset_leaderboard();
        c.leaderboard()
    }))
}

async fn player_points(
    State(service): State<AppState>,
    Path(player): Path<String>,
) -> Json<PlayerPoints> {
    let player = PlayerId(player);
    let points = service.with_controller(|c| c.points(&player));
    Json(PlayerPoints { player, points })
}

async fn list_sessions(State(service): State<AppState>) -> Json<Vec<String>> {
    Json(service.with_controller(|c| c.sessions()))
}

async fn start_session(
    State(service): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionStarted>, ApiError> {
    let archived = service
        .with_controller(|c| c.start_session(&request.name))
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err))?;
    Ok(Json(SessionStarted {
        name: request.name.trim().to_string(),
        archived,
    }))
}

async fn view_session(
    State(service): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Standing>>, ApiError> {
    service
        .with_controller(|c| c.session(&name))
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("session '{name}' does not exist")))
}

async fn start_waves(State(service): State<AppState>) -> Result<Json<StartResponse>, ApiError> {
    service
        .with_controller(|c| c.start_waves())
        .map(|()| Json(StartResponse { started: true }))
        .map_err(|err| ApiError::new(StatusCode::CONFLICT, err))
}

async fn stop_waves(State(service): State<AppState>) -> Json<StopResponse> {
    let stopped = service.with_controller(|c| c.stop_waves());
    Json(StopResponse { stopped })
}

async fn reload_config(State(service): State<AppState>) -> Result<Json<ReloadSummary>, ApiError> {
    service
        .reload_config()
        .map(Json)
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}")))
}

async fn reload_loot(State(service): State<AppState>) -> Json<LootReloadResponse> {
    service.reload_loot();
    Json(LootReloadResponse { reloaded: true })
}

async fn report_kill(
    State(service): State<AppState>,
    Json(kill): Json<KillEvent>,
) -> Json<Option<KillOutcome>> {
    Json(service.with_controller(|c| c.on_mob_killed(&kill)))
}

async fn report_death(
    State(service): State<AppState>,
    Json(report): Json<DeathReport>,
) -> Json<DeathResponse> {
    let deaths = service.with_controller(|c| c.on_player_death(&report.player));
    Json(DeathResponse {
        player: report.player,
        deaths,
    })
}

async fn open_container(
    State(service): State<AppState>,
    Json(open): Json<ContainerOpen>,
) -> Result<Json<ContainerOutcome>, ApiError> {
    service
        .with_controller(|c| c.on_container_open(&open))
        .map(Json)
        .map_err(|err| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, err))
}

async fn stream_events(
    State(service): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = service.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arena::{MobKind, SimulatedArena},
        clock::ManualClock,
        config::from_yaml_str,
        encounter::EncounterController,
        loot::BlockPos,
        wave::WavePhase,
    };

    const CONFIG: &str = r#"
spawner:
  waves:
    - { name: Only, duration: 3, spawnInterval: 1, mobs: { zombie: 1 } }
chest:
  tier-chances: { common: 1 }
  tiers:
    common:
      loot:
        - { item: bread, weight: 1 }
"#;

    fn app() -> AppState {
        Arc::new(EncounterService::new(EncounterController::new(
            from_yaml_str(CONFIG).config,
            SimulatedArena::new(),
            Arc::new(ManualClock::new()),
            5,
        )))
    }

    #[tokio::test]
    async fn test_start_twice_conflicts() {
        let service = app();
        let Json(first) = start_waves(State(service.clone())).await.unwrap();
        assert!(first.started);
        let err = start_waves(State(service.clone())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let Json(stop) = stop_waves(State(service.clone())).await;
        assert!(stop.stopped);
        let Json(snapshot) = state(State(service)).await;
        assert_eq!(snapshot.run.phase, WavePhase::Idle);
    }

    #[tokio::test]
    async fn test_kill_and_death_reports() {
        let service = app();
        let kill = KillEvent {
            killer: Some(PlayerId("ana".to_string())),
            victim: MobKind::new("zombie"),
            wave_spawned: true,
            world: "world".to_string(),
        };
        let Json(outcome) = report_kill(State(service.clone()), Json(kill)).await;
        assert_eq!(outcome.unwrap().total, 1);

        let Json(death) = report_death(
            State(service.clone()),
            Json(DeathReport {
                player: PlayerId("ana".to_string()),
            }),
        )
        .await;
        assert_eq!(death.deaths, 1);

        let Json(board) = leaderboard(State(service)).await;
        assert_eq!(board.len(), 1);
        assert_eq!((board[0].points, board[0].deaths), (1, 1));
    }

    #[tokio::test]
    async fn test_sessions_and_player_points() {
        let service = app();
        let kill = KillEvent {
            killer: Some(PlayerId("ana".to_string())),
            victim: MobKind::new("zombie"),
            wave_spawned: true,
            world: "world".to_string(),
        };
        report_kill(State(service.clone()), Json(kill)).await;
        let Json(points) = player_points(State(service.clone()), Path("ana".to_string())).await;
        assert_eq!(points.points, 1);

        let Json(started) = start_session(
            State(service.clone()),
            Json(SessionRequest {
                name: "opening".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(started.archived, 1);
        let Json(points) = player_points(State(service.clone()), Path("ana".to_string())).await;
        assert_eq!(points.points, 0);

        let Json(names) = list_sessions(State(service.clone())).await;
        assert_eq!(names, vec!["opening".to_string()]);
        let Json(archived) = view_session(State(service.clone()), Path("opening".to_string()))
            .await
            .unwrap();
        assert_eq!(archived[0].points, 1);

        let missing = view_session(State(service.clone()), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        let blank = start_session(
            State(service),
            Json(SessionRequest {
                name: " ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_container_open_route() {
        let service = app();
        let open = ContainerOpen {
            location: BlockPos {
                world: "world".to_string(),
                x: 0,
                y: 0,
                z: 0,
            },
            loot_container: true,
            empty: true,
            slots: 9,
        };
        let Json(first) = open_container(State(service.clone()), Json(open.clone()))
            .await
            .unwrap();
        assert!(matches!(first, ContainerOutcome::Filled(_)));
        let Json(second) = open_container(State(service), Json(open)).await.unwrap();
        assert_eq!(second, ContainerOutcome::AlreadyRolled);
    }
}
