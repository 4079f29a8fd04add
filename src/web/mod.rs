//! HTTP API for the LinkPeek firewall service.
//!
//! Provides the firewall decision endpoint, the client toggle, analytics
//! reads, event ingestion, and an SSE decision stream. CORS is fully open
//! (the decision endpoint is called from arbitrary bio pages), so the router
//! carries a permissive [`CorsLayer`] that also answers OPTIONS preflights.
//!
//! - `POST /api/firewall/decision` — evaluate a redirect request
//! - `GET  /api/firewall/settings` — read a user's toggle and plan
//! - `PUT  /api/firewall/settings` — flip the toggle
//! - `GET  /api/firewall/stats`    — aggregate savings statistics
//! - `GET  /api/events`            — recent redirect events
//! - `POST /api/events/redirect`   — record a redirect outcome
//! - `POST /api/events/recovery`   — record a fallback invocation
//! - `GET  /api/events/stream`     — real-time SSE decision stream
//! - `GET  /api/benchmarks`        — per-platform benchmark rows
//! - `GET  /api/alerts`            — platforms currently below the floor
//! - `GET  /api/health`            — liveness probe
//!
//! Tracking endpoints (`/px.gif`, `/hooks/conversion`, `/sitemap.xml`) live in
//! the [`track`] submodule.

pub mod track;

use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{Any, CorsLayer};

use crate::alerts;
use crate::benchmarks;
use crate::config::{AlertConfig, FirewallConfig};
use crate::error::Result;
use crate::firewall::{self, Decision, DecisionRequest, Plan, Profile};
use crate::scorer::RiskScorer;
use crate::scorer::patterns::SignatureTable;
use crate::store::{self, DbPool, DecisionEvent};

/// Shared application state for all handlers.
pub struct AppState {
    /// SQLite connection pool.
    pub db: DbPool,
    /// Firewall thresholds (hot-reloadable).
    pub firewall: Arc<RwLock<FirewallConfig>>,
    /// Risk scoring backend.
    pub scorer: Arc<dyn RiskScorer>,
    /// Broadcast sender for subscribing to live decision events.
    pub event_tx: broadcast::Sender<DecisionEvent>,
    /// Alert thresholds for the `/api/alerts` read.
    pub alerts: AlertConfig,
    /// Public site base URL for sitemap generation.
    pub site_url: String,
    /// In-app-browser signatures for decorating decision events.
    pub signatures: SignatureTable,
}

/// Build the axum router with all API and tracking endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/firewall/decision", post(post_decision))
        .route(
            "/api/firewall/settings",
            get(get_settings).put(put_settings),
        )
        .route("/api/firewall/stats", get(get_stats))
        .route("/api/events", get(get_events))
        .route("/api/events/redirect", post(post_redirect_event))
        .route("/api/events/recovery", post(post_recovery_event))
        .route("/api/events/stream", get(get_event_stream))
        .route("/api/benchmarks", get(get_benchmarks))
        .route("/api/alerts", get(get_alerts))
        .route("/api/health", get(get_health))
        .merge(track::router())
        .layer(cors)
        .with_state(state)
}

/// Start the web server on the given address.
pub async fn start(listen_addr: &str, state: Arc<AppState>) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("LinkPeek firewall listening on {}", listen_addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::LinkPeekError::Server(e.to_string()))?;
    Ok(())
}

// ─── Query / Body Types ─────────────────────────────────────────────────────

/// Query parameters for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Query parameters for `GET /api/firewall/settings`.
#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    pub user_id: String,
}

/// Body of `PUT /api/firewall/settings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub user_id: String,
    pub firewall_enabled: bool,
}

/// Settings as returned to the client toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub user_id: String,
    pub plan: Plan,
    pub firewall_enabled: bool,
}

impl From<Profile> for SettingsResponse {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            plan: p.plan,
            firewall_enabled: p.firewall_enabled,
        }
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

fn json_error(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// `POST /api/firewall/decision` — evaluate one redirect request.
///
/// Any internal failure fails open: HTTP 500 with a no-fallback decision so
/// the caller serves the direct redirect.
async fn post_decision(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecisionRequest>,
) -> impl IntoResponse {
    match evaluate_decision(&state, &req) {
        Ok(decision) => (StatusCode::OK, Json(decision)).into_response(),
        Err(e) => {
            tracing::error!("Firewall decision failed, failing open: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Decision::open("error"))).into_response()
        }
    }
}

fn evaluate_decision(state: &AppState, req: &DecisionRequest) -> Result<Decision> {
    let conn = state
        .db
        .get()
        .map_err(|e| crate::error::LinkPeekError::Pool(e.to_string()))?;
    let profile = store::get_profile(&conn, &req.user_id)?;
    let config = state.firewall.read().unwrap().clone();
    let decision = firewall::decide(profile.as_ref(), req, state.scorer.as_ref(), &config)?;

    // Lagged or absent subscribers are fine; send errors are ignored.
    let _ = state.event_tx.send(DecisionEvent {
        timestamp: store::now_rfc3339(),
        link_id: req.link_id.clone(),
        platform: req.platform.clone(),
        in_app_browser: state.signatures.match_platform(&req.user_agent).is_some(),
        use_fallback: decision.use_fallback,
        strategy: decision.strategy.clone(),
        risk_score: decision.risk_score,
        reason: decision.reason.clone(),
    });

    Ok(decision)
}

/// `GET /api/firewall/settings?user_id=` — read a user's toggle and plan.
async fn get_settings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SettingsQuery>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match store::get_profile(&conn, &params.user_id) {
        Ok(Some(profile)) => Json(SettingsResponse::from(profile)).into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "unknown user"),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `PUT /api/firewall/settings` — flip the firewall toggle.
async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match store::set_firewall_enabled(&conn, &update.user_id, update.firewall_enabled) {
        Ok(true) => {
            tracing::info!(
                "Firewall toggle for {} set to {}",
                update.user_id,
                update.firewall_enabled
            );
            Json(serde_json::json!({"status": "ok"})).into_response()
        }
        Ok(false) => json_error(StatusCode::NOT_FOUND, "unknown user"),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `GET /api/firewall/stats` — aggregate savings statistics.
async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match store::firewall_stats(&conn) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `GET /api/events` — recent redirect events as JSON.
async fn get_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match store::query_recent_redirects(&conn, params.limit) {
        Ok(events) => Json(events).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `POST /api/events/redirect` — record one redirect outcome (write-once).
async fn post_redirect_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<store::RedirectEvent>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match store::insert_redirect(&conn, &event) {
        Ok(id) => Json(serde_json::json!({"status": "ok", "id": id})).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `POST /api/events/recovery` — record one fallback invocation (write-once).
async fn post_recovery_event(
    State(state): State<Arc<AppState>>,
    Json(attempt): Json<store::RecoveryAttempt>,
) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match store::insert_recovery(&conn, &attempt) {
        Ok(id) => Json(serde_json::json!({"status": "ok", "id": id})).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `GET /api/events/stream` — SSE stream of live decision events.
async fn get_event_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data)))
        }
        Err(_) => None, // lagged receiver — skip
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /api/benchmarks` — all benchmark rows.
async fn get_benchmarks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match benchmarks::query_all(&conn) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `GET /api/alerts` — platforms currently below the success floor.
async fn get_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    match benchmarks::query_all(&conn) {
        Ok(rows) => Json(alerts::evaluate(&rows, &state.alerts)).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// `GET /api/health` — liveness probe.
async fn get_health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::HeuristicScorer;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt as _;

    /// Scorer returning a fixed score regardless of input.
    struct FixedScorer(u8);

    impl RiskScorer for FixedScorer {
        fn score(&self, _: &str, _: &str, _: Option<&str>) -> Result<u8> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenScorer;

    impl RiskScorer for BrokenScorer {
        fn score(&self, _: &str, _: &str, _: Option<&str>) -> Result<u8> {
            Err(crate::error::LinkPeekError::Scorer("down".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn test_state_with_scorer(scorer: Arc<dyn RiskScorer>) -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = store::open_pool(&dir.path().join("test.db")).unwrap();
        let (tx, _rx) = broadcast::channel(16);

        let conn = pool.get().unwrap();
        store::upsert_profile(
            &conn,
            &Profile {
                user_id: "u_pro".to_string(),
                plan: Plan::Pro,
                firewall_enabled: true,
            },
        )
        .unwrap();
        store::upsert_profile(
            &conn,
            &Profile {
                user_id: "u_free".to_string(),
                plan: Plan::Free,
                firewall_enabled: true,
            },
        )
        .unwrap();

        (
            Arc::new(AppState {
                db: pool,
                firewall: Arc::new(RwLock::new(FirewallConfig::default())),
                scorer,
                event_tx: tx,
                alerts: AlertConfig {
                    enabled: true,
                    ..AlertConfig::default()
                },
                site_url: "https://linkpeek.app".to_string(),
                signatures: SignatureTable::new(),
            }),
            dir,
        )
    }

    fn test_state(score: u8) -> (Arc<AppState>, tempfile::TempDir) {
        test_state_with_scorer(Arc::new(FixedScorer(score)))
    }

    fn decision_body(user_id: &str, platform: &str) -> String {
        serde_json::json!({
            "linkId": "lnk_1",
            "userAgent": "Instagram 300.0",
            "platform": platform,
            "userId": user_id,
        })
        .to_string()
    }

    async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = app.into_service().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.into_service().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn decision_medium_risk_instagram() {
        let (state, _dir) = test_state(55);
        let app = router(state);
        let (status, json) = post_json(
            app,
            "/api/firewall/decision",
            decision_body("u_pro", "instagram"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["useFallback"], true);
        assert_eq!(json["strategy"], "webview-recovery");
        assert_eq!(json["riskScore"], 55);
        assert_eq!(json["reason"], "medium_risk_instagram");
    }

    #[tokio::test]
    async fn decision_high_risk_any_platform() {
        let (state, _dir) = test_state(85);
        let app = router(state);
        let (status, json) = post_json(
            app,
            "/api/firewall/decision",
            decision_body("u_pro", "newsletter"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["strategy"], "webview-safe");
        assert_eq!(json["reason"], "high_risk_detected");
    }

    #[tokio::test]
    async fn decision_free_plan_is_disabled() {
        let (state, _dir) = test_state(85);
        let app = router(state);
        let (status, json) = post_json(
            app,
            "/api/firewall/decision",
            decision_body("u_free", "instagram"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["useFallback"], false);
        assert_eq!(json["riskScore"], 0);
        assert_eq!(json["reason"], "firewall_disabled");
    }

    #[tokio::test]
    async fn decision_scorer_failure_fails_open_with_500() {
        let (state, _dir) = test_state_with_scorer(Arc::new(BrokenScorer));
        let app = router(state);
        let (status, json) = post_json(
            app,
            "/api/firewall/decision",
            decision_body("u_pro", "instagram"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["useFallback"], false);
        assert_eq!(json["riskScore"], 0);
        assert_eq!(json["reason"], "error");
    }

    #[tokio::test]
    async fn decision_broadcasts_event() {
        let (state, _dir) = test_state(85);
        let mut rx = state.event_tx.subscribe();
        let app = router(state);
        post_json(
            app,
            "/api/firewall/decision",
            decision_body("u_pro", "instagram"),
        )
        .await;

        let event = rx.try_recv().unwrap();
        assert_eq!(event.link_id, "lnk_1");
        assert!(event.use_fallback);
        assert!(event.in_app_browser);
        assert_eq!(event.risk_score, 85);
    }

    #[tokio::test]
    async fn event_stream_delivers_live_decisions() {
        let (state, _dir) = test_state(0);
        let app = router(state.clone());
        let req = Request::builder()
            .uri("/api/events/stream")
            .body(Body::empty())
            .unwrap();
        let resp = app.into_service().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("text/event-stream")
        );

        // The handler has already subscribed, so this send is buffered
        // for the open stream.
        state
            .event_tx
            .send(DecisionEvent {
                timestamp: store::now_rfc3339(),
                link_id: "lnk_sse".to_string(),
                platform: "instagram".to_string(),
                in_app_browser: true,
                use_fallback: true,
                strategy: Some("webview-safe".to_string()),
                risk_score: 80,
                reason: "high_risk_detected".to_string(),
            })
            .unwrap();

        let mut body = resp.into_body().into_data_stream();
        let chunk = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.starts_with("data:"));
        assert!(text.contains("\"linkId\":\"lnk_sse\""));
        assert!(text.contains("\"strategy\":\"webview-safe\""));
    }

    #[tokio::test]
    async fn settings_roundtrip() {
        let (state, _dir) = test_state(0);
        let app = router(state.clone());
        let (status, json) = get_json(app, "/api/firewall/settings?user_id=u_pro").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["plan"], "pro");
        assert_eq!(json["firewallEnabled"], true);

        let app = router(state.clone());
        let body = serde_json::json!({"userId": "u_pro", "firewallEnabled": false}).to_string();
        let req = Request::builder()
            .method("PUT")
            .uri("/api/firewall/settings")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = app.into_service().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let app = router(state);
        let (_, json) = get_json(app, "/api/firewall/settings?user_id=u_pro").await;
        assert_eq!(json["firewallEnabled"], false);
    }

    #[tokio::test]
    async fn settings_unknown_user_is_404() {
        let (state, _dir) = test_state(0);
        let app = router(state);
        let (status, _) = get_json(app, "/api/firewall/settings?user_id=nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ingest_and_list_redirect_events() {
        let (state, _dir) = test_state(0);
        let app = router(state.clone());
        let body = serde_json::json!({
            "linkId": "lnk_9",
            "platform": "instagram",
            "deviceClass": "mobile",
            "country": "US",
            "success": true,
            "loadTimeMs": 350,
            "inAppBrowser": true,
            "fallbackUsed": true,
            "riskScore": 72,
            "strategy": "webview-safe",
        })
        .to_string();
        let (status, json) = post_json(app, "/api/events/redirect", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["id"], 1);

        let app = router(state);
        let (_, json) = get_json(app, "/api/events?limit=10").await;
        let events = json.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["linkId"], "lnk_9");
        assert_eq!(events[0]["fallbackUsed"], true);
    }

    #[tokio::test]
    async fn ingest_recovery_event() {
        let (state, _dir) = test_state(0);
        let app = router(state);
        let body = serde_json::json!({
            "platform": "instagram",
            "strategy": "webview-recovery",
            "success": true,
            "userId": "u_pro",
        })
        .to_string();
        let (status, json) = post_json(app, "/api/events/recovery", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn stats_reflect_ingested_events() {
        let (state, _dir) = test_state(0);
        let conn = state.db.get().unwrap();
        for success in [true, false] {
            store::insert_redirect(
                &conn,
                &store::RedirectEvent {
                    id: None,
                    timestamp: String::new(),
                    link_id: "lnk_1".to_string(),
                    platform: "instagram".to_string(),
                    device_class: "mobile".to_string(),
                    country: None,
                    success,
                    load_time_ms: 300,
                    in_app_browser: true,
                    fallback_used: true,
                    risk_score: 80,
                    strategy: Some("webview-safe".to_string()),
                },
            )
            .unwrap();
        }

        let app = router(state);
        let (status, json) = get_json(app, "/api/firewall/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["totalRedirects"], 2);
        assert_eq!(json["fallbacksServed"], 2);
        assert_eq!(json["recoveredClicks"], 1);
    }

    #[tokio::test]
    async fn benchmarks_and_alerts_endpoints() {
        let (state, _dir) = test_state(0);
        let conn = state.db.get().unwrap();
        // 60 direct failures out of 100 pushes instagram below the 0.85 floor
        for i in 0..100 {
            store::insert_redirect(
                &conn,
                &store::RedirectEvent {
                    id: None,
                    timestamp: String::new(),
                    link_id: "lnk_1".to_string(),
                    platform: "instagram".to_string(),
                    device_class: "mobile".to_string(),
                    country: None,
                    success: i >= 60,
                    load_time_ms: 300,
                    in_app_browser: true,
                    fallback_used: false,
                    risk_score: 50,
                    strategy: None,
                },
            )
            .unwrap();
        }
        benchmarks::recompute(&conn).unwrap();

        let app = router(state.clone());
        let (status, json) = get_json(app, "/api/benchmarks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["platform"], "instagram");
        assert_eq!(json[0]["sampleSize"], 100);

        let app = router(state);
        let (status, json) = get_json(app, "/api/alerts").await;
        assert_eq!(status, StatusCode::OK);
        let alerts = json.as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["platform"], "instagram");
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (state, _dir) = test_state(0);
        let app = router(state);
        let (status, json) = get_json(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let (state, _dir) = test_state(0);
        let app = router(state);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/firewall/decision")
            .header("origin", "https://some-bio-page.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.into_service().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn decision_with_heuristic_scorer_end_to_end() {
        let (state, _dir) = test_state_with_scorer(Arc::new(HeuristicScorer::new()));
        let app = router(state);
        let body = serde_json::json!({
            "linkId": "lnk_1",
            "userAgent": "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Instagram 300.0.0.0",
            "platform": "instagram",
            "userId": "u_pro",
        })
        .to_string();
        let (status, json) = post_json(app, "/api/firewall/decision", body).await;
        assert_eq!(status, StatusCode::OK);
        // 45 base + 30 in-app signature crosses the high threshold
        assert_eq!(json["useFallback"], true);
        assert_eq!(json["strategy"], "webview-safe");
    }
}
