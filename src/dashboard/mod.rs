//! Dashboard: Axum web server for the scanner.
//!
//! Serves a JSON API (one resource per view plus the user actions) and a
//! self-contained HTML page that polls it. CORS enabled for local
//! development.

pub mod routes;
pub mod views;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    response::Html,
    routing::{get, post, put},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Bind the dashboard port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Status
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/messages", get(routes::get_messages))
        .route("/api/messages/dismiss", post(routes::dismiss_notification))
        // Views
        .route("/api/views", get(routes::list_views))
        .route("/api/views/:view", get(routes::get_view))
        // Opportunities
        .route("/api/opportunities/:id", get(routes::get_opportunity))
        .route("/api/opportunities/:id/favorite", post(routes::toggle_favorite))
        .route("/api/opportunities/:id/alert", post(routes::toggle_alert))
        .route("/api/opportunities/:id/send", post(routes::send_opportunity))
        // Watchlist
        .route("/api/watchlist/add", post(routes::add_to_watchlist))
        .route("/api/watchlist/remove", post(routes::remove_from_watchlist))
        .route("/api/watchlist/alert", post(routes::toggle_watchlist_alert))
        // Calendar, journal, backtest, prep
        .route("/api/calendar/:id/analysis", post(routes::analyze_event))
        .route("/api/journal/:id/notes", put(routes::update_trade_notes))
        .route("/api/backtest", post(routes::run_backtest))
        .route("/api/prep/checklist/:id", post(routes::toggle_checklist_item))
        .route("/api/prep/journal", put(routes::set_prep_journal))
        // Settings
        .route("/api/autopilot", post(routes::set_autopilot))
        .route("/api/account", get(routes::get_account).put(routes::set_account))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::MockEventAnalyst;
    use crate::backtest::Backtester;
    use crate::config::AccountConfig;
    use crate::data::SimulatedSideData;
    use crate::engine::alert::{ACTION_TTL, NOTIFICATION_TTL};
    use crate::engine::notify::{NotificationPolicy, Silent};
    use crate::engine::task::TaskGuard;
    use crate::engine::{ScanContext, ScanSettings, ScanState, Scheduler};
    use crate::scanner::sniper::SniperScanner;
    use crate::sink::MockMessagingSink;
    use crate::storage::daily::DailyPrep;
    use crate::storage::prefs::Preferences;
    use crate::storage::MemoryStore;
    use crate::types::{EventAnalysis, VolatilityRating};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use routes::DashboardState;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn test_state_with(sink: MockMessagingSink, analyst: Option<MockEventAnalyst>) -> AppState {
        let store = Arc::new(MemoryStore::new());
        let ctx = ScanContext {
            generator: Arc::new(SniperScanner::seeded(11)),
            side_data: Arc::new(SimulatedSideData::seeded(11)),
            sink: Arc::new(sink),
            chime: Arc::new(Silent),
            state: Arc::new(ScanState::new(
                50,
                NOTIFICATION_TTL,
                ACTION_TTL,
                AccountConfig { balance: 10_000.0, risk_pct: 1.0 },
            )),
            prefs: Arc::new(RwLock::new(Preferences::load(store.clone()))),
            policy: NotificationPolicy::default(),
            settings: ScanSettings::default(),
        };
        Arc::new(DashboardState::new(
            Scheduler::new(Arc::new(ctx)),
            DailyPrep::load(store, Utc::now().date_naive()),
            analyst.map(|a| Arc::new(a) as Arc<dyn crate::analyst::EventAnalyst>),
            Backtester::seeded(3),
        ))
    }

    fn test_state() -> AppState {
        test_state_with(MockMessagingSink::new(), None)
    }

    /// Run one poll cycle until it yields at least one opportunity.
    async fn populated(state: &AppState) -> String {
        for _ in 0..20 {
            state.ctx.run_poll_cycle(&TaskGuard::detached()).await;
            if let Some(opp) = state.ctx.state.book().await.items().first() {
                return opp.id.clone();
            }
        }
        panic!("generator produced nothing in 20 cycles");
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, _) = send(build_router(test_state()), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_before_first_cycle() {
        let (status, json) = send(build_router(test_state()), get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scan"]["initial_load_done"], false);
        assert_eq!(json["retained"], 0);
        assert_eq!(json["account"]["balance"], 10_000.0);
        assert_eq!(json["analyst_enabled"], false);
    }

    #[tokio::test]
    async fn test_every_view_renders_before_data_loads() {
        let state = test_state();
        for kind in ["opportunities", "analysis", "calendar", "backtest", "tradingprep", "journal", "favorites", "watchlist", "correlation"] {
            let (status, json) = send(build_router(state.clone()), get(&format!("/api/views/{kind}"))).await;
            assert_eq!(status, StatusCode::OK, "view {kind}");
            assert_eq!(json["view"], kind);
        }
        let (status, _) = send(build_router(state), get("/api/views/glossary")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_opportunities_view_filters() {
        let state = test_state();
        populated(&state).await;

        let (status, json) = send(build_router(state.clone()), get("/api/views/opportunities?pair=All&bias=All")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!json["opportunities"].as_array().unwrap().is_empty());

        let (status, _) = send(build_router(state), get("/api/views/opportunities?bias=Sideways")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_favorite_toggle_and_detail() {
        let state = test_state();
        let id = populated(&state).await;

        let (status, json) = send(build_router(state.clone()), post_empty(&format!("/api/opportunities/{id}/favorite"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], true);
        assert_eq!(state.ctx.state.current_action().await.unwrap().text, "Added to favorites!");

        let (_, json) = send(build_router(state.clone()), get("/api/views/favorites")).await;
        assert_eq!(json["opportunities"][0]["id"], id.as_str());

        let (status, json) = send(build_router(state.clone()), get(&format!("/api/opportunities/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["card"]["is_favorite"], true);
        assert!(json["lots"]["micro"].as_f64().unwrap() > 0.0);

        let (status, _) = send(build_router(state), post_empty("/api/opportunities/opp-missing/favorite")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_evicted_favorite_can_be_removed() {
        let state = test_state();
        state.ctx.prefs.write().await.toggle_favorite("opp-evicted").unwrap();

        let (status, json) = send(build_router(state.clone()), post_empty("/api/opportunities/opp-evicted/favorite")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], false);
        assert!(!state.ctx.prefs.read().await.is_favorite("opp-evicted"));

        // Re-adding needs the setup to be retained.
        let (status, _) = send(build_router(state), post_empty("/api/opportunities/opp-evicted/favorite")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_watchlist_remove_trims_pair() {
        let app = build_router(test_state());
        let (status, _) = send(app.clone(), json_req("POST", "/api/watchlist/add", serde_json::json!({"pair": " NZD/USD "}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(app, json_req("POST", "/api/watchlist/remove", serde_json::json!({"pair": " NZD/USD "}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!json["watchlist"].as_array().unwrap().contains(&serde_json::json!("NZD/USD")));
    }

    #[tokio::test]
    async fn test_manual_send_reports_failure() {
        let mut sink = MockMessagingSink::new();
        sink.expect_deliver().times(1).returning(|_, _, _| false);
        let state = test_state_with(sink, None);
        let id = populated(&state).await;

        let (status, json) = send(build_router(state.clone()), post_empty(&format!("/api/opportunities/{id}/send"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["delivered"], false);
        let (_, json) = send(build_router(state), get("/api/messages")).await;
        assert_eq!(json["action"]["kind"], "error");
    }

    #[tokio::test]
    async fn test_watchlist_cascade_through_api() {
        let state = test_state();
        let app = build_router(state.clone());

        let (status, _) = send(app.clone(), json_req("POST", "/api/watchlist/add", serde_json::json!({"pair": "NZD/USD"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, json) = send(app.clone(), json_req("POST", "/api/watchlist/alert", serde_json::json!({"pair": "NZD/USD"}))).await;
        assert!(json["alerts"].as_array().unwrap().contains(&serde_json::json!("NZD/USD")));

        let (_, json) = send(app.clone(), json_req("POST", "/api/watchlist/remove", serde_json::json!({"pair": "NZD/USD"}))).await;
        assert!(!json["watchlist"].as_array().unwrap().contains(&serde_json::json!("NZD/USD")));
        assert!(!json["alerts"].as_array().unwrap().contains(&serde_json::json!("NZD/USD")));

        let (status, _) = send(app.clone(), json_req("POST", "/api/watchlist/add", serde_json::json!({"pair": "BTC/USD"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(app, json_req("POST", "/api/watchlist/alert", serde_json::json!({"pair": "NZD/USD"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_analysis_is_cached() {
        let mut analyst = MockEventAnalyst::new();
        analyst.expect_analyze().times(1).returning(|_| {
            Ok(EventAnalysis {
                explanation: "Measures inflation.".into(),
                bullish_impact: "Hot print lifts the currency.".into(),
                bearish_impact: "Soft print weighs on it.".into(),
                volatility_rating: VolatilityRating::VeryHigh,
            })
        });
        let state = test_state_with(MockMessagingSink::new(), Some(analyst));
        state.ctx.run_poll_cycle(&TaskGuard::detached()).await;
        let event_id = state.ctx.state.events.read().await.as_ref().unwrap()[0].id.clone();

        let uri = format!("/api/calendar/{event_id}/analysis");
        let (status, json) = send(build_router(state.clone()), post_empty(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["analysis"]["volatilityRating"], "Very High");

        // Second request is served from the cache (the mock allows one call).
        let (status, _) = send(build_router(state), post_empty(&uri)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_event_analysis_without_analyst() {
        let state = test_state();
        state.ctx.run_poll_cycle(&TaskGuard::detached()).await;
        let event_id = state.ctx.state.events.read().await.as_ref().unwrap()[0].id.clone();
        let (status, _) = send(build_router(state), post_empty(&format!("/api/calendar/{event_id}/analysis"))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_journal_notes_update() {
        let state = test_state();
        state.ctx.run_poll_cycle(&TaskGuard::detached()).await;
        let trade_id = state.ctx.state.history.read().await.as_ref().unwrap()[0].id.clone();

        let (status, json) = send(
            build_router(state.clone()),
            json_req("PUT", &format!("/api/journal/{trade_id}/notes"), serde_json::json!({"notes": "Waited for the sweep."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["notes"], "Waited for the sweep.");

        let (status, _) = send(
            build_router(state),
            json_req("PUT", "/api/journal/trade-missing/notes", serde_json::json!({"notes": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_backtest_validation() {
        let app = build_router(test_state());
        let ok = serde_json::json!({
            "pair": "EUR/USD", "start_date": "2025-01-01", "end_date": "2025-06-30",
            "initial_balance": 10000.0, "risk_pct": 1.0
        });
        let (status, json) = send(app.clone(), json_req("POST", "/api/backtest", ok)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["total_trades"].as_u64().unwrap() > 0);

        let reversed = serde_json::json!({
            "pair": "EUR/USD", "start_date": "2025-06-30", "end_date": "2025-01-01",
            "initial_balance": 10000.0, "risk_pct": 1.0
        });
        let (status, _) = send(app.clone(), json_req("POST", "/api/backtest", reversed)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let endless = serde_json::json!({
            "pair": "EUR/USD", "start_date": "0001-01-01", "end_date": "9999-12-31",
            "initial_balance": 10000.0, "risk_pct": 1.0
        });
        let (status, json) = send(app, json_req("POST", "/api/backtest", endless)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("date range"));
    }

    #[tokio::test]
    async fn test_prep_checklist_toggle() {
        let app = build_router(test_state());
        let (status, json) = send(app.clone(), post_empty("/api/prep/checklist/check-econ")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["completion_pct"], 20.0);

        let (status, _) = send(app, post_empty("/api/prep/checklist/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_account_update_validates() {
        let app = build_router(test_state());
        let (status, json) = send(app.clone(), json_req("PUT", "/api/account", serde_json::json!({"balance": 2500.0, "risk_pct": 2.0}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["risk_pct"], 2.0);

        let (status, _) = send(app, json_req("PUT", "/api/account", serde_json::json!({"balance": -1.0, "risk_pct": 2.0}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_autopilot_toggle() {
        let state = test_state();
        let (status, json) = send(build_router(state.clone()), json_req("POST", "/api/autopilot", serde_json::json!({"enabled": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["active"], true);
        assert!(state.ctx.state.status().await.autopilot_active);

        let (_, json) = send(build_router(state.clone()), json_req("POST", "/api/autopilot", serde_json::json!({"enabled": false}))).await;
        assert_eq!(json["active"], false);
        state.scheduler.lock().await.shutdown().await;
    }

    #[tokio::test]
    async fn test_dashboard_html() {
        let resp = build_router(test_state()).oneshot(get("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 200_000).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("SNIPER"));
        assert!(html.contains("Dashboard"));
    }
}
