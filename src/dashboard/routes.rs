//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! Every user action also leaves a short-lived action message, the same
//! slot the autopilot writes to.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::views::{CardContext, OpportunityCard, View, ViewKind, ViewQuery};
use crate::analyst::EventAnalyst;
use crate::backtest::{BacktestParams, BacktestResult, Backtester};
use crate::config::AccountConfig;
use crate::data::calendar::{self, NewsWarning};
use crate::data::history;
use crate::data::sessions;
use crate::engine::alert::ActionMessage;
use crate::engine::notify::Notification;
use crate::engine::{ScanContext, ScanStatus, Scheduler};
use crate::storage::daily::DailyPrep;
use crate::strategy::risk::{LotBreakdown, RiskPlan};
use crate::types::{is_known_symbol, EconomicEvent, HistoricalTrade, SniperError};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub ctx: Arc<ScanContext>,
    pub scheduler: Mutex<Scheduler>,
    pub daily: RwLock<DailyPrep>,
    pub analyst: Option<Arc<dyn EventAnalyst>>,
    pub backtester: Backtester,
}

impl DashboardState {
    pub fn new(
        scheduler: Scheduler,
        daily: DailyPrep,
        analyst: Option<Arc<dyn EventAnalyst>>,
        backtester: Backtester,
    ) -> Self {
        Self {
            ctx: scheduler.context().clone(),
            scheduler: Mutex::new(scheduler),
            daily: RwLock::new(daily),
            analyst,
            backtester,
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body for every failed request. Domain errors map to 4xx/5xx by
/// kind; anything else is a 500.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E: Into<anyhow::Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub fn status_for(err: &SniperError) -> StatusCode {
    match err {
        SniperError::NotFound(_) => StatusCode::NOT_FOUND,
        SniperError::InvalidInput(_) | SniperError::InvalidOpportunity(_) => StatusCode::BAD_REQUEST,
        SniperError::Delivery { .. } | SniperError::Analyst(_) => StatusCode::BAD_GATEWAY,
        SniperError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        SniperError::Generator(_) | SniperError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<SniperError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(status = %status, error = %format!("{:#}", self.0), "Request failed");
        }
        let body = serde_json::json!({ "error": format!("{:#}", self.0) });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub scan: ScanStatus,
    pub retained: usize,
    pub account: AccountConfig,
    pub open_sessions: Vec<&'static str>,
    pub news_warning: Option<NewsWarning>,
    pub analyst_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub notification: Option<Notification>,
    pub action: Option<ActionMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityDetail {
    pub card: OpportunityCard,
    /// Upcoming releases for either currency of the pair.
    pub relevant_events: Vec<EconomicEvent>,
    pub lots: LotBreakdown,
    /// Sizing as it appears in the outbound signal.
    pub signal_risk: RiskPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResponse {
    pub delivered: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairRequest {
    pub pair: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WatchlistResponse {
    pub watchlist: Vec<String>,
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutopilotRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountRequest {
    pub balance: f64,
    pub risk_pct: f64,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let now = Utc::now();
    let news_warning = state
        .ctx
        .state
        .events
        .read()
        .await
        .as_deref()
        .and_then(|events| calendar::next_high_impact(events, now));

    Json(StatusResponse {
        scan: state.ctx.state.status().await,
        retained: state.ctx.state.book().await.len(),
        account: state.ctx.state.account().await,
        open_sessions: sessions::open_sessions(now),
        news_warning,
        analyst_enabled: state.analyst.is_some(),
    })
}

/// GET /api/messages
pub async fn get_messages(State(state): State<AppState>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        notification: state.ctx.state.current_notification().await,
        action: state.ctx.state.current_action().await,
    })
}

/// POST /api/messages/dismiss
pub async fn dismiss_notification(State(state): State<AppState>) -> StatusCode {
    state.ctx.state.dismiss_notification().await;
    StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// GET /api/views
pub async fn list_views() -> Json<Vec<ViewKind>> {
    Json(ViewKind::ALL.to_vec())
}

/// GET /api/views/:view
pub async fn get_view(
    State(state): State<AppState>,
    Path(view): Path<String>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<View> {
    let kind: ViewKind = view.parse()?;
    Ok(Json(render_view(&state, kind, &query).await?))
}

async fn render_view(state: &DashboardState, kind: ViewKind, query: &ViewQuery) -> Result<View, ApiError> {
    let scan = &state.ctx.state;
    let now = Utc::now();

    let view = match kind {
        ViewKind::Opportunities | ViewKind::Favorites => {
            let book = scan.book().await;
            let favorites = state.ctx.prefs.read().await.favorites().clone();
            let alerts = scan.active_alerts.read().await.clone();
            let events = scan.events.read().await.clone().unwrap_or_default();
            let cards = CardContext {
                favorites: &favorites,
                alerts: &alerts,
                events: &events,
                account: scan.account().await,
                now,
            };
            if kind == ViewKind::Favorites {
                View::favorites(book.items(), &cards)
            } else {
                View::opportunities(book.items(), &query.opportunity_filter()?, &cards)
            }
        }
        ViewKind::Analysis => View::analysis(scan.market_analysis.read().await.clone()),
        ViewKind::Calendar => View::calendar(scan.events.read().await.clone()),
        ViewKind::Backtest => View::backtest(now.date_naive()),
        ViewKind::TradingPrep => {
            let mut prep = state.daily.write().await;
            prep.roll_over(now.date_naive());
            View::trading_prep(&prep, now)
        }
        ViewKind::Journal => {
            let history = scan.history.read().await;
            View::journal(history.as_deref(), &query.trade_filter()?)
        }
        ViewKind::Watchlist => {
            let prefs = state.ctx.prefs.read().await;
            let book = scan.book().await;
            let analysis = scan.market_analysis.read().await;
            View::watchlist(prefs.watchlist(), prefs.watchlist_alerts(), book.items(), analysis.as_ref())
        }
        ViewKind::Correlation => {
            let pairs = state.ctx.prefs.read().await.watchlist().to_vec();
            let matrix = state.ctx.side_data.correlation_matrix(&pairs).await?;
            View::correlation(pairs, matrix)
        }
    };
    Ok(view)
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

/// GET /api/opportunities/:id
pub async fn get_opportunity(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<OpportunityDetail> {
    let scan = &state.ctx.state;
    let book = scan.book().await;
    let opp = book
        .get(&id)
        .ok_or_else(|| SniperError::NotFound(format!("opportunity {id}")))?;

    let now = Utc::now();
    let favorites = state.ctx.prefs.read().await.favorites().clone();
    let alerts = scan.active_alerts.read().await.clone();
    let events = scan.events.read().await.clone().unwrap_or_default();
    let account = scan.account().await;
    let card = OpportunityCard::build(
        opp,
        &CardContext {
            favorites: &favorites,
            alerts: &alerts,
            events: &events,
            account,
            now,
        },
    );

    Ok(Json(OpportunityDetail {
        lots: card.risk.lot_breakdown(),
        relevant_events: calendar::relevant_events(&events, &opp.pair, now)
            .into_iter()
            .cloned()
            .collect(),
        signal_risk: RiskPlan::flat(opp, account.balance, account.risk_pct),
        card,
    }))
}

/// POST /api/opportunities/:id/favorite
pub async fn toggle_favorite(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ToggleResponse> {
    let retained = state.ctx.state.book().await.contains(&id);
    let mut prefs = state.ctx.prefs.write().await;
    // Evicted setups can still be un-favorited, never newly favorited.
    if !retained && !prefs.is_favorite(&id) {
        return Err(SniperError::NotFound(format!("opportunity {id}")).into());
    }
    let active = prefs.toggle_favorite(&id)?;
    drop(prefs);
    let message = if active {
        ActionMessage::success("Added to favorites!")
    } else {
        ActionMessage::info("Removed from favorites.")
    };
    state.ctx.state.push_action(message).await;
    Ok(Json(ToggleResponse { active }))
}

/// POST /api/opportunities/:id/alert
pub async fn toggle_alert(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<ToggleResponse> {
    let scan = &state.ctx.state;
    let active = scan.toggle_alert(&id).await?;
    let pair = scan.book().await.get(&id).map(|o| o.pair.clone()).unwrap_or_default();
    let message = if active {
        ActionMessage::success(format!("Alert set for {pair}."))
    } else {
        ActionMessage::info(format!("Alert removed for {pair}."))
    };
    scan.push_action(message).await;
    Ok(Json(ToggleResponse { active }))
}

/// POST /api/opportunities/:id/send
pub async fn send_opportunity(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<DeliveryResponse> {
    let delivered = state.ctx.send_manual(&id).await?;
    Ok(Json(DeliveryResponse { delivered }))
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

async fn watchlist_snapshot(state: &DashboardState) -> WatchlistResponse {
    let prefs = state.ctx.prefs.read().await;
    WatchlistResponse {
        watchlist: prefs.watchlist().to_vec(),
        alerts: prefs.watchlist_alerts().iter().cloned().collect(),
    }
}

/// POST /api/watchlist/add
pub async fn add_to_watchlist(State(state): State<AppState>, Json(req): Json<PairRequest>) -> ApiResult<WatchlistResponse> {
    let pair = req.pair.trim();
    if !is_known_symbol(pair) {
        return Err(SniperError::InvalidInput(format!("unknown pair: {pair}")).into());
    }
    if state.ctx.prefs.write().await.add_to_watchlist(pair)? {
        state
            .ctx
            .state
            .push_action(ActionMessage::success(format!("{pair} added to watchlist.")))
            .await;
    }
    Ok(Json(watchlist_snapshot(&state).await))
}

/// POST /api/watchlist/remove
pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> ApiResult<WatchlistResponse> {
    let pair = req.pair.trim();
    if !state.ctx.prefs.write().await.remove_from_watchlist(pair)? {
        return Err(SniperError::NotFound(format!("{pair} is not on the watchlist")).into());
    }
    state
        .ctx
        .state
        .push_action(ActionMessage::info(format!("{pair} removed from watchlist.")))
        .await;
    Ok(Json(watchlist_snapshot(&state).await))
}

/// POST /api/watchlist/alert
pub async fn toggle_watchlist_alert(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> ApiResult<WatchlistResponse> {
    let pair = req.pair.trim();
    let enabled = state.ctx.prefs.write().await.toggle_watchlist_alert(pair)?;
    let text = if enabled {
        format!("Watchlist alerts for {pair} enabled.")
    } else {
        format!("Watchlist alerts for {pair} disabled.")
    };
    state.ctx.state.push_action(ActionMessage::info(text)).await;
    Ok(Json(watchlist_snapshot(&state).await))
}

// ---------------------------------------------------------------------------
// Calendar and journal
// ---------------------------------------------------------------------------

/// POST /api/calendar/:id/analysis
///
/// Returns the cached analysis when the event already has one.
pub async fn analyze_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<EconomicEvent> {
    let scan = &state.ctx.state;
    let event = scan
        .event(&id)
        .await
        .ok_or_else(|| SniperError::NotFound(format!("event {id}")))?;
    if event.analysis.is_some() {
        return Ok(Json(event));
    }

    let analyst = state
        .analyst
        .as_ref()
        .ok_or_else(|| SniperError::Config("event analysis is not configured".into()))?;
    let analysis = analyst.analyze(&event).await.map_err(|e| {
        warn!(event_id = %id, error = %format!("{e:#}"), "Event analysis failed");
        SniperError::Analyst(format!("{e:#}"))
    })?;

    // The calendar may have been refreshed meanwhile; the old id is then gone.
    Ok(Json(scan.attach_analysis(&id, analysis).await?))
}

/// PUT /api/journal/:id/notes
pub async fn update_trade_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<NotesRequest>,
) -> ApiResult<HistoricalTrade> {
    let trade = {
        let mut loaded = state.ctx.state.history.write().await;
        let trades = loaded
            .as_mut()
            .ok_or_else(|| SniperError::NotFound("trade history not loaded yet".into()))?;
        history::set_trade_notes(trades, &id, &req.notes)?;
        trades.iter().find(|t| t.id == id).cloned()
    }
    .ok_or_else(|| SniperError::NotFound(format!("trade {id}")))?;

    state
        .ctx
        .state
        .push_action(ActionMessage::success("Trade notes saved!"))
        .await;
    Ok(Json(trade))
}

// ---------------------------------------------------------------------------
// Backtest and trading prep
// ---------------------------------------------------------------------------

/// POST /api/backtest
pub async fn run_backtest(State(state): State<AppState>, Json(params): Json<BacktestParams>) -> ApiResult<BacktestResult> {
    // The simulation is CPU-bound; keep it off the async workers.
    let (params, result) = tokio::task::spawn_blocking(move || {
        let result = state.backtester.run(&params);
        (params, result)
    })
    .await?;
    let result = result?;
    info!(
        pair = %params.pair,
        trades = result.total_trades,
        win_rate = result.win_rate,
        final_balance = result.final_balance,
        "Backtest complete"
    );
    Ok(Json(result))
}

/// POST /api/prep/checklist/:id
pub async fn toggle_checklist_item(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<View> {
    let now = Utc::now();
    let mut prep = state.daily.write().await;
    prep.roll_over(now.date_naive());
    prep.toggle_item(&id)?;
    Ok(Json(View::trading_prep(&prep, now)))
}

/// PUT /api/prep/journal
pub async fn set_prep_journal(State(state): State<AppState>, Json(req): Json<JournalRequest>) -> ApiResult<View> {
    let now = Utc::now();
    let mut prep = state.daily.write().await;
    prep.roll_over(now.date_naive());
    prep.set_journal(&req.text)?;
    Ok(Json(View::trading_prep(&prep, now)))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// POST /api/autopilot
pub async fn set_autopilot(State(state): State<AppState>, Json(req): Json<AutopilotRequest>) -> Json<ToggleResponse> {
    let mut scheduler = state.scheduler.lock().await;
    scheduler.set_autopilot(req.enabled).await;
    Json(ToggleResponse {
        active: scheduler.autopilot_active(),
    })
}

/// GET /api/account
pub async fn get_account(State(state): State<AppState>) -> Json<AccountConfig> {
    Json(state.ctx.state.account().await)
}

/// PUT /api/account
pub async fn set_account(State(state): State<AppState>, Json(req): Json<AccountRequest>) -> ApiResult<AccountConfig> {
    let account = state.ctx.state.set_account(req.balance, req.risk_pct).await?;
    info!(balance = account.balance, risk_pct = account.risk_pct, "Account settings updated");
    Ok(Json(account))
}
