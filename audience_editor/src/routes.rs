//! src/routes.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::AudienceError,
    history::HistoryToggle,
    model::{Client, Group, StatusFilter},
    notify::Notice,
    ranking::ContactRanking,
    roster::{ReloadOutcome, RemoveOutcome},
    session::AudienceSession,
    staging::StagingAdd,
    stats::{StatsCard, StatsPanel},
    transfer::{DragState, TransferReport},
    view::{AudiencePage, Card, ViewState},
};

/// Shared application state handed to every handler.
pub type AppState = Arc<AudienceSession>;

type ApiResult<T> = Result<Json<T>, AudienceError>;

impl IntoResponse for AudienceError {
    fn into_response(self) -> Response {
        let status = match &self {
            AudienceError::Validation(_) | AudienceError::Transfer(_) => StatusCode::BAD_REQUEST,
            AudienceError::Duplicate { .. } | AudienceError::NoGroup  => StatusCode::CONFLICT,
            AudienceError::Sync(_)                                     => StatusCode::BAD_GATEWAY,
            AudienceError::NoRecipients                                => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = json!({ "error": self.to_string(), "severity": self.severity() });
        (status, Json(body)).into_response()
    }
}

pub fn router(session: AppState) -> Router {
    Router::new()
        .route("/group",                 get(get_group).put(put_group))
        .route("/roster",                get(get_roster).post(post_roster))
        .route("/roster/:email",         delete(delete_roster))
        .route("/staging",               get(get_staging).post(post_staging))
        .route("/staging/:email",        delete(delete_staging))
        .route("/drag",                  get(get_drag))
        .route("/drag/start",            post(post_drag_start))
        .route("/drag/cancel",           post(post_drag_cancel))
        .route("/drag/drop",             post(post_drag_drop))
        .route("/view",                  get(get_view).put(put_view))
        .route("/view/next",             post(post_next_page))
        .route("/view/prev",             post(post_prev_page))
        .route("/history/:email/toggle", post(post_toggle_history))
        .route("/audience",              get(get_audience))
        .route("/recipients",            get(get_recipients))
        .route("/ranking",               get(get_ranking))
        .route("/stats",                 get(get_stats))
        .route("/stats/card",            post(post_stats_card))
        .route("/notices",               get(get_notices))
        .with_state(session)
}

// ── incoming JSON payloads ─────────────────────────────────────────────
#[derive(Deserialize)]
pub struct GroupBody {
    group: Group,
}

#[derive(Deserialize)]
pub struct CardBody {
    card: StatsCard,
}

#[derive(Deserialize)]
pub struct EmailBody {
    email: String,
}

#[derive(Deserialize)]
pub struct StagingBody {
    email:  String,
    #[serde(default)]
    mirror: bool,
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    confirm: bool,
}

#[derive(Deserialize)]
pub struct ViewBody {
    search: Option<String>,
    filter: Option<StatusFilter>,
}

// ── outgoing ───────────────────────────────────────────────────────────
#[derive(Serialize)]
pub struct GroupView {
    group: Group,
}

#[derive(Serialize)]
pub struct PageView {
    group:          Group,
    settings:       ViewState,
    page:           usize,
    total_pages:    usize,
    total_filtered: usize,
    expanded:       Option<String>,
    cards:          Vec<Card>,
}

impl PageView {
    fn new(session: &AudienceSession, page: AudiencePage) -> Self {
        Self {
            group:          session.active_group(),
            settings:       session.view_settings(),
            page:           page.page,
            total_pages:    page.total_pages,
            total_filtered: page.total_filtered,
            expanded:       session.expanded_card(),
            cards:          page.cards(Utc::now()),
        }
    }
}

#[derive(Serialize)]
pub struct DragPayload {
    payload: String,
}

// ── group ──────────────────────────────────────────────────────────────
pub async fn get_group(State(session): State<AppState>) -> Json<GroupView> {
    Json(GroupView { group: session.active_group() })
}

pub async fn put_group(
    State(session): State<AppState>,
    Json(body): Json<GroupBody>,
) -> ApiResult<ReloadOutcome> {
    Ok(Json(session.select_group(body.group).await?))
}

// ── roster ─────────────────────────────────────────────────────────────
pub async fn get_roster(State(session): State<AppState>) -> Json<Vec<Client>> {
    Json(session.roster().clients())
}

pub async fn post_roster(
    State(session): State<AppState>,
    Json(body): Json<EmailBody>,
) -> ApiResult<Client> {
    Ok(Json(session.add_to_roster(&body.email).await?))
}

pub async fn delete_roster(
    State(session): State<AppState>,
    Path(email): Path<String>,
    Query(q): Query<ConfirmQuery>,
) -> ApiResult<RemoveOutcome> {
    Ok(Json(session.remove_from_roster(&email, &q.confirm).await?))
}

// ── staging ────────────────────────────────────────────────────────────
pub async fn get_staging(State(session): State<AppState>) -> Json<Vec<Client>> {
    Json(session.staging().current())
}

pub async fn post_staging(
    State(session): State<AppState>,
    Json(body): Json<StagingBody>,
) -> ApiResult<StagingAdd> {
    Ok(Json(session.add_to_staging(&body.email, &body.mirror).await?))
}

pub async fn delete_staging(
    State(session): State<AppState>,
    Path(email): Path<String>,
) -> StatusCode {
    if session.remove_from_staging(&email) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// ── drag & drop ────────────────────────────────────────────────────────
pub async fn get_drag(State(session): State<AppState>) -> Json<DragState> {
    Json(session.drag_state())
}

pub async fn post_drag_start(
    State(session): State<AppState>,
    Json(body): Json<EmailBody>,
) -> ApiResult<DragPayload> {
    let payload = session.begin_drag(&body.email)?;
    Ok(Json(DragPayload { payload }))
}

pub async fn post_drag_cancel(State(session): State<AppState>) -> StatusCode {
    session.cancel_drag();
    StatusCode::NO_CONTENT
}

/// Body is the raw text the drag carried.
pub async fn post_drag_drop(
    State(session): State<AppState>,
    payload: String,
) -> ApiResult<TransferReport> {
    Ok(Json(session.drop_on_staging(&payload)?))
}

// ── view ───────────────────────────────────────────────────────────────
pub async fn get_view(State(session): State<AppState>) -> Json<PageView> {
    let page = session.view();
    Json(PageView::new(&session, page))
}

pub async fn put_view(
    State(session): State<AppState>,
    Json(body): Json<ViewBody>,
) -> Json<PageView> {
    if let Some(search) = body.search {
        session.set_search(&search);
    }
    if let Some(filter) = body.filter {
        session.set_filter(filter);
    }
    let page = session.view();
    Json(PageView::new(&session, page))
}

pub async fn post_next_page(State(session): State<AppState>) -> Json<PageView> {
    let page = session.next_page();
    Json(PageView::new(&session, page))
}

pub async fn post_prev_page(State(session): State<AppState>) -> Json<PageView> {
    let page = session.prev_page();
    Json(PageView::new(&session, page))
}

// ── history ────────────────────────────────────────────────────────────
pub async fn post_toggle_history(
    State(session): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<HistoryToggle> {
    Ok(Json(session.toggle_history(&email).await?))
}

// ── audience / sender hand-off ─────────────────────────────────────────
pub async fn get_audience(State(session): State<AppState>) -> Json<Vec<Client>> {
    Json(session.effective_audience())
}

pub async fn get_recipients(State(session): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(session.recipients()?))
}

pub async fn get_ranking(State(session): State<AppState>) -> ApiResult<ContactRanking> {
    Ok(Json(session.ranking().await?))
}

/// `null` while the group is `none`.
pub async fn get_stats(State(session): State<AppState>) -> ApiResult<Option<StatsPanel>> {
    Ok(Json(session.stats().await?))
}

pub async fn post_stats_card(
    State(session): State<AppState>,
    Json(body): Json<CardBody>,
) -> Json<PageView> {
    let page = session.select_stats_card(body.card);
    Json(PageView::new(&session, page))
}

pub async fn get_notices(State(session): State<AppState>) -> Json<Vec<Notice>> {
    Json(session.notices().drain())
}
