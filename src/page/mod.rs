//! Tourist-facing destination detail page and its "Add to Dream List" action.
//!
//! The page reads destinations through [`DestinationLoader`] and adds them to the
//! tourist's wishlist through [`WishlistService`]. The tourist comes from the
//! `x-tourist-id` header, falling back to the configured default identity.

use crate::destination::{Destination, DestinationLoader};
use crate::wishlist::{TouristId, UpsertOutcome, WishlistService};
use askama_escape::{escape, Html as HtmlEscape};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

pub const TOURIST_HEADER: &str = "x-tourist-id";

#[derive(Clone)]
pub struct PageState {
    pub loader: Arc<DestinationLoader>,
    pub wishlists: WishlistService,
    pub default_tourist: TouristId,
    pub atomic_upsert: bool,
}

pub fn router(state: PageState) -> Router {
    Router::new()
        .route("/tourist/destinations/:destination_id", get(destination_page))
        .route("/tourist/destinations/:destination_id/dream-list", post(add_to_dream_list_handler))
        .route("/tourist/dream-list/status", get(dream_list_status_handler))
        .with_state(state)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Notice {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DreamListResponse {
    pub status: Notice,
    pub message: String,
}

impl DreamListResponse {
    fn new(status: Notice, message: String) -> Self {
        Self { status, message }
    }
}

fn tourist_from_headers(headers: &HeaderMap, default: TouristId) -> Result<TouristId, StatusCode> {
    match headers.get(TOURIST_HEADER) {
        None => Ok(default),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .map(TouristId)
            .ok_or(StatusCode::BAD_REQUEST),
    }
}

async fn destination_page(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let tourist = match tourist_from_headers(&headers, state.default_tourist) {
        Ok(tourist) => tourist,
        Err(status) => return (status, format!("Invalid {TOURIST_HEADER} header")).into_response(),
    };
    match state.loader.load_route(&raw_id).await {
        Some(destination) => {
            Html(render_destination(&destination, state.wishlists.is_adding(tourist))).into_response()
        }
        None => (StatusCode::NOT_FOUND, Html(render_not_found())).into_response(),
    }
}

async fn add_to_dream_list_handler(
    State(state): State<PageState>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let tourist = match tourist_from_headers(&headers, state.default_tourist) {
        Ok(tourist) => tourist,
        Err(status) => {
            let body = DreamListResponse::new(Notice::Error, format!("Invalid {TOURIST_HEADER} header"));
            return (status, Json(body)).into_response();
        }
    };

    let Some(destination) = state.loader.load_route(&raw_id).await else {
        let body = DreamListResponse::new(Notice::Error, "Destination not found.".to_string());
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };

    let result = if state.atomic_upsert {
        state.wishlists.add_atomic(tourist, destination.id).await
    } else {
        state.wishlists.add_to_wishlist(tourist, destination.id).await
    };

    let (status, body) = match result {
        Ok(UpsertOutcome::Created | UpsertOutcome::Appended) => (
            StatusCode::OK,
            DreamListResponse::new(Notice::Success, format!("{} added to your Dream List!", destination.name)),
        ),
        Ok(UpsertOutcome::AlreadyPresent) => (
            StatusCode::OK,
            DreamListResponse::new(Notice::Info, format!("{} is already in your Dream List", destination.name)),
        ),
        Err(_) => (
            StatusCode::BAD_GATEWAY,
            DreamListResponse::new(Notice::Error, format!("Failed to add {} to Dream List", destination.name)),
        ),
    };
    (status, Json(body)).into_response()
}

async fn dream_list_status_handler(State(state): State<PageState>, headers: HeaderMap) -> Response {
    match tourist_from_headers(&headers, state.default_tourist) {
        Ok(tourist) => Json(serde_json::json!({ "adding": state.wishlists.is_adding(tourist) })).into_response(),
        Err(status) => status.into_response(),
    }
}

/// Renders the detail page. `adding` disables the button for the requesting tourist.
pub fn render_destination(destination: &Destination, adding: bool) -> String {
    let name = escape(&destination.name, HtmlEscape);
    let overview: String = destination
        .details
        .iter()
        .map(|paragraph| format!("      <p class=\"paragraph\">{}</p>\n", escape(paragraph, HtmlEscape)))
        .collect();
    let activities: String = destination
        .activities
        .iter()
        .map(|activity| format!("      <li>{}</li>\n", escape(activity, HtmlEscape)))
        .collect();
    let (disabled, label) = if adding {
        (" disabled", "Adding...")
    } else {
        ("", "Add to Dream List")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{name}</title>
</head>
<body>
  <h1>{name}</h1>
  <hr>
  <img src="{image}" alt="{name}">
  <section class="overview">
    <h2>Overview</h2>
{overview}  </section>
  <dl class="facts">
    <dt>District</dt><dd>{district}</dd>
    <dt>Province</dt><dd>{province}</dd>
    <dt>Type</dt><dd>{kind}</dd>
    <dt>Climate</dt><dd>{climate}</dd>
  </dl>
  <section class="activities">
    <h2>Activities</h2>
    <ul>
{activities}    </ul>
  </section>
  <form method="post" action="/tourist/destinations/{id}/dream-list">
    <button type="submit"{disabled}>{label}</button>
  </form>
</body>
</html>
"#,
        name = name,
        image = escape(&destination.image, HtmlEscape),
        overview = overview,
        district = escape(&destination.district, HtmlEscape),
        province = escape(&destination.province, HtmlEscape),
        kind = escape(&destination.kind, HtmlEscape),
        climate = escape(&destination.climate, HtmlEscape),
        activities = activities,
        id = destination.id,
        disabled = disabled,
        label = label,
    )
}

pub fn render_not_found() -> String {
    "<!DOCTYPE html>\n<html lang=\"en\">\n<body>\n  <div>Destination not found.</div>\n</body>\n</html>\n".to_string()
}
