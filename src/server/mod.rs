//! Destination-management service: the HTTP surface the detail page talks to.
//!
//! Routes mirror what the page and the admin tooling expect:
//! destinations are read and administered under `/destinations`, wishlists under
//! `/wishlist`. A wishlist read for a tourist without one answers `null` rather than 404.

use crate::database::Database;
use crate::destination::{Destination, DestinationId, NewDestination};
use crate::wishlist::{AddDestinationResponse, NewWishlist, TouristId, UpsertOutcome, Wishlist, WishlistId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiState {
    pub database: Arc<Database>,
}

pub fn router(database: Arc<Database>) -> Router {
    Router::new()
        .route("/destinations/", get(get_destinations_handler))
        .route("/destinations/count", get(count_destinations_handler))
        .route("/destinations/add", post(create_destination_handler))
        .route("/destinations/destination/:id", get(get_destination_handler))
        .route("/destinations/update_destination/:id", put(update_destination_handler))
        .route("/destinations/delete_destination/:id", delete(delete_destination_handler))
        .route("/wishlist/add", post(create_wishlist_handler))
        .route("/wishlist/:id", get(get_wishlist_handler))
        .route("/wishlist/:id/update-destinations", patch(update_wishlist_handler))
        .route("/wishlist/:id/destinations/:destination_id", post(add_destination_handler))
        .with_state(ApiState { database })
}

fn internal(e: sqlx::Error) -> StatusCode {
    error!(error = %e, "database error");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_destinations_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<Destination>>, StatusCode> {
    state.database.get_destinations().await.map(Json).map_err(internal)
}

async fn count_destinations_handler(
    State(state): State<ApiState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let count = state.database.count_destinations().await.map_err(internal)?;
    Ok(Json(serde_json::json!({ "count": count })))
}

async fn get_destination_handler(
    State(state): State<ApiState>,
    Path(id): Path<DestinationId>,
) -> Result<Json<Destination>, StatusCode> {
    match state.database.get_destination(id).await.map_err(internal)? {
        Some(destination) => Ok(Json(destination)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn create_destination_handler(
    State(state): State<ApiState>,
    Json(payload): Json<NewDestination>,
) -> Result<(StatusCode, Json<Destination>), StatusCode> {
    let destination = state.database.create_destination(&payload).await.map_err(internal)?;
    info!(destination_id = destination.id, name = %destination.name, "destination created");
    Ok((StatusCode::CREATED, Json(destination)))
}

async fn update_destination_handler(
    State(state): State<ApiState>,
    Path(id): Path<DestinationId>,
    Json(payload): Json<NewDestination>,
) -> Result<Json<Destination>, StatusCode> {
    match state.database.update_destination(id, &payload).await.map_err(internal)? {
        Some(destination) => Ok(Json(destination)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn delete_destination_handler(
    State(state): State<ApiState>,
    Path(id): Path<DestinationId>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !state.database.delete_destination(id).await.map_err(internal)? {
        return Err(StatusCode::NOT_FOUND);
    }
    info!(destination_id = id, "destination deleted");
    Ok(Json(serde_json::json!({
        "message": "Destination deleted successfully"
    })))
}

async fn get_wishlist_handler(
    State(state): State<ApiState>,
    Path(tourist): Path<i64>,
) -> Result<Json<Option<Wishlist>>, StatusCode> {
    state
        .database
        .get_wishlist(TouristId(tourist))
        .await
        .map(Json)
        .map_err(internal)
}

async fn create_wishlist_handler(
    State(state): State<ApiState>,
    Json(payload): Json<NewWishlist>,
) -> Result<(StatusCode, Json<Wishlist>), StatusCode> {
    match state.database.create_wishlist(&payload).await.map_err(internal)? {
        Some(wishlist) => Ok((StatusCode::CREATED, Json(wishlist))),
        None => Err(StatusCode::CONFLICT),
    }
}

async fn update_wishlist_handler(
    State(state): State<ApiState>,
    Path(id): Path<WishlistId>,
    Json(destinations): Json<Vec<DestinationId>>,
) -> Result<Json<Wishlist>, StatusCode> {
    match state
        .database
        .update_wishlist_destinations(id, &destinations)
        .await
        .map_err(internal)?
    {
        Some(wishlist) => Ok(Json(wishlist)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn add_destination_handler(
    State(state): State<ApiState>,
    Path((tourist, destination)): Path<(i64, DestinationId)>,
) -> Result<(StatusCode, Json<AddDestinationResponse>), StatusCode> {
    let response = state
        .database
        .add_destination_if_absent(TouristId(tourist), destination)
        .await
        .map_err(internal)?;
    let status = match response.outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Appended | UpsertOutcome::AlreadyPresent => StatusCode::OK,
    };
    Ok((status, Json(response)))
}
