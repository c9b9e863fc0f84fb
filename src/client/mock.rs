//! In-process scripted stand-in for the destination-management service.
//!
//! Runs an axum server on a random port. Responses come from [`MockState`], which
//! tests can script (forced statuses, raw bodies, delays, a barrier or a gate on
//! reads) and inspect afterwards (request counters and recorded write bodies).

use super::RemoteClient;
use crate::destination::{Destination, DestinationId};
use crate::wishlist::{plan_upsert, AddDestinationResponse, TouristId, UpsertOutcome, UpsertPlan, Wishlist};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Barrier, Mutex, MutexGuard, Notify};
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct MockState {
    pub destinations: HashMap<DestinationId, Destination>,
    pub wishlist: Option<Wishlist>,

    pub destination_status: Option<StatusCode>,
    pub raw_destination_body: Option<String>,
    pub read_status: Option<StatusCode>,
    pub raw_wishlist_body: Option<String>,
    pub read_delay: Option<Duration>,
    pub read_barrier: Option<Arc<Barrier>>,
    /// Notified once a wishlist read has arrived; the read then waits on `read_gate`.
    pub read_started: Option<Arc<Notify>>,
    pub read_gate: Option<Arc<Notify>>,
    pub create_status: Option<StatusCode>,
    pub update_status: Option<StatusCode>,

    pub destination_gets: usize,
    pub reads: usize,
    pub creates: usize,
    pub updates: usize,
    pub created: Vec<Value>,
    pub updated: Vec<(i64, Value)>,
    next_wishlist_id: i64,
}

impl MockState {
    pub fn with_wishlist(wishlist: Wishlist) -> Self {
        Self {
            next_wishlist_id: wishlist.id,
            wishlist: Some(wishlist),
            ..Self::default()
        }
    }

    /// Holds every wishlist read open until the returned gate is notified.
    ///
    /// # Returns
    /// `(started, gate)`: `started` is notified when a read arrives.
    pub fn gate_reads(&mut self) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        self.read_started = Some(started.clone());
        self.read_gate = Some(gate.clone());
        (started, gate)
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockRemote {
    state: Shared,
    addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl MockRemote {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock destination service");
        let addr = listener.local_addr().expect("Failed to get local address");

        let app = Router::new()
            .route("/destinations/destination/:id", get(get_destination))
            .route("/wishlist/add", post(create_wishlist))
            .route("/wishlist/:id", get(get_wishlist))
            .route("/wishlist/:id/update-destinations", patch(update_wishlist))
            .route("/wishlist/:id/destinations/:destination_id", post(add_destination))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock destination service failed");
        });

        Self {
            state,
            addr,
            _handle: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> RemoteClient {
        RemoteClient::new(&self.base_url())
    }

    pub async fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().await
    }
}

async fn get_destination(State(state): State<Shared>, Path(id): Path<DestinationId>) -> Response {
    let mut state = state.lock().await;
    state.destination_gets += 1;
    if let Some(status) = state.destination_status {
        return status.into_response();
    }
    if let Some(body) = state.raw_destination_body.clone() {
        return body.into_response();
    }
    match state.destinations.get(&id) {
        Some(destination) => Json(destination.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_wishlist(State(state): State<Shared>, Path(_tourist): Path<i64>) -> Response {
    let (barrier, started, gate, delay) = {
        let mut state = state.lock().await;
        state.reads += 1;
        (
            state.read_barrier.clone(),
            state.read_started.clone(),
            state.read_gate.clone(),
            state.read_delay,
        )
    };
    if let Some(barrier) = barrier {
        barrier.wait().await;
    }
    if let Some(started) = started {
        started.notify_one();
    }
    if let Some(gate) = gate {
        gate.notified().await;
    }
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let state = state.lock().await;
    if let Some(status) = state.read_status {
        return status.into_response();
    }
    if let Some(body) = state.raw_wishlist_body.clone() {
        return body.into_response();
    }
    Json(state.wishlist.clone()).into_response()
}

async fn create_wishlist(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().await;
    state.creates += 1;
    state.created.push(body.clone());
    if let Some(status) = state.create_status {
        return status.into_response();
    }

    state.next_wishlist_id += 1;
    let wishlist = Wishlist {
        id: state.next_wishlist_id,
        tourist_id: TouristId(body["touristId"].as_i64().unwrap_or_default()),
        destinations: serde_json::from_value(body["destinations"].clone()).unwrap_or_default(),
    };
    state.wishlist = Some(wishlist.clone());
    (StatusCode::CREATED, Json(wishlist)).into_response()
}

async fn update_wishlist(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().await;
    state.updates += 1;
    state.updated.push((id, body.clone()));
    if let Some(status) = state.update_status {
        return status.into_response();
    }

    let destinations: Vec<DestinationId> = serde_json::from_value(body).unwrap_or_default();
    match state.wishlist.as_mut() {
        Some(wishlist) if wishlist.id == id => {
            wishlist.destinations = destinations;
            Json(wishlist.clone()).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn add_destination(
    State(state): State<Shared>,
    Path((tourist, destination)): Path<(i64, DestinationId)>,
) -> Response {
    let mut state = state.lock().await;
    let tourist = TouristId(tourist);
    let existing = state.wishlist.clone().filter(|w| w.tourist_id == tourist);

    let outcome = match plan_upsert(existing.as_ref(), tourist, destination) {
        UpsertPlan::Create(new_wishlist) => {
            state.next_wishlist_id += 1;
            state.wishlist = Some(Wishlist {
                id: state.next_wishlist_id,
                tourist_id: new_wishlist.tourist_id,
                destinations: new_wishlist.destinations,
            });
            UpsertOutcome::Created
        }
        UpsertPlan::Append { destinations, .. } => {
            if let Some(wishlist) = state.wishlist.as_mut() {
                wishlist.destinations = destinations;
            }
            UpsertOutcome::Appended
        }
        UpsertPlan::AlreadyPresent => UpsertOutcome::AlreadyPresent,
    };

    match state.wishlist.clone() {
        Some(wishlist) => Json(AddDestinationResponse { outcome, wishlist }).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
