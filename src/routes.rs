use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // WebSocket
        .route("/client-ws", get(crate::websocket::websocket_handler))
        // Health check
        .route("/api/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let connectivity = *state.connectivity.borrow();

    // Collect first; DashMap guards must not be held across an await
    let sessions: Vec<_> = state.sessions.iter().map(|e| e.value().clone()).collect();
    let mut in_flight = 0;
    for session in &sessions {
        if session.is_in_flight().await {
            in_flight += 1;
        }
    }

    Json(json!({
        "status": "ok",
        "connectivity": connectivity,
        "active_sessions": sessions.len(),
        "in_flight_sessions": in_flight
    }))
}
