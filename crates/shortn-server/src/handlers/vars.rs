use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use shortn_client::CounterValue;
use std::collections::BTreeMap;

/// Every process counter as one JSON object.
pub async fn vars_handler(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, CounterValue>> {
    Json(state.counters().snapshot())
}
