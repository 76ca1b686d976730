use axum::Json;
use axum::extract::State;
use pb_compute::functions::Location;

use crate::dto::HardwareResponse;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_locations(State(state): State<AppState>) -> Result<Json<Vec<Location>>, ApiError> {
    Ok(Json(state.adapter.list_locations().await?))
}

pub async fn list_hardware(State(state): State<AppState>) -> Json<Vec<HardwareResponse>> {
    Json(
        state
            .adapter
            .list_hardware_profiles()
            .into_iter()
            .map(HardwareResponse::from)
            .collect(),
    )
}
