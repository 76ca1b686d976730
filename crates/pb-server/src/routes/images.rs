use axum::Json;
use axum::extract::{Path, State};
use pb_compute::functions::{self, ImageMetadata};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<ImageMetadata>>, ApiError> {
    let images = state.adapter.list_images().await?;
    Ok(Json(images.iter().map(functions::image_metadata).collect()))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<ImageMetadata>, ApiError> {
    let image = state.adapter.get_image(&image_id).await?;
    Ok(Json(functions::image_metadata(&image)))
}
