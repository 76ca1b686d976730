pub mod images;
pub mod locations;
pub mod nodes;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Catalog
        .route("/locations", get(locations::list_locations))
        .route("/hardware", get(locations::list_hardware))
        .route("/images", get(images::list_images))
        .route("/images/{id}", get(images::get_image))
        // Nodes
        .route("/nodes", post(nodes::create_node).get(nodes::list_nodes))
        .route(
            "/nodes/{datacenter_id}/{server_id}",
            get(nodes::get_node).delete(nodes::destroy_node),
        )
        .route("/nodes/{datacenter_id}/{server_id}/reboot", post(nodes::reboot_node))
        .route("/nodes/{datacenter_id}/{server_id}/resume", post(nodes::resume_node))
        .route("/nodes/{datacenter_id}/{server_id}/suspend", post(nodes::suspend_node))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
