use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use pb_compute::functions::{self, NodeMetadata};
use pb_compute::hardware::Hardware;
use pb_compute::types::{Template, TemplateLocation, TemplateOptions};
use uuid::Uuid;

use crate::dto::{CreateNodeRequest, CreatedNodeResponse, ListNodesQuery};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_node(
    State(state): State<AppState>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<CreatedNodeResponse>), ApiError> {
    let group = req.group.trim().to_string();
    if group.is_empty() {
        return Err(ApiError::BadRequest("group must not be empty".into()));
    }

    let hardware = Hardware::from_id(&req.hardware_id)?.with_extra_volumes(&req.extra_volumes_gb);
    let name = req
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| default_name(&group));

    let template = Template {
        location: TemplateLocation {
            id: req.location_id,
            region: None,
        },
        image_id: req.image_id,
        hardware,
        options: TemplateOptions {
            login_user: req.login_user,
            login_password: req.password,
            login_private_key: req.private_key,
            networks: req.networks,
            inbound_ports: req.inbound_ports,
        },
    };

    let created = state
        .adapter
        .create_node_with_group_encoded_into_name(&group, &name, &template)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedNodeResponse {
            node: functions::node_metadata(&created.node),
            credentials: created.credentials,
            skipped: created.skipped,
        }),
    ))
}

/// `<group>-<8 hex chars>`
fn default_name(group: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{group}-{}", &suffix[..8])
}

pub async fn list_nodes(
    State(state): State<AppState>,
    Query(query): Query<ListNodesQuery>,
) -> Result<Json<Vec<NodeMetadata>>, ApiError> {
    let nodes = match query.ids {
        Some(ids) => {
            let ids: Vec<String> = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            state.adapter.list_nodes_by_ids(&ids).await?
        }
        None => state.adapter.list_nodes().await?,
    };
    Ok(Json(nodes.iter().map(functions::node_metadata).collect()))
}

pub async fn get_node(
    State(state): State<AppState>,
    Path((datacenter_id, server_id)): Path<(String, String)>,
) -> Result<Json<NodeMetadata>, ApiError> {
    let node = state.adapter.get_node(&format!("{datacenter_id}/{server_id}")).await?;
    Ok(Json(functions::node_metadata(&node)))
}

pub async fn destroy_node(
    State(state): State<AppState>,
    Path((datacenter_id, server_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.adapter.destroy_node(&format!("{datacenter_id}/{server_id}")).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reboot_node(
    State(state): State<AppState>,
    Path((datacenter_id, server_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.adapter.reboot_node(&format!("{datacenter_id}/{server_id}")).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_node(
    State(state): State<AppState>,
    Path((datacenter_id, server_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.adapter.resume_node(&format!("{datacenter_id}/{server_id}")).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn suspend_node(
    State(state): State<AppState>,
    Path((datacenter_id, server_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.adapter.suspend_node(&format!("{datacenter_id}/{server_id}")).await?;
    Ok(StatusCode::NO_CONTENT)
}
