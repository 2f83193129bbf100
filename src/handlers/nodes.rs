//! Node registry handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Node;
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterNodeQuery {
    #[validate(length(min = 1, max = 64))]
    pub node_id: String,
}

#[derive(Debug, Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<Node>,
    pub total_nodes: usize,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub status: &'static str,
    pub node: Node,
}

pub async fn status(State(state): State<AppState>) -> Json<NodesResponse> {
    let nodes = state.defense.registry.snapshot();
    Json(NodesResponse {
        total_nodes: nodes.len(),
        nodes,
    })
}

pub async fn register(
    State(state): State<AppState>,
    Query(query): Query<RegisterNodeQuery>,
) -> AppResult<Json<RegisterResponse>> {
    query.validate()?;

    let node_id = query.node_id.trim();
    if node_id.is_empty() {
        return Err(crate::AppError::ValidationError("node_id must not be blank".to_string()));
    }

    let (node, created) = state.defense.registry.register(node_id);
    if created {
        tracing::info!("Node {} registered", node.node_id);
    }

    Ok(Json(RegisterResponse {
        status: if created { "registered" } else { "exists" },
        node,
    }))
}
