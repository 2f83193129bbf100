//! Cooperating node model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    pub status: String,
    pub blocked_threats: u64,
    pub last_update: DateTime<Utc>,
}

impl Node {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            status: STATUS_ACTIVE.to_string(),
            blocked_threats: 0,
            last_update: Utc::now(),
        }
    }
}
