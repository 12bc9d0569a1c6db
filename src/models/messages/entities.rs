use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::common::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_role: Role,
    pub receiver_id: String,
    pub receiver_role: Role,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
