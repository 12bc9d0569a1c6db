use serde::Deserialize;

use crate::models::common::Role;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub receiver_role: Role,
    pub subject: String,
    pub content: String,
}
