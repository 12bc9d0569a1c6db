use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::common::{Record, Role};

/// 设置记录的固定 id
pub const SETTINGS_ID: &str = "settings";

/// 全校设置（单例）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub school_name: String,
    #[serde(default)]
    pub school_year: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    // 其余学校自定义配置项原样保留
    #[serde(flatten)]
    pub extra: Record,
}

impl Settings {
    pub fn with_school_name(school_name: impl Into<String>) -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            school_name: school_name.into(),
            school_year: None,
            updated_at: Some(Utc::now()),
            extra: Record::new(),
        }
    }
}

/// 管理员操作审计记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub actor_id: String,
    pub actor_role: Role,
    pub action: String,
    pub target_collection: String,
    pub target_id: String,
    #[serde(default)]
    pub details: Option<Value>,
    pub at: DateTime<Utc>,
}
