use serde::Deserialize;

use crate::models::common::Role;

// 创建账户请求
//
// 角色相关字段放在 `details` 中，`role` 字段决定目标集合。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    // 已经处理过的口令密文，本层不做哈希
    pub password_secret: String,
    #[serde(flatten)]
    pub details: AccountDetails,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AccountDetails {
    #[serde(rename_all = "camelCase")]
    Admin {
        #[serde(default)]
        is_primary: bool,
    },
    #[serde(rename_all = "camelCase")]
    Teacher {
        #[serde(default)]
        assigned_class_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Student {
        class_id: String,
        #[serde(default)]
        birth_date: Option<String>,
        #[serde(default)]
        guardian_id: Option<String>,
    },
    #[serde(rename = "parent", rename_all = "camelCase")]
    Guardian {
        #[serde(default)]
        phone: Option<String>,
        #[serde(default)]
        child_ids: Vec<String>,
    },
}

impl AccountDetails {
    pub fn role(&self) -> Role {
        match self {
            AccountDetails::Admin { .. } => Role::Admin,
            AccountDetails::Teacher { .. } => Role::Teacher,
            AccountDetails::Student { .. } => Role::Student,
            AccountDetails::Guardian { .. } => Role::Guardian,
        }
    }
}
