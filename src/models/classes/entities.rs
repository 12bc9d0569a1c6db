use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::accounts::entities::AccountStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub school_year: Option<String>,
    // 科目内嵌在班级中，没有独立集合
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Class {
    /// 按 id 查找科目（科目 id 只在班级内唯一）
    pub fn subject(&self, subject_id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == subject_id)
    }
}

// 科目：一个教师在一个班级中的一门课
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
}
