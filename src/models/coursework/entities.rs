use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 分数上限（法国学制，满分 20）
pub const MAX_GRADE: f64 = 20.0;

// 课程资料
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coursework {
    pub id: String,
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    pub file_path: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// 作业
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// 作业提交
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub exercise_id: String,
    pub student_id: String,
    pub file_path: String,
    #[serde(default)]
    pub grade: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
}

// 成绩，由已评分的提交生成时携带 exercise_id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub exercise_id: Option<String>,
    pub value: f64,
    #[serde(default)]
    pub commentary: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}
