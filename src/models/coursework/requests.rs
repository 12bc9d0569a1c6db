use serde::Deserialize;

// 学生提交作业
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExerciseRequest {
    pub exercise_id: String,
    pub file_path: String,
}

// 教师评分
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSubmissionRequest {
    pub grade: f64,
    #[serde(default)]
    pub comment: Option<String>,
}
