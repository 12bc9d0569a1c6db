use serde::Deserialize;

// 创建班级请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub school_year: Option<String>,
    #[serde(default)]
    pub subjects: Vec<SubjectInput>,
}

// 科目输入，id 为空时自动分配
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub teacher_id: String,
}
