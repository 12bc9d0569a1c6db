use serde::Serialize;

/// 删除学生的级联结果
///
/// 各步骤按顺序独立写入，中途失败时已完成的步骤不会回滚，
/// 可以重新执行删除或运行关系修复。
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentDeletionReport {
    pub grades_removed: u64,
    pub submissions_removed: u64,
    pub guardians_updated: u64,
    pub student_removed: bool,
}
