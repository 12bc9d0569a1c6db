use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::{Result, SchoolError};
use crate::models::common::Collection;
use crate::storage::BackendState;

/// 单个集合的迁移结果
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStatus {
    Inserted(u64),
    // 主存储已有数据，不覆盖
    Skipped,
    // 快照中没有该集合的数据
    EmptySource,
}

/// 迁移报告
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MigrationReport {
    pub collections: BTreeMap<Collection, MigrationStatus>,
}

impl MigrationReport {
    pub fn status(&self, collection: Collection) -> Option<&MigrationStatus> {
        self.collections.get(&collection)
    }

    /// 本次实际写入的记录总数
    pub fn total_inserted(&self) -> u64 {
        self.collections
            .values()
            .map(|s| match s {
                MigrationStatus::Inserted(n) => *n,
                _ => 0,
            })
            .sum()
    }
}

/// 单个集合的恢复结果：`{count}` 或 `{error}`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CollectionRestoreStatus {
    Restored { count: u64 },
    Failed { error: String },
}

impl CollectionRestoreStatus {
    pub fn is_restored(&self) -> bool {
        matches!(self, CollectionRestoreStatus::Restored { .. })
    }
}

/// 恢复报告
///
/// 恢复不是跨集合事务：`success == false` 时，已成功的集合保持恢复后的状态。
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RestoreReport {
    pub success: bool,
    pub collections: BTreeMap<String, CollectionRestoreStatus>,
}

impl RestoreReport {
    /// 需要把部分失败当作错误处理的调用方使用
    pub fn into_result(self) -> Result<RestoreReport> {
        if self.success {
            Ok(self)
        } else {
            Err(SchoolError::partial_restore(format!(
                "以下集合恢复失败: {}",
                self.failed_collections().join(", ")
            )))
        }
    }

    pub fn failed_collections(&self) -> Vec<&str> {
        self.collections
            .iter()
            .filter(|(_, status)| !status.is_restored())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// 关系修复结果
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub dangling_child_ids_removed: u64,
    pub missing_child_links_added: u64,
    pub dangling_guardian_refs_cleared: u64,
    pub orphan_grades_removed: u64,
    pub orphan_submissions_removed: u64,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == RepairReport::default()
    }
}

/// 存储状态概览
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatusResponse {
    pub state: BackendState,
    pub primary_configured: bool,
    pub counts: BTreeMap<Collection, u64>,
}
