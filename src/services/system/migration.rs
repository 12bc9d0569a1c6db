//! 快照 -> 主存储的单向迁移
//!
//! 逐个集合执行：主存储中已有数据的集合跳过，绝不覆盖；
//! 因此可以重复执行，不会产生重复记录。

use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::system::responses::{MigrationReport, MigrationStatus};
use crate::storage::{PersistenceRouter, StorageBackend};

pub struct MigrationService {
    primary: Arc<dyn StorageBackend>,
    snapshot: Arc<dyn StorageBackend>,
}

impl MigrationService {
    pub fn new(primary: Arc<dyn StorageBackend>, snapshot: Arc<dyn StorageBackend>) -> Self {
        Self { primary, snapshot }
    }

    /// 从路由器取出两个后端，没有主存储时无法迁移
    pub fn from_router(router: &PersistenceRouter) -> Result<Self> {
        let primary = router
            .primary()
            .ok_or_else(|| SchoolError::backend_unavailable("主存储不可用，无法迁移"))?;
        Ok(Self::new(primary, router.snapshot()))
    }

    /// 迁移全部已知集合
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        for collection in Collection::ALL {
            let status = self.migrate_collection(collection).await?;
            report.collections.insert(collection, status);
        }

        info!(
            "Migration finished, {} record(s) copied into {}",
            report.total_inserted(),
            self.primary.name()
        );
        Ok(report)
    }

    /// 迁移单个集合
    pub async fn migrate_collection(&self, collection: Collection) -> Result<MigrationStatus> {
        let existing = self.primary.count(collection).await?;
        if existing > 0 {
            info!(
                "Skipping migration of {}: primary already holds {} record(s)",
                collection, existing
            );
            return Ok(MigrationStatus::Skipped);
        }

        let records = self.snapshot.get_all(collection).await?;
        if records.is_empty() {
            return Ok(MigrationStatus::EmptySource);
        }

        // 单例集合只写一条
        let inserted = if collection.is_singleton() {
            if records.len() > 1 {
                warn!(
                    "Snapshot holds {} records for singleton {}, migrating the first",
                    records.len(),
                    collection
                );
            }
            let Some(record) = records.into_iter().next() else {
                return Ok(MigrationStatus::EmptySource);
            };
            self.primary.insert(collection, record).await?;
            1
        } else {
            self.primary.insert_many(collection, records).await?
        };

        info!("Migrated {} record(s) into {}", inserted, collection);
        Ok(MigrationStatus::Inserted(inserted))
    }
}
