//! 全量备份与恢复
//!
//! 备份文件格式与快照文件相同。恢复是破坏性的，且不是跨集合事务：
//! 中途失败时部分集合已恢复、其余保持原样，报告中逐个集合体现。
//! 恢复期间不做读写互斥，需要在维护窗口内执行。

use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::AuditLog;
use crate::access::Actor;
use crate::errors::{Result, SchoolError};
use crate::models::common::record_id;
use crate::models::system::responses::{CollectionRestoreStatus, RestoreReport};
use crate::models::{Collection, Record};
use crate::storage::{PersistenceRouter, SnapshotDocument};

const BACKUP_PREFIX: &str = "backup-";

pub struct BackupService {
    router: Arc<PersistenceRouter>,
    backup_dir: PathBuf,
}

impl BackupService {
    pub fn new(router: Arc<PersistenceRouter>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            router,
            backup_dir: backup_dir.into(),
        }
    }

    /// 生成带时间戳的备份文件名（微秒时间戳 + 随机后缀，避免并发冲突）
    fn backup_file_name() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{BACKUP_PREFIX}{}-{}.json",
            Utc::now().format("%Y%m%dT%H%M%S%6fZ"),
            &suffix[..8]
        )
    }

    /// 通过路由器读取全部集合并写入备份文件
    pub async fn create_backup(&self) -> Result<PathBuf> {
        let mut document = SnapshotDocument::default();
        for collection in Collection::ALL {
            let records = self.router.get_all(collection).await;
            document.set_records(collection, records)?;
        }

        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|e| {
                SchoolError::file_operation(format!(
                    "创建备份目录 {} 失败: {e}",
                    self.backup_dir.display()
                ))
            })?;

        let path = self.backup_dir.join(Self::backup_file_name());
        document.write_to(&path).await?;

        info!("Backup written to {}", path.display());
        Ok(path)
    }

    /// 列出备份目录中的备份文件（按文件名升序，即时间顺序）
    pub async fn list_backups(&self) -> Result<Vec<PathBuf>> {
        if !tokio::fs::try_exists(&self.backup_dir).await? {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.backup_dir).await?;
        let mut backups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json") {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// 从备份文件恢复
    ///
    /// 文件无法读取或解析时返回错误；单个集合的失败只记录在报告中。
    pub async fn restore_backup(&self, path: &Path) -> Result<RestoreReport> {
        let document = SnapshotDocument::read_from(path).await?;
        let mut report = RestoreReport {
            success: true,
            ..Default::default()
        };

        for (name, records) in document.collections {
            let status = match name.parse::<Collection>() {
                Ok(collection) if !collection.is_singleton() => {
                    self.restore_collection(collection, records).await
                }
                Ok(collection) => Err(SchoolError::validation(format!(
                    "{collection} 必须以单个对象保存"
                ))),
                Err(e) => Err(e),
            };
            report.collections.insert(name, Self::into_status(status));
        }

        if let Some(settings) = document.settings {
            let status = self
                .restore_collection(Collection::Settings, vec![settings])
                .await;
            report.collections.insert(
                Collection::Settings.as_str().to_string(),
                Self::into_status(status),
            );
        }

        report.success = report.collections.values().all(|s| s.is_restored());
        if report.success {
            info!(
                "Restore from {} completed ({} collections)",
                path.display(),
                report.collections.len()
            );
        } else {
            warn!(
                "Restore from {} partially failed: {:?}",
                path.display(),
                report.failed_collections()
            );
        }

        Ok(report)
    }

    /// 管理员发起的恢复，完成后写入审计（恢复会覆盖审计集合，所以放在最后）
    pub async fn restore_backup_by(&self, actor: &Actor, path: &Path) -> Result<RestoreReport> {
        let report = self.restore_backup(path).await?;
        AuditLog::new(self.router.clone())
            .record(
                actor,
                "restore_backup",
                "backup",
                &path.display().to_string(),
                Some(json!({
                    "success": report.success,
                    "failed": report.failed_collections(),
                })),
            )
            .await;
        Ok(report)
    }

    /// 用备份记录整体替换当前负责该集合的后端中的内容
    async fn restore_collection(&self, collection: Collection, records: Vec<Record>) -> Result<u64> {
        if let Some(bad) = records.iter().position(|r| record_id(r).is_none()) {
            return Err(SchoolError::validation(format!(
                "备份中 {collection} 第 {bad} 条记录缺少 id"
            )));
        }

        let backend = self.router.backend_for(collection);
        let count = backend.replace_all(collection, records).await?;
        info!(
            "Restored {} record(s) into {} on {}",
            count,
            collection,
            backend.name()
        );
        Ok(count)
    }

    fn into_status(result: Result<u64>) -> CollectionRestoreStatus {
        match result {
            Ok(count) => CollectionRestoreStatus::Restored { count },
            Err(e) => {
                error!("Collection restore failed: {}", e);
                CollectionRestoreStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        DeleteOutcome, InsertOutcome, RoutingTable, SnapshotStore, StorageBackend, UpdateOutcome,
    };
    use crate::test_support::{ids, record, snapshot_router};
    use async_trait::async_trait;
    use serde_json::json;

    #[tokio::test]
    async fn test_backup_then_restore_round_trip() {
        let (dir, router) = snapshot_router(json!({
            "students": [{"id": "s1", "classId": "c1"}, {"id": "s2", "classId": "c1"}],
            "classes": [{"id": "c1", "name": "6eA", "subjects": []}],
            "settings": {"id": "settings", "schoolName": "Collège Jean Moulin"}
        }))
        .await;
        let service = BackupService::new(router.clone(), dir.path().join("backups"));

        let path = service.create_backup().await.unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("backup-"));

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw["settings"].is_object());
        assert_eq!(raw["students"].as_array().unwrap().len(), 2);

        // 破坏数据后恢复
        router.delete(Collection::Students, "s1").await.unwrap();
        router
            .insert(Collection::Students, record(json!({"id": "s9", "classId": "c1"})))
            .await
            .unwrap();

        let report = service.restore_backup(&path).await.unwrap();
        assert!(report.success);
        assert_eq!(
            report.collections["students"],
            CollectionRestoreStatus::Restored { count: 2 }
        );
        assert_eq!(
            report.collections["settings"],
            CollectionRestoreStatus::Restored { count: 1 }
        );
        let students = router.get_all(Collection::Students).await;
        assert_eq!(crate::test_support::ids(&students), vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_backup_names_do_not_collide() {
        let (dir, router) = snapshot_router(json!({})).await;
        let service = BackupService::new(router, dir.path().join("backups"));
        let a = service.create_backup().await.unwrap();
        let b = service.create_backup().await.unwrap();
        assert_ne!(a, b);
        assert_eq!(service.list_backups().await.unwrap().len(), 2);
    }

    /// 对指定集合的写入总是失败的后端
    struct FailingOn {
        inner: SnapshotStore,
        failing: Collection,
    }

    impl FailingOn {
        fn check(&self, collection: Collection) -> Result<()> {
            if collection == self.failing {
                Err(SchoolError::database_operation("simulated write failure"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl StorageBackend for FailingOn {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn get_all(&self, c: Collection) -> Result<Vec<Record>> {
            self.inner.get_all(c).await
        }
        async fn get_by_id(&self, c: Collection, id: &str) -> Result<Option<Record>> {
            self.inner.get_by_id(c, id).await
        }
        async fn insert(&self, c: Collection, r: Record) -> Result<InsertOutcome> {
            self.check(c)?;
            self.inner.insert(c, r).await
        }
        async fn update(&self, c: Collection, id: &str, f: Record) -> Result<UpdateOutcome> {
            self.check(c)?;
            self.inner.update(c, id, f).await
        }
        async fn delete(&self, c: Collection, id: &str) -> Result<DeleteOutcome> {
            self.check(c)?;
            self.inner.delete(c, id).await
        }
        async fn insert_many(&self, c: Collection, r: Vec<Record>) -> Result<u64> {
            self.check(c)?;
            self.inner.insert_many(c, r).await
        }
        async fn clear(&self, c: Collection) -> Result<u64> {
            self.inner.clear(c).await
        }
        async fn replace_all(&self, c: Collection, r: Vec<Record>) -> Result<u64> {
            self.check(c)?;
            self.inner.replace_all(c, r).await
        }
    }

    #[tokio::test]
    async fn test_partial_restore_is_reported_per_collection() {
        let dir = tempfile::tempdir().unwrap();
        let backup_path = dir.path().join("backup.json");
        std::fs::write(
            &backup_path,
            serde_json::to_vec(&json!({
                "teachers": [{"id": "t1"}, {"id": "t2"}],
                "grades": [{"id": "g1"}],
                "messages": [{"id": "m1"}, {"id": "m2"}, {"id": "m3"}]
            }))
            .unwrap(),
        )
        .unwrap();

        let db_path = dir.path().join("db.json");
        std::fs::write(
            &db_path,
            serde_json::to_vec(&json!({"grades": [{"id": "old1"}, {"id": "old2"}]})).unwrap(),
        )
        .unwrap();
        let backend = FailingOn {
            inner: SnapshotStore::open(&db_path).await.unwrap(),
            failing: Collection::Grades,
        };
        let router = Arc::new(PersistenceRouter::fallback_active(
            None,
            Arc::new(backend),
            RoutingTable::default(),
        ));
        let service = BackupService::new(router.clone(), dir.path().join("backups"));

        let report = service.restore_backup(&backup_path).await.unwrap();
        assert!(!report.success);
        assert!(matches!(
            report.collections["grades"],
            CollectionRestoreStatus::Failed { .. }
        ));
        assert_eq!(
            report.collections["teachers"],
            CollectionRestoreStatus::Restored { count: 2 }
        );
        assert_eq!(
            report.collections["messages"],
            CollectionRestoreStatus::Restored { count: 3 }
        );
        // 已恢复的集合不会回滚
        assert_eq!(router.get_all(Collection::Messages).await.len(), 3);
        // 失败的集合保留原有记录
        assert_eq!(
            ids(&router.get_all(Collection::Grades).await),
            vec!["old1", "old2"]
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["success"], false);
        assert!(value["collections"]["grades"]["error"].is_string());
        assert_eq!(value["collections"]["teachers"]["count"], 2);

        let err = report.into_result().unwrap_err();
        assert_eq!(err.code(), "E012");
    }

    #[tokio::test]
    async fn test_unknown_collection_in_backup_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backup_path = dir.path().join("backup.json");
        std::fs::write(
            &backup_path,
            serde_json::to_vec(&json!({"homeworks": [{"id": "h1"}], "classes": []})).unwrap(),
        )
        .unwrap();
        let (_db_dir, router) = snapshot_router(json!({})).await;
        let service = BackupService::new(router, dir.path().join("backups"));

        let report = service.restore_backup(&backup_path).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.failed_collections(), vec!["homeworks"]);
        assert_eq!(
            report.collections["classes"],
            CollectionRestoreStatus::Restored { count: 0 }
        );
    }

    #[tokio::test]
    async fn test_restore_by_admin_is_audited() {
        let (dir, router) = snapshot_router(json!({
            "classes": [{"id": "c1", "name": "6eA", "subjects": []}]
        }))
        .await;
        let service = BackupService::new(router.clone(), dir.path().join("backups"));
        let path = service.create_backup().await.unwrap();

        let admin = Actor::new("A1", crate::models::Role::Admin);
        let report = service.restore_backup_by(&admin, &path).await.unwrap();
        assert!(report.success);

        let entries = AuditLog::new(router).entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "restore_backup");
        assert_eq!(entries[0].details.as_ref().unwrap()["success"], true);
    }
}
