//! 启动流程
//!
//! 配置 -> 打开快照 -> 连接主存储 -> 选择后端 -> (开发环境) 迁移 -> 初始化设置。
//! 后端选择的结果在进程生命周期内固定。

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::system::responses::MigrationReport;
use crate::services::{MigrationService, SettingsService};
use crate::storage::{
    BackendState, PersistenceRouter, RoutingTable, SeaOrmStore, SnapshotStore, StorageBackend,
};

pub struct AppContext {
    pub router: Arc<PersistenceRouter>,
    // 开发环境启动时执行的迁移结果
    pub migration: Option<MigrationReport>,
}

/// 准备运行上下文
pub async fn prepare_startup(config: &AppConfig) -> Result<AppContext> {
    let state = BackendState::Uninitialized;

    let snapshot: Arc<dyn StorageBackend> =
        Arc::new(SnapshotStore::open(&config.snapshot.path).await?);
    let routing = RoutingTable::from_names(&config.routing.fallback_collections)?;

    let state = state.advance(BackendState::Connecting)?;
    let primary = if config.database.enabled {
        SeaOrmStore::connect(&config.database)
            .await
            .map(|store| Arc::new(store) as Arc<dyn StorageBackend>)
    } else {
        Err(SchoolError::backend_unavailable("主存储已在配置中禁用"))
    };

    let (router, migration) =
        select_backend(state, config.is_production(), primary, snapshot, routing).await?;
    let router = Arc::new(router);

    let settings = SettingsService::new(router.clone());
    if let Err(e) = settings.ensure_default(&config.app.system_name).await {
        warn!("Failed to seed default settings: {}", e);
    }

    info!("Storage ready in {:?} state", router.state());
    Ok(AppContext { router, migration })
}

/// 根据主存储的连接结果确定终态
///
/// - 主存储不可达：生产环境启动失败，开发环境使用快照
/// - 生产环境：主存储为空时使用快照，不自动迁移
/// - 开发环境：先迁移再使用主存储，迁移失败时使用快照
pub async fn select_backend(
    state: BackendState,
    production: bool,
    primary: Result<Arc<dyn StorageBackend>>,
    snapshot: Arc<dyn StorageBackend>,
    routing: RoutingTable,
) -> Result<(PersistenceRouter, Option<MigrationReport>)> {
    let primary = match primary {
        Ok(primary) => primary,
        Err(e) if production => {
            return Err(SchoolError::backend_unavailable(format!(
                "生产环境要求主存储可用: {e}"
            )));
        }
        Err(e) => {
            warn!("Primary store unavailable, serving from snapshot: {}", e);
            state.advance(BackendState::FallbackActive)?;
            return Ok((PersistenceRouter::fallback_active(None, snapshot, routing), None));
        }
    };

    if production {
        let mut total = 0;
        for collection in Collection::ALL {
            total += primary.count(collection).await?;
        }
        if total == 0 {
            warn!(
                "Primary store is empty and auto-migration is disabled in production, serving from snapshot"
            );
            state.advance(BackendState::FallbackActive)?;
            return Ok((
                PersistenceRouter::fallback_active(Some(primary), snapshot, routing),
                None,
            ));
        }
        state.advance(BackendState::PrimaryActive)?;
        return Ok((
            PersistenceRouter::primary_active(primary, snapshot, routing),
            None,
        ));
    }

    match MigrationService::new(primary.clone(), snapshot.clone())
        .migrate()
        .await
    {
        Ok(report) => {
            info!(
                "Startup migration copied {} record(s)",
                report.total_inserted()
            );
            state.advance(BackendState::PrimaryActive)?;
            Ok((
                PersistenceRouter::primary_active(primary, snapshot, routing),
                Some(report),
            ))
        }
        Err(e) => {
            warn!("Startup migration failed, serving from snapshot: {}", e);
            state.advance(BackendState::FallbackActive)?;
            Ok((
                PersistenceRouter::fallback_active(Some(primary), snapshot, routing),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppSettings, BackupConfig, DatabaseConfig, RoutingConfig, SnapshotConfig};
    use crate::models::system::responses::MigrationStatus;
    use crate::storage::router::tests::UnreachableBackend;
    use crate::storage::sea_orm_storage::memory_store;
    use crate::test_support::record;
    use serde_json::json;

    async fn snapshot_with_classes(dir: &tempfile::TempDir) -> Arc<dyn StorageBackend> {
        let path = dir.path().join("db.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({"classes": [{"id": "C1", "name": "6eA"}]})).unwrap(),
        )
        .unwrap();
        Arc::new(SnapshotStore::open(&path).await.unwrap())
    }

    fn unreachable() -> Result<Arc<dyn StorageBackend>> {
        Err(SchoolError::database_connection("connection refused"))
    }

    #[tokio::test]
    async fn test_unreachable_primary_in_development_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot_with_classes(&dir).await;
        let (router, migration) = select_backend(
            BackendState::Connecting,
            false,
            unreachable(),
            snapshot,
            RoutingTable::default(),
        )
        .await
        .unwrap();

        assert_eq!(router.state(), BackendState::FallbackActive);
        assert!(migration.is_none());
        assert_eq!(router.get_all(Collection::Classes).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_primary_in_production_fails() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot_with_classes(&dir).await;
        let result = select_backend(
            BackendState::Connecting,
            true,
            unreachable(),
            snapshot,
            RoutingTable::default(),
        )
        .await;
        assert!(matches!(result, Err(SchoolError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_development_migrates_then_uses_primary() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot_with_classes(&dir).await;
        let primary: Arc<dyn StorageBackend> = Arc::new(memory_store().await);

        let (router, migration) = select_backend(
            BackendState::Connecting,
            false,
            Ok(primary.clone()),
            snapshot,
            RoutingTable::default(),
        )
        .await
        .unwrap();

        assert_eq!(router.state(), BackendState::PrimaryActive);
        assert_eq!(
            migration.unwrap().status(Collection::Classes),
            Some(&MigrationStatus::Inserted(1))
        );
        assert_eq!(primary.count(Collection::Classes).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_production_with_empty_primary_serves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot_with_classes(&dir).await;
        let primary: Arc<dyn StorageBackend> = Arc::new(memory_store().await);

        let (router, migration) = select_backend(
            BackendState::Connecting,
            true,
            Ok(primary.clone()),
            snapshot.clone(),
            RoutingTable::default(),
        )
        .await
        .unwrap();
        assert_eq!(router.state(), BackendState::FallbackActive);
        assert!(migration.is_none());
        // 主存储句柄保留给手动迁移
        assert!(router.primary().is_some());
        assert_eq!(primary.count(Collection::Classes).await.unwrap(), 0);

        // 主存储已有数据时直接使用
        primary
            .insert(Collection::Students, record(json!({"id": "S1", "classId": "C1"})))
            .await
            .unwrap();
        let (router, _) = select_backend(
            BackendState::Connecting,
            true,
            Ok(primary),
            snapshot,
            RoutingTable::default(),
        )
        .await
        .unwrap();
        assert_eq!(router.state(), BackendState::PrimaryActive);
    }

    #[tokio::test]
    async fn test_failed_migration_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot_with_classes(&dir).await;
        let (router, migration) = select_backend(
            BackendState::Connecting,
            false,
            Ok(Arc::new(UnreachableBackend) as Arc<dyn StorageBackend>),
            snapshot,
            RoutingTable::default(),
        )
        .await
        .unwrap();
        assert_eq!(router.state(), BackendState::FallbackActive);
        assert!(migration.is_none());
    }

    #[tokio::test]
    async fn test_prepare_startup_without_primary() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            app: AppSettings {
                system_name: "Test School".to_string(),
                environment: "development".to_string(),
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                enabled: false,
                url: String::new(),
                name: String::new(),
                pool_size: 1,
                timeout: 1,
            },
            snapshot: SnapshotConfig {
                path: dir.path().join("db.json").display().to_string(),
            },
            backup: BackupConfig {
                dir: dir.path().join("backups").display().to_string(),
            },
            routing: RoutingConfig::default(),
        };

        let context = prepare_startup(&config).await.unwrap();
        assert_eq!(context.router.state(), BackendState::FallbackActive);
        let settings = SettingsService::new(context.router.clone()).get().await.unwrap();
        assert_eq!(settings.school_name, config.app.system_name);
    }
}
