//! SeaORM 主存储实现
//!
//! 统一的文档存储层，支持 SQLite、PostgreSQL 和 MySQL。

mod documents;

use crate::config::DatabaseConfig;
use crate::errors::{Result, SchoolError};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// SeaORM 存储实现
#[derive(Clone)]
pub struct SeaOrmStore {
    pub(crate) db: DatabaseConnection,
}

impl SeaOrmStore {
    /// 连接主存储、运行表结构迁移并做一次连通性检测
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db_url = Self::build_database_url(&config.url, &config.name)?;

        // 根据数据库类型选择连接方式
        let db = if db_url.starts_with("sqlite:") {
            Self::connect_sqlite(&db_url, config).await?
        } else {
            Self::connect_generic(&db_url, config).await?
        };

        let store = Self::from_connection(db).await?;
        store.ping().await?;

        info!("Primary store initialized, database: {}", db_url);

        Ok(store)
    }

    /// 使用已建立的连接，运行迁移
    pub async fn from_connection(db: DatabaseConnection) -> Result<Self> {
        Migrator::up(&db, None)
            .await
            .map_err(|e| SchoolError::database_operation(format!("数据库迁移失败: {e}")))?;
        Ok(Self { db })
    }

    /// 连通性检测
    pub async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| SchoolError::backend_unavailable(format!("主存储无响应: {e}")))
    }

    pub fn backend_name(&self) -> &'static str {
        match self.db.get_database_backend() {
            sea_orm::DatabaseBackend::Sqlite => "sqlite",
            sea_orm::DatabaseBackend::Postgres => "postgres",
            sea_orm::DatabaseBackend::MySql => "mysql",
            #[allow(unreachable_patterns)]
            _ => "database",
        }
    }

    /// SQLite 专用连接（WAL + pragma 优化）
    async fn connect_sqlite(url: &str, config: &DatabaseConfig) -> Result<DatabaseConnection> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::sqlite::{
            SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
        };
        use std::str::FromStr;

        let in_memory = url.contains(":memory:");
        let opt = SqliteConnectOptions::from_str(url)
            .map_err(|e| SchoolError::database_config(format!("SQLite URL 解析失败: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .pragma("temp_store", "memory");

        // 内存库每个连接各自独立，只能用单连接
        let max_connections = if in_memory { 1 } else { config.pool_size };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .test_before_acquire(true)
            .acquire_timeout(Duration::from_secs(config.timeout))
            .idle_timeout(None)
            .connect_with(opt)
            .await
            .map_err(|e| SchoolError::database_connection(format!("SQLite 连接失败: {e}")))?;

        Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
    }

    /// 通用连接（PostgreSQL、MySQL 等）
    async fn connect_generic(url: &str, config: &DatabaseConfig) -> Result<DatabaseConnection> {
        let mut opt = ConnectOptions::new(url);
        opt.max_connections(config.pool_size)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(config.timeout))
            .acquire_timeout(Duration::from_secs(config.timeout))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging(false)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        Database::connect(opt)
            .await
            .map_err(|e| SchoolError::database_connection(format!("无法连接到数据库: {e}")))
    }

    /// 从 URL 自动推断数据库类型并构建连接 URL
    ///
    /// 网络数据库的 URL 未携带库名时，使用 `name` 补全。
    fn build_database_url(url: &str, name: &str) -> Result<String> {
        if url.starts_with("sqlite:") {
            Ok(url.to_string())
        } else if url.ends_with(".db") || url.ends_with(".sqlite") {
            Ok(format!("sqlite://{url}?mode=rwc"))
        } else if url == ":memory:" {
            Ok("sqlite::memory:".to_string())
        } else if url.starts_with("postgres://")
            || url.starts_with("postgresql://")
            || url.starts_with("mysql://")
            || url.starts_with("mariadb://")
        {
            Ok(Self::with_database_name(url, name))
        } else {
            Err(SchoolError::database_config(format!(
                "无法从 URL 推断数据库类型: {url}. 支持: sqlite://, postgres://, mysql://, 或 .db/.sqlite 文件路径"
            )))
        }
    }

    fn with_database_name(url: &str, name: &str) -> String {
        if name.is_empty() {
            return url.to_string();
        }
        let (base, query) = match url.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (url, None),
        };
        let authority_start = base.find("://").map(|i| i + 3).unwrap_or(0);
        let mut result = match base[authority_start..].find('/') {
            // 已经带库名
            Some(slash) if authority_start + slash + 1 < base.len() => return url.to_string(),
            Some(_) => format!("{base}{name}"),
            None => format!("{base}/{name}"),
        };
        if let Some(query) = query {
            result.push('?');
            result.push_str(query);
        }
        result
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> SeaOrmStore {
    let config = DatabaseConfig {
        enabled: true,
        url: ":memory:".to_string(),
        name: String::new(),
        pool_size: 1,
        timeout: 5,
    };
    SeaOrmStore::connect(&config)
        .await
        .expect("in-memory sqlite should be available")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_database_url_sqlite() {
        assert_eq!(
            SeaOrmStore::build_database_url("data/school.db", "").unwrap(),
            "sqlite://data/school.db?mode=rwc"
        );
        assert_eq!(
            SeaOrmStore::build_database_url(":memory:", "school").unwrap(),
            "sqlite::memory:"
        );
    }

    #[test]
    fn test_build_database_url_appends_name() {
        assert_eq!(
            SeaOrmStore::build_database_url("postgres://u:p@localhost:5432", "school").unwrap(),
            "postgres://u:p@localhost:5432/school"
        );
        assert_eq!(
            SeaOrmStore::build_database_url("postgres://localhost/?sslmode=disable", "school")
                .unwrap(),
            "postgres://localhost/school?sslmode=disable"
        );
        assert_eq!(
            SeaOrmStore::build_database_url("mysql://localhost/other", "school").unwrap(),
            "mysql://localhost/other"
        );
    }

    #[test]
    fn test_build_database_url_rejects_unknown_scheme() {
        let err = SeaOrmStore::build_database_url("mongodb://localhost", "school").unwrap_err();
        assert_eq!(err.code(), "E001");
    }
}
