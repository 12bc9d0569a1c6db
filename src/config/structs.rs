use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub database: DatabaseConfig,
    pub snapshot: SnapshotConfig,
    pub backup: BackupConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// 应用设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub system_name: String,
    pub environment: String, // development | production
    pub log_level: String,
}

/// 主存储（文档数据库）配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool, // false 时直接使用快照文件
    pub url: String,  // 数据库连接 URL（从 scheme 自动推断类型）
    #[serde(default)]
    pub name: String, // 数据库名，URL 未携带时追加
    pub pool_size: u32, // 连接池大小
    pub timeout: u64,   // 连接超时 (秒)
}

/// 快照文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub path: String,
}

/// 备份配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub dir: String,
}

/// 集合路由策略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// 始终由快照文件服务的集合
    pub fallback_collections: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallback_collections: vec!["adminAuditLog".to_string()],
        }
    }
}

fn default_true() -> bool {
    true
}
