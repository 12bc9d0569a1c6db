//! 系统服务：迁移、备份恢复、设置、审计、关系修复

pub mod audit;
pub mod backup;
pub mod migration;
pub mod repair;
pub mod settings;

pub use audit::AuditLog;
pub use backup::BackupService;
pub use migration::MigrationService;
pub use repair::RelationshipRepair;
pub use settings::SettingsService;
