//! 业务服务层
//!
//! 所有读写都经由 `PersistenceRouter`；跨记录的引用一致性在这里维护。

pub mod accounts;
pub mod classes;
pub mod coursework;
pub mod messages;
pub mod system;

pub use accounts::AccountService;
pub use classes::ClassService;
pub use coursework::CourseworkService;
pub use messages::MessageService;
pub use system::{AuditLog, BackupService, MigrationService, RelationshipRepair, SettingsService};
