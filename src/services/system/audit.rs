//! 管理员操作审计
//!
//! 审计集合默认走快照优先路由。写入失败只记录日志，不影响已完成的操作。

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use crate::access::Actor;
use crate::models::common::{from_record, new_record_id, to_record};
use crate::models::system::entities::AuditEntry;
use crate::models::Collection;
use crate::storage::PersistenceRouter;

pub struct AuditLog {
    router: Arc<PersistenceRouter>,
}

impl AuditLog {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self { router }
    }

    /// 追加一条审计记录，`target` 为集合名或其他操作对象（如备份文件）
    pub async fn record(
        &self,
        actor: &Actor,
        action: &str,
        target: &str,
        target_id: &str,
        details: Option<Value>,
    ) {
        let entry = AuditEntry {
            id: new_record_id(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            action: action.to_string(),
            target_collection: target.to_string(),
            target_id: target_id.to_string(),
            details,
            at: Utc::now(),
        };

        let record = match to_record(&entry) {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to serialize audit entry {}: {}", action, e);
                return;
            }
        };

        match self.router.insert(Collection::AdminAuditLog, record).await {
            Ok(_) => debug!(
                "Audit: {} by {} on {}/{}",
                action, actor.id, target, target_id
            ),
            Err(e) => error!("Failed to append audit entry {}: {}", action, e),
        }
    }

    /// 按时间顺序返回全部审计记录
    pub async fn entries(&self) -> Vec<AuditEntry> {
        let mut entries: Vec<AuditEntry> = self
            .router
            .get_all(Collection::AdminAuditLog)
            .await
            .into_iter()
            .filter_map(|record| from_record(record).ok())
            .collect();
        entries.sort_by_key(|entry| entry.at);
        entries
    }
}
