use serde_json::json;
use tracing::info;

use super::ClassService;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::accounts::entities::AccountStatus;
use crate::models::common::record_from_value;

/// 停用班级即软删除，科目与作业保持原样
pub async fn set_status(
    service: &ClassService,
    actor: &Actor,
    class_id: &str,
    status: AccountStatus,
) -> Result<()> {
    if !resolver::is_admin(actor).is_allowed() {
        return Err(SchoolError::authorization("只有管理员可以修改班级状态"));
    }

    let outcome = service
        .router()
        .update(
            Collection::Classes,
            class_id,
            record_from_value(json!({ "status": status }))?,
        )
        .await?;
    if outcome.matched == 0 {
        return Err(SchoolError::not_found(format!("班级 {class_id} 不存在")));
    }

    info!("Class {} set to {} by {}", class_id, status, actor.id);
    Ok(())
}
