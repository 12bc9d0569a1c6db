use serde_json::json;
use tracing::info;

use super::AccountService;
use super::guardians::require_admin;
use crate::access::Actor;
use crate::errors::{Result, SchoolError};
use crate::models::Role;
use crate::models::accounts::entities::AccountStatus;
use crate::models::common::record_from_value;

/// 修改账户状态；停用即软删除，记录保留
pub async fn set_status(
    service: &AccountService,
    actor: &Actor,
    role: Role,
    account_id: &str,
    status: AccountStatus,
) -> Result<()> {
    // 管理员账户只能由主管理员处理
    if role == Role::Admin {
        service.guard.can_manage_admins(actor).await.into_result()?;
    } else {
        require_admin(actor)?;
    }

    let collection = role.collection();
    if service
        .router()
        .get_by_id(collection, account_id)
        .await
        .is_none()
    {
        return Err(SchoolError::not_found(format!(
            "{collection}/{account_id} 不存在"
        )));
    }

    let fields = record_from_value(json!({ "status": status }))?;
    service
        .router()
        .update(collection, account_id, fields)
        .await?;

    service
        .audit
        .record(
            actor,
            "set_status",
            collection.as_str(),
            account_id,
            Some(json!({ "status": status })),
        )
        .await;
    info!("Account {}/{} set to {}", collection, account_id, status);
    Ok(())
}
