//! 家长与学生的双向关联
//!
//! `Guardian.childIds` 与 `Student.guardianId` 互为镜像，两次写入之间没有事务；
//! 中途失败留下的不一致由关系修复处理。

use serde_json::{Value, json};
use tracing::info;

use super::AccountService;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::accounts::entities::{Guardian, Student};
use crate::models::common::{from_record, record_from_value};
use crate::models::Collection;

pub async fn link_guardian(
    service: &AccountService,
    actor: &Actor,
    guardian_id: &str,
    student_id: &str,
) -> Result<()> {
    require_admin(actor)?;
    load_guardian(service, guardian_id).await?;
    assign_guardian(service, guardian_id, student_id).await?;

    service
        .audit
        .record(
            actor,
            "link_guardian",
            Collection::Guardians.as_str(),
            guardian_id,
            Some(json!({ "studentId": student_id })),
        )
        .await;
    info!("Guardian {} linked to student {}", guardian_id, student_id);
    Ok(())
}

pub async fn unlink_guardian(
    service: &AccountService,
    actor: &Actor,
    guardian_id: &str,
    student_id: &str,
) -> Result<()> {
    require_admin(actor)?;
    let guardian = load_guardian(service, guardian_id).await?;
    let student = load_student(service, student_id).await?;

    if guardian.child_ids.iter().any(|id| id == student_id) {
        remove_child(service, &guardian, student_id).await?;
    }
    if student.guardian_id.as_deref() == Some(guardian_id) {
        set_student_guardian(service, student_id, Value::Null).await?;
    }

    service
        .audit
        .record(
            actor,
            "unlink_guardian",
            Collection::Guardians.as_str(),
            guardian_id,
            Some(json!({ "studentId": student_id })),
        )
        .await;
    info!("Guardian {} unlinked from student {}", guardian_id, student_id);
    Ok(())
}

/// 将学生挂到家长名下；学生原有的其他家长会先解除
pub(crate) async fn assign_guardian(
    service: &AccountService,
    guardian_id: &str,
    student_id: &str,
) -> Result<()> {
    let student = load_student(service, student_id).await?;

    if let Some(previous) = student.guardian_id.as_deref()
        && previous != guardian_id
        && let Ok(previous) = load_guardian(service, previous).await
    {
        remove_child(service, &previous, student_id).await?;
    }

    add_child(service, guardian_id, student_id).await?;
    if student.guardian_id.as_deref() != Some(guardian_id) {
        set_student_guardian(service, student_id, json!(guardian_id)).await?;
    }
    Ok(())
}

/// 在家长的 childIds 中登记学生（已存在时不重复）
pub(crate) async fn add_child(
    service: &AccountService,
    guardian_id: &str,
    student_id: &str,
) -> Result<()> {
    let guardian = load_guardian(service, guardian_id).await?;
    if guardian.child_ids.iter().any(|id| id == student_id) {
        return Ok(());
    }
    let mut child_ids = guardian.child_ids;
    child_ids.push(student_id.to_string());
    write_child_ids(service, guardian_id, child_ids).await
}

pub(crate) async fn remove_child(
    service: &AccountService,
    guardian: &Guardian,
    student_id: &str,
) -> Result<()> {
    let child_ids: Vec<String> = guardian
        .child_ids
        .iter()
        .filter(|id| *id != student_id)
        .cloned()
        .collect();
    write_child_ids(service, &guardian.id, child_ids).await
}

async fn write_child_ids(
    service: &AccountService,
    guardian_id: &str,
    child_ids: Vec<String>,
) -> Result<()> {
    let fields = record_from_value(json!({ "childIds": child_ids }))?;
    service
        .router()
        .update(Collection::Guardians, guardian_id, fields)
        .await?;
    Ok(())
}

async fn set_student_guardian(
    service: &AccountService,
    student_id: &str,
    guardian_id: Value,
) -> Result<()> {
    let fields = record_from_value(json!({ "guardianId": guardian_id }))?;
    service
        .router()
        .update(Collection::Students, student_id, fields)
        .await?;
    Ok(())
}

pub(crate) async fn load_guardian(service: &AccountService, id: &str) -> Result<Guardian> {
    let record = service
        .router()
        .get_by_id(Collection::Guardians, id)
        .await
        .ok_or_else(|| SchoolError::not_found(format!("家长 {id} 不存在")))?;
    from_record(record)
}

pub(crate) async fn load_student(service: &AccountService, id: &str) -> Result<Student> {
    let record = service
        .router()
        .get_by_id(Collection::Students, id)
        .await
        .ok_or_else(|| SchoolError::not_found(format!("学生 {id} 不存在")))?;
    from_record(record)
}

pub(crate) fn require_admin(actor: &Actor) -> Result<()> {
    if resolver::is_admin(actor).is_allowed() {
        Ok(())
    } else {
        Err(SchoolError::authorization("只有管理员可以执行该操作"))
    }
}
