use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::AccountService;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::accounts::requests::{AccountDetails, CreateAccountRequest};
use crate::models::common::{new_record_id, record_from_value};
use crate::models::{Collection, Role};
use crate::storage::InsertOutcome;

pub async fn create_account(
    service: &AccountService,
    actor: &Actor,
    request: CreateAccountRequest,
) -> Result<InsertOutcome> {
    let role = request.details.role();

    // 权限校验：管理员账户只能由主管理员创建
    if role == Role::Admin {
        service.guard.can_manage_admins(actor).await.into_result()?;
    } else if !resolver::is_admin(actor).is_allowed() {
        return Err(SchoolError::authorization("只有管理员可以创建账户"));
    }

    let name = request.name.trim().to_string();
    let email = normalize_email(&request.email);
    if name.is_empty() {
        return Err(SchoolError::validation("姓名不能为空"));
    }
    if !email.contains('@') {
        return Err(SchoolError::validation(format!("邮箱格式无效: {email}")));
    }
    if email_taken(service, &email).await {
        return Err(SchoolError::validation(format!("邮箱已被使用: {email}")));
    }

    check_references(service, &request.details).await?;

    let id = new_record_id();
    let mut record = record_from_value(json!({
        "id": id,
        "name": name,
        "email": email,
        "passwordSecret": request.password_secret,
        "status": "active",
        "createdAt": Utc::now(),
    }))?;
    let extra = match &request.details {
        AccountDetails::Admin { is_primary } => json!({
            "isPrimary": is_primary,
            "createdBy": actor.id,
        }),
        AccountDetails::Teacher { assigned_class_ids } => json!({
            "assignedClassIds": assigned_class_ids,
        }),
        AccountDetails::Student {
            class_id,
            birth_date,
            guardian_id,
        } => json!({
            "classId": class_id,
            "birthDate": birth_date,
            "guardianId": guardian_id,
        }),
        AccountDetails::Guardian { phone, child_ids } => json!({
            "phone": phone,
            "childIds": dedup(child_ids),
        }),
    };
    record.extend(record_from_value(extra)?);

    let outcome = service.router().insert(role.collection(), record).await?;

    // 镜像家长与学生之间的双向引用
    match &request.details {
        AccountDetails::Student {
            guardian_id: Some(guardian_id),
            ..
        } => {
            super::guardians::add_child(service, guardian_id, &outcome.id).await?;
        }
        AccountDetails::Guardian { child_ids, .. } => {
            for child_id in dedup(child_ids) {
                super::guardians::assign_guardian(service, &outcome.id, &child_id).await?;
            }
        }
        _ => {}
    }

    service
        .audit
        .record(
            actor,
            "create_account",
            role.collection().as_str(),
            &outcome.id,
            None,
        )
        .await;
    info!("Account {} created as {} by {}", outcome.id, role, actor.id);
    Ok(outcome)
}

/// 邮箱统一小写比较
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 在全部四类账户中检查邮箱（忽略大小写，兼容历史数据）
pub async fn email_taken(service: &AccountService, email: &str) -> bool {
    let email = normalize_email(email);
    for collection in Collection::ACCOUNTS {
        let taken = service
            .router()
            .get_all(collection)
            .await
            .iter()
            .filter_map(|record| record.get("email").and_then(|v| v.as_str()))
            .any(|existing| normalize_email(existing) == email);
        if taken {
            return true;
        }
    }
    false
}

/// 所有引用必须指向已存在的记录
async fn check_references(service: &AccountService, details: &AccountDetails) -> Result<()> {
    match details {
        AccountDetails::Admin { .. } => Ok(()),
        AccountDetails::Teacher { assigned_class_ids } => {
            for class_id in assigned_class_ids {
                require(service, Collection::Classes, class_id).await?;
            }
            Ok(())
        }
        AccountDetails::Student {
            class_id,
            guardian_id,
            ..
        } => {
            require(service, Collection::Classes, class_id).await?;
            if let Some(guardian_id) = guardian_id {
                require(service, Collection::Guardians, guardian_id).await?;
            }
            Ok(())
        }
        AccountDetails::Guardian { child_ids, .. } => {
            for child_id in child_ids {
                require(service, Collection::Students, child_id).await?;
            }
            Ok(())
        }
    }
}

async fn require(service: &AccountService, collection: Collection, id: &str) -> Result<()> {
    if service.router().get_by_id(collection, id).await.is_none() {
        return Err(SchoolError::validation(format!(
            "引用的 {collection}/{id} 不存在"
        )));
    }
    Ok(())
}

fn dedup(ids: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(id.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot_router;

    async fn service() -> (tempfile::TempDir, AccountService) {
        let (dir, router) = snapshot_router(json!({
            "admins": [
                {"id": "A1", "name": "Root", "email": "root@school", "isPrimary": true},
                {"id": "A2", "name": "Deputy", "email": "deputy@school"}
            ],
            "teachers": [{"id": "T1", "name": "T", "email": "Taken@School"}],
            "students": [{"id": "S1", "name": "A", "email": "a@school", "classId": "C1"}],
            "parents": [{"id": "P1", "name": "P", "email": "p@school", "childIds": []}],
            "classes": [{"id": "C1", "name": "6eA", "subjects": []}]
        }))
        .await;
        (dir, AccountService::new(router))
    }

    fn request(value: serde_json::Value) -> CreateAccountRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_student_mirrors_guardian() {
        let (_dir, service) = service().await;
        let outcome = service
            .create_account(
                &Actor::new("A2", Role::Admin),
                request(json!({
                    "role": "student",
                    "name": "Bob",
                    "email": " Bob@School ",
                    "passwordSecret": "hash",
                    "classId": "C1",
                    "guardianId": "P1"
                })),
            )
            .await
            .unwrap();

        let student = service
            .router()
            .get_by_id(Collection::Students, &outcome.id)
            .await
            .unwrap();
        assert_eq!(student["email"], "bob@school");
        assert_eq!(student["status"], "active");
        let guardian = service
            .router()
            .get_by_id(Collection::Guardians, "P1")
            .await
            .unwrap();
        assert_eq!(guardian["childIds"], json!([outcome.id]));
    }

    #[tokio::test]
    async fn test_email_unique_across_account_collections() {
        let (_dir, service) = service().await;
        assert!(service.email_taken("taken@school").await);
        assert!(!service.email_taken("free@school").await);

        let err = service
            .create_account(
                &Actor::new("A2", Role::Admin),
                request(json!({
                    "role": "parent",
                    "name": "Dup",
                    "email": "a@school",
                    "passwordSecret": "hash"
                })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_dangling_references() {
        let (_dir, service) = service().await;
        let err = service
            .create_account(
                &Actor::new("A2", Role::Admin),
                request(json!({
                    "role": "student",
                    "name": "Ghost",
                    "email": "ghost@school",
                    "passwordSecret": "hash",
                    "classId": "C404"
                })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Validation(_)));
        assert!(!service.email_taken("ghost@school").await);
    }

    #[tokio::test]
    async fn test_create_guardian_links_children() {
        let (_dir, service) = service().await;
        let outcome = service
            .create_account(
                &Actor::new("A2", Role::Admin),
                request(json!({
                    "role": "parent",
                    "name": "Parent",
                    "email": "parent2@school",
                    "passwordSecret": "hash",
                    "childIds": ["S1", "S1"]
                })),
            )
            .await
            .unwrap();

        let guardian = service
            .router()
            .get_by_id(Collection::Guardians, &outcome.id)
            .await
            .unwrap();
        assert_eq!(guardian["childIds"], json!(["S1"]));
        let student = service
            .router()
            .get_by_id(Collection::Students, "S1")
            .await
            .unwrap();
        assert_eq!(student["guardianId"], json!(outcome.id));
    }

    #[tokio::test]
    async fn test_only_primary_admin_creates_admins() {
        let (_dir, service) = service().await;
        let body = json!({
            "role": "admin",
            "name": "New",
            "email": "new@school",
            "passwordSecret": "hash"
        });

        let err = service
            .create_account(&Actor::new("A2", Role::Admin), request(body.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Authorization(_)));

        let outcome = service
            .create_account(&Actor::new("A1", Role::Admin), request(body))
            .await
            .unwrap();
        let admin = service
            .router()
            .get_by_id(Collection::Admins, &outcome.id)
            .await
            .unwrap();
        assert_eq!(admin["createdBy"], "A1");
        assert_eq!(admin["isPrimary"], false);
    }

    #[tokio::test]
    async fn test_teacher_cannot_create_accounts() {
        let (_dir, service) = service().await;
        let err = service
            .create_account(
                &Actor::new("T1", Role::Teacher),
                request(json!({
                    "role": "student",
                    "name": "X",
                    "email": "x@school",
                    "passwordSecret": "hash",
                    "classId": "C1"
                })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Authorization(_)));
    }
}
