//! 删除学生
//!
//! 级联顺序：成绩 -> 提交 -> 家长 childIds -> 学生本身。
//! 学生记录最后删除，中途失败时重新执行即可继续清理。

use serde_json::json;
use tracing::{info, warn};

use super::AccountService;
use super::guardians::{load_student, remove_child, require_admin};
use crate::access::Actor;
use crate::errors::Result;
use crate::models::accounts::entities::Guardian;
use crate::models::accounts::responses::StudentDeletionReport;
use crate::models::common::{from_record, record_id};
use crate::models::Collection;
use crate::storage::Filter;

pub async fn delete_student(
    service: &AccountService,
    actor: &Actor,
    student_id: &str,
) -> Result<StudentDeletionReport> {
    require_admin(actor)?;
    let student = load_student(service, student_id).await?;
    let mut report = StudentDeletionReport::default();

    report.grades_removed = delete_owned(service, Collection::Grades, student_id).await?;
    report.submissions_removed =
        delete_owned(service, Collection::Submissions, student_id).await?;

    for record in service.router().get_all(Collection::Guardians).await {
        let guardian: Guardian = match from_record(record) {
            Ok(guardian) => guardian,
            Err(e) => {
                warn!("Skipping unparsable guardian record: {}", e);
                continue;
            }
        };
        if guardian.child_ids.iter().any(|id| id == student_id) {
            remove_child(service, &guardian, student_id).await?;
            report.guardians_updated += 1;
        }
    }

    let removed = service
        .router()
        .delete(Collection::Students, &student.id)
        .await?;
    report.student_removed = removed.removed > 0;

    service
        .audit
        .record(
            actor,
            "delete_student",
            Collection::Students.as_str(),
            student_id,
            Some(json!(report)),
        )
        .await;
    info!("Student {} deleted: {:?}", student_id, report);
    Ok(report)
}

/// 删除 studentId 指向该学生的全部记录
async fn delete_owned(
    service: &AccountService,
    collection: Collection,
    student_id: &str,
) -> Result<u64> {
    let owned = service
        .router()
        .find(collection, &Filter::eq("studentId", student_id))
        .await;
    let mut removed = 0;
    for record in &owned {
        if let Some(id) = record_id(record) {
            removed += service.router().delete(collection, id).await?.removed;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SchoolError;
    use crate::models::Role;
    use crate::services::accounts::guardians::add_child;
    use crate::services::system::{AuditLog, RelationshipRepair};
    use crate::test_support::{ids, snapshot_router};

    fn guardians_referencing(records: &[crate::models::Record], student_id: &str) -> Vec<String> {
        let referencing: Vec<_> = records
            .iter()
            .filter(|g| {
                g["childIds"]
                    .as_array()
                    .is_some_and(|children| children.iter().any(|id| id == student_id))
            })
            .cloned()
            .collect();
        ids(&referencing)
    }

    #[tokio::test]
    async fn test_delete_student_cascades() {
        let (_dir, router) = snapshot_router(json!({
            "students": [
                {"id": "S1", "name": "A", "email": "a@s", "classId": "C1", "guardianId": "P1"},
                {"id": "S2", "name": "B", "email": "b@s", "classId": "C1"}
            ],
            "parents": [
                {"id": "P1", "name": "P", "email": "p@s", "childIds": ["S1", "S2"]}
            ],
            "grades": [
                {"id": "G1", "studentId": "S1", "subjectId": "M", "teacherId": "T", "value": 12.0},
                {"id": "G2", "studentId": "S1", "subjectId": "F", "teacherId": "T", "value": 15.0},
                {"id": "G3", "studentId": "S2", "subjectId": "M", "teacherId": "T", "value": 9.5}
            ],
            "submissions": [
                {"id": "X1", "exerciseId": "E1", "studentId": "S1", "filePath": "f"}
            ]
        }))
        .await;
        let service = AccountService::new(router.clone());

        let report = service
            .delete_student(&Actor::new("A1", Role::Admin), "S1")
            .await
            .unwrap();
        assert_eq!(
            report,
            StudentDeletionReport {
                grades_removed: 2,
                submissions_removed: 1,
                guardians_updated: 1,
                student_removed: true,
            }
        );

        assert_eq!(ids(&router.get_all(Collection::Students).await), vec!["S2"]);
        assert_eq!(ids(&router.get_all(Collection::Grades).await), vec!["G3"]);
        assert!(router.get_all(Collection::Submissions).await.is_empty());
        let p1 = router.get_by_id(Collection::Guardians, "P1").await.unwrap();
        assert_eq!(p1["childIds"], json!(["S2"]));

        let audit = AuditLog::new(router).entries().await;
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "delete_student");
    }

    #[tokio::test]
    async fn test_delete_student_requires_admin() {
        let (_dir, router) = snapshot_router(json!({
            "students": [{"id": "S1", "name": "A", "email": "a@s", "classId": "C1"}]
        }))
        .await;
        let service = AccountService::new(router.clone());

        let err = service
            .delete_student(&Actor::new("T1", Role::Teacher), "S1")
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::Authorization(_)));
        assert_eq!(router.get_all(Collection::Students).await.len(), 1);

        let err = service
            .delete_student(&Actor::new("A1", Role::Admin), "S404")
            .await
            .unwrap_err();
        assert!(matches!(err, SchoolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_link_racing_delete_leaves_dangling_child() {
        let (_dir, router) = snapshot_router(json!({
            "students": [
                {"id": "S1", "name": "A", "email": "a@s", "classId": "C1", "guardianId": "P1"}
            ],
            "parents": [
                {"id": "P1", "name": "P", "email": "p@s", "childIds": ["S1"]},
                {"id": "P2", "name": "Q", "email": "q@s", "childIds": []}
            ]
        }))
        .await;
        let service = AccountService::new(router.clone());
        let admin = Actor::new("A1", Role::Admin);

        // link_guardian 已读到学生，此时删除请求完整执行
        load_student(&service, "S1").await.unwrap();
        service.delete_student(&admin, "S1").await.unwrap();
        assert!(router.get_by_id(Collection::Students, "S1").await.is_none());

        // 随后 link_guardian 的写入落地
        add_child(&service, "P2", "S1").await.unwrap();
        let guardians = router.get_all(Collection::Guardians).await;
        assert_eq!(guardians_referencing(&guardians, "S1"), vec!["P2"]);

        let report = RelationshipRepair::new(router.clone()).run().await.unwrap();
        assert_eq!(report.dangling_child_ids_removed, 1);
        let guardians = router.get_all(Collection::Guardians).await;
        assert!(guardians_referencing(&guardians, "S1").is_empty());
        assert!(RelationshipRepair::new(router).run().await.unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_concurrent_link_and_delete_converge_after_repair() {
        let (_dir, router) = snapshot_router(json!({
            "students": [
                {"id": "S1", "name": "A", "email": "a@s", "classId": "C1", "guardianId": "P1"}
            ],
            "parents": [
                {"id": "P1", "name": "P", "email": "p@s", "childIds": ["S1"]},
                {"id": "P2", "name": "Q", "email": "q@s", "childIds": []}
            ]
        }))
        .await;
        let service = AccountService::new(router.clone());
        let admin = Actor::new("A1", Role::Admin);

        let (linked, deleted) = tokio::join!(
            service.link_guardian(&admin, "P2", "S1"),
            service.delete_student(&admin, "S1"),
        );
        // 关联请求可能成功，也可能因学生已删除而失败
        if let Err(e) = linked {
            assert!(matches!(e, SchoolError::NotFound(_)));
        }
        assert!(deleted.unwrap().student_removed);

        RelationshipRepair::new(router.clone()).run().await.unwrap();
        assert!(router.get_by_id(Collection::Students, "S1").await.is_none());
        let guardians = router.get_all(Collection::Guardians).await;
        assert!(guardians_referencing(&guardians, "S1").is_empty());
    }
}
