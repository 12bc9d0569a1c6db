//! 关系修复
//!
//! 没有跨记录事务时，级联操作与并发写入可能留下悬空引用。
//! 本模块执行一次幂等的对账：
//! - 家长 `childIds` 中不存在的学生，或学生的 `guardianId` 指向别人时移除
//! - 学生 `guardianId` 指向存在的家长但对方未登记时补上 `childIds`
//! - 家长登记了学生而学生没有 `guardianId` 时补上 `guardianId`
//! - 学生 `guardianId` 指向不存在的家长时清空
//! - 删除学生已不存在的成绩与提交

use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::Result;
use crate::models::accounts::entities::{Guardian, Student};
use crate::models::common::{from_record, record_id, record_from_value};
use crate::models::system::responses::RepairReport;
use crate::models::{Collection, Record};
use crate::storage::PersistenceRouter;

pub struct RelationshipRepair {
    router: Arc<PersistenceRouter>,
}

impl RelationshipRepair {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self { router }
    }

    async fn load<T: serde::de::DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        self.router
            .get_all(collection)
            .await
            .into_iter()
            .filter_map(|record| match from_record::<T>(record) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!("Skipping unparsable record in {}: {}", collection, e);
                    None
                }
            })
            .collect()
    }

    pub async fn run(&self) -> Result<RepairReport> {
        let mut report = RepairReport::default();

        let students: HashMap<String, Student> = self
            .load::<Student>(Collection::Students)
            .await
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        let guardians: Vec<Guardian> = self.load(Collection::Guardians).await;
        let guardian_ids: HashSet<&str> = guardians.iter().map(|g| g.id.as_str()).collect();

        // 学生侧需要写回的 guardianId
        let mut student_fixes: BTreeMap<String, Value> = BTreeMap::new();

        for student in students.values() {
            if let Some(guardian_id) = &student.guardian_id
                && !guardian_ids.contains(guardian_id.as_str())
            {
                student_fixes.insert(student.id.clone(), Value::Null);
                report.dangling_guardian_refs_cleared += 1;
            }
        }

        for guardian in &guardians {
            let mut child_ids: Vec<String> = Vec::new();
            let mut changed = false;

            for child_id in &guardian.child_ids {
                let keep = match students.get(child_id) {
                    None => false,
                    Some(student) => {
                        // 本轮已经认领或清空的以修复结果为准
                        let owner = match student_fixes.get(child_id) {
                            Some(Value::String(id)) => Some(id.as_str()),
                            Some(_) => None,
                            None => student
                                .guardian_id
                                .as_deref()
                                .filter(|id| guardian_ids.contains(id)),
                        };
                        match owner {
                            Some(id) => id == guardian.id,
                            None => {
                                // 学生一侧没有有效家长，以家长一侧为准
                                if student.guardian_id.is_none() {
                                    report.missing_child_links_added += 1;
                                }
                                student_fixes.insert(child_id.clone(), json!(guardian.id));
                                true
                            }
                        }
                    }
                };
                if keep && !child_ids.contains(child_id) {
                    child_ids.push(child_id.clone());
                } else {
                    if !keep {
                        report.dangling_child_ids_removed += 1;
                    }
                    changed = true;
                }
            }

            for student in students.values() {
                if student.guardian_id.as_deref() == Some(guardian.id.as_str())
                    && !child_ids.contains(&student.id)
                {
                    child_ids.push(student.id.clone());
                    report.missing_child_links_added += 1;
                    changed = true;
                }
            }

            if changed {
                let fields = record_from_value(json!({ "childIds": child_ids }))?;
                self.router
                    .update(Collection::Guardians, &guardian.id, fields)
                    .await?;
            }
        }

        for (student_id, guardian_id) in student_fixes {
            let fields = record_from_value(json!({ "guardianId": guardian_id }))?;
            self.router
                .update(Collection::Students, &student_id, fields)
                .await?;
        }

        report.orphan_grades_removed = self
            .remove_orphans(Collection::Grades, &students)
            .await?;
        report.orphan_submissions_removed = self
            .remove_orphans(Collection::Submissions, &students)
            .await?;

        if report.is_clean() {
            info!("Relationship repair found nothing to fix");
        } else {
            warn!("Relationship repair applied fixes: {:?}", report);
        }
        Ok(report)
    }

    /// 删除 `studentId` 指向不存在学生的记录
    async fn remove_orphans(
        &self,
        collection: Collection,
        students: &HashMap<String, Student>,
    ) -> Result<u64> {
        let orphans: Vec<Record> = self
            .router
            .get_all(collection)
            .await
            .into_iter()
            .filter(|record| {
                record
                    .get("studentId")
                    .and_then(Value::as_str)
                    .is_some_and(|id| !students.contains_key(id))
            })
            .collect();

        let mut removed = 0;
        for record in &orphans {
            if let Some(id) = record_id(record) {
                removed += self.router.delete(collection, id).await?.removed;
            }
        }
        Ok(removed)
    }
}
