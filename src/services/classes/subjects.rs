//! 科目校验
//!
//! 科目 id 只需在班级内唯一；任课教师必须是已存在的教师。

use serde_json::json;
use std::collections::HashSet;
use tracing::info;

use super::ClassService;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::classes::entities::{Class, Subject};
use crate::models::classes::requests::SubjectInput;
use crate::models::common::{from_record, new_record_id, record_from_value};

pub async fn update_subjects(
    service: &ClassService,
    actor: &Actor,
    class_id: &str,
    subjects: Vec<SubjectInput>,
) -> Result<Class> {
    if !resolver::is_admin(actor).is_allowed() {
        return Err(SchoolError::authorization("只有管理员可以修改科目"));
    }

    let record = service
        .router()
        .get_by_id(Collection::Classes, class_id)
        .await
        .ok_or_else(|| SchoolError::not_found(format!("班级 {class_id} 不存在")))?;
    let mut class: Class = from_record(record)?;

    let subjects = validate_subjects(service, subjects).await?;
    let fields = record_from_value(json!({ "subjects": subjects }))?;
    service
        .router()
        .update(Collection::Classes, class_id, fields)
        .await?;

    info!(
        "Class {} now has {} subject(s)",
        class_id,
        subjects.len()
    );
    class.subjects = subjects;
    Ok(class)
}

/// 分配缺失的 id，并检查 id 唯一与教师引用
pub(crate) async fn validate_subjects(
    service: &ClassService,
    inputs: Vec<SubjectInput>,
) -> Result<Vec<Subject>> {
    let mut seen = HashSet::new();
    let mut subjects = Vec::with_capacity(inputs.len());

    for input in inputs {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(SchoolError::validation("科目名称不能为空"));
        }
        let id = match input.id {
            Some(id) if !id.is_empty() => id,
            _ => new_record_id(),
        };
        if !seen.insert(id.clone()) {
            return Err(SchoolError::validation(format!("科目 id 重复: {id}")));
        }
        if service
            .router()
            .get_by_id(Collection::Teachers, &input.teacher_id)
            .await
            .is_none()
        {
            return Err(SchoolError::validation(format!(
                "科目 {name} 的教师 {} 不存在",
                input.teacher_id
            )));
        }
        subjects.push(Subject {
            id,
            name,
            teacher_id: input.teacher_id,
        });
    }

    Ok(subjects)
}
