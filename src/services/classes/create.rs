use chrono::Utc;
use tracing::info;

use super::ClassService;
use super::subjects::validate_subjects;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::accounts::entities::AccountStatus;
use crate::models::classes::entities::Class;
use crate::models::classes::requests::CreateClassRequest;
use crate::models::common::{new_record_id, to_record};
use crate::storage::InsertOutcome;

pub async fn create_class(
    service: &ClassService,
    actor: &Actor,
    request: CreateClassRequest,
) -> Result<InsertOutcome> {
    if !resolver::is_admin(actor).is_allowed() {
        return Err(SchoolError::authorization("只有管理员可以创建班级"));
    }

    let name = request.name.trim().to_string();
    if name.is_empty() {
        return Err(SchoolError::validation("班级名称不能为空"));
    }

    let subjects = validate_subjects(service, request.subjects).await?;
    let class = Class {
        id: new_record_id(),
        name,
        level: request.level,
        school_year: request.school_year,
        subjects,
        status: AccountStatus::Active,
        created_at: Some(Utc::now()),
    };

    let outcome = service
        .router()
        .insert(Collection::Classes, to_record(&class)?)
        .await?;
    info!("Class {} ({}) created by {}", class.name, outcome.id, actor.id);
    Ok(outcome)
}
