use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::CourseworkService;
use crate::access::{Actor, resolver};
use crate::errors::{Result, SchoolError};
use crate::models::accounts::entities::Student;
use crate::models::common::{from_record, new_record_id, record_from_value, record_id, to_record};
use crate::models::coursework::entities::{Exercise, Submission};
use crate::models::coursework::requests::SubmitExerciseRequest;
use crate::models::{Collection, Role};
use crate::storage::{Filter, InsertOutcome};

/// 提交作业；同一学生重复提交时覆盖文件并保留原 id
pub async fn submit_exercise(
    service: &CourseworkService,
    actor: &Actor,
    request: SubmitExerciseRequest,
) -> Result<InsertOutcome> {
    if actor.role != Role::Student {
        return Err(SchoolError::authorization("只有学生可以提交作业"));
    }
    if request.file_path.trim().is_empty() {
        return Err(SchoolError::validation("提交文件路径不能为空"));
    }

    let student: Student = match service
        .router()
        .get_by_id(Collection::Students, &actor.id)
        .await
    {
        Some(record) => from_record(record)?,
        None => return Err(SchoolError::authorization("学生账户不存在")),
    };
    let exercise: Exercise = match service
        .router()
        .get_by_id(Collection::Exercises, &request.exercise_id)
        .await
    {
        Some(record) => from_record(record)?,
        None => {
            return Err(SchoolError::not_found(format!(
                "作业 {} 不存在",
                request.exercise_id
            )));
        }
    };

    if !resolver::student_in_class(&student, &exercise.class_id).is_allowed() {
        return Err(SchoolError::authorization("学生不属于该作业所在班级"));
    }
    let now = Utc::now();
    if let Some(deadline) = exercise.deadline
        && now > deadline
    {
        return Err(SchoolError::validation(format!(
            "作业 {} 已于 {} 截止",
            exercise.id, deadline
        )));
    }

    let existing = service
        .router()
        .find(
            Collection::Submissions,
            &Filter::eq("exerciseId", exercise.id.as_str()).and("studentId", student.id.as_str()),
        )
        .await;

    if let Some(id) = existing.first().and_then(record_id) {
        let fields = record_from_value(json!({
            "filePath": request.file_path,
            "submittedAt": now,
        }))?;
        service
            .router()
            .update(Collection::Submissions, id, fields)
            .await?;
        info!("Student {} resubmitted exercise {}", student.id, exercise.id);
        return Ok(InsertOutcome { id: id.to_string() });
    }

    let submission = Submission {
        id: new_record_id(),
        exercise_id: exercise.id.clone(),
        student_id: student.id.clone(),
        file_path: request.file_path,
        grade: None,
        comment: None,
        submitted_at: Some(now),
        graded_at: None,
    };
    let outcome = service
        .router()
        .insert(Collection::Submissions, to_record(&submission)?)
        .await?;
    info!("Student {} submitted exercise {}", student.id, exercise.id);
    Ok(outcome)
}
