//! 评分
//!
//! 先写提交记录上的分数，再按 (学生, 科目, 作业) 更新或插入成绩。
//! 两次写入之间失败时重新评分即可收敛。

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::CourseworkService;
use crate::access::Actor;
use crate::errors::{Result, SchoolError};
use crate::models::Collection;
use crate::models::common::{from_record, new_record_id, record_from_value, record_id, to_record};
use crate::models::coursework::entities::{Exercise, Grade, MAX_GRADE, Submission};
use crate::models::coursework::requests::GradeSubmissionRequest;
use crate::storage::Filter;

pub async fn grade_submission(
    service: &CourseworkService,
    actor: &Actor,
    submission_id: &str,
    request: GradeSubmissionRequest,
) -> Result<Grade> {
    if !request.grade.is_finite() || !(0.0..=MAX_GRADE).contains(&request.grade) {
        return Err(SchoolError::validation(format!(
            "分数必须在 0 到 {MAX_GRADE} 之间: {}",
            request.grade
        )));
    }

    service
        .guard
        .can_grade_submission(actor, submission_id)
        .await
        .into_result()?;

    // 守卫已确认两条记录存在
    let submission: Submission = load(service, Collection::Submissions, submission_id).await?;
    let exercise: Exercise = load(service, Collection::Exercises, &submission.exercise_id).await?;

    let now = Utc::now();
    let comment = request.comment.unwrap_or_default();
    let fields = record_from_value(json!({
        "grade": request.grade,
        "comment": comment,
        "gradedAt": now,
    }))?;
    service
        .router()
        .update(Collection::Submissions, submission_id, fields)
        .await?;

    let existing = service
        .router()
        .find(
            Collection::Grades,
            &Filter::eq("studentId", submission.student_id.as_str())
                .and("subjectId", exercise.subject_id.as_str())
                .and("exerciseId", exercise.id.as_str()),
        )
        .await;

    let grade = Grade {
        id: existing
            .first()
            .and_then(record_id)
            .map(str::to_string)
            .unwrap_or_else(new_record_id),
        student_id: submission.student_id.clone(),
        subject_id: exercise.subject_id.clone(),
        teacher_id: actor.id.clone(),
        exercise_id: Some(exercise.id.clone()),
        value: request.grade,
        commentary: comment,
        date: Some(now),
    };

    if existing.is_empty() {
        service
            .router()
            .insert(Collection::Grades, to_record(&grade)?)
            .await?;
    } else {
        service
            .router()
            .update(Collection::Grades, &grade.id, to_record(&grade)?)
            .await?;
    }

    info!(
        "Submission {} graded {} by {}",
        submission_id, grade.value, actor.id
    );
    Ok(grade)
}

async fn load<T: serde::de::DeserializeOwned>(
    service: &CourseworkService,
    collection: Collection,
    id: &str,
) -> Result<T> {
    let record = service
        .router()
        .get_by_id(collection, id)
        .await
        .ok_or_else(|| SchoolError::not_found(format!("{collection}/{id} 不存在")))?;
    from_record(record)
}
