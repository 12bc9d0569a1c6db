pub mod grade;
pub mod submit;

use std::sync::Arc;

use crate::access::{AccessGuard, Actor};
use crate::errors::Result;
use crate::models::coursework::entities::Grade;
use crate::models::coursework::requests::{GradeSubmissionRequest, SubmitExerciseRequest};
use crate::storage::{InsertOutcome, PersistenceRouter};

pub struct CourseworkService {
    router: Arc<PersistenceRouter>,
    guard: AccessGuard,
}

impl CourseworkService {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self {
            guard: AccessGuard::new(router.clone()),
            router,
        }
    }

    pub(crate) fn router(&self) -> &PersistenceRouter {
        &self.router
    }

    // 学生提交作业
    pub async fn submit_exercise(
        &self,
        actor: &Actor,
        request: SubmitExerciseRequest,
    ) -> Result<InsertOutcome> {
        submit::submit_exercise(self, actor, request).await
    }

    // 教师评分并同步成绩
    pub async fn grade_submission(
        &self,
        actor: &Actor,
        submission_id: &str,
        request: GradeSubmissionRequest,
    ) -> Result<Grade> {
        grade::grade_submission(self, actor, submission_id, request).await
    }
}
