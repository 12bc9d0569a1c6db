pub mod create;
pub mod status;
pub mod subjects;

use std::sync::Arc;

use crate::access::Actor;
use crate::errors::Result;
use crate::models::accounts::entities::AccountStatus;
use crate::models::classes::entities::Class;
use crate::models::classes::requests::{CreateClassRequest, SubjectInput};
use crate::storage::{InsertOutcome, PersistenceRouter};

pub struct ClassService {
    router: Arc<PersistenceRouter>,
}

impl ClassService {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self { router }
    }

    pub(crate) fn router(&self) -> &PersistenceRouter {
        &self.router
    }

    // 创建班级
    pub async fn create_class(
        &self,
        actor: &Actor,
        request: CreateClassRequest,
    ) -> Result<InsertOutcome> {
        create::create_class(self, actor, request).await
    }

    // 替换班级的科目列表
    pub async fn update_subjects(
        &self,
        actor: &Actor,
        class_id: &str,
        subjects: Vec<SubjectInput>,
    ) -> Result<Class> {
        subjects::update_subjects(self, actor, class_id, subjects).await
    }

    // 启用/停用班级（软删除）
    pub async fn set_status(
        &self,
        actor: &Actor,
        class_id: &str,
        status: AccountStatus,
    ) -> Result<()> {
        status::set_status(self, actor, class_id, status).await
    }
}
