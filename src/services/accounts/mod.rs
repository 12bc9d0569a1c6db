pub mod create;
pub mod delete;
pub mod guardians;
pub mod status;

use std::sync::Arc;

use crate::access::{AccessGuard, Actor};
use crate::errors::Result;
use crate::models::Role;
use crate::models::accounts::entities::AccountStatus;
use crate::models::accounts::requests::CreateAccountRequest;
use crate::models::accounts::responses::StudentDeletionReport;
use crate::services::system::AuditLog;
use crate::storage::{InsertOutcome, PersistenceRouter};

/// 账户服务，负责账户之间的引用一致性
pub struct AccountService {
    router: Arc<PersistenceRouter>,
    guard: AccessGuard,
    audit: AuditLog,
}

impl AccountService {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self {
            guard: AccessGuard::new(router.clone()),
            audit: AuditLog::new(router.clone()),
            router,
        }
    }

    pub(crate) fn router(&self) -> &PersistenceRouter {
        &self.router
    }

    // 创建账户
    pub async fn create_account(
        &self,
        actor: &Actor,
        request: CreateAccountRequest,
    ) -> Result<InsertOutcome> {
        create::create_account(self, actor, request).await
    }

    // 邮箱是否已被任一账户使用
    pub async fn email_taken(&self, email: &str) -> bool {
        create::email_taken(self, email).await
    }

    // 删除学生并级联清理
    pub async fn delete_student(
        &self,
        actor: &Actor,
        student_id: &str,
    ) -> Result<StudentDeletionReport> {
        delete::delete_student(self, actor, student_id).await
    }

    // 建立家长与学生的关联
    pub async fn link_guardian(
        &self,
        actor: &Actor,
        guardian_id: &str,
        student_id: &str,
    ) -> Result<()> {
        guardians::link_guardian(self, actor, guardian_id, student_id).await
    }

    // 解除家长与学生的关联
    pub async fn unlink_guardian(
        &self,
        actor: &Actor,
        guardian_id: &str,
        student_id: &str,
    ) -> Result<()> {
        guardians::unlink_guardian(self, actor, guardian_id, student_id).await
    }

    // 启用/停用账户（软删除）
    pub async fn set_status(
        &self,
        actor: &Actor,
        role: Role,
        account_id: &str,
        status: AccountStatus,
    ) -> Result<()> {
        status::set_status(self, actor, role, account_id, status).await
    }
}
