//! 访问守卫
//!
//! 通过路由器加载判定所需的实体，再交给 `resolver` 中的纯谓词。
//! 目标实体不存在时返回 `NotFound`，与 `Forbidden` 区分；
//! 请求方自身的记录缺失（悬空身份）按拒绝处理。

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use super::resolver::{self, Actor, Decision, Grant};
use crate::errors::{Result, SchoolError};
use crate::models::accounts::entities::{Admin, Guardian, Student, Teacher};
use crate::models::classes::entities::Class;
use crate::models::common::from_record;
use crate::models::coursework::entities::{Exercise, Submission};
use crate::models::messages::entities::Message;
use crate::models::{Collection, Role};
use crate::storage::PersistenceRouter;

/// 守卫结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted(Grant),
    Forbidden,
    NotFound { collection: Collection, id: String },
}

impl AccessOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessOutcome::Granted(_))
    }

    /// 传输层使用的状态码
    pub fn status_code(&self) -> u16 {
        match self {
            AccessOutcome::Granted(_) => 200,
            AccessOutcome::Forbidden => 403,
            AccessOutcome::NotFound { .. } => 404,
        }
    }

    /// 业务服务使用：拒绝与不存在分别映射为对应错误
    pub fn into_result(self) -> Result<Grant> {
        match self {
            AccessOutcome::Granted(grant) => Ok(grant),
            AccessOutcome::Forbidden => Err(SchoolError::authorization("无权执行该操作")),
            AccessOutcome::NotFound { collection, id } => {
                Err(SchoolError::not_found(format!("{collection}/{id} 不存在")))
            }
        }
    }

    fn not_found(collection: Collection, id: &str) -> Self {
        AccessOutcome::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}

impl From<Decision> for AccessOutcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow(grant) => AccessOutcome::Granted(grant),
            Decision::Deny => AccessOutcome::Forbidden,
        }
    }
}

pub struct AccessGuard {
    router: Arc<PersistenceRouter>,
}

impl AccessGuard {
    pub fn new(router: Arc<PersistenceRouter>) -> Self {
        Self { router }
    }

    /// 加载并解析实体；不存在或内容损坏都视为不存在
    pub async fn load<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Option<T> {
        let record = self.router.get_by_id(collection, id).await?;
        match from_record(record) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("Record {}/{} cannot be parsed: {}", collection, id, e);
                None
            }
        }
    }

    fn log_outcome(&self, actor: &Actor, action: &str, outcome: AccessOutcome) -> AccessOutcome {
        debug!(
            "Access {} by {}:{} -> {:?}",
            action, actor.role, actor.id, outcome
        );
        outcome
    }

    /// 查看班级（课表、资料、作业列表）
    pub async fn can_view_class(&self, actor: &Actor, class_id: &str) -> AccessOutcome {
        let Some(class) = self.load::<Class>(Collection::Classes, class_id).await else {
            return AccessOutcome::not_found(Collection::Classes, class_id);
        };

        let decision = match actor.role {
            Role::Admin => resolver::is_admin(actor),
            Role::Teacher => match self.load::<Teacher>(Collection::Teachers, &actor.id).await {
                Some(teacher) => resolver::teacher_teaches_class(&teacher, &class),
                None => Decision::Deny,
            },
            Role::Student => match self.load::<Student>(Collection::Students, &actor.id).await {
                Some(student) => resolver::student_in_class(&student, &class.id),
                None => Decision::Deny,
            },
            Role::Guardian => self.guardian_has_child_in_class(actor, &class.id).await,
        };

        self.log_outcome(actor, "view_class", decision.into())
    }

    async fn guardian_has_child_in_class(&self, actor: &Actor, class_id: &str) -> Decision {
        let Some(guardian) = self.load::<Guardian>(Collection::Guardians, &actor.id).await else {
            return Decision::Deny;
        };
        for child_id in &guardian.child_ids {
            // 悬空的 child id 直接跳过
            let Some(child) = self.load::<Student>(Collection::Students, child_id).await else {
                continue;
            };
            if resolver::student_in_class(&child, class_id).is_allowed() {
                return resolver::guardian_owns_student(&guardian, child_id);
            }
        }
        Decision::Deny
    }

    /// 在某班级的某科目下发布资料或作业
    pub async fn can_manage_subject(
        &self,
        actor: &Actor,
        class_id: &str,
        subject_id: &str,
    ) -> AccessOutcome {
        let Some(class) = self.load::<Class>(Collection::Classes, class_id).await else {
            return AccessOutcome::not_found(Collection::Classes, class_id);
        };
        if class.subject(subject_id).is_none() {
            return AccessOutcome::NotFound {
                collection: Collection::Classes,
                id: format!("{class_id}/{subject_id}"),
            };
        }

        let decision = resolver::resolve(actor, || {
            if actor.role != Role::Teacher {
                return Decision::Deny;
            }
            resolver::teacher_teaches_subject(&actor.id, &class, subject_id)
        });
        self.log_outcome(actor, "manage_subject", decision.into())
    }

    /// 评分：加载提交 -> 作业 -> 班级
    pub async fn can_grade_submission(&self, actor: &Actor, submission_id: &str) -> AccessOutcome {
        let Some(submission) = self
            .load::<Submission>(Collection::Submissions, submission_id)
            .await
        else {
            return AccessOutcome::not_found(Collection::Submissions, submission_id);
        };
        let Some(exercise) = self
            .load::<Exercise>(Collection::Exercises, &submission.exercise_id)
            .await
        else {
            return AccessOutcome::not_found(Collection::Exercises, &submission.exercise_id);
        };
        let Some(class) = self.load::<Class>(Collection::Classes, &exercise.class_id).await else {
            return AccessOutcome::not_found(Collection::Classes, &exercise.class_id);
        };

        let decision = resolver::resolve(actor, || {
            if actor.role != Role::Teacher {
                return Decision::Deny;
            }
            resolver::can_grade_submission(&actor.id, &exercise, &class)
        });
        self.log_outcome(actor, "grade_submission", decision.into())
    }

    /// 查看学生档案与成绩
    pub async fn can_view_student(&self, actor: &Actor, student_id: &str) -> AccessOutcome {
        let Some(student) = self.load::<Student>(Collection::Students, student_id).await else {
            return AccessOutcome::not_found(Collection::Students, student_id);
        };

        let decision = match actor.role {
            Role::Admin => resolver::is_admin(actor),
            Role::Student => {
                resolver::can_access_own_record(&actor.id, actor.role, &student.id, Role::Student)
            }
            Role::Guardian => match self.load::<Guardian>(Collection::Guardians, &actor.id).await {
                Some(guardian) => resolver::guardian_owns_student(&guardian, &student.id),
                None => Decision::Deny,
            },
            Role::Teacher => {
                let teacher = self.load::<Teacher>(Collection::Teachers, &actor.id).await;
                let class = self.load::<Class>(Collection::Classes, &student.class_id).await;
                match (teacher, class) {
                    (Some(teacher), Some(class)) => {
                        resolver::teacher_teaches_class(&teacher, &class)
                    }
                    _ => Decision::Deny,
                }
            }
        };
        self.log_outcome(actor, "view_student", decision.into())
    }

    /// 阅读或标记消息：只有收发双方
    pub async fn can_access_message(&self, actor: &Actor, message_id: &str) -> AccessOutcome {
        let Some(message) = self.load::<Message>(Collection::Messages, message_id).await else {
            return AccessOutcome::not_found(Collection::Messages, message_id);
        };

        let decision = resolver::can_access_own_record(
            &actor.id,
            actor.role,
            &message.receiver_id,
            message.receiver_role,
        )
        .or_else(|| {
            resolver::can_access_own_record(
                &actor.id,
                actor.role,
                &message.sender_id,
                message.sender_role,
            )
        });
        self.log_outcome(actor, "access_message", decision.into())
    }

    /// 修改账户：本人或管理员；管理员账户只能由本人或主管理员修改
    pub async fn can_modify_account(
        &self,
        actor: &Actor,
        role: Role,
        account_id: &str,
    ) -> AccessOutcome {
        if self
            .router
            .get_by_id(role.collection(), account_id)
            .await
            .is_none()
        {
            return AccessOutcome::not_found(role.collection(), account_id);
        }

        let own = resolver::can_access_own_record(&actor.id, actor.role, account_id, role);
        let decision = if role == Role::Admin {
            match own {
                Decision::Deny => self.primary_admin(actor).await,
                allowed => allowed,
            }
        } else {
            resolver::resolve(actor, || own)
        };
        self.log_outcome(actor, "modify_account", decision.into())
    }

    /// 管理员管理（创建/停用其他管理员）
    pub async fn can_manage_admins(&self, actor: &Actor) -> AccessOutcome {
        let decision = self.primary_admin(actor).await;
        self.log_outcome(actor, "manage_admins", decision.into())
    }

    async fn primary_admin(&self, actor: &Actor) -> Decision {
        if actor.role != Role::Admin {
            return Decision::Deny;
        }
        match self.load::<Admin>(Collection::Admins, &actor.id).await {
            Some(admin) => resolver::is_primary_admin(actor, &admin),
            None => Decision::Deny,
        }
    }
}
