//! 基于关系的访问判定
//!
//! 所有谓词都是纯函数：只接收已经通过路由器加载好的实体，不做任何 I/O，
//! 也不修改状态。默认拒绝；管理员绕过所有谓词。

use serde::Serialize;

use crate::models::Role;
use crate::models::accounts::entities::{Admin, Guardian, Student, Teacher};
use crate::models::classes::entities::Class;
use crate::models::coursework::entities::Exercise;

/// 请求方身份（由上层从请求凭据中解析）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// 授权依据，调用方可以用它限定后续查询范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Grant {
    Admin,
    PrimaryAdmin,
    AssignedClass { class_id: String },
    SubjectTeacher { class_id: String, subject_id: String },
    ExerciseOwner { exercise_id: String },
    ClassMember { class_id: String },
    GuardianOf { student_id: String },
    OwnRecord,
}

/// 判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Allow(Grant),
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn grant(&self) -> Option<&Grant> {
        match self {
            Decision::Allow(grant) => Some(grant),
            Decision::Deny => None,
        }
    }

    /// 前一个判定拒绝时再尝试下一个
    pub fn or_else<F>(self, next: F) -> Decision
    where
        F: FnOnce() -> Decision,
    {
        match self {
            Decision::Deny => next(),
            allowed => allowed,
        }
    }

    fn when(condition: bool, grant: impl FnOnce() -> Grant) -> Decision {
        if condition {
            Decision::Allow(grant())
        } else {
            Decision::Deny
        }
    }
}

pub fn is_admin(actor: &Actor) -> Decision {
    Decision::when(actor.role == Role::Admin, || Grant::Admin)
}

/// 主管理员：角色为管理员且对应的管理员记录标记为 primary
pub fn is_primary_admin(actor: &Actor, admin: &Admin) -> Decision {
    Decision::when(
        actor.role == Role::Admin && admin.id == actor.id && admin.is_primary,
        || Grant::PrimaryAdmin,
    )
}

/// 教师被分配到该班级，或者教授该班级的任一科目
pub fn teacher_teaches_class(teacher: &Teacher, class: &Class) -> Decision {
    let assigned = teacher.assigned_class_ids.iter().any(|id| *id == class.id);
    let teaches_subject = class.subjects.iter().any(|s| s.teacher_id == teacher.id);
    Decision::when(assigned || teaches_subject, || Grant::AssignedClass {
        class_id: class.id.clone(),
    })
}

/// 只看科目本身的 teacher_id，班级分配不算
pub fn teacher_teaches_subject(teacher_id: &str, class: &Class, subject_id: &str) -> Decision {
    let teaches = class
        .subject(subject_id)
        .is_some_and(|s| s.teacher_id == teacher_id);
    Decision::when(teaches, || Grant::SubjectTeacher {
        class_id: class.id.clone(),
        subject_id: subject_id.to_string(),
    })
}

pub fn student_in_class(student: &Student, class_id: &str) -> Decision {
    Decision::when(student.class_id == class_id, || Grant::ClassMember {
        class_id: class_id.to_string(),
    })
}

pub fn guardian_owns_student(guardian: &Guardian, student_id: &str) -> Decision {
    Decision::when(
        guardian.child_ids.iter().any(|id| id == student_id),
        || Grant::GuardianOf {
            student_id: student_id.to_string(),
        },
    )
}

/// 作业布置者，或者该科目的任课教师
pub fn can_grade_submission(actor_id: &str, exercise: &Exercise, class: &Class) -> Decision {
    Decision::when(exercise.teacher_id == actor_id, || Grant::ExerciseOwner {
        exercise_id: exercise.id.clone(),
    })
    .or_else(|| {
        if exercise.class_id != class.id {
            return Decision::Deny;
        }
        teacher_teaches_subject(actor_id, class, &exercise.subject_id)
    })
}

/// 只有同一个账户（id 与角色都相同）才算本人
pub fn can_access_own_record(
    actor_id: &str,
    actor_role: Role,
    owner_id: &str,
    owner_role: Role,
) -> Decision {
    Decision::when(actor_id == owner_id && actor_role == owner_role, || {
        Grant::OwnRecord
    })
}

/// 管理员直接放行，否则执行给定谓词
pub fn resolve<F>(actor: &Actor, check: F) -> Decision
where
    F: FnOnce() -> Decision,
{
    is_admin(actor).or_else(check)
}
