use serde::{Deserialize, Serialize};

use crate::errors::SchoolError;

/// 已知集合。账户按角色分布在四个集合中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Admins,
    Teachers,
    Students,
    #[serde(rename = "parents")]
    Guardians,
    Classes,
    Coursework,
    Exercises,
    Submissions,
    Grades,
    Messages,
    Settings,
    AdminAuditLog,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::Admins,
        Collection::Teachers,
        Collection::Students,
        Collection::Guardians,
        Collection::Classes,
        Collection::Coursework,
        Collection::Exercises,
        Collection::Submissions,
        Collection::Grades,
        Collection::Messages,
        Collection::Settings,
        Collection::AdminAuditLog,
    ];

    /// 四类账户集合，邮箱唯一性在它们之间联合校验
    pub const ACCOUNTS: [Collection; 4] = [
        Collection::Admins,
        Collection::Teachers,
        Collection::Students,
        Collection::Guardians,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Admins => "admins",
            Collection::Teachers => "teachers",
            Collection::Students => "students",
            Collection::Guardians => "parents",
            Collection::Classes => "classes",
            Collection::Coursework => "coursework",
            Collection::Exercises => "exercises",
            Collection::Submissions => "submissions",
            Collection::Grades => "grades",
            Collection::Messages => "messages",
            Collection::Settings => "settings",
            Collection::AdminAuditLog => "adminAuditLog",
        }
    }

    /// 单例集合（只有一条记录）
    pub fn is_singleton(&self) -> bool {
        matches!(self, Collection::Settings)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = SchoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SchoolError::unknown_collection(format!("未知集合: '{s}'")))
    }
}

// 账户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    #[serde(rename = "parent")]
    Guardian,
}

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const TEACHER: &'static str = "teacher";
    pub const STUDENT: &'static str = "student";
    pub const GUARDIAN: &'static str = "parent";

    /// 角色对应的账户集合
    pub fn collection(&self) -> Collection {
        match self {
            Role::Admin => Collection::Admins,
            Role::Teacher => Collection::Teachers,
            Role::Student => Collection::Students,
            Role::Guardian => Collection::Guardians,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => Role::ADMIN,
            Role::Teacher => Role::TEACHER,
            Role::Student => Role::STUDENT,
            Role::Guardian => Role::GUARDIAN,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Role::ADMIN => Ok(Role::Admin),
            Role::TEACHER => Ok(Role::Teacher),
            Role::STUDENT => Ok(Role::Student),
            Role::GUARDIAN => Ok(Role::Guardian),
            _ => Err(format!("Invalid role: {s}")),
        }
    }
}
