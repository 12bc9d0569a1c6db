//! 访问控制
//!
//! - `resolver`：纯谓词，判断谁可以对什么做什么
//! - `guard`：经由路由器加载关系数据后调用谓词

pub mod guard;
pub mod resolver;

pub use guard::{AccessGuard, AccessOutcome};
pub use resolver::{Actor, Decision, Grant};
