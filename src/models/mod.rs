pub mod accounts;
pub mod classes;
pub mod common;
pub mod coursework;
pub mod messages;
pub mod system;

pub use common::{Collection, Record, Role};
