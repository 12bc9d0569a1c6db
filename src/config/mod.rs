//! 配置管理
//!
//! 静态配置在启动时加载一次，之后只读。

mod r#impl;
mod structs;

pub use structs::*;
