//! School Records - 学校档案后端核心
//!
//! 以文档集合保存账户、班级、作业、成绩与消息，
//! 主存储不可用时由本地 JSON 快照文件接管。
//!
//! # 架构
//! - `access`: 基于关系的访问判定
//! - `config`: 配置管理
//! - `entity`: SeaORM 数据库实体
//! - `errors`: 统一错误处理
//! - `models`: 数据模型定义
//! - `runtime`: 运行时生命周期管理
//! - `services`: 业务逻辑层
//! - `storage`: 数据存储层（SeaORM 主存储 + 快照文件 + 路由）

pub mod access;
pub mod config;
pub mod entity;
pub mod errors;
pub mod models;
pub mod runtime;
pub mod services;
pub mod storage;

#[cfg(test)]
mod test_support;
