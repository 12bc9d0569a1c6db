//! 数据存储层
//!
//! `StorageBackend` 是两种后端共同的契约：
//! - [`SeaOrmStore`]：主存储，网络文档数据库（经由 SeaORM 的 documents 表）
//! - [`SnapshotStore`]：单个 JSON 快照文件，保存全部集合
//!
//! 业务代码只通过 [`PersistenceRouter`] 访问存储。

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::Result;
use crate::models::{Collection, Record};

pub mod filter;
pub mod router;
pub mod sea_orm_storage;
pub mod snapshot_storage;

pub use filter::Filter;
pub use router::{BackendState, PersistenceRouter, RoutingPolicy, RoutingTable};
pub use sea_orm_storage::SeaOrmStore;
pub use snapshot_storage::{SnapshotDocument, SnapshotStore};

/// 插入结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub id: String,
}

/// 更新结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub matched: u64,
}

/// 删除结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub removed: u64,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &'static str;

    // 获取集合内全部记录
    async fn get_all(&self, collection: Collection) -> Result<Vec<Record>>;
    // 通过 id 获取记录
    async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>>;
    // 插入记录，记录必须已带 id；id 重复时返回校验错误
    async fn insert(&self, collection: Collection, record: Record) -> Result<InsertOutcome>;
    // 合并部分字段
    async fn update(&self, collection: Collection, id: &str, fields: Record)
    -> Result<UpdateOutcome>;
    // 删除记录
    async fn delete(&self, collection: Collection, id: &str) -> Result<DeleteOutcome>;

    // 按过滤器查询
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Record>> {
        Ok(filter.apply(self.get_all(collection).await?))
    }

    // 集合记录数
    async fn count(&self, collection: Collection) -> Result<u64> {
        Ok(self.get_all(collection).await?.len() as u64)
    }

    /// 批量插入，用于迁移与恢复
    async fn insert_many(&self, collection: Collection, records: Vec<Record>) -> Result<u64>;

    /// 清空集合，返回删除条数
    async fn clear(&self, collection: Collection) -> Result<u64>;

    /// 以给定记录整体替换集合内容，失败时集合保持原样
    async fn replace_all(&self, collection: Collection, records: Vec<Record>) -> Result<u64>;
}
