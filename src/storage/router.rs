//! 持久化路由
//!
//! 组合主存储与快照存储，对外提供统一的查询接口。
//!
//! 每次调用的路由规则：
//! 1. 启动时已固定为 `FallbackActive`：一律由快照服务
//! 2. 集合被配置为快照优先：由快照服务
//! 3. 否则访问主存储；出错时记录日志并改由快照服务本次调用（不改变全局状态）
//!
//! 读操作失败时返回空结果，写操作返回显式错误。

use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{DeleteOutcome, Filter, InsertOutcome, StorageBackend, UpdateOutcome};
use crate::errors::{Result, SchoolError};
use crate::models::common::ensure_record_id;
use crate::models::{Collection, Record};

/// 存储后端状态
///
/// `Uninitialized -> Connecting -> {PrimaryActive | FallbackActive}`，
/// 终态在进程生命周期内不再改变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendState {
    Uninitialized,
    Connecting,
    PrimaryActive,
    FallbackActive,
}

impl BackendState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackendState::PrimaryActive | BackendState::FallbackActive
        )
    }

    /// 状态迁移，非法迁移返回错误
    pub fn advance(self, next: BackendState) -> Result<BackendState> {
        let allowed = matches!(
            (self, next),
            (BackendState::Uninitialized, BackendState::Connecting)
                | (BackendState::Connecting, BackendState::PrimaryActive)
                | (BackendState::Connecting, BackendState::FallbackActive)
        );
        if allowed {
            debug!("Backend state transition: {:?} -> {:?}", self, next);
            Ok(next)
        } else {
            Err(SchoolError::database_config(format!(
                "非法的后端状态迁移: {self:?} -> {next:?}"
            )))
        }
    }
}

/// 集合路由策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoutingPolicy {
    PrimaryPreferred,
    FallbackPreferred,
}

/// 静态的集合路由表
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    fallback_preferred: HashSet<Collection>,
}

impl RoutingTable {
    pub fn new<I>(fallback_preferred: I) -> Self
    where
        I: IntoIterator<Item = Collection>,
    {
        Self {
            fallback_preferred: fallback_preferred.into_iter().collect(),
        }
    }

    /// 从配置中的集合名构建
    pub fn from_names(names: &[String]) -> Result<Self> {
        let collections = names
            .iter()
            .map(|name| name.parse::<Collection>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(collections))
    }

    pub fn policy(&self, collection: Collection) -> RoutingPolicy {
        if self.fallback_preferred.contains(&collection) {
            RoutingPolicy::FallbackPreferred
        } else {
            RoutingPolicy::PrimaryPreferred
        }
    }
}

/// 持久化路由器，所有业务读写的唯一入口
pub struct PersistenceRouter {
    primary: Option<Arc<dyn StorageBackend>>,
    snapshot: Arc<dyn StorageBackend>,
    state: BackendState,
    routing: RoutingTable,
}

impl PersistenceRouter {
    /// 使用已连接的主存储构建（`PrimaryActive`）
    pub fn primary_active(
        primary: Arc<dyn StorageBackend>,
        snapshot: Arc<dyn StorageBackend>,
        routing: RoutingTable,
    ) -> Self {
        Self {
            primary: Some(primary),
            snapshot,
            state: BackendState::PrimaryActive,
            routing,
        }
    }

    /// 固定为快照模式（`FallbackActive`）
    ///
    /// 主存储可以连通但不允许自动迁移时仍保留句柄，供管理员手动迁移。
    pub fn fallback_active(
        primary: Option<Arc<dyn StorageBackend>>,
        snapshot: Arc<dyn StorageBackend>,
        routing: RoutingTable,
    ) -> Self {
        Self {
            primary,
            snapshot,
            state: BackendState::FallbackActive,
            routing,
        }
    }

    pub fn state(&self) -> BackendState {
        self.state
    }

    pub fn policy(&self, collection: Collection) -> RoutingPolicy {
        self.routing.policy(collection)
    }

    pub fn primary(&self) -> Option<Arc<dyn StorageBackend>> {
        self.primary.clone()
    }

    pub fn snapshot(&self) -> Arc<dyn StorageBackend> {
        self.snapshot.clone()
    }

    /// 本集合当前由主存储服务时返回主存储
    fn primary_for(&self, collection: Collection) -> Option<&Arc<dyn StorageBackend>> {
        if self.state == BackendState::FallbackActive {
            return None;
        }
        if self.routing.policy(collection) == RoutingPolicy::FallbackPreferred {
            return None;
        }
        self.primary.as_ref()
    }

    /// 当前负责该集合的后端（不考虑单次调用的失败回退）
    pub fn backend_for(&self, collection: Collection) -> Arc<dyn StorageBackend> {
        self.primary_for(collection)
            .unwrap_or(&self.snapshot)
            .clone()
    }

    /// 按路由规则执行一次调用，主存储故障时改由快照执行
    ///
    /// 主存储返回的校验等业务错误原样返回，不重试快照。
    async fn dispatch<T, F, Fut>(&self, collection: Collection, op: &'static str, call: F) -> Result<T>
    where
        F: Fn(Arc<dyn StorageBackend>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(primary) = self.primary_for(collection) {
            match call(primary.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_backend_failure() => return Err(e),
                Err(e) => {
                    warn!(
                        "Primary store {} on {} failed, serving from snapshot: {}",
                        op, collection, e
                    );
                }
            }
        } else {
            debug!("{} on {} served by snapshot", op, collection);
        }
        call(self.snapshot.clone()).await
    }

    /// 获取集合全部记录，失败时返回空列表
    pub async fn get_all(&self, collection: Collection) -> Vec<Record> {
        self.dispatch(collection, "get_all", |backend| async move {
            backend.get_all(collection).await
        })
        .await
        .unwrap_or_else(|e| {
            error!("get_all on {} failed, returning empty list: {}", collection, e);
            Vec::new()
        })
    }

    /// 通过 id 获取记录，不存在或失败时返回 None
    pub async fn get_by_id(&self, collection: Collection, id: &str) -> Option<Record> {
        self.dispatch(collection, "get_by_id", |backend| async move {
            backend.get_by_id(collection, id).await
        })
        .await
        .unwrap_or_else(|e| {
            error!("get_by_id {}/{} failed: {}", collection, id, e);
            None
        })
    }

    /// 按过滤器查询，失败时返回空列表
    pub async fn find(&self, collection: Collection, filter: &Filter) -> Vec<Record> {
        self.dispatch(collection, "find", |backend| async move {
            backend.find(collection, filter).await
        })
        .await
        .unwrap_or_else(|e| {
            error!("find on {} failed, returning empty list: {}", collection, e);
            Vec::new()
        })
    }

    /// 插入记录，缺少 id 时分配 UUID
    pub async fn insert(&self, collection: Collection, mut record: Record) -> Result<InsertOutcome> {
        ensure_record_id(&mut record);
        let record = &record;
        self.dispatch(collection, "insert", |backend| async move {
            backend.insert(collection, record.clone()).await
        })
        .await
    }

    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Record,
    ) -> Result<UpdateOutcome> {
        let fields = &fields;
        self.dispatch(collection, "update", |backend| async move {
            backend.update(collection, id, fields.clone()).await
        })
        .await
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<DeleteOutcome> {
        self.dispatch(collection, "delete", |backend| async move {
            backend.delete(collection, id).await
        })
        .await
    }

    pub async fn count(&self, collection: Collection) -> Result<u64> {
        self.dispatch(collection, "count", |backend| async move {
            backend.count(collection).await
        })
        .await
    }
}
