//! 文档实体
//!
//! 主存储中所有集合共用 documents 表，记录正文以 JSON 文本保存。

use sea_orm::entity::prelude::*;

use crate::errors::SchoolError;
use crate::models::Record;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub collection: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub record_id: String,
    #[sea_orm(column_type = "Text")]
    pub data: String,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// 解析为文档记录
    pub fn into_record(self) -> crate::errors::Result<Record> {
        serde_json::from_str(&self.data).map_err(|e| {
            SchoolError::serialization(format!(
                "文档 {}/{} 内容无法解析: {e}",
                self.collection, self.record_id
            ))
        })
    }
}
