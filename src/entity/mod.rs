//! SeaORM 实体定义
//!
//! 主存储只有一张 documents 表，集合名 + 记录 id 为联合主键。

pub mod prelude;

pub mod documents;
