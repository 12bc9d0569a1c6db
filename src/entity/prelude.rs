//! 预导入模块，方便使用

pub use super::documents::{
    ActiveModel as DocumentActiveModel, Column as DocumentColumn, Entity as Documents,
    Model as DocumentModel,
};
