//! 通用文档记录
//!
//! 所有集合都以半结构化 JSON 对象存储，`id` 由应用层分配。

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::errors::{Result, SchoolError};

/// 一条文档记录：字段名 -> 值
pub type Record = Map<String, Value>;

/// 记录主键字段名
pub const ID_FIELD: &str = "id";

/// 读取记录的 id
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

/// 生成新的记录 id（UUID v4，并发创建时不会碰撞）
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录缺少 id 时分配一个新的，返回最终 id
pub fn ensure_record_id(record: &mut Record) -> String {
    match record_id(record) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = new_record_id();
            record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
    }
}

/// 将部分字段合并进记录，`id` 字段不可被覆盖
pub fn merge_fields(target: &mut Record, fields: Record) {
    for (key, value) in fields {
        if key == ID_FIELD {
            continue;
        }
        target.insert(key, value);
    }
}

/// 将记录反序列化为具体实体
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// 将实体序列化为记录
pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SchoolError::serialization(format!(
            "记录必须是 JSON 对象，实际为: {other}"
        ))),
    }
}

/// 用 `json!` 构造的对象直接转为记录
pub fn record_from_value(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SchoolError::serialization(format!(
            "记录必须是 JSON 对象，实际为: {other}"
        ))),
    }
}
