//! 查询过滤器
//!
//! 只支持两种形式：
//! - 等值合取：`{k1: v1, k2: v2}`，所有字段都相等才匹配
//! - 析取：`{"$or": [cond1, cond2, ...]}`，任一条件匹配即可

use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::{Result, SchoolError};
use crate::models::Record;

/// JSON 形式中表示析取的保留键
pub const OR_KEY: &str = "$or";

/// 一组等值条件
pub type Conditions = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All(Conditions),
    Any(Vec<Conditions>),
}

impl Filter {
    /// 单字段等值条件
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut conditions = Conditions::new();
        conditions.insert(field.into(), value.into());
        Filter::All(conditions)
    }

    /// 追加一个等值条件；析取形式下追加到每个分支
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        match &mut self {
            Filter::All(conditions) => {
                conditions.insert(field, value);
            }
            Filter::Any(branches) => {
                for branch in branches.iter_mut() {
                    branch.insert(field.clone(), value.clone());
                }
            }
        }
        self
    }

    /// 任一条件组匹配即可
    pub fn any<I>(branches: I) -> Self
    where
        I: IntoIterator<Item = Filter>,
    {
        let mut flattened = Vec::new();
        for branch in branches {
            match branch {
                Filter::All(conditions) => flattened.push(conditions),
                Filter::Any(nested) => flattened.extend(nested),
            }
        }
        Filter::Any(flattened)
    }

    /// 从 JSON 对象解析
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| SchoolError::validation("过滤器必须是 JSON 对象"))?;

        if let Some(branches) = object.get(OR_KEY) {
            if object.len() != 1 {
                return Err(SchoolError::validation(format!(
                    "'{OR_KEY}' 不能与其他字段混用"
                )));
            }
            let branches = branches
                .as_array()
                .ok_or_else(|| SchoolError::validation(format!("'{OR_KEY}' 的值必须是数组")))?;
            let mut parsed = Vec::with_capacity(branches.len());
            for branch in branches {
                let branch = branch
                    .as_object()
                    .ok_or_else(|| SchoolError::validation("析取分支必须是 JSON 对象"))?;
                parsed.push(
                    branch
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<Conditions>(),
                );
            }
            return Ok(Filter::Any(parsed));
        }

        Ok(Filter::All(
            object
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ))
    }

    /// 判断记录是否匹配
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All(conditions) => matches_all(conditions, record),
            Filter::Any(branches) => branches.iter().any(|c| matches_all(c, record)),
        }
    }

    /// 过滤记录列表，保持原有顺序，每条记录最多出现一次
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn matches_all(conditions: &Conditions, record: &Record) -> bool {
    conditions
        .iter()
        .all(|(field, expected)| match record.get(field) {
            Some(actual) => actual == expected,
            // 缺失字段只与 null 相等
            None => expected.is_null(),
        })
}
