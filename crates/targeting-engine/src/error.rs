//! 规则引擎错误类型
//!
//! `RuleError` 只出现在宿主主动调用的可失败操作中（编译校验、编辑、存储、注册）。
//! 评估路径上的异常一律以 `Diagnostic` 标签记录并失败关闭为 `false`。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("属性不存在: {path} 引用了未注册的属性 '{attribute}'")]
    UnknownAttribute { path: String, attribute: String },

    #[error("无效的操作符: {path} 的操作符 '{operator}' 不支持类型 {attribute_type}")]
    InvalidOperator {
        path: String,
        operator: String,
        attribute_type: String,
    },

    #[error("取值格式错误: {path} - {message}")]
    MalformedValue { path: String, message: String },

    #[error("正则表达式无效: {path} - {message}")]
    InvalidPattern { path: String, message: String },

    #[error("超出限制: {what} 数量 {actual} 超过上限 {limit}")]
    LimitExceeded {
        what: String,
        actual: usize,
        limit: usize,
    },

    #[error("索引越界: {what}[{index}]，当前长度 {len}")]
    IndexOutOfRange {
        what: String,
        index: usize,
        len: usize,
    },

    #[error("操作符重复注册: {attribute_type}.{operator}")]
    DuplicateOperator {
        attribute_type: String,
        operator: String,
    },

    #[error("属性重复注册: {0}")]
    DuplicateAttribute(String),

    #[error("规则集未找到: {0}")]
    FlagNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RuleError {
    pub(crate) fn malformed(path: &str, message: impl Into<String>) -> Self {
        Self::MalformedValue {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// 条件失败关闭的原因
///
/// 非致命诊断标签，随评估追踪一起返回给编辑器用于高亮提示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Diagnostic {
    /// 条件引用了属性目录中不存在的属性
    UnknownAttribute,
    /// 操作符不属于该属性类型
    OperatorTypeMismatch,
    /// 规则中的目标值形状不符合操作符要求
    MalformedValue,
    /// `matches` 的正则表达式无法编译
    InvalidPattern,
    /// 上下文中没有该属性的值
    MissingContextValue,
    /// 上下文中的值类型与属性类型不兼容
    IncompatibleContextValue,
}

impl Diagnostic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownAttribute => "unknownAttribute",
            Self::OperatorTypeMismatch => "operatorTypeMismatch",
            Self::MalformedValue => "malformedValue",
            Self::InvalidPattern => "invalidPattern",
            Self::MissingContextValue => "missingContextValue",
            Self::IncompatibleContextValue => "incompatibleContextValue",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
