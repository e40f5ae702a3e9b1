//! 规则引擎领域模型
//!
//! `RuleSet` 是不可变值：所有编辑操作都返回新值，原值保持不变，
//! 评估中的快照不会观察到编辑中途的状态。

use crate::error::{Diagnostic, Result, RuleError};
use crate::operators::LogicalOperator;
use crate::value::lookup_path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 条件：属性 + 操作符 + 目标值
///
/// 操作符以字符串 id 保存，未知操作符可以正常反序列化，在评估时失败关闭。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(
        attribute: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// 规则组
///
/// 没有任何条件的规则组是通配组，总是匹配。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub logic: LogicalOperator,
    #[serde(default)]
    pub return_value: Value,
}

impl RuleGroup {
    pub fn new(logic: LogicalOperator, conditions: Vec<Condition>, return_value: impl Into<Value>) -> Self {
        Self {
            conditions,
            logic,
            return_value: return_value.into(),
        }
    }

    pub fn and(conditions: Vec<Condition>, return_value: impl Into<Value>) -> Self {
        Self::new(LogicalOperator::And, conditions, return_value)
    }

    pub fn or(conditions: Vec<Condition>, return_value: impl Into<Value>) -> Self {
        Self::new(LogicalOperator::Or, conditions, return_value)
    }

    /// 通配组：无条件匹配
    pub fn wildcard(return_value: impl Into<Value>) -> Self {
        Self::new(LogicalOperator::And, Vec::new(), return_value)
    }

    pub fn is_wildcard(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// 规则集：有序规则组 + 默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
    #[serde(default)]
    pub default_value: Value,
}

impl RuleSet {
    pub fn new(default_value: impl Into<Value>) -> Self {
        Self {
            groups: Vec::new(),
            default_value: default_value.into(),
        }
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// 条件总数
    pub fn condition_count(&self) -> usize {
        self.groups.iter().map(|g| g.conditions.len()).sum()
    }

    // ==================== 编辑操作（返回新值） ====================

    /// 追加规则组
    pub fn with_group(&self, group: RuleGroup) -> Self {
        let mut next = self.clone();
        next.groups.push(group);
        next
    }

    /// 删除规则组
    pub fn without_group(&self, index: usize) -> Result<Self> {
        self.check_group(index)?;
        let mut next = self.clone();
        next.groups.remove(index);
        Ok(next)
    }

    /// 调整规则组顺序（组顺序决定匹配优先级）
    pub fn move_group(&self, from: usize, to: usize) -> Result<Self> {
        self.check_group(from)?;
        self.check_group(to)?;
        let mut next = self.clone();
        let group = next.groups.remove(from);
        next.groups.insert(to, group);
        Ok(next)
    }

    /// 向规则组追加条件
    pub fn with_condition(&self, group: usize, condition: Condition) -> Result<Self> {
        self.edit_group(group, |g| {
            g.conditions.push(condition);
            Ok(())
        })
    }

    /// 删除规则组中的条件
    pub fn without_condition(&self, group: usize, index: usize) -> Result<Self> {
        self.edit_group(group, |g| {
            check_index("conditions", index, g.conditions.len())?;
            g.conditions.remove(index);
            Ok(())
        })
    }

    /// 替换规则组中的条件
    pub fn replace_condition(&self, group: usize, index: usize, condition: Condition) -> Result<Self> {
        self.edit_group(group, |g| {
            check_index("conditions", index, g.conditions.len())?;
            g.conditions[index] = condition;
            Ok(())
        })
    }

    /// 设置规则组的逻辑操作符
    pub fn with_logic(&self, group: usize, logic: LogicalOperator) -> Result<Self> {
        self.edit_group(group, |g| {
            g.logic = logic;
            Ok(())
        })
    }

    /// 设置规则组的返回值
    pub fn with_return_value(&self, group: usize, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        self.edit_group(group, |g| {
            g.return_value = value;
            Ok(())
        })
    }

    /// 设置默认值
    pub fn with_default_value(&self, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.default_value = value.into();
        next
    }

    fn edit_group<F>(&self, index: usize, edit: F) -> Result<Self>
    where
        F: FnOnce(&mut RuleGroup) -> Result<()>,
    {
        self.check_group(index)?;
        let mut next = self.clone();
        edit(&mut next.groups[index])?;
        Ok(next)
    }

    fn check_group(&self, index: usize) -> Result<()> {
        check_index("groups", index, self.groups.len())
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(Value::Bool(false))
    }
}

fn check_index(what: &str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(RuleError::IndexOutOfRange {
            what: what.to_string(),
            index,
            len,
        })
    }
}

/// 评估上下文 - 属性名到运行时取值的映射
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationContext {
    data: Map<String, Value>,
}

impl EvaluationContext {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建，非对象值视为空上下文
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self { data },
            _ => Self::default(),
        }
    }

    /// 从 JSON 字符串创建
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// 设置属性值，返回自身便于链式构造
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(attribute.into(), value.into());
        self
    }

    /// 获取属性值
    ///
    /// 优先按完整名称查找，找不到时再按点号路径查找嵌套对象。
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(attribute) {
            return Some(value);
        }

        let (head, rest) = attribute.split_once('.')?;
        lookup_path(self.data.get(head)?, rest)
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl From<Value> for EvaluationContext {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// 单个条件的评估追踪
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResult {
    pub attribute: String,
    pub operator: String,
    pub value: Value,
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

/// 单个规则组的评估追踪
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub matched: bool,
    pub logic: LogicalOperator,
    pub conditions: Vec<ConditionResult>,
    pub return_value: Value,
}

/// 评估结果
///
/// `group_results` 只包含实际评估过的组：首个匹配组之后的组不会出现。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub final_result: Value,
    pub matched_group: Option<usize>,
    pub group_results: Vec<GroupResult>,
}

impl EvaluationResult {
    /// 是否落到了默认值
    pub fn is_default(&self) -> bool {
        self.matched_group.is_none()
    }
}
