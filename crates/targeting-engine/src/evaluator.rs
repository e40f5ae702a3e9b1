//! 条件评估器与规则组评估器
//!
//! 条件评估在任何输入下都不会失败：属性未注册、操作符与类型不匹配、
//! 目标值格式错误、正则无效、上下文缺值等情况一律返回 `false`，
//! 并附带对应的诊断标签。

use crate::attributes::AttributeRegistry;
use crate::error::Diagnostic;
use crate::models::{Condition, EvaluationContext, RuleGroup};
use crate::operators::{LogicalOperator, OperatorContext, OperatorRegistry};
use serde_json::Value;
use tracing::debug;

/// 单个条件的评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub result: bool,
    pub diagnostic: Option<Diagnostic>,
}

impl ConditionOutcome {
    fn pass(result: bool) -> Self {
        Self {
            result,
            diagnostic: None,
        }
    }

    fn fail_closed(diagnostic: Diagnostic) -> Self {
        Self {
            result: false,
            diagnostic: Some(diagnostic),
        }
    }
}

/// 条件评估器
pub struct ConditionEvaluator<'a> {
    attributes: &'a AttributeRegistry,
    operators: &'a OperatorRegistry,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(attributes: &'a AttributeRegistry, operators: &'a OperatorRegistry) -> Self {
        Self {
            attributes,
            operators,
        }
    }

    /// 评估条件
    ///
    /// 1. 在属性目录中解析属性
    /// 2. 按属性类型解析操作符
    /// 3. 读取上下文中的值并执行比较
    pub fn evaluate(
        &self,
        condition: &Condition,
        context: &EvaluationContext,
        env: &OperatorContext<'_>,
    ) -> ConditionOutcome {
        let outcome = self.evaluate_inner(condition, context, env);

        if let Some(diagnostic) = outcome.diagnostic {
            debug!(
                attribute = %condition.attribute,
                operator = %condition.operator,
                %diagnostic,
                "Condition failed closed"
            );
        }

        outcome
    }

    fn evaluate_inner(
        &self,
        condition: &Condition,
        context: &EvaluationContext,
        env: &OperatorContext<'_>,
    ) -> ConditionOutcome {
        let Some(attribute) = self.attributes.resolve(&condition.attribute) else {
            return ConditionOutcome::fail_closed(Diagnostic::UnknownAttribute);
        };

        let Some(operator) = self
            .operators
            .get(attribute.attribute_type, &condition.operator)
        else {
            return ConditionOutcome::fail_closed(Diagnostic::OperatorTypeMismatch);
        };

        let actual = match context.get(&attribute.name) {
            None | Some(Value::Null) => {
                return ConditionOutcome::fail_closed(Diagnostic::MissingContextValue);
            }
            Some(actual) => actual,
        };

        match operator.compare(actual, &condition.value, env) {
            Ok(result) => ConditionOutcome::pass(result),
            Err(diagnostic) => ConditionOutcome::fail_closed(diagnostic),
        }
    }
}

/// 规则组评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct GroupVerdict<'g> {
    pub matched: bool,
    pub candidate_value: &'g Value,
}

/// 规则组评估器
///
/// 组合顺序与条件顺序无关：AND 要求全部为真，OR 要求至少一个为真，
/// 空条件列表视为通配组。
pub struct GroupEvaluator;

impl GroupEvaluator {
    pub fn evaluate<'g>(group: &'g RuleGroup, results: &[bool]) -> GroupVerdict<'g> {
        GroupVerdict {
            matched: Self::combine(group.logic, results),
            candidate_value: &group.return_value,
        }
    }

    /// 按逻辑操作符合并条件结果
    pub fn combine(logic: LogicalOperator, results: &[bool]) -> bool {
        if results.is_empty() {
            return true;
        }

        match logic {
            LogicalOperator::And => results.iter().all(|r| *r),
            LogicalOperator::Or => results.iter().any(|r| *r),
        }
    }
}
