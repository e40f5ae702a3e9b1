//! 规则集编译器
//!
//! 在规则集进入存储之前做结构校验，并预提取规则引用的属性。
//! 评估本身不依赖编译：未经编译的规则集同样可以评估，异常条件会失败关闭。

use crate::attributes::AttributeRegistry;
use crate::error::{Diagnostic, Result, RuleError};
use crate::models::{Condition, RuleSet};
use crate::operators::OperatorRegistry;
use flag_shared::config::EngineConfig;
use flag_shared::observability::metrics::FLAG_RULESET_COMPILES_TOTAL;
use std::collections::BTreeSet;
use std::sync::Arc;

/// 编译后的规则集
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    /// 原始规则集
    pub rule_set: Arc<RuleSet>,
    /// 规则中引用的所有属性
    pub required_attributes: BTreeSet<String>,
    /// 编译版本号（用于缓存失效）
    pub compile_version: u64,
}

impl CompiledRuleSet {
    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }
}

/// 规则集编译器
pub struct RuleSetCompiler {
    limits: EngineConfig,
    attributes: Arc<AttributeRegistry>,
    operators: Arc<OperatorRegistry>,
    compile_version: u64,
}

impl RuleSetCompiler {
    pub fn new(limits: EngineConfig) -> Self {
        Self {
            limits,
            attributes: Arc::new(AttributeRegistry::default()),
            operators: Arc::new(OperatorRegistry::default()),
            compile_version: 0,
        }
    }

    pub fn with_attributes(mut self, attributes: impl Into<Arc<AttributeRegistry>>) -> Self {
        self.attributes = attributes.into();
        self
    }

    pub fn with_operators(mut self, operators: impl Into<Arc<OperatorRegistry>>) -> Self {
        self.operators = operators.into();
        self
    }

    /// 从 JSON 字符串编译规则集
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledRuleSet> {
        let rule_set = RuleSet::from_json(json)?;
        self.compile(rule_set)
    }

    /// 编译规则集
    pub fn compile(&mut self, rule_set: RuleSet) -> Result<CompiledRuleSet> {
        if let Err(e) = self.validate(&rule_set) {
            metrics::counter!(FLAG_RULESET_COMPILES_TOTAL, "status" => "error").increment(1);
            return Err(e);
        }

        let required_attributes = Self::extract_attributes(&rule_set);

        self.compile_version += 1;
        metrics::counter!(FLAG_RULESET_COMPILES_TOTAL, "status" => "ok").increment(1);

        Ok(CompiledRuleSet {
            rule_set: Arc::new(rule_set),
            required_attributes,
            compile_version: self.compile_version,
        })
    }

    /// 验证规则集结构，返回第一个发现的问题
    pub fn validate(&self, rule_set: &RuleSet) -> Result<()> {
        if rule_set.groups.len() > self.limits.max_groups {
            return Err(RuleError::LimitExceeded {
                what: "groups".to_string(),
                actual: rule_set.groups.len(),
                limit: self.limits.max_groups,
            });
        }

        for (i, group) in rule_set.groups.iter().enumerate() {
            if group.conditions.len() > self.limits.max_conditions_per_group {
                return Err(RuleError::LimitExceeded {
                    what: format!("groups[{}].conditions", i),
                    actual: group.conditions.len(),
                    limit: self.limits.max_conditions_per_group,
                });
            }

            for (j, condition) in group.conditions.iter().enumerate() {
                let path = format!("groups[{}].conditions[{}]", i, j);
                self.validate_condition(condition, &path)?;
            }
        }

        Ok(())
    }

    /// 验证条件：属性存在、操作符属于该类型、目标值形状正确
    fn validate_condition(&self, condition: &Condition, path: &str) -> Result<()> {
        if condition.attribute.is_empty() {
            return Err(RuleError::ParseError(format!("条件 '{}' 的属性不能为空", path)));
        }

        let attribute = self
            .attributes
            .resolve(&condition.attribute)
            .ok_or_else(|| RuleError::UnknownAttribute {
                path: path.to_string(),
                attribute: condition.attribute.clone(),
            })?;

        let operator = self
            .operators
            .get(attribute.attribute_type, &condition.operator)
            .ok_or_else(|| RuleError::InvalidOperator {
                path: path.to_string(),
                operator: condition.operator.clone(),
                attribute_type: attribute.attribute_type.to_string(),
            })?;

        operator
            .shape()
            .check(&condition.value)
            .map_err(|diagnostic| match diagnostic {
                Diagnostic::InvalidPattern => RuleError::InvalidPattern {
                    path: path.to_string(),
                    message: format!("无法编译 {}", condition.value),
                },
                _ => RuleError::malformed(
                    path,
                    format!(
                        "{} 操作符需要 {}，实际为 {}",
                        operator.id(),
                        operator.shape().describe(),
                        condition.value
                    ),
                ),
            })
    }

    /// 提取规则集中引用的所有属性
    fn extract_attributes(rule_set: &RuleSet) -> BTreeSet<String> {
        rule_set
            .groups
            .iter()
            .flat_map(|g| g.conditions.iter())
            .map(|c| c.attribute.clone())
            .collect()
    }
}

impl Default for RuleSetCompiler {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rule_set_json() -> &'static str {
        r#"
        {
            "groups": [
                {
                    "logic": "AND",
                    "conditions": [
                        {"attribute": "country", "operator": "in", "value": ["BR", "US"]},
                        {"attribute": "accountAge", "operator": "between", "value": {"min": 10, "max": 20}}
                    ],
                    "returnValue": true
                },
                {
                    "logic": "OR",
                    "conditions": [
                        {"attribute": "email", "operator": "matches", "value": "@acme\\.io$"},
                        {"attribute": "country", "operator": "equals", "value": "CA"}
                    ],
                    "returnValue": true
                }
            ],
            "defaultValue": false
        }
        "#
    }

    fn compile_err(json: &str) -> RuleError {
        RuleSetCompiler::default()
            .compile_from_json(json)
            .expect_err("compile should fail")
    }

    #[test]
    fn test_compile_from_json() {
        let mut compiler = RuleSetCompiler::default();
        let compiled = compiler.compile_from_json(sample_rule_set_json()).unwrap();

        assert_eq!(compiled.rule_set().groups.len(), 2);
        assert_eq!(
            compiled.required_attributes.iter().collect::<Vec<_>>(),
            vec!["accountAge", "country", "email"]
        );
    }

    #[test]
    fn test_compile_version() {
        let mut compiler = RuleSetCompiler::default();

        let compiled1 = compiler.compile_from_json(sample_rule_set_json()).unwrap();
        let compiled2 = compiler.compile_from_json(sample_rule_set_json()).unwrap();

        assert_eq!(compiled1.compile_version, 1);
        assert_eq!(compiled2.compile_version, 2);
    }

    #[test]
    fn test_wildcard_group_is_valid() {
        let mut compiler = RuleSetCompiler::default();
        let json = r#"{"groups": [{"conditions": [], "returnValue": true}], "defaultValue": false}"#;

        let compiled = compiler.compile_from_json(json).unwrap();
        assert!(compiled.required_attributes.is_empty());
    }

    #[test]
    fn test_validate_unknown_attribute() {
        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "shoeSize", "operator": "equals", "value": "42"}], "returnValue": true}]}"#,
        );

        assert!(matches!(
            &err,
            RuleError::UnknownAttribute { path, attribute }
                if path == "groups[0].conditions[0]" && attribute == "shoeSize"
        ));
    }

    #[test]
    fn test_validate_empty_attribute() {
        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "", "operator": "equals", "value": "x"}], "returnValue": true}]}"#,
        );
        assert!(err.to_string().contains("属性不能为空"));
    }

    #[test]
    fn test_validate_operator_type_mismatch() {
        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "accountAge", "operator": "contains", "value": "1"}], "returnValue": true}]}"#,
        );

        assert!(matches!(
            &err,
            RuleError::InvalidOperator { operator, attribute_type, .. }
                if operator == "contains" && attribute_type == "number"
        ));
    }

    #[test]
    fn test_validate_between_missing_bound() {
        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "accountAge", "operator": "between", "value": {"min": 10}}], "returnValue": true}]}"#,
        );
        assert!(matches!(err, RuleError::MalformedValue { .. }));
    }

    #[test]
    fn test_validate_in_requires_list() {
        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "country", "operator": "in", "value": "BR"}], "returnValue": true}]}"#,
        );
        assert!(matches!(err, RuleError::MalformedValue { .. }));
        assert!(err.to_string().contains("list"));
    }

    #[test]
    fn test_validate_invalid_regex() {
        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "email", "operator": "matches", "value": "(["}], "returnValue": true}]}"#,
        );
        assert!(matches!(err, RuleError::InvalidPattern { .. }));
        assert!(err.to_string().contains("正则表达式无效"));
    }

    #[test]
    fn test_validate_duration() {
        let mut compiler = RuleSetCompiler::default();
        let ok = r#"{"groups": [{"conditions": [{"attribute": "lastLoginDate", "operator": "inLast", "value": {"value": 30, "unit": "days"}}], "returnValue": true}]}"#;
        assert!(compiler.compile_from_json(ok).is_ok());

        let err = compile_err(
            r#"{"groups": [{"conditions": [{"attribute": "lastLoginDate", "operator": "inLast", "value": {"value": 30, "unit": "years"}}], "returnValue": true}]}"#,
        );
        assert!(matches!(err, RuleError::MalformedValue { .. }));
    }

    #[test]
    fn test_group_limit() {
        let limits = EngineConfig {
            max_groups: 1,
            ..Default::default()
        };
        let mut compiler = RuleSetCompiler::new(limits);

        let err = compiler.compile_from_json(sample_rule_set_json()).unwrap_err();
        assert!(matches!(
            err,
            RuleError::LimitExceeded { actual: 2, limit: 1, .. }
        ));
    }

    #[test]
    fn test_condition_limit() {
        let limits = EngineConfig {
            max_conditions_per_group: 1,
            ..Default::default()
        };
        let compiler = RuleSetCompiler::new(limits);
        let rule_set = RuleSet::from_json(sample_rule_set_json()).unwrap();

        let err = compiler.validate(&rule_set).unwrap_err();
        assert!(matches!(
            &err,
            RuleError::LimitExceeded { what, .. } if what == "groups[0].conditions"
        ));
    }

    #[test]
    fn test_invalid_json() {
        let err = compile_err("{not json");
        assert!(matches!(err, RuleError::JsonError(_)));
    }
}
