//! 规则引擎
//!
//! 按声明顺序遍历规则组，首个匹配组的返回值即为最终结果（first-match-wins），
//! 无匹配时返回默认值。每个被评估的组都会完整评估全部条件，以便返回逐条件追踪。

use crate::attributes::AttributeRegistry;
use crate::evaluator::{ConditionEvaluator, GroupEvaluator};
use crate::models::{ConditionResult, EvaluationContext, EvaluationResult, GroupResult, RuleSet};
use crate::operators::{OperatorContext, OperatorRegistry, RegexCache};
use chrono::{DateTime, Utc};
use flag_shared::config::EngineConfig;
use flag_shared::observability::metrics::{
    FLAG_CONDITION_FAILURES_TOTAL, FLAG_EVALUATIONS_TOTAL, FLAG_EVALUATION_DURATION_SECONDS,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// 时钟抽象，`inLast` / `notInLast` 的时间窗口以此为基准
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 规则引擎
///
/// 不持有任何与规则集生命周期相关的可变状态，可在多个线程间共享。
/// 正则缓存只是编译结果的备忘，不影响评估结果。
pub struct RuleEngine {
    attributes: Arc<AttributeRegistry>,
    operators: Arc<OperatorRegistry>,
    regex_cache: RegexCache,
    clock: Arc<dyn Clock>,
}

impl RuleEngine {
    /// 使用内置属性目录和操作符表创建引擎
    pub fn new() -> Self {
        Self {
            attributes: Arc::new(AttributeRegistry::default()),
            operators: Arc::new(OperatorRegistry::default()),
            regex_cache: RegexCache::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// 按配置创建引擎
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            regex_cache: RegexCache::new(config.regex_cache_capacity),
            ..Self::new()
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

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// 评估规则集，当前时间取自时钟（每次调用只读取一次）
    pub fn evaluate(&self, rule_set: &RuleSet, context: &EvaluationContext) -> EvaluationResult {
        self.evaluate_at(rule_set, context, self.clock.now())
    }

    /// 以指定时间评估规则集
    ///
    /// 纯函数：相同的 `(rule_set, context, now)` 总是得到相同结果。
    #[instrument(level = "debug", skip_all, fields(groups = rule_set.groups.len()))]
    pub fn evaluate_at(
        &self,
        rule_set: &RuleSet,
        context: &EvaluationContext,
        now: DateTime<Utc>,
    ) -> EvaluationResult {
        let start = Instant::now();

        let env = OperatorContext {
            now,
            regex_cache: &self.regex_cache,
        };
        let conditions = ConditionEvaluator::new(&self.attributes, &self.operators);

        let mut group_results = Vec::new();
        let mut matched_group = None;

        for (index, group) in rule_set.groups.iter().enumerate() {
            let traced: Vec<ConditionResult> = group
                .conditions
                .iter()
                .map(|condition| {
                    let outcome = conditions.evaluate(condition, context, &env);
                    if let Some(diagnostic) = outcome.diagnostic {
                        metrics::counter!(FLAG_CONDITION_FAILURES_TOTAL, "diagnostic" => diagnostic.as_str())
                            .increment(1);
                    }
                    ConditionResult {
                        attribute: condition.attribute.clone(),
                        operator: condition.operator.clone(),
                        value: condition.value.clone(),
                        result: outcome.result,
                        diagnostic: outcome.diagnostic,
                    }
                })
                .collect();

            let results: Vec<bool> = traced.iter().map(|c| c.result).collect();
            let verdict = GroupEvaluator::evaluate(group, &results);

            group_results.push(GroupResult {
                matched: verdict.matched,
                logic: group.logic,
                conditions: traced,
                return_value: verdict.candidate_value.clone(),
            });

            if verdict.matched {
                matched_group = Some(index);
                break;
            }
        }

        let final_result = match matched_group {
            Some(index) => rule_set.groups[index].return_value.clone(),
            None => rule_set.default_value.clone(),
        };

        let outcome = if matched_group.is_some() { "matched" } else { "default" };
        metrics::counter!(FLAG_EVALUATIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(FLAG_EVALUATION_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        debug!(matched_group = ?matched_group, %outcome, "Rule set evaluated");

        EvaluationResult {
            final_result,
            matched_group,
            group_results,
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
