//! 功能开关定向规则引擎
//!
//! 根据用户上下文评估规则集，决定功能开关返回的值：
//! - 按属性类型注册的操作符目录
//! - 规则组 AND/OR 组合，first-match-wins
//! - 异常条件失败关闭并附带诊断
//! - 冲突检测与覆盖率估算
//! - 写时复制的规则集存储

pub mod attributes;
pub mod compiler;
pub mod conflict;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
pub mod store;
pub mod value;

pub use attributes::{Attribute, AttributeRegistry, AttributeType};
pub use compiler::{CompiledRuleSet, RuleSetCompiler};
pub use conflict::{Conflict, detect_conflicts};
pub use coverage::estimate_coverage;
pub use engine::{Clock, RuleEngine, SystemClock};
pub use error::{Diagnostic, Result, RuleError};
pub use evaluator::{ConditionEvaluator, ConditionOutcome, GroupEvaluator};
pub use models::{
    Condition, ConditionResult, EvaluationContext, EvaluationResult, GroupResult, RuleGroup,
    RuleSet,
};
pub use operators::{LogicalOperator, Operator, OperatorContext, OperatorRegistry, RegexCache, TargetShape};
pub use store::{FlagStore, FlagStoreStats};
