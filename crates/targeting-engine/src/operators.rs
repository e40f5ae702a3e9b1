//! 操作符注册表
//!
//! 按 `(属性类型, 操作符 id)` 索引的比较函数表。内置表覆盖 string / number /
//! date / object 四种类型，宿主也可以通过 `register` 扩展自定义操作符。
//!
//! 所有比较函数都是纯函数，返回 `Result<bool, Diagnostic>`：`Err` 表示条件
//! 失败关闭，携带的诊断标签说明原因。

use crate::attributes::AttributeType;
use crate::error::{Diagnostic, Result, RuleError};
use crate::value::{as_f64, lookup_path, num_eq, parse_datetime};
use chrono::{DateTime, Months, TimeDelta, Utc};
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// 用户编写的正则表达式编译上限
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// 默认正则缓存容量
pub const DEFAULT_REGEX_CACHE_CAPACITY: usize = 256;

/// 比较时可用的环境
pub struct OperatorContext<'a> {
    /// 本次评估的当前时间，一次 evaluate 调用内保持不变
    pub now: DateTime<Utc>,
    pub regex_cache: &'a RegexCache,
}

/// 比较函数：`(上下文值, 规则目标值, 环境)`
pub type CompareFn = fn(&Value, &Value, &OperatorContext<'_>) -> std::result::Result<bool, Diagnostic>;

/// 操作符期望的目标值形状，用于编译期校验
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// 字符串标量
    Text,
    /// 数值标量（可由字符串强制转换）
    Number,
    /// 日期标量
    Date,
    /// `{min, max}` 数值区间
    NumberRange,
    /// `{min, max}` 或 `{start, end}` 日期区间
    DateRange,
    /// `{value, unit}` 时间窗口
    Duration,
    /// 列表
    List,
    /// 正则表达式
    Pattern,
    /// 属性名（支持点号路径）
    PropertyName,
    /// 不做校验，留给自定义操作符
    Any,
}

impl TargetShape {
    /// 检查目标值形状
    pub fn check(&self, target: &Value) -> std::result::Result<(), Diagnostic> {
        match self {
            Self::Text | Self::PropertyName => target_str(target).map(|_| ()),
            Self::Number => target_number(target).map(|_| ()),
            Self::Date => target_date(target).map(|_| ()),
            Self::NumberRange => number_bounds(target).map(|_| ()),
            Self::DateRange => date_bounds(target).map(|_| ()),
            Self::Duration => parse_duration(target).map(|_| ()),
            Self::List => target_list(target).map(|_| ()),
            Self::Pattern => {
                let pattern = target_str(target)?;
                compile_pattern(pattern)
                    .map(|_| ())
                    .ok_or(Diagnostic::InvalidPattern)
            }
            Self::Any => Ok(()),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::NumberRange => "{min, max} number range",
            Self::DateRange => "{min, max} date range",
            Self::Duration => "{value, unit} duration",
            Self::List => "list",
            Self::Pattern => "regular expression",
            Self::PropertyName => "property name",
            Self::Any => "any",
        }
    }
}

/// 操作符定义
#[derive(Clone)]
pub struct Operator {
    id: String,
    label: String,
    attribute_type: AttributeType,
    shape: TargetShape,
    compare: CompareFn,
}

impl Operator {
    pub fn new(
        attribute_type: AttributeType,
        id: impl Into<String>,
        label: impl Into<String>,
        shape: TargetShape,
        compare: CompareFn,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            attribute_type,
            shape,
            compare,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 编辑器下拉框中展示的名称
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    pub fn shape(&self) -> TargetShape {
        self.shape
    }

    pub fn compare(
        &self,
        actual: &Value,
        target: &Value,
        ctx: &OperatorContext<'_>,
    ) -> std::result::Result<bool, Diagnostic> {
        (self.compare)(actual, target, ctx)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("id", &self.id)
            .field("attribute_type", &self.attribute_type)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// 操作符注册表
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    table: HashMap<AttributeType, HashMap<String, Operator>>,
    /// 每种类型的注册顺序
    order: HashMap<AttributeType, Vec<String>>,
}

impl OperatorRegistry {
    /// 创建空注册表
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
            order: HashMap::new(),
        }
    }

    /// 注册操作符，同一类型下 id 重复时报错
    pub fn register(&mut self, operator: Operator) -> Result<()> {
        let by_id = self.table.entry(operator.attribute_type).or_default();
        if by_id.contains_key(&operator.id) {
            return Err(RuleError::DuplicateOperator {
                attribute_type: operator.attribute_type.to_string(),
                operator: operator.id,
            });
        }

        self.order
            .entry(operator.attribute_type)
            .or_default()
            .push(operator.id.clone());
        by_id.insert(operator.id.clone(), operator);
        Ok(())
    }

    /// 查找某类型下的操作符
    pub fn get(&self, attribute_type: AttributeType, id: &str) -> Option<&Operator> {
        self.table.get(&attribute_type)?.get(id)
    }

    /// 列出某类型下的全部操作符（按注册顺序），未注册任何操作符的类型返回空列表
    pub fn resolve(&self, attribute_type: AttributeType) -> Vec<&Operator> {
        let (Some(ids), Some(by_id)) = (
            self.order.get(&attribute_type),
            self.table.get(&attribute_type),
        ) else {
            return Vec::new();
        };

        ids.iter().filter_map(|id| by_id.get(id)).collect()
    }

    fn with(mut self, operators: Vec<Operator>) -> Self {
        for operator in operators {
            let attribute_type = operator.attribute_type;
            let id = operator.id.clone();
            self.order.entry(attribute_type).or_default().push(id.clone());
            self.table
                .entry(attribute_type)
                .or_default()
                .insert(id, operator);
        }
        self
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        use AttributeType as T;
        use TargetShape as S;

        Self::empty().with(vec![
            // 字符串
            Operator::new(T::String, "equals", "equals", S::Text, string_equals),
            Operator::new(T::String, "notEquals", "does not equal", S::Text, string_not_equals),
            Operator::new(T::String, "contains", "contains", S::Text, string_contains),
            Operator::new(T::String, "notContains", "does not contain", S::Text, string_not_contains),
            Operator::new(T::String, "startsWith", "starts with", S::Text, string_starts_with),
            Operator::new(T::String, "endsWith", "ends with", S::Text, string_ends_with),
            Operator::new(T::String, "in", "is one of", S::List, string_in),
            Operator::new(T::String, "notIn", "is not one of", S::List, string_not_in),
            Operator::new(T::String, "matches", "matches regex", S::Pattern, string_matches),
            // 数值
            Operator::new(T::Number, "equals", "=", S::Number, number_equals),
            Operator::new(T::Number, "notEquals", "≠", S::Number, number_not_equals),
            Operator::new(T::Number, "greaterThan", ">", S::Number, number_gt),
            Operator::new(T::Number, "greaterThanOrEqual", "≥", S::Number, number_gte),
            Operator::new(T::Number, "lessThan", "<", S::Number, number_lt),
            Operator::new(T::Number, "lessThanOrEqual", "≤", S::Number, number_lte),
            Operator::new(T::Number, "between", "between", S::NumberRange, number_between),
            // 日期
            Operator::new(T::Date, "before", "before", S::Date, date_before),
            Operator::new(T::Date, "after", "after", S::Date, date_after),
            Operator::new(T::Date, "between", "between", S::DateRange, date_between),
            Operator::new(T::Date, "inLast", "in the last", S::Duration, date_in_last),
            Operator::new(T::Date, "notInLast", "not in the last", S::Duration, date_not_in_last),
            // 对象
            Operator::new(T::Object, "hasProperty", "has property", S::PropertyName, object_has_property),
            Operator::new(
                T::Object,
                "notHasProperty",
                "does not have property",
                S::PropertyName,
                object_not_has_property,
            ),
        ])
    }
}

/// 逻辑操作符
///
/// 反序列化时只有字符串 `"OR"` 映射为 Or，其余任何值（包括缺省、null、数字）都按 And 处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "String")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl<'de> Deserialize<'de> for LogicalOperator {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            Some("OR") => Self::Or,
            _ => Self::And,
        })
    }
}

impl From<LogicalOperator> for String {
    fn from(value: LogicalOperator) -> Self {
        value.to_string()
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// 时间窗口单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Days,
    Weeks,
    Months,
}

impl DurationUnit {
    fn parse(unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "day" | "days" => Some(Self::Days),
            "week" | "weeks" => Some(Self::Weeks),
            "month" | "months" => Some(Self::Months),
            _ => None,
        }
    }
}

/// 线程安全的正则缓存
///
/// 无效的表达式同样被缓存（值为 None），避免反复编译失败。
/// 写满后整体清空。
#[derive(Debug)]
pub struct RegexCache {
    entries: DashMap<String, Option<Regex>>,
    capacity: usize,
}

impl RegexCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// 获取编译结果，无效表达式返回 None
    pub fn get_or_compile(&self, pattern: &str) -> Option<Regex> {
        if let Some(entry) = self.entries.get(pattern) {
            return entry.value().clone();
        }

        let compiled = compile_pattern(pattern);

        if self.capacity > 0 {
            if self.entries.len() >= self.capacity {
                self.entries.clear();
            }
            self.entries.insert(pattern.to_string(), compiled.clone());
        }

        compiled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX_CACHE_CAPACITY)
    }
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .ok()
}

// ==================== 取值辅助 ====================

type Outcome = std::result::Result<bool, Diagnostic>;

fn target_str(target: &Value) -> std::result::Result<&str, Diagnostic> {
    target.as_str().ok_or(Diagnostic::MalformedValue)
}

fn target_number(target: &Value) -> std::result::Result<f64, Diagnostic> {
    as_f64(target).ok_or(Diagnostic::MalformedValue)
}

fn target_date(target: &Value) -> std::result::Result<DateTime<Utc>, Diagnostic> {
    parse_datetime(target).ok_or(Diagnostic::MalformedValue)
}

fn target_list(target: &Value) -> std::result::Result<&Vec<Value>, Diagnostic> {
    target.as_array().ok_or(Diagnostic::MalformedValue)
}

fn actual_str(actual: &Value) -> std::result::Result<&str, Diagnostic> {
    actual.as_str().ok_or(Diagnostic::IncompatibleContextValue)
}

fn actual_number(actual: &Value) -> std::result::Result<f64, Diagnostic> {
    as_f64(actual).ok_or(Diagnostic::IncompatibleContextValue)
}

fn actual_date(actual: &Value) -> std::result::Result<DateTime<Utc>, Diagnostic> {
    parse_datetime(actual).ok_or(Diagnostic::IncompatibleContextValue)
}

/// 读取区间上下界，任一缺失即为格式错误
fn range_bounds<'v>(
    target: &'v Value,
    aliases: &[(&str, &str)],
) -> std::result::Result<(&'v Value, &'v Value), Diagnostic> {
    let obj = target.as_object().ok_or(Diagnostic::MalformedValue)?;

    aliases
        .iter()
        .find_map(|(lo, hi)| match (obj.get(*lo), obj.get(*hi)) {
            (Some(min), Some(max)) if !min.is_null() && !max.is_null() => Some((min, max)),
            _ => None,
        })
        .ok_or(Diagnostic::MalformedValue)
}

fn number_bounds(target: &Value) -> std::result::Result<(f64, f64), Diagnostic> {
    let (min, max) = range_bounds(target, &[("min", "max")])?;
    Ok((target_number(min)?, target_number(max)?))
}

fn date_bounds(
    target: &Value,
) -> std::result::Result<(DateTime<Utc>, DateTime<Utc>), Diagnostic> {
    let (min, max) = range_bounds(target, &[("min", "max"), ("start", "end")])?;
    Ok((target_date(min)?, target_date(max)?))
}

fn parse_duration(target: &Value) -> std::result::Result<(u32, DurationUnit), Diagnostic> {
    let obj = target.as_object().ok_or(Diagnostic::MalformedValue)?;

    let amount = obj
        .get("value")
        .and_then(as_f64)
        .ok_or(Diagnostic::MalformedValue)?;
    if amount < 0.0 || amount.fract() != 0.0 || amount > f64::from(u32::MAX) {
        return Err(Diagnostic::MalformedValue);
    }

    let unit = obj
        .get("unit")
        .and_then(Value::as_str)
        .and_then(DurationUnit::parse)
        .ok_or(Diagnostic::MalformedValue)?;

    Ok((amount as u32, unit))
}

/// 计算时间窗口起点 `now - duration`
fn window_start(target: &Value, now: DateTime<Utc>) -> std::result::Result<DateTime<Utc>, Diagnostic> {
    let (amount, unit) = parse_duration(target)?;

    let start = match unit {
        DurationUnit::Days => TimeDelta::try_days(i64::from(amount))
            .and_then(|delta| now.checked_sub_signed(delta)),
        DurationUnit::Weeks => TimeDelta::try_weeks(i64::from(amount))
            .and_then(|delta| now.checked_sub_signed(delta)),
        DurationUnit::Months => now.checked_sub_months(Months::new(amount)),
    };

    start.ok_or(Diagnostic::MalformedValue)
}

// ==================== 字符串 ====================

fn string_equals(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let expected = target_str(target)?;
    Ok(actual_str(actual)? == expected)
}

fn string_not_equals(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    string_equals(actual, target, ctx).map(|r| !r)
}

fn string_contains(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let needle = target_str(target)?;
    Ok(actual_str(actual)?.contains(needle))
}

fn string_not_contains(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    string_contains(actual, target, ctx).map(|r| !r)
}

fn string_starts_with(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let prefix = target_str(target)?;
    Ok(actual_str(actual)?.starts_with(prefix))
}

fn string_ends_with(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let suffix = target_str(target)?;
    Ok(actual_str(actual)?.ends_with(suffix))
}

fn string_in(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let list = target_list(target)?;
    let s = actual_str(actual)?;
    Ok(list.iter().any(|item| item.as_str() == Some(s)))
}

fn string_not_in(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    string_in(actual, target, ctx).map(|r| !r)
}

fn string_matches(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    let pattern = target_str(target)?;
    let regex = ctx
        .regex_cache
        .get_or_compile(pattern)
        .ok_or(Diagnostic::InvalidPattern)?;
    Ok(regex.is_match(actual_str(actual)?))
}

// ==================== 数值 ====================

fn number_compare<F>(actual: &Value, target: &Value, cmp: F) -> Outcome
where
    F: Fn(f64, f64) -> bool,
{
    let expected = target_number(target)?;
    Ok(cmp(actual_number(actual)?, expected))
}

fn number_equals(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    number_compare(actual, target, num_eq)
}

fn number_not_equals(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    number_compare(actual, target, |a, b| !num_eq(a, b))
}

fn number_gt(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    number_compare(actual, target, |a, b| a > b)
}

fn number_gte(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    number_compare(actual, target, |a, b| a >= b)
}

fn number_lt(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    number_compare(actual, target, |a, b| a < b)
}

fn number_lte(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    number_compare(actual, target, |a, b| a <= b)
}

fn number_between(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let (min, max) = number_bounds(target)?;
    let n = actual_number(actual)?;
    Ok(n >= min && n <= max)
}

// ==================== 日期 ====================

fn date_before(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let expected = target_date(target)?;
    Ok(actual_date(actual)? < expected)
}

fn date_after(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let expected = target_date(target)?;
    Ok(actual_date(actual)? > expected)
}

fn date_between(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let (start, end) = date_bounds(target)?;
    let at = actual_date(actual)?;
    Ok(at >= start && at <= end)
}

fn date_in_last(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    let start = window_start(target, ctx.now)?;
    let at = actual_date(actual)?;
    Ok(at >= start && at <= ctx.now)
}

fn date_not_in_last(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    date_in_last(actual, target, ctx).map(|r| !r)
}

// ==================== 对象 ====================

fn object_has_property(actual: &Value, target: &Value, _: &OperatorContext<'_>) -> Outcome {
    let property = target_str(target)?;
    let obj = actual
        .as_object()
        .ok_or(Diagnostic::IncompatibleContextValue)?;

    Ok(obj.contains_key(property) || lookup_path(actual, property).is_some())
}

fn object_not_has_property(actual: &Value, target: &Value, ctx: &OperatorContext<'_>) -> Outcome {
    object_has_property(actual, target, ctx).map(|r| !r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn check(attribute_type: AttributeType, id: &str, actual: Value, target: Value) -> Outcome {
        let registry = OperatorRegistry::default();
        let cache = RegexCache::default();
        let ctx = OperatorContext {
            now: now(),
            regex_cache: &cache,
        };
        registry
            .get(attribute_type, id)
            .expect("operator registered")
            .compare(&actual, &target, &ctx)
    }

    #[test]
    fn test_resolve_by_type() {
        let registry = OperatorRegistry::default();

        let string_ops: Vec<&str> = registry
            .resolve(AttributeType::String)
            .iter()
            .map(|op| op.id())
            .collect();
        assert_eq!(
            string_ops,
            vec![
                "equals",
                "notEquals",
                "contains",
                "notContains",
                "startsWith",
                "endsWith",
                "in",
                "notIn",
                "matches"
            ]
        );
        assert_eq!(registry.resolve(AttributeType::Number).len(), 7);
        assert_eq!(registry.resolve(AttributeType::Date).len(), 5);
        assert_eq!(registry.resolve(AttributeType::Object).len(), 2);
    }

    #[test]
    fn test_empty_registry_resolves_nothing() {
        let registry = OperatorRegistry::empty();
        assert!(registry.resolve(AttributeType::String).is_empty());
        assert!(registry.get(AttributeType::String, "equals").is_none());
    }

    #[test]
    fn test_operator_scoped_to_type() {
        let registry = OperatorRegistry::default();
        assert!(registry.get(AttributeType::Number, "between").is_some());
        assert!(registry.get(AttributeType::String, "between").is_none());
        assert!(registry.get(AttributeType::Object, "equals").is_none());
    }

    #[test]
    fn test_register_custom_operator() {
        fn is_even(actual: &Value, _: &Value, _: &OperatorContext<'_>) -> Outcome {
            let n = as_f64(actual).ok_or(Diagnostic::IncompatibleContextValue)?;
            Ok(n % 2.0 == 0.0)
        }

        let mut registry = OperatorRegistry::default();
        registry
            .register(Operator::new(
                AttributeType::Number,
                "isEven",
                "is even",
                TargetShape::Any,
                is_even,
            ))
            .unwrap();

        assert_eq!(registry.resolve(AttributeType::Number).len(), 8);
        assert_eq!(
            registry.resolve(AttributeType::Number).last().map(|op| op.id()),
            Some("isEven")
        );

        let duplicate = registry.register(Operator::new(
            AttributeType::Number,
            "isEven",
            "is even",
            TargetShape::Any,
            is_even,
        ));
        assert!(matches!(duplicate, Err(RuleError::DuplicateOperator { .. })));
    }

    #[test]
    fn test_string_operators() {
        use AttributeType::String as S;

        assert_eq!(check(S, "equals", json!("premium"), json!("premium")), Ok(true));
        assert_eq!(check(S, "equals", json!("Premium"), json!("premium")), Ok(false));
        assert_eq!(check(S, "notEquals", json!("free"), json!("premium")), Ok(true));
        assert_eq!(check(S, "contains", json!("a@acme.io"), json!("@acme")), Ok(true));
        assert_eq!(check(S, "notContains", json!("a@acme.io"), json!("@corp")), Ok(true));
        assert_eq!(check(S, "startsWith", json!("beta-42"), json!("beta-")), Ok(true));
        assert_eq!(check(S, "endsWith", json!("a@acme.io"), json!(".com")), Ok(false));
    }

    #[test]
    fn test_string_membership() {
        use AttributeType::String as S;

        assert_eq!(check(S, "in", json!("BR"), json!(["BR", "US"])), Ok(true));
        assert_eq!(check(S, "in", json!("FR"), json!(["BR", "US"])), Ok(false));
        assert_eq!(check(S, "notIn", json!("FR"), json!(["BR", "US"])), Ok(true));
        assert_eq!(check(S, "in", json!("BR"), json!([])), Ok(false));
        assert_eq!(
            check(S, "in", json!("BR"), json!("BR")),
            Err(Diagnostic::MalformedValue)
        );
        assert_eq!(
            check(S, "notIn", json!("BR"), json!("BR")),
            Err(Diagnostic::MalformedValue)
        );
    }

    #[test]
    fn test_string_matches() {
        use AttributeType::String as S;

        assert_eq!(
            check(S, "matches", json!("dev@acme.io"), json!(r"@acme\.io$")),
            Ok(true)
        );
        assert_eq!(
            check(S, "matches", json!("dev@acme.io"), json!("([")),
            Err(Diagnostic::InvalidPattern)
        );
    }

    #[test]
    fn test_string_rejects_non_string_context() {
        assert_eq!(
            check(AttributeType::String, "equals", json!(5), json!("5")),
            Err(Diagnostic::IncompatibleContextValue)
        );
    }

    #[test]
    fn test_number_operators() {
        use AttributeType::Number as N;

        assert_eq!(check(N, "equals", json!(100.0), json!(100)), Ok(true));
        assert_eq!(check(N, "equals", json!("42"), json!(42)), Ok(true));
        assert_eq!(check(N, "notEquals", json!(1), json!(2)), Ok(true));
        assert_eq!(check(N, "greaterThan", json!(100), json!(50)), Ok(true));
        assert_eq!(check(N, "greaterThanOrEqual", json!(50), json!(50)), Ok(true));
        assert_eq!(check(N, "lessThan", json!(49), json!(50)), Ok(true));
        assert_eq!(check(N, "lessThanOrEqual", json!(51), json!(50)), Ok(false));
    }

    #[test]
    fn test_number_non_numeric_fails_closed() {
        use AttributeType::Number as N;

        assert_eq!(
            check(N, "greaterThan", json!("abc"), json!(1)),
            Err(Diagnostic::IncompatibleContextValue)
        );
        assert_eq!(
            check(N, "notEquals", json!("abc"), json!(1)),
            Err(Diagnostic::IncompatibleContextValue)
        );
        assert_eq!(
            check(N, "lessThan", json!(1), json!("lots")),
            Err(Diagnostic::MalformedValue)
        );
    }

    #[test]
    fn test_number_between() {
        use AttributeType::Number as N;
        let range = json!({"min": 10, "max": 20});

        assert_eq!(check(N, "between", json!(15), range.clone()), Ok(true));
        assert_eq!(check(N, "between", json!(10), range.clone()), Ok(true));
        assert_eq!(check(N, "between", json!(20), range.clone()), Ok(true));
        assert_eq!(check(N, "between", json!(25), range), Ok(false));
        assert_eq!(
            check(N, "between", json!(15), json!({"min": 10})),
            Err(Diagnostic::MalformedValue)
        );
        assert_eq!(
            check(N, "between", json!(15), json!({"min": 10, "max": null})),
            Err(Diagnostic::MalformedValue)
        );
    }

    #[test]
    fn test_date_operators() {
        use AttributeType::Date as D;

        assert_eq!(
            check(D, "before", json!("2024-01-15T10:00:00Z"), json!("2024-01-20")),
            Ok(true)
        );
        assert_eq!(
            check(D, "after", json!("2024-01-15"), json!("2024-01-20")),
            Ok(false)
        );
        assert_eq!(
            check(
                D,
                "between",
                json!("2024-03-01"),
                json!({"start": "2024-01-01", "end": "2024-12-31"})
            ),
            Ok(true)
        );
        assert_eq!(
            check(D, "between", json!("2024-03-01"), json!({"start": "2024-01-01"})),
            Err(Diagnostic::MalformedValue)
        );
        assert_eq!(
            check(D, "before", json!("soon"), json!("2024-01-20")),
            Err(Diagnostic::IncompatibleContextValue)
        );
    }

    #[test]
    fn test_date_in_last() {
        use AttributeType::Date as D;
        let week = json!({"value": 7, "unit": "days"});

        // now = 2024-06-15T12:00:00Z
        assert_eq!(check(D, "inLast", json!("2024-06-10T00:00:00Z"), week.clone()), Ok(true));
        assert_eq!(check(D, "inLast", json!("2024-06-01T00:00:00Z"), week.clone()), Ok(false));
        assert_eq!(check(D, "notInLast", json!("2024-06-01T00:00:00Z"), week), Ok(true));
        assert_eq!(
            check(D, "inLast", json!("2024-04-20"), json!({"value": 2, "unit": "months"})),
            Ok(true)
        );
        assert_eq!(
            check(D, "inLast", json!("2024-05-20"), json!({"value": "2", "unit": "weeks"})),
            Ok(false)
        );
        // 未来时间不在过去的窗口内
        assert_eq!(
            check(D, "inLast", json!("2024-06-16"), json!({"value": 7, "unit": "days"})),
            Ok(false)
        );
    }

    #[test]
    fn test_malformed_durations() {
        use AttributeType::Date as D;
        let at = json!("2024-06-10");

        for target in [
            json!({"value": 7}),
            json!({"value": 7, "unit": "fortnights"}),
            json!({"value": -1, "unit": "days"}),
            json!({"value": 1.5, "unit": "days"}),
            json!(7),
        ] {
            assert_eq!(
                check(D, "inLast", at.clone(), target.clone()),
                Err(Diagnostic::MalformedValue),
                "target {target}"
            );
        }
    }

    #[test]
    fn test_object_operators() {
        use AttributeType::Object as O;
        let metadata = json!({"beta": true, "org": {"tier": "gold"}});

        assert_eq!(check(O, "hasProperty", metadata.clone(), json!("beta")), Ok(true));
        assert_eq!(check(O, "hasProperty", metadata.clone(), json!("org.tier")), Ok(true));
        assert_eq!(check(O, "notHasProperty", metadata.clone(), json!("alpha")), Ok(true));
        assert_eq!(
            check(O, "hasProperty", json!("beta"), json!("beta")),
            Err(Diagnostic::IncompatibleContextValue)
        );
        assert_eq!(
            check(O, "hasProperty", metadata, json!(["beta"])),
            Err(Diagnostic::MalformedValue)
        );
    }

    #[test]
    fn test_target_shape_check() {
        assert!(TargetShape::NumberRange.check(&json!({"min": 1, "max": 2})).is_ok());
        assert_eq!(
            TargetShape::NumberRange.check(&json!([1, 2])),
            Err(Diagnostic::MalformedValue)
        );
        assert_eq!(
            TargetShape::Pattern.check(&json!("([")),
            Err(Diagnostic::InvalidPattern)
        );
        assert!(TargetShape::Duration.check(&json!({"value": 3, "unit": "weeks"})).is_ok());
        assert!(TargetShape::Any.check(&json!(null)).is_ok());
    }

    #[test]
    fn test_regex_cache() {
        let cache = RegexCache::new(2);

        assert!(cache.get_or_compile("^a").is_some());
        assert!(cache.get_or_compile("([").is_none());
        assert_eq!(cache.len(), 2);

        // 写满后清空再插入
        assert!(cache.get_or_compile("b$").is_some());
        assert_eq!(cache.len(), 1);

        let disabled = RegexCache::new(0);
        assert!(disabled.get_or_compile("^a").is_some());
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_logical_operator_parsing() {
        let or: LogicalOperator = serde_json::from_str(r#""OR""#).unwrap();
        let and: LogicalOperator = serde_json::from_str(r#""AND""#).unwrap();
        let xor: LogicalOperator = serde_json::from_str(r#""XOR""#).unwrap();

        assert_eq!(or, LogicalOperator::Or);
        assert_eq!(and, LogicalOperator::And);
        assert_eq!(xor, LogicalOperator::And);

        let null: LogicalOperator = serde_json::from_str("null").unwrap();
        let number: LogicalOperator = serde_json::from_str("5").unwrap();
        let lower: LogicalOperator = serde_json::from_str(r#""or""#).unwrap();
        assert_eq!(null, LogicalOperator::And);
        assert_eq!(number, LogicalOperator::And);
        assert_eq!(lower, LogicalOperator::And);
        assert_eq!(serde_json::to_string(&LogicalOperator::Or).unwrap(), r#""OR""#);
    }
}
