//! 覆盖率估算
//!
//! 粗略估计规则集能决定的输入空间占比，仅作为编辑器中的提示，不是证明：
//! 存在通配组时为 100；否则为 `min(95, 条件总数 × 15)`。

use crate::models::RuleSet;

/// 每个条件贡献的覆盖率
pub const COVERAGE_PER_CONDITION: usize = 15;
/// 无通配组时的覆盖率上限
pub const MAX_PARTIAL_COVERAGE: usize = 95;

/// 估算覆盖率（0–100）
pub fn estimate_coverage(rule_set: &RuleSet) -> u8 {
    if rule_set.groups.iter().any(|g| g.is_wildcard()) {
        return 100;
    }

    let estimate = rule_set
        .condition_count()
        .saturating_mul(COVERAGE_PER_CONDITION)
        .min(MAX_PARTIAL_COVERAGE);

    // 上限 95，转换不会截断
    estimate as u8
}
