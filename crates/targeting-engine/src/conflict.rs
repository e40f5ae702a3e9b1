//! 冲突检测
//!
//! 找出条件集合完全相同但返回值不同的规则组对。只是编辑提示，不影响评估：
//! 按 first-match-wins，靠后的那个组永远不会因为这些条件而命中。
//!
//! 等价判定只比较条件的 `(attribute, operator, value)` 多重集合，
//! 不考虑组的 AND/OR 逻辑，也不考虑子集/部分重叠。

use crate::models::{Condition, RuleGroup, RuleSet};
use crate::value::deep_eq;
use serde::{Deserialize, Serialize};

/// 冲突描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub group_index_a: usize,
    pub group_index_b: usize,
    pub description: String,
}

/// 检测规则集中的冲突
///
/// 两两比较全部规则组，结果按 `(group_index_a, group_index_b)` 升序排列。
pub fn detect_conflicts(rule_set: &RuleSet) -> Vec<Conflict> {
    let groups = &rule_set.groups;
    let mut conflicts = Vec::new();

    for (a, group_a) in groups.iter().enumerate() {
        for (b, group_b) in groups.iter().enumerate().skip(a + 1) {
            if equivalent(group_a, group_b) && !deep_eq(&group_a.return_value, &group_b.return_value) {
                conflicts.push(Conflict {
                    group_index_a: a,
                    group_index_b: b,
                    description: format!(
                        "规则组 {} 与规则组 {} 的条件相同，但返回值不同（{} / {}），规则组 {} 永远不会生效",
                        a + 1,
                        b + 1,
                        group_a.return_value,
                        group_b.return_value,
                        b + 1
                    ),
                });
            }
        }
    }

    conflicts
}

/// 判断两个规则组的条件集合是否等价
///
/// 条件数量相同，且存在一一对应使每对条件结构相等。
/// 结构相等是等价关系，因此贪心配对即可找到双射（如果存在）。
pub fn equivalent(a: &RuleGroup, b: &RuleGroup) -> bool {
    if a.conditions.len() != b.conditions.len() {
        return false;
    }

    let mut used = vec![false; b.conditions.len()];

    a.conditions.iter().all(|ca| {
        let partner = b
            .conditions
            .iter()
            .enumerate()
            .position(|(j, cb)| !used[j] && same_condition(ca, cb));

        match partner {
            Some(j) => {
                used[j] = true;
                true
            }
            None => false,
        }
    })
}

fn same_condition(a: &Condition, b: &Condition) -> bool {
    a.attribute == b.attribute && a.operator == b.operator && deep_eq(&a.value, &b.value)
}
