//! 指标描述模块
//!
//! 基于 metrics crate 的门面。未安装 recorder 时所有上报均为空操作，
//! 由宿主进程自行选择导出方式。

/// 规则评估总次数，按 outcome（matched / default）区分
pub const FLAG_EVALUATIONS_TOTAL: &str = "flag_evaluations_total";
/// 规则评估耗时（秒）
pub const FLAG_EVALUATION_DURATION_SECONDS: &str = "flag_evaluation_duration_seconds";
/// 条件失败关闭次数，按 diagnostic 区分
pub const FLAG_CONDITION_FAILURES_TOTAL: &str = "flag_condition_failures_total";
/// 规则集编译次数，按 status（ok / error）区分
pub const FLAG_RULESET_COMPILES_TOTAL: &str = "flag_ruleset_compiles_total";

/// 注册指标描述
///
/// 这些描述会出现在导出端的 HELP 注释中。
pub fn describe_metrics() {
    metrics::describe_counter!(FLAG_EVALUATIONS_TOTAL, "Total number of flag evaluations");
    metrics::describe_histogram!(
        FLAG_EVALUATION_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Flag evaluation duration in seconds"
    );
    metrics::describe_counter!(
        FLAG_CONDITION_FAILURES_TOTAL,
        "Total number of conditions that failed closed"
    );
    metrics::describe_counter!(
        FLAG_RULESET_COMPILES_TOTAL,
        "Total number of rule set compilations"
    );
}
