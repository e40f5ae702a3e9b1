//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 描述的统一初始化。
//! 库代码只通过 `tracing` / `metrics` 宏上报，由二进制入口决定是否安装订阅者。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics 描述（HELP 文本）
///
/// # Example
///
/// ```ignore
/// use flag_shared::config::AppConfig;
/// use flag_shared::observability;
///
/// fn main() -> anyhow::Result<()> {
///     let config = AppConfig::load("rule-tester")?;
///     observability::init(&config.service_name, &config.observability)?;
///     Ok(())
/// }
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<()> {
    tracing::init(config)?;
    metrics::describe_metrics();

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "Observability initialized"
    );

    Ok(())
}
