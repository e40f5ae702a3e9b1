//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 规则引擎配置
///
/// 限制项只在编译（校验）阶段生效，`evaluate` 本身从不因数量超限而失败。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 单个规则集允许的最大规则组数量
    pub max_groups: usize,
    /// 单个规则组允许的最大条件数量
    pub max_conditions_per_group: usize,
    /// 正则表达式缓存容量，写满后整体清空
    pub regex_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_groups: 100,
            max_conditions_per_group: 50,
            regex_cache_capacity: 256,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（FLAG_ 前缀，双下划线分隔层级，如 FLAG_ENGINE__MAX_GROUPS -> engine.max_groups）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("FLAG_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), service_name, &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, service_name: &str, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("FLAG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.max_groups, 100);
        assert_eq!(config.engine.max_conditions_per_group, 50);
        assert_eq!(config.engine.regex_cache_capacity, 256);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.json_logs());
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = std::env::temp_dir().join("flag-shared-config-missing");
        let config = AppConfig::load_from(&dir, "rule-tester", "test").unwrap();

        assert_eq!(config.service_name, "rule-tester");
        assert_eq!(config.environment, "test");
        assert_eq!(config.engine.max_groups, 100);
        assert!(!config.is_production());
    }

    #[test]
    fn test_load_service_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("flag-shared-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            "[engine]\nmax_groups = 20\n\n[observability]\nlog_format = \"json\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("rule-tester.toml"),
            "[engine]\nmax_conditions_per_group = 5\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&dir, "rule-tester", "staging").unwrap();

        assert_eq!(config.engine.max_groups, 20);
        assert_eq!(config.engine.max_conditions_per_group, 5);
        assert_eq!(config.engine.regex_cache_capacity, 256);
        assert!(config.observability.json_logs());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
