//! 规则测试工具
//!
//! 在命令行对 JSON 规则集执行评估、冲突检测、覆盖率估算与校验，结果以 JSON 输出到 stdout。
//!
//! Usage:
//!     rule-tester evaluate --rules flag.json --context user.json
//!     rule-tester evaluate --rules flag.json --context user.json --now 2024-06-01T00:00:00Z
//!     rule-tester conflicts --rules flag.json
//!     rule-tester coverage --rules flag.json
//!     rule-tester validate --rules flag.json --attributes catalog.json

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use flag_shared::config::AppConfig;
use flag_shared::observability;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use targeting_engine::{
    AttributeRegistry, EvaluationContext, RuleEngine, RuleSet, RuleSetCompiler, detect_conflicts,
    estimate_coverage,
};
use tracing::{debug, info};

const SERVICE_NAME: &str = "rule-tester";

#[derive(Parser, Debug)]
#[command(name = "rule-tester")]
#[command(about = "Evaluate and inspect feature flag targeting rules")]
#[command(version)]
struct Args {
    /// Path to an attribute catalog JSON file (replaces the built-in catalog)
    #[arg(short, long, global = true)]
    attributes: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a rule set against a user context
    Evaluate {
        /// Path to the rule set JSON file
        #[arg(short, long)]
        rules: PathBuf,

        /// Path to the evaluation context JSON file
        #[arg(short, long)]
        context: PathBuf,

        /// Evaluation time (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<String>,
    },
    /// List groups with identical conditions but different return values
    Conflicts {
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Estimate the coverage of a rule set
    Coverage {
        #[arg(short, long)]
        rules: PathBuf,
    },
    /// Validate a rule set and print the attributes it references
    Validate {
        #[arg(short, long)]
        rules: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let service_name = if config.service_name.is_empty() {
        SERVICE_NAME
    } else {
        config.service_name.as_str()
    };
    observability::init(service_name, &config.observability)?;

    let attributes = match &args.attributes {
        Some(path) => {
            let catalog = AttributeRegistry::from_json(&read_file(path)?)
                .with_context(|| format!("Invalid attribute catalog: {}", path.display()))?;
            info!(attributes = catalog.len(), "Loaded attribute catalog from {}", path.display());
            Arc::new(catalog)
        }
        None => Arc::new(AttributeRegistry::default()),
    };

    let output = match args.command {
        Command::Evaluate {
            rules,
            context,
            now,
        } => {
            let rule_set = load_rule_set(&rules)?;
            let context = EvaluationContext::from_json(&read_file(&context)?)
                .with_context(|| format!("Invalid context JSON: {}", context.display()))?;

            let engine = RuleEngine::from_config(&config.engine).with_attributes(attributes);
            let result = match now {
                Some(now) => engine.evaluate_at(&rule_set, &context, parse_now(&now)?),
                None => engine.evaluate(&rule_set, &context),
            };

            debug!(matched_group = ?result.matched_group, "Evaluation finished");
            serde_json::to_value(&result)?
        }
        Command::Conflicts { rules } => {
            let rule_set = load_rule_set(&rules)?;
            serde_json::to_value(detect_conflicts(&rule_set))?
        }
        Command::Coverage { rules } => {
            let rule_set = load_rule_set(&rules)?;
            json!({ "coverage": estimate_coverage(&rule_set) })
        }
        Command::Validate { rules } => {
            let rule_set = load_rule_set(&rules)?;
            let mut compiler = RuleSetCompiler::new(config.engine.clone()).with_attributes(attributes);
            let compiled = compiler
                .compile(rule_set)
                .with_context(|| format!("Rule set is invalid: {}", rules.display()))?;

            json!({
                "valid": true,
                "groups": compiled.rule_set().groups.len(),
                "requiredAttributes": compiled.required_attributes,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_rule_set(path: &Path) -> Result<RuleSet> {
    RuleSet::from_json(&read_file(path)?)
        .with_context(|| format!("Invalid rule set JSON: {}", path.display()))
}

fn parse_now(raw: &str) -> Result<DateTime<Utc>> {
    let now = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("--now must be an RFC 3339 timestamp, got '{}'", raw))?;
    Ok(now.with_timezone(&Utc))
}
