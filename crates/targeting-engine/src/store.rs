//! 规则集存储
//!
//! 以 flag key 为键的写时复制存储。每个 flag 的当前版本保存在 `ArcSwap` 中，
//! 读取端一次原子 load 拿到完整快照，编辑端基于快照生成新值后整体替换，
//! 评估中的调用永远不会观察到编辑中途的规则集。
//!
//! 不做持久化；多写者之间按最后写入为准。

use crate::compiler::{CompiledRuleSet, RuleSetCompiler};
use crate::engine::RuleEngine;
use crate::error::{Result, RuleError};
use crate::models::{EvaluationContext, EvaluationResult, RuleSet};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

type Slot = Arc<ArcSwap<CompiledRuleSet>>;

/// 规则集存储
#[derive(Clone)]
pub struct FlagStore {
    flags: Arc<DashMap<String, Slot>>,
    /// 规则集编译器（编译版本号需要串行递增）
    compiler: Arc<Mutex<RuleSetCompiler>>,
}

impl FlagStore {
    /// 创建新的存储（默认限制与内置目录）
    pub fn new() -> Self {
        Self::with_compiler(RuleSetCompiler::default())
    }

    /// 使用指定编译器创建存储
    pub fn with_compiler(compiler: RuleSetCompiler) -> Self {
        Self {
            flags: Arc::new(DashMap::new()),
            compiler: Arc::new(Mutex::new(compiler)),
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    fn compile(&self, rule_set: RuleSet) -> Result<CompiledRuleSet> {
        self.compiler.lock().compile(rule_set)
    }

    fn publish(&self, flag_key: &str, compiled: CompiledRuleSet) -> Arc<CompiledRuleSet> {
        let compiled = Arc::new(compiled);
        match self.flags.get(flag_key) {
            Some(slot) => slot.store(Arc::clone(&compiled)),
            None => {
                self.flags
                    .entry(flag_key.to_string())
                    .and_modify(|slot| slot.store(Arc::clone(&compiled)))
                    .or_insert_with(|| Arc::new(ArcSwap::new(Arc::clone(&compiled))));
            }
        }
        compiled
    }

    /// 加载（或覆盖）规则集
    #[instrument(skip(self, rule_set), fields(groups = rule_set.groups.len()))]
    pub fn load(&self, flag_key: &str, rule_set: RuleSet) -> Result<()> {
        let compiled = self.compile(rule_set)?;
        let version = compiled.compile_version;
        self.publish(flag_key, compiled);

        info!(compile_version = version, "Rule set loaded: {}", flag_key);
        Ok(())
    }

    /// 从 JSON 字符串加载规则集
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, flag_key: &str, json: &str) -> Result<()> {
        let rule_set = RuleSet::from_json(json)?;
        self.load(flag_key, rule_set)
    }

    /// 获取当前快照
    pub fn snapshot(&self, flag_key: &str) -> Option<Arc<CompiledRuleSet>> {
        let slot = self.flags.get(flag_key)?;
        Some(slot.load_full())
    }

    /// 基于当前快照编辑规则集并发布新版本
    ///
    /// 编辑函数拿到的是不可变快照，返回新值；编译失败时保持原版本不变。
    #[instrument(skip(self, edit))]
    pub fn update<F>(&self, flag_key: &str, edit: F) -> Result<Arc<CompiledRuleSet>>
    where
        F: FnOnce(&RuleSet) -> Result<RuleSet>,
    {
        let Some(current) = self.snapshot(flag_key) else {
            warn!("Updating unknown rule set: {}", flag_key);
            return Err(RuleError::FlagNotFound(flag_key.to_string()));
        };

        let next = edit(current.rule_set())?;
        let published = self.publish(flag_key, self.compile(next)?);

        info!(compile_version = published.compile_version, "Rule set updated: {}", flag_key);
        Ok(published)
    }

    /// 删除规则集
    #[instrument(skip(self))]
    pub fn delete(&self, flag_key: &str) -> Result<()> {
        if self.flags.remove(flag_key).is_some() {
            info!("Rule set deleted: {}", flag_key);
            Ok(())
        } else {
            warn!("Deleting unknown rule set: {}", flag_key);
            Err(RuleError::FlagNotFound(flag_key.to_string()))
        }
    }

    pub fn contains(&self, flag_key: &str) -> bool {
        self.flags.contains_key(flag_key)
    }

    /// 获取所有 flag key（升序）
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.flags.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// 对当前快照执行评估
    pub fn evaluate(
        &self,
        engine: &RuleEngine,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<EvaluationResult> {
        let snapshot = self
            .snapshot(flag_key)
            .ok_or_else(|| RuleError::FlagNotFound(flag_key.to_string()))?;

        Ok(engine.evaluate(snapshot.rule_set(), context))
    }

    /// 清空所有规则集
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.flags.len();
        self.flags.clear();
        info!("Cleared {} rule sets", count);
    }

    /// 获取存储统计信息
    pub fn stats(&self) -> FlagStoreStats {
        let flags_count = self.flags.len();
        let (total_groups, total_conditions) = self
            .flags
            .iter()
            .map(|r| {
                let compiled = r.value().load();
                (
                    compiled.rule_set().groups.len(),
                    compiled.rule_set().condition_count(),
                )
            })
            .fold((0, 0), |(g, c), (dg, dc)| (g + dg, c + dc));

        FlagStoreStats {
            flags_count,
            total_groups,
            total_conditions,
        }
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 存储统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagStoreStats {
    pub flags_count: usize,
    pub total_groups: usize,
    pub total_conditions: usize,
}
