//! 内存引擎
//! 外部引擎的本地替身：维护规则表、校验增量指令、记录命中，供测试与命令行使用

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::RuleEngine;
use super::wire::{EngineMatch, RegexSupport, RuleDelta, WireRule};
use crate::config::GlobalConfig;
use crate::error::{RsBlockerError, RsbResult};
use crate::sync::state::FeatureState;
use crate::utils::log_format::summarize_ids;
use crate::validator::regex_checker::check_regex_locally;

/// 内存引擎
#[derive(Debug)]
pub struct InMemoryEngine {
    rules: Mutex<Vec<WireRule>>,
    matches: Mutex<Vec<EngineMatch>>,
    indicator: Mutex<Option<FeatureState>>,
    max_active_rules: usize,
    regex_size_limit: usize,
    apply_calls: AtomicUsize,
    remove_all_calls: AtomicUsize,
    // 模拟引擎不可达
    unavailable: AtomicBool,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new(&GlobalConfig::default())
    }
}

impl InMemoryEngine {
    pub fn new(config: &GlobalConfig) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            matches: Mutex::new(Vec::new()),
            indicator: Mutex::new(None),
            max_active_rules: config.max_active_rules,
            regex_size_limit: config.regex_size_limit,
            apply_calls: AtomicUsize::new(0),
            remove_all_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// 预置活动规则
    pub fn with_rules(self, rules: Vec<WireRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..self
        }
    }

    /// 记录一次命中（模拟浏览器请求命中规则）
    pub async fn record_match(&self, rule_id: u32) {
        let time_stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.matches.lock().await.push(EngineMatch { rule_id, time_stamp });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// apply_rule_delta 调用次数
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// remove_all_rules 调用次数
    pub fn remove_all_calls(&self) -> usize {
        self.remove_all_calls.load(Ordering::SeqCst)
    }

    /// 最近一次状态指示
    pub async fn indicator(&self) -> Option<FeatureState> {
        *self.indicator.lock().await
    }

    /// 当前规则表快照（按 ID 排序）
    pub async fn snapshot(&self) -> Vec<WireRule> {
        let mut rules = self.rules.lock().await.clone();
        rules.sort_by_key(|rule| rule.id);
        rules
    }

    fn ensure_available(&self) -> RsbResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RsBlockerError::EngineError("engine is unavailable".to_string()));
        }
        Ok(())
    }

    /// 计算应用增量后的规则表；任一检查失败则整体拒绝
    fn next_table(&self, current: &[WireRule], delta: &RuleDelta) -> RsbResult<Vec<WireRule>> {
        let removed: HashSet<u32> = delta.remove_rule_ids.iter().copied().collect();
        let mut table: Vec<WireRule> = current
            .iter()
            .filter(|rule| !removed.contains(&rule.id))
            .cloned()
            .collect();

        let mut ids: HashSet<u32> = table.iter().map(|rule| rule.id).collect();
        for rule in &delta.add_rules {
            if !ids.insert(rule.id) {
                return Err(RsBlockerError::EngineError(format!(
                    "rule with id {} does not have a unique id",
                    rule.id
                )));
            }
            if let Some(pattern) = &rule.condition.regex_filter {
                let support = check_regex_locally(pattern, false, self.regex_size_limit);
                if !support.is_supported {
                    return Err(RsBlockerError::EngineError(format!(
                        "rule with id {} specifies an unsupported regexFilter: {}",
                        rule.id,
                        support.reason.unwrap_or_default()
                    )));
                }
            }
            table.push(rule.clone());
        }

        if table.len() > self.max_active_rules {
            return Err(RsBlockerError::RuleLimitExceeded {
                limit: self.max_active_rules,
                requested: table.len(),
            });
        }
        Ok(table)
    }
}

#[async_trait]
impl RuleEngine for InMemoryEngine {
    async fn get_active_rules(&self) -> RsbResult<Vec<WireRule>> {
        self.ensure_available()?;
        Ok(self.rules.lock().await.clone())
    }

    async fn apply_rule_delta(&self, delta: RuleDelta) -> RsbResult<()> {
        self.ensure_available()?;
        self.apply_calls.fetch_add(1, Ordering::SeqCst);

        let mut rules = self.rules.lock().await;
        let table = self.next_table(&rules, &delta)?;
        debug!(
            "内存引擎应用增量：删除 {}，新增 {}，当前规则数 {}",
            summarize_ids(&delta.remove_rule_ids),
            delta.add_rules.len(),
            table.len()
        );
        *rules = table;
        Ok(())
    }

    async fn remove_all_rules(&self) -> RsbResult<()> {
        self.ensure_available()?;
        self.remove_all_calls.fetch_add(1, Ordering::SeqCst);
        self.rules.lock().await.clear();
        Ok(())
    }

    async fn get_matched_rules(&self) -> RsbResult<Vec<EngineMatch>> {
        self.ensure_available()?;
        Ok(self.matches.lock().await.clone())
    }

    async fn is_regex_supported(&self, pattern: &str, case_sensitive: bool) -> RsbResult<RegexSupport> {
        self.ensure_available()?;
        Ok(check_regex_locally(pattern, case_sensitive, self.regex_size_limit))
    }

    async fn set_status_indicator(&self, state: FeatureState) -> RsbResult<()> {
        self.ensure_available()?;
        *self.indicator.lock().await = Some(state);
        Ok(())
    }
}
