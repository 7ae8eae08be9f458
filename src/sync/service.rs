//! 规则同步服务
//! 面向上层（UI/命令行）的唯一入口：开关拦截、保存规则集、导入导出、查询命中
//! 同一实例内所有对引擎/存储的读-改-写都在同一把锁内串行执行

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use super::reconciler::Reconciler;
use super::state::FeatureState;
use crate::config::GlobalConfig;
use crate::engine::{RuleDelta, RuleEngine};
use crate::error::RsbResult;
use crate::rule::id::{MAX_RESERVED_RULE_ID, assign_ids, visible_rule_sets, walk_visible_rules};
use crate::rule::model::{MatchedRule, RulePointer, RuleSet};
use crate::store::RuleStore;
use crate::transcoder::{ExportedRuleSets, ImportError, export_rule_sets, import_rule_sets};

// 状态通知通道容量
const STATE_CHANNEL_CAPACITY: usize = 16;

/// 导入结果：文档被拒绝时返回 Rejected，不修改任何状态
#[derive(Debug)]
pub enum ImportOutcome {
    Imported(Vec<RuleSet>),
    Rejected(ImportError),
}

pub struct RuleSyncService {
    engine: Arc<dyn RuleEngine>,
    store: RuleStore,
    reconciler: Reconciler,
    // 单实例内只允许一个同步过程
    sync_lock: Mutex<()>,
    state_tx: broadcast::Sender<FeatureState>,
}

impl RuleSyncService {
    pub fn new(engine: Arc<dyn RuleEngine>, store: RuleStore, config: &GlobalConfig) -> RsbResult<Self> {
        let reconciler = Reconciler::new(engine.clone(), config)?;
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Ok(Self {
            engine,
            store,
            reconciler,
            sync_lock: Mutex::new(()),
            state_tx,
        })
    }

    /// 订阅开关状态变化，每次真实切换恰好一条消息
    pub fn subscribe(&self) -> broadcast::Receiver<FeatureState> {
        self.state_tx.subscribe()
    }

    pub async fn state(&self) -> RsbResult<FeatureState> {
        self.store.feature_state().await
    }

    pub async fn rule_sets(&self) -> RsbResult<Vec<RuleSet>> {
        self.store.rule_sets().await
    }

    pub async fn language(&self) -> RsbResult<Option<String>> {
        self.store.language().await
    }

    pub async fn set_language(&self, language: Option<&str>) -> RsbResult<()> {
        self.store.set_language(language).await
    }

    fn notify(&self, state: FeatureState) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.state_tx.send(state);
    }

    /// 开启拦截：按最近一次持久化的规则集完整同步
    /// 已开启时不做任何引擎调用，返回 false
    pub async fn enable(&self) -> RsbResult<bool> {
        let _guard = self.sync_lock.lock().await;
        if self.store.feature_state().await?.is_enabled() {
            debug!("拦截已开启，忽略重复开启");
            return Ok(false);
        }

        let rule_sets = self.store.rule_sets().await?;
        self.reconciler.apply_rule_sets(&rule_sets).await?;
        // 状态最后落盘：前面任一步失败时下次开启会完整重来并补发通知
        self.engine.set_status_indicator(FeatureState::Enabled).await?;
        self.store.set_feature_state(FeatureState::Enabled).await?;
        info!("拦截已开启，规则集数量：{}", rule_sets.len());
        self.notify(FeatureState::Enabled);
        Ok(true)
    }

    /// 关闭拦截：一次性清空引擎规则
    /// 已关闭时不做任何引擎调用，返回 false
    pub async fn disable(&self) -> RsbResult<bool> {
        let _guard = self.sync_lock.lock().await;
        if !self.store.feature_state().await?.is_enabled() {
            debug!("拦截已关闭，忽略重复关闭");
            return Ok(false);
        }

        self.reconciler.remove_all().await?;
        self.engine.set_status_indicator(FeatureState::Disabled).await?;
        self.store.set_feature_state(FeatureState::Disabled).await?;
        info!("拦截已关闭");
        self.notify(FeatureState::Disabled);
        Ok(true)
    }

    /// 保存规则集：分配 ID → 持久化计数器 → （开启时）同步引擎 → 持久化规则集
    /// 计数器在引擎调用之前写入，重试不会复用已经发出的 ID
    pub async fn update_rule_sets(&self, rule_sets: Vec<RuleSet>) -> RsbResult<Vec<RuleSet>> {
        let _guard = self.sync_lock.lock().await;
        self.update_locked(rule_sets).await
    }

    async fn update_locked(&self, rule_sets: Vec<RuleSet>) -> RsbResult<Vec<RuleSet>> {
        let next_id = self.store.next_rule_id().await?;
        let (assigned, new_next_id) = assign_ids(rule_sets, next_id);
        if new_next_id != next_id {
            debug!("分配规则 ID：{}..{}", next_id, new_next_id);
            self.store.set_next_rule_id(new_next_id).await?;
        }

        // 编辑中、占用保留 ID 的规则与因此变空的规则集不落盘
        let rule_sets = visible_rule_sets(&assigned);

        if self.store.feature_state().await?.is_enabled() {
            self.reconciler.apply_rule_sets(&rule_sets).await?;
        }
        self.store.set_rule_sets(&rule_sets).await?;
        Ok(rule_sets)
    }

    /// 导入文档并保存；文档被拒绝时存储与引擎均不变
    pub async fn import_rule_sets(&self, doc: &Value) -> RsbResult<ImportOutcome> {
        let _guard = self.sync_lock.lock().await;
        let existing = self.store.rule_sets().await?;
        match import_rule_sets(doc, &existing) {
            Ok(merged) => Ok(ImportOutcome::Imported(self.update_locked(merged).await?)),
            Err(err) => {
                info!("导入被拒绝：{}", err);
                Ok(ImportOutcome::Rejected(err))
            }
        }
    }

    pub async fn export_rule_sets(&self) -> RsbResult<ExportedRuleSets> {
        Ok(export_rule_sets(&self.store.rule_sets().await?))
    }

    /// 只计算当前规则集与引擎之间的增量，不提交
    pub async fn plan(&self) -> RsbResult<RuleDelta> {
        let rule_sets = self.store.rule_sets().await?;
        self.reconciler.plan(&rule_sets).await
    }

    /// 引擎命中记录 → 规则位置；找不到对应用户规则的 ID（如保留规则）被丢弃
    pub async fn get_matched_rules(&self) -> RsbResult<Vec<MatchedRule>> {
        let matches = self.engine.get_matched_rules().await?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let rule_sets = self.store.rule_sets().await?;
        let pointers: HashMap<u32, RulePointer> = walk_visible_rules(&rule_sets)
            .filter(|visible| visible.id > MAX_RESERVED_RULE_ID)
            .map(|visible| {
                (
                    visible.id,
                    RulePointer {
                        rule_set_name: visible.rule_set.name.clone(),
                        number: visible.number,
                        is_blocking: visible.rule.action.is_blocking(),
                    },
                )
            })
            .collect();

        Ok(matches
            .into_iter()
            .filter_map(|hit| {
                pointers.get(&hit.rule_id).map(|pointer| MatchedRule {
                    rule_id: hit.rule_id,
                    rule: pointer.clone(),
                    time_stamp: hit.time_stamp,
                })
            })
            .collect())
    }
}
