//! 规则 ID 生命周期
//! 编辑中 / 未保存 / 系统保留 / 持久化 四种状态互斥，持久化 ID 由单调计数器分配

use std::fmt;
use serde::{Deserialize, Serialize};

use super::model::{Rule, RuleSet};
use crate::error::RsBlockerError;

/// 编辑中规则的存储值
pub const EDITING_RULE_ID: i64 = -1;
/// 未保存规则的存储值
pub const UNSAVED_RULE_ID: i64 = 0;
/// 系统保留区间上界（1..=10）
pub const MAX_RESERVED_RULE_ID: u32 = 10;
/// 第一个可分配的持久化 ID，也是 nextRuleId 的初始值
pub const FIRST_DURABLE_RULE_ID: u32 = MAX_RESERVED_RULE_ID + 1;

/// 规则 ID
/// 序列化为整数：-1 / 0 / 1..=10 / 11..
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RuleId {
    /// UI 正在编辑，不会进入存储或引擎
    Editing,
    /// 已被 UI 接受、等待分配持久化 ID
    Unsaved,
    /// 系统注入的保留规则
    Reserved(u32),
    /// 已持久化规则
    Durable(u32),
}

impl RuleId {
    /// 引擎侧使用的数值 ID；编辑中/未保存的规则没有
    pub fn engine_id(&self) -> Option<u32> {
        match self {
            RuleId::Reserved(n) | RuleId::Durable(n) => Some(*n),
            RuleId::Editing | RuleId::Unsaved => None,
        }
    }

    /// 是否允许出现在用户规则集的存储与导出中；保留 ID 只属于系统规则
    pub fn is_visible(&self) -> bool {
        matches!(self, RuleId::Durable(_))
    }
}

impl TryFrom<i64> for RuleId {
    type Error = RsBlockerError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            EDITING_RULE_ID => Ok(RuleId::Editing),
            UNSAVED_RULE_ID => Ok(RuleId::Unsaved),
            n if n >= 1 && n <= MAX_RESERVED_RULE_ID as i64 => Ok(RuleId::Reserved(n as u32)),
            n if n > MAX_RESERVED_RULE_ID as i64 && n <= u32::MAX as i64 => {
                Ok(RuleId::Durable(n as u32))
            }
            n => Err(RsBlockerError::InvalidRuleId(n)),
        }
    }
}

impl From<RuleId> for i64 {
    fn from(id: RuleId) -> Self {
        match id {
            RuleId::Editing => EDITING_RULE_ID,
            RuleId::Unsaved => UNSAVED_RULE_ID,
            RuleId::Reserved(n) | RuleId::Durable(n) => n as i64,
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleId::Editing => write!(f, "editing"),
            RuleId::Unsaved => write!(f, "unsaved"),
            RuleId::Reserved(n) => write!(f, "reserved#{}", n),
            RuleId::Durable(n) => write!(f, "{}", n),
        }
    }
}

/// 为所有缺失 ID 或未保存的规则分配持久化 ID
/// 返回 (规则集, 新的 nextId)；其余 ID（含保留、已持久化、编辑中）保持不变
pub fn assign_ids(mut rule_sets: Vec<RuleSet>, next_id: u32) -> (Vec<RuleSet>, u32) {
    // 计数器永远不能落入保留区间
    let mut next = next_id.max(FIRST_DURABLE_RULE_ID);

    for rule in rule_sets.iter_mut().flat_map(|set| set.rules.iter_mut()) {
        if matches!(rule.id, None | Some(RuleId::Unsaved)) {
            rule.id = Some(RuleId::Durable(next));
            next += 1;
        }
    }

    (rule_sets, next)
}

/// 可见规则：带引擎 ID 的规则及其在规则集中的位置
#[derive(Debug, Clone, Copy)]
pub struct VisibleRule<'a> {
    pub rule_set: &'a RuleSet,
    // 从 1 开始
    pub number: usize,
    pub rule: &'a Rule,
    pub id: u32,
}

/// 遍历所有可见规则（跳过编辑中、未保存和缺失 ID 的规则）
pub fn walk_visible_rules(rule_sets: &[RuleSet]) -> impl Iterator<Item = VisibleRule<'_>> {
    rule_sets.iter().flat_map(|rule_set| {
        rule_set
            .rules
            .iter()
            .enumerate()
            .filter_map(move |(index, rule)| {
                let id = rule.id.and_then(|id| id.engine_id())?;
                Some(VisibleRule {
                    rule_set,
                    number: index + 1,
                    rule,
                    id,
                })
            })
    })
}

/// 仅保留持久化规则的规则集副本，规则被过滤空的规则集整体丢弃
pub fn visible_rule_sets(rule_sets: &[RuleSet]) -> Vec<RuleSet> {
    rule_sets
        .iter()
        .filter_map(|rule_set| {
            let rules: Vec<Rule> = rule_set
                .rules
                .iter()
                .filter(|rule| rule.id.is_some_and(|id| id.is_visible()))
                .cloned()
                .collect();
            (!rules.is_empty()).then(|| RuleSet::new(rule_set.name.clone(), rules))
        })
        .collect()
}
