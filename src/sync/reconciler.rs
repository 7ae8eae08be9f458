//! 规则集同步器
//! 本地规则 → 引擎线路格式，合并系统保留规则，与引擎当前规则表按 ID 求最小增量
//! 引擎没有原地更新，内容变化的规则既删除又重新添加

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use crate::config::GlobalConfig;
use crate::engine::{RuleDelta, RuleEngine, WireCondition, WireRule};
use crate::error::{RsBlockerError, RsbResult};
use crate::rule::id::{MAX_RESERVED_RULE_ID, walk_visible_rules};
use crate::rule::model::{Rule, RuleAction, RuleSet};
use crate::utils::log_format::summarize_ids;

/// 扩展自身请求的放行规则 ID
pub const SELF_ALLOW_RULE_ID: u32 = 1;

/// 单条规则 → 线路格式
/// 空列表整体省略；urlFilter / regexFilter 按 isRegexFilter 二选一
pub fn to_wire_rule(id: u32, rule: &Rule) -> WireRule {
    fn non_empty<T: Clone>(list: &[T]) -> Option<Vec<T>> {
        (!list.is_empty()).then(|| list.to_vec())
    }

    let condition = &rule.condition;
    let (url_filter, regex_filter) = match (condition.url_filter.is_empty(), condition.is_regex_filter) {
        (true, _) => (None, None),
        (false, true) => (None, Some(condition.url_filter.clone())),
        (false, false) => (Some(condition.url_filter.clone()), None),
    };

    WireRule {
        id,
        action: rule.action,
        condition: WireCondition {
            request_domains: non_empty(&condition.request_domains),
            initiator_domains: non_empty(&condition.initiator_domains),
            url_filter,
            regex_filter,
            request_methods: non_empty(&condition.request_methods),
            resource_types: non_empty(&condition.resource_types),
        },
        priority: rule.priority,
    }
}

/// 用户规则集 → 线路规则（只取持久化规则）
pub fn to_wire_rules(rule_sets: &[RuleSet]) -> Vec<WireRule> {
    walk_visible_rules(rule_sets)
        .filter(|visible| {
            // 保留区间只属于系统规则
            let durable = visible.id > MAX_RESERVED_RULE_ID;
            if !durable {
                warn!(
                    "规则集 [{}] 第 {} 条规则使用了保留 ID {}，已跳过",
                    visible.rule_set.name, visible.number, visible.id
                );
            }
            durable
        })
        .map(|visible| to_wire_rule(visible.id, visible.rule))
        .collect()
}

/// 系统保留规则集：放行扩展自身 origin 发起的请求
pub fn reserved_rules(config: &GlobalConfig) -> RsbResult<Vec<WireRule>> {
    let origin = Url::parse(&config.extension_origin)?;
    let host = origin.host_str().ok_or_else(|| {
        RsBlockerError::InvalidInput(format!(
            "extension origin has no host: {}",
            config.extension_origin
        ))
    })?;

    Ok(vec![WireRule {
        id: SELF_ALLOW_RULE_ID,
        action: RuleAction::allow(),
        condition: WireCondition {
            initiator_domains: Some(vec![host.to_string()]),
            ..Default::default()
        },
        priority: Some(config.reserved_rule_priority),
    }])
}

/// 按 ID 计算期望规则与活动规则之间的增量
pub fn compute_delta(desired: &[WireRule], active: &[WireRule]) -> RuleDelta {
    let desired_by_id: HashMap<u32, &WireRule> = desired.iter().map(|r| (r.id, r)).collect();
    let active_by_id: HashMap<u32, &WireRule> = active.iter().map(|r| (r.id, r)).collect();

    let mut remove_rule_ids: Vec<u32> = active
        .iter()
        .filter(|rule| {
            desired_by_id
                .get(&rule.id)
                .is_none_or(|wanted| !wanted.is_equivalent(rule))
        })
        .map(|rule| rule.id)
        .collect();
    remove_rule_ids.sort_unstable();
    remove_rule_ids.dedup();

    let add_rules: Vec<WireRule> = desired
        .iter()
        .filter(|rule| {
            active_by_id
                .get(&rule.id)
                .is_none_or(|current| !current.is_equivalent(rule))
        })
        .cloned()
        .collect();

    RuleDelta {
        remove_rule_ids,
        add_rules,
    }
}

/// 同步器
#[derive(Clone)]
pub struct Reconciler {
    engine: Arc<dyn RuleEngine>,
    reserved: Vec<WireRule>,
}

impl Reconciler {
    pub fn new(engine: Arc<dyn RuleEngine>, config: &GlobalConfig) -> RsbResult<Self> {
        Ok(Self {
            engine,
            reserved: reserved_rules(config)?,
        })
    }

    /// 保留规则在前，用户规则在后
    pub fn desired_rules(&self, rule_sets: &[RuleSet]) -> Vec<WireRule> {
        self.reserved
            .iter()
            .cloned()
            .chain(to_wire_rules(rule_sets))
            .collect()
    }

    /// 只计算增量，不提交
    pub async fn plan(&self, rule_sets: &[RuleSet]) -> RsbResult<RuleDelta> {
        let desired = self.desired_rules(rule_sets);
        let active = self.engine.get_active_rules().await?;
        Ok(compute_delta(&desired, &active))
    }

    /// 计算增量并一次性提交给引擎，返回提交的增量
    pub async fn apply_rule_sets(&self, rule_sets: &[RuleSet]) -> RsbResult<RuleDelta> {
        let delta = self.plan(rule_sets).await?;
        debug!(
            "提交规则增量：删除 {}，新增 {}",
            summarize_ids(&delta.remove_rule_ids),
            summarize_ids(&delta.add_rules.iter().map(|r| r.id).collect::<Vec<_>>())
        );
        self.engine.apply_rule_delta(delta.clone()).await?;
        Ok(delta)
    }

    pub async fn remove_all(&self) -> RsbResult<()> {
        self.engine.remove_all_rules().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::engine::InMemoryEngine;
    use crate::rule::id::RuleId;
    use crate::rule::model::{RequestMethod, RuleCondition};

    fn wire(id: u32, action: RuleAction) -> WireRule {
        WireRule {
            id,
            action,
            condition: WireCondition {
                url_filter: Some(format!("path-{}", id)),
                ..Default::default()
            },
            priority: None,
        }
    }

    fn user_rule(id: RuleId, url_filter: &str) -> Rule {
        let condition = RuleCondition {
            url_filter: url_filter.to_string(),
            ..Default::default()
        };
        Rule::new(RuleAction::block(), condition).with_id(id)
    }

    #[test]
    fn test_delta_is_minimal() {
        let active = vec![
            wire(1, RuleAction::block()),
            wire(2, RuleAction::block()),
            wire(3, RuleAction::block()),
        ];
        let desired = vec![
            wire(1, RuleAction::block()),
            wire(3, RuleAction::allow()),
            wire(4, RuleAction::block()),
        ];

        let delta = compute_delta(&desired, &active);

        assert_eq!(delta.remove_rule_ids, vec![2, 3]);
        assert_eq!(
            delta.add_rules,
            vec![wire(3, RuleAction::allow()), wire(4, RuleAction::block())]
        );
    }

    #[test]
    fn test_reordered_lists_do_not_trigger_replacement() {
        let mut active = wire(11, RuleAction::block());
        active.condition.request_methods = Some(vec![RequestMethod::Post, RequestMethod::Get]);
        let mut desired = wire(11, RuleAction::block());
        desired.condition.request_methods = Some(vec![RequestMethod::Get, RequestMethod::Post]);

        assert!(compute_delta(&[desired], &[active]).is_empty());
    }

    #[test]
    fn test_wire_translation_omits_empty_and_picks_filter_kind() {
        let mut rule = user_rule(RuleId::Durable(11), "^https://ads\\.");
        rule.condition.is_regex_filter = true;
        rule.condition.request_domains = vec![];
        rule.condition.request_methods = vec![RequestMethod::Get];

        let wire = to_wire_rule(11, &rule);
        assert_eq!(wire.condition.url_filter, None);
        assert_eq!(wire.condition.regex_filter.as_deref(), Some("^https://ads\\."));
        assert_eq!(wire.condition.request_domains, None);
        assert_eq!(wire.condition.request_methods, Some(vec![RequestMethod::Get]));

        let plain = to_wire_rule(12, &user_rule(RuleId::Durable(12), "||ads^"));
        assert_eq!(plain.condition.url_filter.as_deref(), Some("||ads^"));
        assert_eq!(plain.condition.regex_filter, None);
    }

    #[test]
    fn test_wire_rules_skip_sentinels_and_reserved_ids() {
        let rule_sets = vec![RuleSet::new(
            "mixed",
            vec![
                user_rule(RuleId::Editing, "a"),
                user_rule(RuleId::Unsaved, "b"),
                user_rule(RuleId::Reserved(2), "c"),
                user_rule(RuleId::Durable(11), "d"),
            ],
        )];

        let ids: Vec<u32> = to_wire_rules(&rule_sets).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![11]);
    }

    #[test]
    fn test_reserved_rule_allows_extension_origin() {
        let config = ConfigManager::custom()
            .extension_origin("chrome-extension://abcdefghijklmnop")
            .reserved_rule_priority(500)
            .build();
        let rules = reserved_rules(&config).unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, SELF_ALLOW_RULE_ID);
        assert!(!rules[0].action.is_blocking());
        assert_eq!(
            rules[0].condition.initiator_domains,
            Some(vec!["abcdefghijklmnop".to_string()])
        );
        assert_eq!(rules[0].priority, Some(500));
    }

    #[tokio::test]
    async fn test_apply_leaves_unchanged_rules_alone() {
        let engine = Arc::new(InMemoryEngine::default());
        let reconciler = Reconciler::new(engine.clone(), &GlobalConfig::default()).unwrap();

        let first = vec![RuleSet::new(
            "ads",
            vec![user_rule(RuleId::Durable(11), "a"), user_rule(RuleId::Durable(12), "b")],
        )];
        let delta = reconciler.apply_rule_sets(&first).await.unwrap();
        let added: Vec<u32> = delta.add_rules.iter().map(|r| r.id).collect();
        assert_eq!(added, vec![SELF_ALLOW_RULE_ID, 11, 12]);

        let second = vec![RuleSet::new(
            "ads",
            vec![user_rule(RuleId::Durable(11), "a"), user_rule(RuleId::Durable(13), "c")],
        )];
        let delta = reconciler.apply_rule_sets(&second).await.unwrap();
        assert_eq!(delta.remove_rule_ids, vec![12]);
        assert_eq!(delta.add_rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![13]);

        let ids: Vec<u32> = engine.snapshot().await.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![SELF_ALLOW_RULE_ID, 11, 13]);
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let engine = Arc::new(InMemoryEngine::default());
        engine.set_unavailable(true);
        let reconciler = Reconciler::new(engine, &GlobalConfig::default()).unwrap();

        assert!(reconciler.apply_rule_sets(&[]).await.is_err());
    }
}
