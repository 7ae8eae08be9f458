//! 引擎线路格式
//! 与外部规则匹配引擎交换的数据结构：空列表字段必须省略，urlFilter 与 regexFilter 二选一

use serde::{Deserialize, Serialize};

use crate::rule::model::{RequestMethod, ResourceType, RuleAction};

/// 引擎未设置优先级时采用的默认值
pub const DEFAULT_ENGINE_PRIORITY: u32 = 1;

/// 引擎侧匹配条件
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_methods: Option<Vec<RequestMethod>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_types: Option<Vec<ResourceType>>,
}

/// 引擎侧规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRule {
    pub id: u32,
    pub action: RuleAction,
    pub condition: WireCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl WireRule {
    /// 结构等价比较用的规范形式：列表排序，缺省优先级补为引擎默认值
    pub fn normalized(&self) -> WireRule {
        fn sorted<T: Ord + Clone>(list: &Option<Vec<T>>) -> Option<Vec<T>> {
            list.as_ref().map(|items| {
                let mut items = items.clone();
                items.sort();
                items
            })
        }

        WireRule {
            id: self.id,
            action: self.action,
            condition: WireCondition {
                request_domains: sorted(&self.condition.request_domains),
                initiator_domains: sorted(&self.condition.initiator_domains),
                url_filter: self.condition.url_filter.clone(),
                regex_filter: self.condition.regex_filter.clone(),
                request_methods: sorted(&self.condition.request_methods),
                resource_types: sorted(&self.condition.resource_types),
            },
            priority: Some(self.priority.unwrap_or(DEFAULT_ENGINE_PRIORITY)),
        }
    }

    /// 忽略列表顺序的结构相等
    pub fn is_equivalent(&self, other: &WireRule) -> bool {
        self.normalized() == other.normalized()
    }
}

/// 一次提交给引擎的增量指令
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDelta {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<WireRule>,
}

impl RuleDelta {
    pub fn is_empty(&self) -> bool {
        self.remove_rule_ids.is_empty() && self.add_rules.is_empty()
    }
}

/// 引擎上报的命中记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMatch {
    pub rule_id: u32,
    pub time_stamp: u64,
}

/// 正则能力检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegexSupport {
    pub is_supported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RegexSupport {
    pub fn supported() -> Self {
        Self {
            is_supported: true,
            reason: None,
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            is_supported: false,
            reason: Some(reason.into()),
        }
    }
}
