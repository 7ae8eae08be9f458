//! 规则数据模型定义
//! 仅存储规则数据，无任何业务逻辑，支持序列化/反序列化

use std::fmt;
use serde::{Deserialize, Serialize};

use super::id::RuleId;

/// 规则动作类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleActionType {
    Block,
    Allow,
}

impl RuleActionType {
    pub const ALL: [RuleActionType; 2] = [RuleActionType::Block, RuleActionType::Allow];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleActionType::Block => "block",
            RuleActionType::Allow => "allow",
        }
    }
}

/// 规则动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: RuleActionType,
}

impl RuleAction {
    pub fn block() -> Self {
        Self { action_type: RuleActionType::Block }
    }

    pub fn allow() -> Self {
        Self { action_type: RuleActionType::Allow }
    }

    pub fn is_blocking(&self) -> bool {
        self.action_type == RuleActionType::Block
    }
}

/// HTTP 请求方法（8 个取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl RequestMethod {
    pub const ALL: [RequestMethod; 8] = [
        RequestMethod::Connect,
        RequestMethod::Delete,
        RequestMethod::Get,
        RequestMethod::Head,
        RequestMethod::Options,
        RequestMethod::Patch,
        RequestMethod::Post,
        RequestMethod::Put,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Connect => "connect",
            RequestMethod::Delete => "delete",
            RequestMethod::Get => "get",
            RequestMethod::Head => "head",
            RequestMethod::Options => "options",
            RequestMethod::Patch => "patch",
            RequestMethod::Post => "post",
            RequestMethod::Put => "put",
        }
    }
}

/// 资源类型（13 个取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Other,
}

impl ResourceType {
    pub const ALL: [ResourceType; 13] = [
        ResourceType::MainFrame,
        ResourceType::SubFrame,
        ResourceType::Stylesheet,
        ResourceType::Script,
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Object,
        ResourceType::Xmlhttprequest,
        ResourceType::Ping,
        ResourceType::CspReport,
        ResourceType::Media,
        ResourceType::Websocket,
        ResourceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::MainFrame => "main_frame",
            ResourceType::SubFrame => "sub_frame",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Script => "script",
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Object => "object",
            ResourceType::Xmlhttprequest => "xmlhttprequest",
            ResourceType::Ping => "ping",
            ResourceType::CspReport => "csp_report",
            ResourceType::Media => "media",
            ResourceType::Websocket => "websocket",
            ResourceType::Other => "other",
        }
    }
}

/// 规则匹配条件
/// 空列表 / 空字符串在序列化时省略，与"未设置"等价
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initiator_domains: Vec<String>,
    // 原始模式串：isRegexFilter 为 true 时按正则解释，否则按 urlFilter 通配语法解释
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url_filter: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_regex_filter: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_methods: Vec<RequestMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceType>,
}

impl RuleCondition {
    /// 所有谓词均为空（isRegexFilter 单独存在不算谓词）
    pub fn is_empty(&self) -> bool {
        self.request_domains.is_empty()
            && self.initiator_domains.is_empty()
            && self.url_filter.is_empty()
            && self.request_methods.is_empty()
            && self.resource_types.is_empty()
    }

    /// 非空正则模式串
    pub fn regex_pattern(&self) -> Option<&str> {
        if self.is_regex_filter && !self.url_filter.is_empty() {
            Some(&self.url_filter)
        } else {
            None
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// 单条规则
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RuleId>,
    pub action: RuleAction,
    pub condition: RuleCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl Rule {
    pub fn new(action: RuleAction, condition: RuleCondition) -> Self {
        Self {
            id: None,
            action,
            condition,
            priority: None,
        }
    }

    pub fn with_id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// 命名、有序的规则集
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }
}

// ======== 匹配遥测（运行期派生，不持久化） ========

/// 引擎上报的规则 ID 在当前规则集中的位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePointer {
    pub rule_set_name: String,
    // 规则在所属规则集中的序号（从 1 开始）
    pub number: usize,
    pub is_blocking: bool,
}

impl fmt::Display for RulePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.is_blocking { "block" } else { "allow" };
        write!(f, "{} #{} ({})", self.rule_set_name, self.number, verb)
    }
}

/// 一次命中记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRule {
    pub rule_id: u32,
    pub rule: RulePointer,
    // 毫秒时间戳（引擎提供）
    pub time_stamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_skips_empty_fields() {
        let condition = RuleCondition {
            request_domains: vec!["example.com".to_string()],
            ..Default::default()
        };
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value, json!({ "requestDomains": ["example.com"] }));
    }

    #[test]
    fn test_condition_is_empty_ignores_regex_flag() {
        let condition = RuleCondition {
            is_regex_filter: true,
            ..Default::default()
        };
        assert!(condition.is_empty());
        assert_eq!(condition.regex_pattern(), None);
    }

    #[test]
    fn test_rule_deserialize_from_camel_case() {
        let rule: Rule = serde_json::from_value(json!({
            "id": 12,
            "action": { "type": "allow" },
            "condition": {
                "urlFilter": "^https://",
                "isRegexFilter": true,
                "requestMethods": ["get", "post"],
                "resourceTypes": ["main_frame", "csp_report"]
            }
        }))
        .unwrap();

        assert_eq!(rule.id, Some(RuleId::Durable(12)));
        assert!(!rule.action.is_blocking());
        assert_eq!(rule.condition.regex_pattern(), Some("^https://"));
        assert_eq!(rule.condition.request_methods, vec![RequestMethod::Get, RequestMethod::Post]);
        assert_eq!(
            rule.condition.resource_types,
            vec![ResourceType::MainFrame, ResourceType::CspReport]
        );
    }

    #[test]
    fn test_enum_strings_match_serde_names() {
        for method in RequestMethod::ALL {
            assert_eq!(serde_json::to_value(method).unwrap(), json!(method.as_str()));
        }
        for resource in ResourceType::ALL {
            assert_eq!(serde_json::to_value(resource).unwrap(), json!(resource.as_str()));
        }
    }
}
