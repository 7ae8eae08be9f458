//! 规则集导出
//! 去掉规则 ID 与空字段，生成可移植文档；编辑中/未保存的规则不会被导出

use serde::{Deserialize, Serialize};

use crate::rule::id::visible_rule_sets;
use crate::rule::model::{Rule, RuleAction, RuleCondition, RuleSet};

/// 文档格式标识
pub const EXPORT_FORMAT: &str = "rsblocker";
/// 唯一支持的文档版本
pub const EXPORT_VERSION: u64 = 1;

/// 导出的规则（无 ID）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRule {
    pub action: RuleAction,
    pub condition: RuleCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRuleSet {
    pub name: String,
    pub rules: Vec<ExportedRule>,
}

/// 可移植文档，唯一跨越文件边界的表示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedRuleSets {
    pub format: String,
    pub version: u64,
    pub rule_sets: Vec<ExportedRuleSet>,
}

impl ExportedRuleSets {
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// urlFilter 为空时 isRegexFilter 一并去掉，避免重新导入时产生空条件
fn export_condition(condition: &RuleCondition) -> RuleCondition {
    let mut condition = condition.clone();
    if condition.url_filter.is_empty() {
        condition.is_regex_filter = false;
    }
    condition
}

fn export_rule(rule: &Rule) -> ExportedRule {
    ExportedRule {
        action: rule.action,
        condition: export_condition(&rule.condition),
        priority: rule.priority,
    }
}

/// 导出已存储的规则集
pub fn export_rule_sets(stored: &[RuleSet]) -> ExportedRuleSets {
    let rule_sets = visible_rule_sets(stored)
        .iter()
        .map(|rule_set| ExportedRuleSet {
            name: rule_set.name.clone(),
            rules: rule_set.rules.iter().map(export_rule).collect(),
        })
        .collect();

    ExportedRuleSets {
        format: EXPORT_FORMAT.to_string(),
        version: EXPORT_VERSION,
        rule_sets,
    }
}
