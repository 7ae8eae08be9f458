//! 规则模块：规则数据模型与 ID 生命周期
pub mod model;
pub mod id;

// 导出核心接口
pub use self::model::{
    MatchedRule, RequestMethod, ResourceType, Rule, RuleAction, RuleActionType, RuleCondition,
    RulePointer, RuleSet,
};
pub use self::id::{
    assign_ids, visible_rule_sets, walk_visible_rules, RuleId, VisibleRule, FIRST_DURABLE_RULE_ID,
    MAX_RESERVED_RULE_ID,
};
