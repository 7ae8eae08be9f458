//! rsblocker - 请求拦截规则集管理：校验、ID 生命周期、引擎同步与导入导出

// 导出全局错误类型
pub use self::error::{RsBlockerError, RsbResult};

// 导出配置模块
pub use self::config::{GlobalConfig, ConfigManager, CustomConfigBuilder};

// 导出规则模块核心接口
pub use self::rule::{
    MatchedRule, RequestMethod, ResourceType, Rule, RuleAction, RuleActionType, RuleCondition,
    RuleId, RulePointer, RuleSet, assign_ids, walk_visible_rules,
};

// 导出校验模块核心接口
pub use self::validator::{
    ErrorLocation, LocalRegexChecker, RegexCapabilityChecker, RegexChecker, RuleValidationError,
    RuleValidator, Validation, validate_rule, validate_rule_set, validate_rule_sets,
};

// 导出引擎边界
pub use self::engine::{EngineMatch, InMemoryEngine, RegexSupport, RuleDelta, RuleEngine, WireRule};

// 导出存储模块核心接口
pub use self::store::{KeyValueStore, MemoryStore, MsgPackFileStore, RuleStore};

// 导出同步模块核心接口
pub use self::sync::{FeatureState, ImportOutcome, Reconciler, RuleSyncService};

// 导出导入导出接口
pub use self::transcoder::{ExportedRuleSets, ImportError, export_rule_sets, import_rule_sets};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod validator;
pub mod engine;
pub mod store;
pub mod sync;
pub mod transcoder;
pub mod utils;
