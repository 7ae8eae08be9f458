//! 校验模块：结构校验、业务规则校验、正则能力检查
pub mod schema;
pub mod business;
pub mod regex_checker;
pub mod rule_validator;

// 导出核心接口
pub use self::schema::{SchemaError, SchemaKind, validate_schema};
pub use self::business::{
    ErrorLocation, RuleDocument, RuleSetValidationResult, RuleSetsValidationResult,
    RuleValidationError, RuleValidationResult, Validation, validate_rule, validate_rule_set,
    validate_rule_sets,
};
pub use self::regex_checker::{LocalRegexChecker, RegexCapabilityChecker, RegexChecker};
pub use self::rule_validator::RuleValidator;
