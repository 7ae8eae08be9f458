//! 导入导出模块：规则集与可移植文档之间的转换
pub mod export;
pub mod import;

pub use self::export::{
    EXPORT_FORMAT, EXPORT_VERSION, ExportedRule, ExportedRuleSet, ExportedRuleSets,
    export_rule_sets,
};
pub use self::import::{ImportError, import_rule_sets, import_rule_sets_from_str};
