//! 规则集导入
//! 校验顺序：format → version → ruleSets 完整校验，任一失败立即返回且不修改目标列表
//! 合并策略：同名规则集原位整体替换，新名称追加到末尾

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use super::export::{EXPORT_FORMAT, EXPORT_VERSION};
use crate::rule::id::RuleId;
use crate::rule::model::RuleSet;
use crate::validator::business::{RuleValidationError, Validation, validate_rule_sets};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Unsupported format: {found:?}")]
    UnsupportedFormat { found: Option<String> },

    #[error("Unsupported version: {found:?}")]
    UnsupportedVersion { found: Option<String> },

    #[error("Invalid rule sets: {} error(s)", .0.len())]
    InvalidRuleSets(Vec<RuleValidationError>),
}

impl ImportError {
    /// 规则级错误（仅 InvalidRuleSets 有）
    pub fn validation_errors(&self) -> &[RuleValidationError] {
        match self {
            ImportError::InvalidRuleSets(errors) => errors,
            _ => &[],
        }
    }
}

fn describe(value: Option<&Value>) -> Option<String> {
    value.map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// 导入文档并按名称合并到已有规则集
pub fn import_rule_sets(doc: &Value, existing: &[RuleSet]) -> Result<Vec<RuleSet>, ImportError> {
    let format = doc.get("format");
    if format.and_then(Value::as_str) != Some(EXPORT_FORMAT) {
        return Err(ImportError::UnsupportedFormat {
            found: describe(format),
        });
    }

    // 按数值比较，1 与 1.0 等价
    let version = doc.get("version");
    if version.and_then(Value::as_f64) != Some(EXPORT_VERSION as f64) {
        return Err(ImportError::UnsupportedVersion {
            found: describe(version),
        });
    }

    let imported = match validate_rule_sets(doc.get("ruleSets").unwrap_or(&Value::Null)) {
        Validation::Valid { evaluated } => evaluated,
        Validation::Invalid { errors } => return Err(ImportError::InvalidRuleSets(errors)),
    };

    info!("导入规则集 {} 个", imported.len());
    Ok(merge_by_name(existing.to_vec(), stamp_unsaved(imported)))
}

/// 从 JSON 文本导入
pub fn import_rule_sets_from_str(text: &str, existing: &[RuleSet]) -> Result<Vec<RuleSet>, ImportError> {
    let doc: Value = serde_json::from_str(text).map_err(|e| ImportError::Malformed(e.to_string()))?;
    import_rule_sets(&doc, existing)
}

/// 所有导入规则标记为未保存，下一次同步时分配持久化 ID
fn stamp_unsaved(mut rule_sets: Vec<RuleSet>) -> Vec<RuleSet> {
    for rule in rule_sets.iter_mut().flat_map(|set| set.rules.iter_mut()) {
        rule.id = Some(RuleId::Unsaved);
    }
    rule_sets
}

/// 同名替换（保持原位置），新名称追加
fn merge_by_name(mut existing: Vec<RuleSet>, imported: Vec<RuleSet>) -> Vec<RuleSet> {
    for rule_set in imported {
        match existing.iter().position(|current| current.name == rule_set.name) {
            Some(index) => existing[index] = rule_set,
            None => existing.push(rule_set),
        }
    }
    existing
}
