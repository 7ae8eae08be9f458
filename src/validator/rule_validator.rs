//! 异步规则校验器
//! 本地校验通过后，再把每条正则规则交给正则能力检查器确认

use serde_json::Value;
use tracing::debug;

use super::business::{
    RuleDocument, RuleSetValidationResult, RuleSetsValidationResult, RuleValidationError,
    RuleValidationResult, Validation, url_filter_location, validate_document,
};
use super::regex_checker::RegexChecker;
use crate::utils::log_format::preview_compact;

/// 引擎拒绝但未给出原因时的文案
pub const UNSUPPORTED_REGEX_MESSAGE: &str = "is not supported by the rule engine";

/// 规则校验器，正则能力检查器通过构造参数注入
#[derive(Debug, Clone)]
pub struct RuleValidator<C> {
    checker: C,
}

impl<C: RegexChecker> RuleValidator<C> {
    pub fn new(checker: C) -> Self {
        Self { checker }
    }

    pub async fn validate_rule(&self, doc: &Value) -> RuleValidationResult {
        self.validate(doc).await
    }

    pub async fn validate_rule_set(&self, doc: &Value) -> RuleSetValidationResult {
        self.validate(doc).await
    }

    pub async fn validate_rule_sets(&self, doc: &Value) -> RuleSetsValidationResult {
        self.validate(doc).await
    }

    /// 本地校验 → 引擎正则检查；本地失败时不询问引擎
    pub async fn validate<T: RuleDocument>(&self, doc: &Value) -> Validation<T> {
        let evaluated = match validate_document::<T>(doc) {
            Validation::Valid { evaluated } => evaluated,
            invalid => return invalid,
        };

        let mut errors = Vec::new();
        for (prefix, rule) in evaluated.rules_with_prefix() {
            let Some(pattern) = rule.condition.regex_pattern() else {
                continue;
            };
            // 引擎默认不区分大小写
            let support = self.checker.is_supported(pattern, false).await;
            if support.is_supported {
                continue;
            }

            debug!(
                "正则被引擎拒绝 [{}]：{:?}",
                preview_compact(pattern, 60),
                support.reason
            );
            errors.push(RuleValidationError {
                location: url_filter_location(T::KIND, &prefix),
                message: support
                    .reason
                    .unwrap_or_else(|| UNSUPPORTED_REGEX_MESSAGE.to_string()),
            });
        }

        if errors.is_empty() {
            Validation::Valid { evaluated }
        } else {
            Validation::Invalid { errors }
        }
    }
}
