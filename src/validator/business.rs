//! 业务规则校验
//! 先做结构校验，再补充 schema 无法表达的两项检查：条件非空、正则语法合法
//! 所有错误统一定位到 ErrorLocation，按 (location, message) 去重

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::schema::{SchemaError, SchemaKind, split_pointer, validate_schema};
use crate::rule::model::{Rule, RuleSet};
use crate::utils::log_format::preview_compact;

pub const EMPTY_CONDITION_MESSAGE: &str = "must specify at least one condition";
pub const INVALID_REGEX_MESSAGE: &str = "is not a valid regular expression";

/// 错误位置
/// 单条规则只填 rule_field；规则集额外填 rule_set_field / rule_number；规则集列表再加 rule_set_number
/// 序号均从 1 开始
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_set_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_number: Option<usize>,
    // 点分字段路径，如 condition.urlFilter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_field: Option<String>,
}

impl ErrorLocation {
    pub fn rule_field(field: impl Into<String>) -> Self {
        Self {
            rule_field: Some(field.into()),
            ..Default::default()
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(n) = self.rule_set_number {
            parts.push(format!("ruleSets[{}]", n));
        }
        match (self.rule_number, &self.rule_set_field) {
            (Some(n), _) => parts.push(format!("rules[{}]", n)),
            (None, Some(field)) => parts.push(field.clone()),
            (None, None) => {}
        }
        if let Some(field) = &self.rule_field {
            parts.push(field.clone());
        }

        if parts.is_empty() {
            write!(f, "(document)")
        } else {
            write!(f, "{}", parts.join("."))
        }
    }
}

/// 单条校验错误
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RuleValidationError {
    pub location: ErrorLocation,
    pub message: String,
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// 校验结果；evaluated 即被校验的文档本身（已解析为强类型）
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid { evaluated: T },
    Invalid { errors: Vec<RuleValidationError> },
}

pub type RuleValidationResult = Validation<Rule>;
pub type RuleSetValidationResult = Validation<RuleSet>;
pub type RuleSetsValidationResult = Validation<Vec<RuleSet>>;

impl<T> Validation<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    pub fn errors(&self) -> &[RuleValidationError] {
        match self {
            Validation::Valid { .. } => &[],
            Validation::Invalid { errors } => errors,
        }
    }

    pub fn into_result(self) -> Result<T, Vec<RuleValidationError>> {
        match self {
            Validation::Valid { evaluated } => Ok(evaluated),
            Validation::Invalid { errors } => Err(errors),
        }
    }
}

/// 可校验的规则文档：Rule / RuleSet / Vec<RuleSet>
pub trait RuleDocument: DeserializeOwned {
    const KIND: SchemaKind;

    /// 文档中每条规则及其 JSON Pointer 路径段前缀
    fn rules_with_prefix(&self) -> Vec<(Vec<String>, &Rule)>;
}

impl RuleDocument for Rule {
    const KIND: SchemaKind = SchemaKind::Rule;

    fn rules_with_prefix(&self) -> Vec<(Vec<String>, &Rule)> {
        vec![(Vec::new(), self)]
    }
}

impl RuleDocument for RuleSet {
    const KIND: SchemaKind = SchemaKind::RuleSet;

    fn rules_with_prefix(&self) -> Vec<(Vec<String>, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (vec!["rules".to_string(), index.to_string()], rule))
            .collect()
    }
}

impl RuleDocument for Vec<RuleSet> {
    const KIND: SchemaKind = SchemaKind::RuleSets;

    fn rules_with_prefix(&self) -> Vec<(Vec<String>, &Rule)> {
        self.iter()
            .enumerate()
            .flat_map(|(set_index, rule_set)| {
                rule_set.rules_with_prefix().into_iter().map(move |(mut prefix, rule)| {
                    prefix.insert(0, set_index.to_string());
                    (prefix, rule)
                })
            })
            .collect()
    }
}

pub fn validate_rule(doc: &Value) -> RuleValidationResult {
    validate_document(doc)
}

pub fn validate_rule_set(doc: &Value) -> RuleSetValidationResult {
    validate_document(doc)
}

pub fn validate_rule_sets(doc: &Value) -> RuleSetsValidationResult {
    validate_document(doc)
}

/// 通用校验流程：结构校验 → 反序列化 → 逐条业务检查
pub fn validate_document<T: RuleDocument>(doc: &Value) -> Validation<T> {
    if let Err(schema_errors) = validate_schema(doc, T::KIND) {
        return Validation::Invalid {
            errors: map_schema_errors(T::KIND, schema_errors),
        };
    }

    let evaluated: T = match serde_json::from_value(doc.clone()) {
        Ok(evaluated) => evaluated,
        Err(e) => {
            return Validation::Invalid {
                errors: vec![RuleValidationError {
                    location: ErrorLocation::default(),
                    message: format!("could not be decoded: {}", e),
                }],
            };
        }
    };

    let mut errors = Vec::new();
    for (prefix, rule) in evaluated.rules_with_prefix() {
        errors.extend(check_rule_semantics(T::KIND, &prefix, rule));
    }

    if errors.is_empty() {
        Validation::Valid { evaluated }
    } else {
        Validation::Invalid {
            errors: dedup_errors(errors),
        }
    }
}

/// 条件非空 + 正则语法检查
fn check_rule_semantics(kind: SchemaKind, prefix: &[String], rule: &Rule) -> Vec<RuleValidationError> {
    let mut errors = Vec::new();

    if rule.condition.is_empty() {
        errors.push(RuleValidationError {
            location: locate(kind, &with_suffix(prefix, &["condition"])),
            message: EMPTY_CONDITION_MESSAGE.to_string(),
        });
        return errors;
    }

    if let Some(pattern) = rule.condition.regex_pattern() {
        if let Err(reason) = check_regex_syntax(pattern) {
            debug!("正则语法错误 [{}]：{}", preview_compact(pattern, 60), preview_compact(&reason, 120));
            errors.push(RuleValidationError {
                location: url_filter_location(kind, prefix),
                message: INVALID_REGEX_MESSAGE.to_string(),
            });
        }
    }

    errors
}

/// 标准正则语法检查（只解析，不编译）
pub fn check_regex_syntax(pattern: &str) -> Result<(), String> {
    regex_syntax::Parser::new()
        .parse(pattern)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// 某条规则的 condition.urlFilter 位置
pub fn url_filter_location(kind: SchemaKind, prefix: &[String]) -> ErrorLocation {
    locate(kind, &with_suffix(prefix, &["condition", "urlFilter"]))
}

fn with_suffix(prefix: &[String], suffix: &[&str]) -> Vec<String> {
    prefix
        .iter()
        .cloned()
        .chain(suffix.iter().map(|s| s.to_string()))
        .collect()
}

/// 结构错误 → 统一错误：定位、改写文案、去重
fn map_schema_errors(kind: SchemaKind, schema_errors: Vec<SchemaError>) -> Vec<RuleValidationError> {
    let errors = schema_errors
        .into_iter()
        .map(|err| {
            let location = locate(kind, &split_pointer(&err.path));
            let message = rewrite_message(&location, err.message);
            RuleValidationError { location, message }
        })
        .collect();
    dedup_errors(errors)
}

/// JSON Pointer 路径段 → ErrorLocation
pub fn locate(kind: SchemaKind, segments: &[String]) -> ErrorLocation {
    let mut location = ErrorLocation::default();
    let mut rest = segments;

    if kind == SchemaKind::RuleSets {
        match rest.split_first() {
            Some((index, tail)) => {
                location.rule_set_number = index.parse::<usize>().ok().map(|i| i + 1);
                rest = tail;
            }
            None => return location,
        }
    }

    if kind != SchemaKind::Rule {
        let Some((field, tail)) = rest.split_first() else {
            return location;
        };
        location.rule_set_field = Some(field.clone());
        if field != "rules" {
            return location;
        }
        match tail.split_first() {
            Some((index, tail)) => match index.parse::<usize>() {
                Ok(i) => {
                    location.rule_number = Some(i + 1);
                    rest = tail;
                }
                Err(_) => return location,
            },
            None => return location,
        }
    }

    location.rule_field = field_path(rest);
    location
}

/// 规则内部路径：去掉数组下标，点号连接
fn field_path(segments: &[String]) -> Option<String> {
    let fields: Vec<&str> = segments
        .iter()
        .filter(|s| s.parse::<usize>().is_err())
        .map(String::as_str)
        .collect();
    (!fields.is_empty()).then(|| fields.join("."))
}

// ======== 文案改写表 ========

enum RewriteTarget {
    RuleField(&'static str),
    RuleSetField(&'static str),
}

struct MessageRewrite {
    target: RewriteTarget,
    // 通用文案前缀
    generic: &'static str,
    replacement: &'static str,
}

const MESSAGE_REWRITES: &[MessageRewrite] = &[
    MessageRewrite {
        target: RewriteTarget::RuleField("action"),
        generic: "must be equal to one of the allowed values",
        replacement: "must be either 'block' or 'allow'",
    },
    MessageRewrite {
        target: RewriteTarget::RuleField("condition.requestDomains"),
        generic: "must match pattern",
        replacement: "must not contain non-ascii code and space",
    },
    MessageRewrite {
        target: RewriteTarget::RuleField("condition.initiatorDomains"),
        generic: "must match pattern",
        replacement: "must not contain non-ascii code and space",
    },
    MessageRewrite {
        target: RewriteTarget::RuleField("condition.urlFilter"),
        generic: "must match pattern",
        replacement: "must not contain non-ascii code",
    },
    MessageRewrite {
        target: RewriteTarget::RuleField("condition.requestMethods"),
        generic: "must be equal to one of the allowed values",
        replacement: "must be a supported request method",
    },
    MessageRewrite {
        target: RewriteTarget::RuleField("condition.resourceTypes"),
        generic: "must be equal to one of the allowed values",
        replacement: "must be a supported resource type",
    },
    MessageRewrite {
        target: RewriteTarget::RuleSetField("name"),
        generic: "must NOT have fewer than",
        replacement: "must not be empty",
    },
    MessageRewrite {
        target: RewriteTarget::RuleSetField("rules"),
        generic: "must NOT have fewer than",
        replacement: "must contain at least one rule",
    },
];

fn rewrite_message(location: &ErrorLocation, message: String) -> String {
    let rewrite = MESSAGE_REWRITES.iter().find(|rewrite| {
        let target_matches = match rewrite.target {
            RewriteTarget::RuleField(prefix) => location
                .rule_field
                .as_deref()
                .is_some_and(|field| field.starts_with(prefix)),
            RewriteTarget::RuleSetField(name) => {
                location.rule_number.is_none() && location.rule_set_field.as_deref() == Some(name)
            }
        };
        target_matches && message.starts_with(rewrite.generic)
    });

    match rewrite {
        Some(rewrite) => rewrite.replacement.to_string(),
        None => message,
    }
}

/// 按 (location, message) 去重，保持首次出现顺序
fn dedup_errors(errors: Vec<RuleValidationError>) -> Vec<RuleValidationError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|err| seen.insert(err.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors(result: &Validation<impl Sized>) -> Vec<(String, String)> {
        result
            .errors()
            .iter()
            .map(|e| (e.location.to_string(), e.message.clone()))
            .collect()
    }

    #[test]
    fn test_empty_condition_is_invalid() {
        let result = validate_rule(&json!({
            "action": { "type": "block" },
            "condition": { "requestDomains": [], "urlFilter": "", "isRegexFilter": true }
        }));
        assert!(!result.is_valid());
        assert_eq!(
            result.errors(),
            &[RuleValidationError {
                location: ErrorLocation::rule_field("condition"),
                message: EMPTY_CONDITION_MESSAGE.to_string(),
            }]
        );
    }

    #[test]
    fn test_any_single_condition_field_is_enough() {
        let conditions = [
            json!({ "requestDomains": ["example.com"] }),
            json!({ "initiatorDomains": ["example.org"] }),
            json!({ "urlFilter": "||ads.example.com^" }),
            json!({ "requestMethods": ["post"] }),
            json!({ "resourceTypes": ["image"] }),
        ];
        for condition in conditions {
            let result = validate_rule(&json!({ "action": { "type": "allow" }, "condition": condition }));
            assert!(result.is_valid(), "{:?}", result);
        }
    }

    #[test]
    fn test_regex_filter_syntax() {
        let invalid = validate_rule(&json!({
            "action": { "type": "block" },
            "condition": { "urlFilter": "[invalid", "isRegexFilter": true }
        }));
        assert_eq!(
            invalid.errors(),
            &[RuleValidationError {
                location: ErrorLocation::rule_field("condition.urlFilter"),
                message: INVALID_REGEX_MESSAGE.to_string(),
            }]
        );

        let valid = validate_rule(&json!({
            "action": { "type": "block" },
            "condition": { "urlFilter": ".*\\.js$", "isRegexFilter": true }
        }));
        assert!(valid.is_valid());

        // 非正则模式不做正则检查
        let glob = validate_rule(&json!({
            "action": { "type": "block" },
            "condition": { "urlFilter": "[invalid" }
        }));
        assert!(glob.is_valid());
    }

    #[test]
    fn test_valid_rule_returns_evaluated_document() {
        let result = validate_rule(&json!({
            "id": 42,
            "action": { "type": "block" },
            "condition": { "requestDomains": ["example.com"] },
            "priority": 2
        }));
        let rule = result.into_result().unwrap();
        assert_eq!(rule.priority, Some(2));
        assert_eq!(rule.condition.request_domains, vec!["example.com"]);
    }

    #[test]
    fn test_action_enum_message_is_rewritten() {
        let result = validate_rule(&json!({
            "action": { "type": "redirect" },
            "condition": { "urlFilter": "x" }
        }));
        assert_eq!(
            errors(&result),
            vec![("action.type".to_string(), "must be either 'block' or 'allow'".to_string())]
        );
    }

    #[test]
    fn test_ascii_messages_and_dedup() {
        let result = validate_rule(&json!({
            "action": { "type": "block" },
            "condition": {
                "requestDomains": ["a b.com", "ü.com"],
                "urlFilter": "ドメイン"
            }
        }));
        // 两个非法域名在同一字段上只保留一条
        assert_eq!(
            errors(&result),
            vec![
                (
                    "condition.requestDomains".to_string(),
                    "must not contain non-ascii code and space".to_string()
                ),
                ("condition.urlFilter".to_string(), "must not contain non-ascii code".to_string()),
            ]
        );
    }

    #[test]
    fn test_rule_set_locations_are_nested() {
        let result = validate_rule_set(&json!({
            "name": "ads",
            "rules": [
                { "action": { "type": "block" }, "condition": { "urlFilter": "ads" } },
                { "action": { "type": "block" }, "condition": {} },
                { "action": { "type": "block" }, "condition": { "urlFilter": "(", "isRegexFilter": true } }
            ]
        }));

        assert_eq!(
            result.errors(),
            &[
                RuleValidationError {
                    location: ErrorLocation {
                        rule_set_field: Some("rules".to_string()),
                        rule_number: Some(2),
                        rule_field: Some("condition".to_string()),
                        ..Default::default()
                    },
                    message: EMPTY_CONDITION_MESSAGE.to_string(),
                },
                RuleValidationError {
                    location: ErrorLocation {
                        rule_set_field: Some("rules".to_string()),
                        rule_number: Some(3),
                        rule_field: Some("condition.urlFilter".to_string()),
                        ..Default::default()
                    },
                    message: INVALID_REGEX_MESSAGE.to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_rule_set_level_messages() {
        let result = validate_rule_set(&json!({ "name": "", "rules": [] }));
        assert_eq!(
            errors(&result),
            vec![
                ("name".to_string(), "must not be empty".to_string()),
                ("rules".to_string(), "must contain at least one rule".to_string()),
            ]
        );
    }

    #[test]
    fn test_rule_sets_locations_include_set_number() {
        let result = validate_rule_sets(&json!([
            { "name": "ok", "rules": [{ "action": { "type": "block" }, "condition": { "urlFilter": "a" } }] },
            { "name": "bad", "rules": [{ "action": { "type": "deny" }, "condition": { "urlFilter": "a" } }] }
        ]));

        assert_eq!(
            result.errors(),
            &[RuleValidationError {
                location: ErrorLocation {
                    rule_set_number: Some(2),
                    rule_set_field: Some("rules".to_string()),
                    rule_number: Some(1),
                    rule_field: Some("action.type".to_string()),
                },
                message: "must be either 'block' or 'allow'".to_string(),
            }]
        );
        assert_eq!(result.errors()[0].location.to_string(), "ruleSets[2].rules[1].action.type");
    }

    #[test]
    fn test_rule_sets_semantic_errors_include_set_number() {
        let result = validate_rule_sets(&json!([
            { "name": "one", "rules": [
                { "action": { "type": "allow" }, "condition": { "resourceTypes": ["script"] } },
                { "action": { "type": "allow" }, "condition": {} }
            ] }
        ]));
        assert_eq!(
            errors(&result),
            vec![("ruleSets[1].rules[2].condition".to_string(), EMPTY_CONDITION_MESSAGE.to_string())]
        );
    }

    #[test]
    fn test_locate_root_and_set_fields() {
        assert_eq!(locate(SchemaKind::RuleSets, &[]), ErrorLocation::default());
        let location = locate(SchemaKind::RuleSet, &["name".to_string()]);
        assert_eq!(location.rule_set_field.as_deref(), Some("name"));
        assert_eq!(location.rule_number, None);
        assert_eq!(location.to_string(), "name");
    }
}
