//! 结构校验：Rule / RuleSet / RuleSets 文档的 JSON Schema 校验
//! 只做结构层检查（类型、必填、枚举、附加属性、字符串模式），不做跨字段推理

use jsonschema::Validator;
use jsonschema::error::ValidationErrorKind;
use once_cell::sync::Lazy;
use serde_json::{Value, json};

use crate::rule::model::{RequestMethod, ResourceType, RuleActionType};

/// 域名：可打印 ASCII 且不含空格
pub const DOMAIN_PATTERN: &str = "^[!-~]+$";
/// URL 模式：仅 ASCII
pub const URL_FILTER_PATTERN: &str = r"^[\x00-\x7F]*$";

/// 文档类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Rule,
    RuleSet,
    RuleSets,
}

/// 结构校验错误，path 为指向文档内部的 JSON Pointer（如 /condition/requestDomains）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

struct CompiledSchema {
    schema: Value,
    validator: Validator,
}

impl CompiledSchema {
    fn compile(schema: Value) -> Self {
        // 内置 schema 编译失败属于程序错误
        let validator = jsonschema::validator_for(&schema)
            .unwrap_or_else(|e| panic!("内置 schema 编译失败: {}", e));
        Self { schema, validator }
    }
}

static RULE_SCHEMA: Lazy<CompiledSchema> = Lazy::new(|| CompiledSchema::compile(rule_schema()));
static RULE_SET_SCHEMA: Lazy<CompiledSchema> =
    Lazy::new(|| CompiledSchema::compile(rule_set_schema()));
static RULE_SETS_SCHEMA: Lazy<CompiledSchema> =
    Lazy::new(|| CompiledSchema::compile(rule_sets_schema()));

fn domain_list_schema() -> Value {
    json!({
        "type": "array",
        "items": { "type": "string", "pattern": DOMAIN_PATTERN }
    })
}

fn enum_list_schema(values: Vec<&'static str>) -> Value {
    json!({
        "type": "array",
        "items": { "enum": values },
        "uniqueItems": true
    })
}

/// 单条规则 schema
pub fn rule_schema() -> Value {
    let action_types: Vec<_> = RuleActionType::ALL.iter().map(|t| t.as_str()).collect();
    let methods: Vec<_> = RequestMethod::ALL.iter().map(|m| m.as_str()).collect();
    let resources: Vec<_> = ResourceType::ALL.iter().map(|r| r.as_str()).collect();

    json!({
        "type": "object",
        "properties": {
            "id": { "type": "integer", "minimum": -1, "maximum": u32::MAX },
            "action": {
                "type": "object",
                "properties": {
                    "type": { "enum": action_types }
                },
                "required": ["type"],
                "additionalProperties": false
            },
            "condition": {
                "type": "object",
                "properties": {
                    "requestDomains": domain_list_schema(),
                    "initiatorDomains": domain_list_schema(),
                    "urlFilter": { "type": "string", "pattern": URL_FILTER_PATTERN },
                    "isRegexFilter": { "type": "boolean" },
                    "requestMethods": enum_list_schema(methods),
                    "resourceTypes": enum_list_schema(resources)
                },
                "additionalProperties": false
            },
            "priority": { "type": "integer", "minimum": 1, "maximum": u32::MAX }
        },
        "required": ["action", "condition"],
        "additionalProperties": false
    })
}

/// 规则集 schema
pub fn rule_set_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "rules": {
                "type": "array",
                "items": rule_schema(),
                "minItems": 1
            }
        },
        "required": ["name", "rules"],
        "additionalProperties": false
    })
}

/// 规则集列表 schema
pub fn rule_sets_schema() -> Value {
    json!({
        "type": "array",
        "items": rule_set_schema()
    })
}

/// 结构校验入口
pub fn validate_schema(doc: &Value, kind: SchemaKind) -> Result<(), Vec<SchemaError>> {
    let compiled: &CompiledSchema = match kind {
        SchemaKind::Rule => &*RULE_SCHEMA,
        SchemaKind::RuleSet => &*RULE_SET_SCHEMA,
        SchemaKind::RuleSets => &*RULE_SETS_SCHEMA,
    };

    let errors: Vec<SchemaError> = compiled
        .validator
        .iter_errors(doc)
        .flat_map(|err| {
            to_schema_errors(
                &compiled.schema,
                err.instance_path.to_string(),
                err.schema_path.to_string(),
                &err.kind,
                err.to_string(),
            )
        })
        .collect();

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// 将 jsonschema 错误转为统一措辞；required / additionalProperties 定位到具体属性
fn to_schema_errors(
    schema: &Value,
    instance_path: String,
    schema_path: String,
    kind: &ValidationErrorKind,
    fallback: String,
) -> Vec<SchemaError> {
    match kind {
        ValidationErrorKind::Required { property } => {
            let name = property.as_str().map(str::to_string).unwrap_or_else(|| property.to_string());
            vec![SchemaError {
                path: join_pointer(&instance_path, &name),
                message: "is required".to_string(),
            }]
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
            .iter()
            .map(|name| SchemaError {
                path: join_pointer(&instance_path, name),
                message: "must NOT have additional properties".to_string(),
            })
            .collect(),
        _ => {
            let keyword = schema_path.rsplit('/').next().unwrap_or_default();
            let keyword_value = schema.pointer(&schema_path);
            let message = keyword_message(keyword, keyword_value).unwrap_or(fallback);
            vec![SchemaError {
                path: instance_path,
                message,
            }]
        }
    }
}

/// 关键字 → 通用错误文案
fn keyword_message(keyword: &str, value: Option<&Value>) -> Option<String> {
    let message = match keyword {
        "type" => format!("must be {}", type_names(value?)),
        "enum" => "must be equal to one of the allowed values".to_string(),
        "pattern" => format!("must match pattern \"{}\"", value?.as_str()?),
        "minLength" => format!("must NOT have fewer than {} characters", value?),
        "minItems" => format!("must NOT have fewer than {} items", value?),
        "minimum" => format!("must be >= {}", value?),
        "maximum" => format!("must be <= {}", value?),
        "uniqueItems" => "must NOT have duplicate items".to_string(),
        _ => return None,
    };
    Some(message)
}

fn type_names(value: &Value) -> String {
    match value {
        Value::String(name) => name.clone(),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// 追加一段 JSON Pointer（转义 ~ 和 /）
fn join_pointer(base: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{}/{}", base, escaped)
}

/// 拆分 JSON Pointer 为未转义的路径段
pub fn split_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}
