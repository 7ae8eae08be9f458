//! 全局错误类型定义
//! 校验失败以数据形式返回（见 validator），这里只承载引擎/存储/IO 等运行期错误

use thiserror::Error;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum RsBlockerError {
    // ===================== 引擎相关错误 =====================
    /// 外部规则引擎拒绝了调用
    #[error("Rule engine error: {0}")]
    EngineError(String),

    /// 提交后的活动规则数超过引擎上限
    #[error("Rule limit exceeded: {requested} active rules requested, limit is {limit}")]
    RuleLimitExceeded { limit: usize, requested: usize },

    // ===================== 存储相关错误 =====================
    #[error("Store operation failed: {0}")]
    StoreError(String),
    #[error("MessagePack encode/decode failed: {0}")]
    MsgPackError(String),

    // ===================== 规则相关错误 =====================
    /// 规则 ID 不在任何合法区间内（负数且不是 -1）
    #[error("Invalid rule id: {0}")]
    InvalidRuleId(i64),

    // ===================== 基础错误 =====================
    #[error("JSON parse failed: {0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("IO operation failed: {0}")]
    IoError(#[from] IoError),
    #[error("URL parse failed: {0}")]
    UrlError(#[from] UrlParseError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// 全局Result类型
pub type RsbResult<T> = Result<T, RsBlockerError>;
