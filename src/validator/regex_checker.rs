//! 正则能力检查
//! 引擎的正则方言是通用正则的严格子集，且有资源上限；本地语法合法不代表引擎接受
//! 优先询问引擎，引擎不可用时退回本地正则引擎

use std::sync::Arc;

use async_trait::async_trait;
use regex::RegexBuilder;
use tracing::warn;

use crate::config::GlobalConfig;
use crate::engine::{RegexSupport, RuleEngine};
use crate::utils::log_format::preview_compact;

pub const REASON_SYNTAX_ERROR: &str = "syntaxError";
pub const REASON_MEMORY_LIMIT_EXCEEDED: &str = "memoryLimitExceeded";

/// 正则能力检查器
#[async_trait]
pub trait RegexChecker: Send + Sync {
    async fn is_supported(&self, pattern: &str, case_sensitive: bool) -> RegexSupport;
}

/// 用本地正则引擎模拟引擎的接受规则：语法 + 编译体积上限
pub fn check_regex_locally(pattern: &str, case_sensitive: bool, size_limit: usize) -> RegexSupport {
    let built = RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .size_limit(size_limit)
        .build();

    match built {
        Ok(_) => RegexSupport::supported(),
        Err(regex::Error::CompiledTooBig(_)) => RegexSupport::unsupported(REASON_MEMORY_LIMIT_EXCEEDED),
        Err(_) => RegexSupport::unsupported(REASON_SYNTAX_ERROR),
    }
}

/// 本地检查器
#[derive(Debug, Clone)]
pub struct LocalRegexChecker {
    size_limit: usize,
}

impl LocalRegexChecker {
    pub fn new(config: &GlobalConfig) -> Self {
        Self {
            size_limit: config.regex_size_limit,
        }
    }
}

impl Default for LocalRegexChecker {
    fn default() -> Self {
        Self::new(&GlobalConfig::default())
    }
}

#[async_trait]
impl RegexChecker for LocalRegexChecker {
    async fn is_supported(&self, pattern: &str, case_sensitive: bool) -> RegexSupport {
        check_regex_locally(pattern, case_sensitive, self.size_limit)
    }
}

/// 引擎优先、本地兜底的检查器
#[derive(Clone)]
pub struct RegexCapabilityChecker {
    engine: Option<Arc<dyn RuleEngine>>,
    local: LocalRegexChecker,
}

impl RegexCapabilityChecker {
    pub fn new(engine: Arc<dyn RuleEngine>, config: &GlobalConfig) -> Self {
        Self {
            engine: Some(engine),
            local: LocalRegexChecker::new(config),
        }
    }

    /// 无引擎场景（如命令行离线校验）
    pub fn local_only(config: &GlobalConfig) -> Self {
        Self {
            engine: None,
            local: LocalRegexChecker::new(config),
        }
    }
}

#[async_trait]
impl RegexChecker for RegexCapabilityChecker {
    async fn is_supported(&self, pattern: &str, case_sensitive: bool) -> RegexSupport {
        if let Some(engine) = &self.engine {
            match engine.is_regex_supported(pattern, case_sensitive).await {
                Ok(support) => return support,
                Err(e) => warn!(
                    "引擎正则检查失败，退回本地检查 [{}]：{}",
                    preview_compact(pattern, 60),
                    e
                ),
            }
        }
        self.local.is_supported(pattern, case_sensitive).await
    }
}
