//! 全局配置管理,存储所有可配置项

use std::path::PathBuf;

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // 本地状态文件路径（MessagePack）
    pub store_path: PathBuf,
    // 扩展自身的 origin，保留放行规则据此生成 initiatorDomains
    pub extension_origin: String,
    // 保留放行规则的优先级，需高于所有用户规则
    pub reserved_rule_priority: u32,
    // 引擎允许的活动规则上限（InMemoryEngine 使用）
    pub max_active_rules: usize,
    // 本地正则编译体积上限（字节）
    pub regex_size_limit: usize,
    // 是否启用详细日志
    pub verbose: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("rsblocker_state.mp"),
            extension_origin: "chrome-extension://rsblocker".to_string(),
            reserved_rule_priority: 100,
            max_active_rules: 5000,
            regex_size_limit: 256 * 1024,
            verbose: false,
        }
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    pub fn extension_origin(mut self, origin: impl Into<String>) -> Self {
        self.config.extension_origin = origin.into();
        self
    }

    pub fn reserved_rule_priority(mut self, priority: u32) -> Self {
        self.config.reserved_rule_priority = priority;
        self
    }

    pub fn max_active_rules(mut self, limit: usize) -> Self {
        self.config.max_active_rules = limit;
        self
    }

    pub fn regex_size_limit(mut self, limit: usize) -> Self {
        self.config.regex_size_limit = limit;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
