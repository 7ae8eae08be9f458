//! 引擎模块：外部规则匹配引擎的边界定义
//! 引擎的匹配语义不在本 crate 内实现，这里只向它下发指令、读取命中遥测
pub mod wire;
pub mod memory;

use async_trait::async_trait;

use crate::error::RsbResult;
use crate::sync::state::FeatureState;

pub use self::wire::{
    DEFAULT_ENGINE_PRIORITY, EngineMatch, RegexSupport, RuleDelta, WireCondition, WireRule,
};
pub use self::memory::InMemoryEngine;

/// 外部规则匹配引擎
/// 所有方法都会跨越进程/浏览器边界，失败时原样向上传播，不做重试
#[async_trait]
pub trait RuleEngine: Send + Sync {
    /// 当前生效的规则表
    async fn get_active_rules(&self) -> RsbResult<Vec<WireRule>>;

    /// 一次性提交删除 + 新增
    async fn apply_rule_delta(&self, delta: RuleDelta) -> RsbResult<()>;

    /// 清空所有规则
    async fn remove_all_rules(&self) -> RsbResult<()>;

    /// 当前上下文的命中记录
    async fn get_matched_rules(&self) -> RsbResult<Vec<EngineMatch>>;

    /// 引擎是否接受该正则
    async fn is_regex_supported(&self, pattern: &str, case_sensitive: bool) -> RsbResult<RegexSupport>;

    /// 更新用户可见的状态指示（如工具栏徽标）
    async fn set_status_indicator(&self, _state: FeatureState) -> RsbResult<()> {
        Ok(())
    }
}
