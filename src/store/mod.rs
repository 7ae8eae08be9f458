//! 存储模块：本地键值持久化
//! 本 crate 假定存储实现自行串行化读写，不做 compare-and-swap
pub mod memory;
pub mod file;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RsbResult;
use crate::rule::id::FIRST_DURABLE_RULE_ID;
use crate::rule::model::RuleSet;
use crate::sync::state::FeatureState;

pub use self::file::MsgPackFileStore;
pub use self::memory::MemoryStore;

/// 存储键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    State,
    NextRuleId,
    RuleSets,
    Language,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::State => "state",
            StoreKey::NextRuleId => "nextRuleId",
            StoreKey::RuleSets => "ruleSets",
            StoreKey::Language => "language",
        }
    }
}

/// 键值存储
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> RsbResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> RsbResult<()>;
    async fn remove(&self, key: &str) -> RsbResult<()>;
}

/// 带类型的存储访问封装
#[derive(Clone)]
pub struct RuleStore {
    inner: Arc<dyn KeyValueStore>,
}

impl RuleStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    async fn get_typed<T: DeserializeOwned>(&self, key: StoreKey) -> RsbResult<Option<T>> {
        match self.inner.get(key.as_str()).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set_typed<T: Serialize>(&self, key: StoreKey, value: &T) -> RsbResult<()> {
        self.inner.set(key.as_str(), serde_json::to_value(value)?).await
    }

    pub async fn feature_state(&self) -> RsbResult<FeatureState> {
        Ok(self.get_typed(StoreKey::State).await?.unwrap_or_default())
    }

    pub async fn set_feature_state(&self, state: FeatureState) -> RsbResult<()> {
        self.set_typed(StoreKey::State, &state).await
    }

    pub async fn next_rule_id(&self) -> RsbResult<u32> {
        Ok(self
            .get_typed(StoreKey::NextRuleId)
            .await?
            .unwrap_or(FIRST_DURABLE_RULE_ID))
    }

    pub async fn set_next_rule_id(&self, next_id: u32) -> RsbResult<()> {
        self.set_typed(StoreKey::NextRuleId, &next_id).await
    }

    pub async fn rule_sets(&self) -> RsbResult<Vec<RuleSet>> {
        Ok(self.get_typed(StoreKey::RuleSets).await?.unwrap_or_default())
    }

    pub async fn set_rule_sets(&self, rule_sets: &[RuleSet]) -> RsbResult<()> {
        self.set_typed(StoreKey::RuleSets, &rule_sets).await
    }

    pub async fn language(&self) -> RsbResult<Option<String>> {
        self.get_typed(StoreKey::Language).await
    }

    pub async fn set_language(&self, language: Option<&str>) -> RsbResult<()> {
        match language {
            Some(language) => self.set_typed(StoreKey::Language, &language).await,
            None => self.inner.remove(StoreKey::Language.as_str()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::id::RuleId;
    use crate::rule::model::{Rule, RuleAction, RuleCondition};

    fn store() -> RuleStore {
        RuleStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_defaults_for_missing_keys() {
        let store = store();
        assert_eq!(store.feature_state().await.unwrap(), FeatureState::Disabled);
        assert_eq!(store.next_rule_id().await.unwrap(), 11);
        assert!(store.rule_sets().await.unwrap().is_empty());
        assert_eq!(store.language().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = store();
        let condition = RuleCondition {
            url_filter: "ads".to_string(),
            ..Default::default()
        };
        let rule_sets = vec![RuleSet::new(
            "ads",
            vec![Rule::new(RuleAction::block(), condition).with_id(RuleId::Durable(11))],
        )];

        store.set_rule_sets(&rule_sets).await.unwrap();
        store.set_next_rule_id(12).await.unwrap();
        store.set_feature_state(FeatureState::Enabled).await.unwrap();
        store.set_language(Some("ja")).await.unwrap();

        assert_eq!(store.rule_sets().await.unwrap(), rule_sets);
        assert_eq!(store.next_rule_id().await.unwrap(), 12);
        assert_eq!(store.feature_state().await.unwrap(), FeatureState::Enabled);
        assert_eq!(store.language().await.unwrap().as_deref(), Some("ja"));

        store.set_language(None).await.unwrap();
        assert_eq!(store.language().await.unwrap(), None);
    }
}
