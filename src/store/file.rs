//! 文件键值存储
//! 整个键值表以 MessagePack 序列化到单个文件；首次访问时加载，每次修改后整体写回

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rmp_serde::{Serializer, from_slice};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::KeyValueStore;
use crate::config::GlobalConfig;
use crate::error::{RsBlockerError, RsbResult};

type Entries = HashMap<String, Value>;

#[derive(Debug)]
pub struct MsgPackFileStore {
    path: PathBuf,
    // None 表示尚未从磁盘加载
    entries: Mutex<Option<Entries>>,
}

impl MsgPackFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn from_config(config: &GlobalConfig) -> Self {
        Self::new(config.store_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> RsbResult<Entries> {
        if !tokio::fs::try_exists(path).await? {
            debug!("状态文件不存在，使用空存储：{}", path.display());
            return Ok(Entries::new());
        }

        let data = tokio::fs::read(path).await?;
        let entries: Entries = from_slice(&data)
            .map_err(|e| RsBlockerError::MsgPackError(format!("decode {}: {}", path.display(), e)))?;
        debug!("状态文件加载成功，键数量：{}", entries.len());
        Ok(entries)
    }

    async fn save(path: &Path, entries: &Entries) -> RsbResult<()> {
        let mut data = Vec::new();
        entries
            .serialize(&mut Serializer::new(&mut data))
            .map_err(|e| RsBlockerError::MsgPackError(format!("encode {}: {}", path.display(), e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &data).await?;
        debug!("状态文件已写入：{}（{} 字节）", path.display(), data.len());
        Ok(())
    }

    /// 在键值表副本上执行修改，写盘成功后才替换内存中的表
    async fn mutate<F>(&self, change: F) -> RsbResult<()>
    where
        F: FnOnce(&mut Entries) + Send,
    {
        let mut guard = self.entries.lock().await;
        let mut next = match guard.as_ref() {
            Some(entries) => entries.clone(),
            None => Self::load(&self.path).await?,
        };
        change(&mut next);
        Self::save(&self.path, &next).await?;
        *guard = Some(next);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MsgPackFileStore {
    async fn get(&self, key: &str) -> RsbResult<Option<Value>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: Value) -> RsbResult<()> {
        let key = key.to_string();
        self.mutate(move |entries| {
            entries.insert(key, value);
        })
        .await
    }

    async fn remove(&self, key: &str) -> RsbResult<()> {
        self.mutate(|entries| {
            entries.remove(key);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.mp");

        let store = MsgPackFileStore::new(&path);
        store.set("nextRuleId", json!(42)).await.unwrap();
        store
            .set("ruleSets", json!([{ "name": "a", "rules": [] }]))
            .await
            .unwrap();
        store.set("language", json!("en")).await.unwrap();
        store.remove("language").await.unwrap();

        let reopened = MsgPackFileStore::new(&path);
        assert_eq!(reopened.get("nextRuleId").await.unwrap(), Some(json!(42)));
        assert_eq!(
            reopened.get("ruleSets").await.unwrap(),
            Some(json!([{ "name": "a", "rules": [] }]))
        );
        assert_eq!(reopened.get("language").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = MsgPackFileStore::new(dir.path().join("absent.mp"));
        assert_eq!(store.get("state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.mp");
        tokio::fs::write(&path, b"\xc1\xc1\xc1").await.unwrap();

        let store = MsgPackFileStore::new(&path);
        assert!(matches!(store.get("state").await, Err(RsBlockerError::MsgPackError(_))));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.mp");

        let store = MsgPackFileStore::new(&path);
        store.set("nextRuleId", json!(11)).await.unwrap();

        // 状态文件被目录占用，写盘必然失败
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();

        assert!(store.set("nextRuleId", json!(42)).await.is_err());
        assert_eq!(store.get("nextRuleId").await.unwrap(), Some(json!(11)));
        assert!(store.remove("nextRuleId").await.is_err());
        assert_eq!(store.get("nextRuleId").await.unwrap(), Some(json!(11)));
    }
}
