//! 本地持久化存储
//!
//! 小程序端的 wx storage 在这里对应为一个键值后端：CLI 用单个 JSON
//! 文件落盘，测试用内存表。调用方不直接碰键名，统一走 SessionStore。

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 键值存储后端
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// 单文件 JSON 存储，每次操作整体读改写
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| Error::Storage(format!("corrupt state file {:?}: {}", self.path, e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        let text = serde_json::to_string_pretty(map)
            .map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.save(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.save(&map)?;
        }
        Ok(())
    }
}

/// 内存存储，用于测试和一次性会话
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let map = self
            .map
            .lock()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| Error::Storage("storage lock poisoned".to_string()))?;
        map.remove(key);
        Ok(())
    }
}
