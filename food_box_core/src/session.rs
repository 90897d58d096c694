//! 会话与本地数据管理
//!
//! token、userInfo、userStats、favorites、drawHistory 五个键的唯一所有者。
//! 所有读改写都经过同一把异步锁：401 清理和登录写入互斥，
//! 页面并发更新收藏/历史也不会互相覆盖。

use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::types::{FavoriteEntry, HistoryEntry, UserInfo, UserStats};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

const KEY_TOKEN: &str = "token";
const KEY_USER_INFO: &str = "userInfo";
const KEY_USER_STATS: &str = "userStats";
const KEY_FAVORITES: &str = "favorites";
const KEY_HISTORY: &str = "drawHistory";

/// 历史记录上限
pub const HISTORY_LIMIT: usize = 20;

/// 会话存储
pub struct SessionStore {
    storage: Mutex<Box<dyn Storage>>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    fn read<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>> {
        match storage.get(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::Storage(format!("corrupt value for {}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| Error::Storage(e.to_string()))?;
        storage.set(key, value)
    }

    /// 当前 token，存在即视为已登录
    pub async fn token(&self) -> Result<Option<String>> {
        let storage = self.storage.lock().await;
        Self::read(storage.as_ref(), KEY_TOKEN)
    }

    pub async fn is_logged_in(&self) -> Result<bool> {
        Ok(self.token().await?.is_some())
    }

    /// 写入会话；user_info 为 None 时保留已缓存的档案
    pub async fn set_session(&self, token: &str, user_info: Option<&UserInfo>) -> Result<()> {
        let storage = self.storage.lock().await;
        storage.set(KEY_TOKEN, Value::String(token.to_string()))?;
        if let Some(info) = user_info {
            Self::write(storage.as_ref(), KEY_USER_INFO, info)?;
        }
        debug!("session stored");
        Ok(())
    }

    /// 清除会话，可重复调用
    pub async fn clear_session(&self) -> Result<()> {
        let storage = self.storage.lock().await;
        storage.remove(KEY_TOKEN)?;
        storage.remove(KEY_USER_INFO)?;
        debug!("session cleared");
        Ok(())
    }

    pub async fn user_info(&self) -> Result<Option<UserInfo>> {
        let storage = self.storage.lock().await;
        Self::read(storage.as_ref(), KEY_USER_INFO)
    }

    /// 浅合并用户档案，返回合并后的完整缓存
    pub async fn merge_user_info(&self, partial: UserInfo) -> Result<UserInfo> {
        let storage = self.storage.lock().await;
        let mut info: UserInfo =
            Self::read(storage.as_ref(), KEY_USER_INFO)?.unwrap_or_default();
        info.merge(partial);
        Self::write(storage.as_ref(), KEY_USER_INFO, &info)?;
        Ok(info)
    }

    pub async fn stats(&self) -> Result<UserStats> {
        let storage = self.storage.lock().await;
        Ok(Self::read(storage.as_ref(), KEY_USER_STATS)?.unwrap_or_default())
    }

    /// 累计抽取一次
    pub async fn record_draw(&self) -> Result<UserStats> {
        let storage = self.storage.lock().await;
        let mut stats: UserStats =
            Self::read(storage.as_ref(), KEY_USER_STATS)?.unwrap_or_default();
        stats.total_draws += 1;
        Self::write(storage.as_ref(), KEY_USER_STATS, &stats)?;
        Ok(stats)
    }

    pub async fn favorites(&self) -> Result<Vec<FavoriteEntry>> {
        let storage = self.storage.lock().await;
        Ok(Self::read(storage.as_ref(), KEY_FAVORITES)?.unwrap_or_default())
    }

    /// 收藏/取消收藏，返回操作后是否处于收藏状态
    pub async fn toggle_favorite(&self, entry: FavoriteEntry) -> Result<bool> {
        let storage = self.storage.lock().await;
        let mut favorites: Vec<FavoriteEntry> =
            Self::read(storage.as_ref(), KEY_FAVORITES)?.unwrap_or_default();

        let favored = if favorites.iter().any(|item| item.id == entry.id) {
            favorites.retain(|item| item.id != entry.id);
            false
        } else {
            favorites.push(entry);
            true
        };
        Self::write(storage.as_ref(), KEY_FAVORITES, &favorites)?;

        // favoriteCount 跟随列表长度
        let mut stats: UserStats =
            Self::read(storage.as_ref(), KEY_USER_STATS)?.unwrap_or_default();
        stats.favorite_count = favorites.len() as u64;
        Self::write(storage.as_ref(), KEY_USER_STATS, &stats)?;

        Ok(favored)
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        let storage = self.storage.lock().await;
        Ok(Self::read(storage.as_ref(), KEY_HISTORY)?.unwrap_or_default())
    }

    /// 写入一条历史：同 id 旧条目移除，新条目置顶，最多保留 20 条
    pub async fn push_history(&self, entry: HistoryEntry) -> Result<()> {
        let storage = self.storage.lock().await;
        let mut history: Vec<HistoryEntry> =
            Self::read(storage.as_ref(), KEY_HISTORY)?.unwrap_or_default();

        history.retain(|item| item.id != entry.id);
        history.insert(0, entry);
        history.truncate(HISTORY_LIMIT);

        Self::write(storage.as_ref(), KEY_HISTORY, &history)
    }

    /// 清除缓存数据（历史、收藏、统计），保留登录状态
    pub async fn clear_cache(&self) -> Result<()> {
        let storage = self.storage.lock().await;
        storage.remove(KEY_HISTORY)?;
        storage.remove(KEY_FAVORITES)?;
        storage.remove(KEY_USER_STATS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::Food;
    use chrono::Utc;

    fn store() -> SessionStore {
        SessionStore::new(Box::new(MemoryStorage::new()))
    }

    fn food(id: i64, name: &str) -> Food {
        Food {
            id,
            name: name.to_string(),
            category: "中餐".to_string(),
            meal_type: Some(2),
            description: None,
            price: Some(38.0),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_session_roundtrip_and_clear() {
        let store = store();
        assert!(!store.is_logged_in().await.unwrap());

        let info = UserInfo {
            username: Some("ab".to_string()),
            ..Default::default()
        };
        store.set_session("T", Some(&info)).await.unwrap();
        assert_eq!(store.token().await.unwrap().as_deref(), Some("T"));
        assert_eq!(store.user_info().await.unwrap(), Some(info));

        store.clear_session().await.unwrap();
        assert!(store.token().await.unwrap().is_none());
        assert!(store.user_info().await.unwrap().is_none());

        // 幂等
        store.clear_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_session_without_info_keeps_cache() {
        let store = store();
        let info = UserInfo {
            nickname: Some("A".to_string()),
            ..Default::default()
        };
        store.set_session("T1", Some(&info)).await.unwrap();
        store.set_session("T2", None).await.unwrap();
        assert_eq!(
            store.user_info().await.unwrap().unwrap().nickname.as_deref(),
            Some("A")
        );
    }

    #[tokio::test]
    async fn test_merge_user_info_never_narrows() {
        let store = store();
        store
            .merge_user_info(UserInfo {
                nickname: Some("A".to_string()),
                remaining_times: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();

        let merged = store
            .merge_user_info(UserInfo {
                remaining_times: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(merged.nickname.as_deref(), Some("A"));
        assert_eq!(merged.remaining_times, Some(2));
    }

    #[tokio::test]
    async fn test_history_cap_and_dedup() {
        let store = store();
        for id in 0..25 {
            store
                .push_history(HistoryEntry::from_food(&food(id, "菜"), Utc::now()))
                .await
                .unwrap();
        }
        let history = store.history().await.unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        // 最新在前
        assert_eq!(history[0].id, 24);

        // 重复 id：旧条目被移除，新条目置顶，长度不变
        store
            .push_history(HistoryEntry::from_food(&food(10, "再来一次"), Utc::now()))
            .await
            .unwrap();
        let history = store.history().await.unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].id, 10);
        assert_eq!(history[0].name, "再来一次");
        assert_eq!(
            history.iter().filter(|item| item.id == 10).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_toggle_favorite_updates_count() {
        let store = store();
        let entry = FavoriteEntry::from_food(&food(1, "红烧肉"), Utc::now());

        assert!(store.toggle_favorite(entry.clone()).await.unwrap());
        assert_eq!(store.stats().await.unwrap().favorite_count, 1);

        assert!(!store.toggle_favorite(entry).await.unwrap());
        assert_eq!(store.stats().await.unwrap().favorite_count, 0);
    }

    #[tokio::test]
    async fn test_record_draw_and_clear_cache() {
        let store = store();
        store.set_session("T", None).await.unwrap();
        store.record_draw().await.unwrap();
        store.record_draw().await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_draws, 2);

        store.clear_cache().await.unwrap();
        assert_eq!(store.stats().await.unwrap(), UserStats::default());
        // 登录状态保留
        assert!(store.is_logged_in().await.unwrap());
    }
}
