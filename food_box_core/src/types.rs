//! 数据类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 统一 API 响应（后端约定：code=0 表示成功）
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// 云函数代理响应包装
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEnvelope {
    pub success: bool,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

/// 用户信息缓存
///
/// 不同接口只返回部分字段（登录只给 token，/api/user/info 给完整档案），
/// 全部字段可选，通过 merge 浅合并，窄响应不会抹掉已知的宽字段。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openid: Option<String>,
    /// 会员等级标签
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// 今日剩余抽取次数
    #[serde(
        rename = "today_remaining_times",
        skip_serializing_if = "Option::is_none"
    )]
    pub remaining_times: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserInfo {
    /// 浅合并：partial 中有值的字段覆盖，缺失的字段保留原值
    pub fn merge(&mut self, partial: UserInfo) {
        if partial.id.is_some() {
            self.id = partial.id;
        }
        if partial.username.is_some() {
            self.username = partial.username;
        }
        if partial.nickname.is_some() {
            self.nickname = partial.nickname;
        }
        if partial.avatar_url.is_some() {
            self.avatar_url = partial.avatar_url;
        }
        if partial.openid.is_some() {
            self.openid = partial.openid;
        }
        if partial.level.is_some() {
            self.level = partial.level;
        }
        if partial.remaining_times.is_some() {
            self.remaining_times = partial.remaining_times;
        }
        if partial.created_at.is_some() {
            self.created_at = partial.created_at;
        }
    }

    /// 是否已绑定微信
    pub fn wechat_linked(&self) -> bool {
        self.openid.is_some()
    }
}

/// 登录响应数据
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub access_token: String,
}

/// 微信登录返回的用户档案
#[derive(Debug, Clone, Deserialize)]
pub struct WechatUser {
    pub id: i64,
    pub openid: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 微信登录响应数据
#[derive(Debug, Clone, Deserialize)]
pub struct WechatLoginData {
    pub access_token: String,
    pub user: WechatUser,
    #[serde(default)]
    pub is_new_user: bool,
}

/// 头像上传响应数据
#[derive(Debug, Clone, Deserialize)]
pub struct AvatarData {
    pub avatar_url: String,
}

/// 餐饮类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealType {
    Breakfast = 1,
    Lunch = 2,
    Dinner = 3,
    Supper = 4,
}

impl MealType {
    /// 按当前小时选餐类：5-9 早餐，10-14 午餐，15-20 晚餐，其余夜宵
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            5..=9 => MealType::Breakfast,
            10..=14 => MealType::Lunch,
            15..=20 => MealType::Dinner,
            _ => MealType::Supper,
        }
    }

    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            MealType::Breakfast => "早餐",
            MealType::Lunch => "午餐",
            MealType::Dinner => "晚餐",
            MealType::Supper => "夜宵",
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(MealType::Breakfast),
            2 => Some(MealType::Lunch),
            3 => Some(MealType::Dinner),
            4 => Some(MealType::Supper),
            _ => None,
        }
    }
}

/// 美食条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub meal_type: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// 抽取筛选条件，字段为 None 时不进入查询串
#[derive(Debug, Clone, Default)]
pub struct DrawParams {
    pub meal_type: Option<MealType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub category: Option<String>,
}

/// 抽取响应数据
#[derive(Debug, Clone, Deserialize)]
pub struct DrawData {
    pub food: Food,
    pub remaining_times: i64,
}

/// 抽取记录
#[derive(Debug, Clone, Deserialize)]
pub struct DrawRecord {
    pub id: i64,
    pub food: Food,
    pub drawn_at: String,
}

/// 抽取记录响应，兼容 {records: [...]} 和裸数组两种格式
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordsData {
    Wrapped { records: Vec<DrawRecord> },
    Bare(Vec<DrawRecord>),
}

impl RecordsData {
    pub fn into_records(self) -> Vec<DrawRecord> {
        match self {
            RecordsData::Wrapped { records } => records,
            RecordsData::Bare(records) => records,
        }
    }
}

/// 本地统计数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(rename = "favoriteCount")]
    pub favorite_count: u64,
    #[serde(rename = "totalDraws")]
    pub total_draws: u64,
}

/// 历史记录条目（confirmChoice 写入，最多 20 条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "drawTime")]
    pub draw_time: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_food(food: &Food, at: DateTime<Utc>) -> Self {
        Self {
            id: food.id,
            name: food.name.clone(),
            category: Some(food.category.clone()),
            price: food.price,
            image_url: food.image_url.clone(),
            draw_time: at,
        }
    }
}

/// 收藏条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(rename = "addTime")]
    pub add_time: DateTime<Utc>,
}

impl FavoriteEntry {
    pub fn from_food(food: &Food, at: DateTime<Utc>) -> Self {
        Self {
            id: food.id,
            name: food.name.clone(),
            category: Some(food.category.clone()),
            price: food.price,
            image_url: food.image_url.clone(),
            add_time: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_known_fields() {
        let mut info = UserInfo {
            nickname: Some("A".to_string()),
            remaining_times: Some(1),
            ..Default::default()
        };
        info.merge(UserInfo {
            remaining_times: Some(2),
            ..Default::default()
        });
        assert_eq!(info.nickname.as_deref(), Some("A"));
        assert_eq!(info.remaining_times, Some(2));
    }

    #[test]
    fn test_merge_fills_missing_fields() {
        let mut info = UserInfo::default();
        info.merge(UserInfo {
            id: Some(1),
            username: Some("ab".to_string()),
            ..Default::default()
        });
        assert_eq!(info.id, Some(1));
        assert_eq!(info.username.as_deref(), Some("ab"));
    }

    #[test]
    fn test_meal_type_for_hour() {
        assert_eq!(MealType::for_hour(7), MealType::Breakfast);
        assert_eq!(MealType::for_hour(12), MealType::Lunch);
        assert_eq!(MealType::for_hour(18), MealType::Dinner);
        assert_eq!(MealType::for_hour(23), MealType::Supper);
        assert_eq!(MealType::for_hour(2), MealType::Supper);
    }

    #[test]
    fn test_records_data_wrapped_and_bare() {
        let wrapped: RecordsData = serde_json::from_value(serde_json::json!({
            "records": [{"id": 1, "food": {"id": 2, "name": "红烧肉", "category": "中餐"}, "drawn_at": "2024-01-01T12:00:00"}]
        }))
        .unwrap();
        assert_eq!(wrapped.into_records().len(), 1);

        let bare: RecordsData = serde_json::from_value(serde_json::json!([
            {"id": 1, "food": {"id": 2, "name": "红烧肉", "category": "中餐"}, "drawn_at": "2024-01-01T12:00:00"}
        ]))
        .unwrap();
        assert_eq!(bare.into_records().len(), 1);
    }

    #[test]
    fn test_user_info_deserializes_backend_field_name() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "id": 1,
            "username": "ab",
            "today_remaining_times": 3
        }))
        .unwrap();
        assert_eq!(info.remaining_times, Some(3));
    }
}
