//! 错误类型定义

use thiserror::Error;

/// 错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 网络错误（无响应：离线、DNS、超时等）
    #[error("Network error: {0}")]
    Network(String),

    /// 应用层错误（HTTP 2xx 但 code != 0）
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// HTTP 错误（非 2xx 且非 401，携带后端返回的原始 body）
    #[error("HTTP {status}: {}", http_error_message(.body))]
    Http { status: u16, body: serde_json::Value },

    /// 401 未授权（会话已失效，已触发清理与跳转）
    #[error("Unauthorized")]
    Unauthorized,

    /// 本地无会话（调用了需要登录的操作）
    #[error("Not authenticated")]
    NotAuthenticated,

    /// 参数校验错误（未发起任何网络请求）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 本地存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 响应格式错误
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 编解码错误
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 取后端错误 body 中的可读信息（msg 或 detail 字段）
fn http_error_message(body: &serde_json::Value) -> String {
    body.get("msg")
        .or_else(|| body.get("detail"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| body.to_string())
}

/// 结果类型
pub type Result<T> = std::result::Result<T, Error>;
