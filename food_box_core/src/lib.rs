//! 吃啥盲盒客户端核心库
//!
//! 提供小程序端的完整请求/会话契约，包括：
//! - 会话存储（token + 用户档案缓存，单一所有者）
//! - 双传输（直连源站 / 云函数代理），启动时二选一注入
//! - 统一响应信封与 401 会话过期处理
//! - 回落式页面导航链

pub mod client;
pub mod error;
pub mod nav;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;

pub use client::{ClientConfig, FoodBoxClient};
pub use error::{Error, Result};
pub use nav::{navigate_with_fallback, ConsoleShell, Route, Shell};
pub use session::{SessionStore, HISTORY_LIMIT};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use transport::{
    DirectTransport, Method, ProxyTransport, RawResponse, RequestDescriptor, Transport,
};
pub use types::*;
