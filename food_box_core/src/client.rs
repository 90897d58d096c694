//! 吃啥盲盒 API 客户端

use crate::error::{Error, Result};
use crate::nav::{navigate_with_fallback, Route, Shell};
use crate::session::SessionStore;
use crate::transport::{
    DirectTransport, ProxyTransport, RawResponse, RequestDescriptor, Transport,
};
use crate::types::*;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 后端源站地址
    pub base_url: String,
    /// 云函数代理入口；为 Some 时走代理传输
    pub proxy_url: Option<String>,
    /// 请求超时（秒）
    pub timeout: u64,
    /// 是否验证 TLS 证书
    pub verify_tls: bool,
    /// 会话过期提示到跳转登录页的间隔（毫秒）
    pub expiry_notice_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            proxy_url: None,
            timeout: 30,
            verify_tls: true,
            expiry_notice_ms: 1500,
        }
    }
}

/// 吃啥盲盒客户端
///
/// 持有会话存储、选定的传输方式和宿主外壳，应用启动时构建一次，
/// 之后以句柄传给需要它的调用方。
pub struct FoodBoxClient {
    config: ClientConfig,
    http: reqwest::Client,
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
    shell: Arc<dyn Shell>,
}

impl FoodBoxClient {
    /// 创建客户端，按配置选定直连或代理传输
    pub fn new(
        config: ClientConfig,
        session: Arc<SessionStore>,
        shell: Arc<dyn Shell>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let transport: Arc<dyn Transport> = match &config.proxy_url {
            Some(url) => Arc::new(ProxyTransport::new(http.clone(), url)),
            None => Arc::new(DirectTransport::new(http.clone(), &config.base_url)),
        };

        Ok(Self {
            config,
            http,
            transport,
            session,
            shell,
        })
    }

    /// 注入自定义传输（测试用）
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: Arc<SessionStore>,
        shell: Arc<dyn Shell>,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            transport,
            session,
            shell,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// 附加 Bearer 头并发送；传输失败时提示一次「网络请求失败」
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
        let request = match self.session.token().await? {
            Some(token) => request.bearer(&token),
            None => request,
        };
        match self.transport.send(request).await {
            Ok(response) => Ok(response),
            Err(e @ Error::Network(_)) => {
                self.shell.toast("网络请求失败");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// 统一状态码策略：2xx 放行 body，401 触发会话过期，其余原样拒绝
    async fn dispatch(&self, request: RequestDescriptor) -> Result<serde_json::Value> {
        let response = self.send(request).await?;
        if response.is_success() {
            return Ok(response.body);
        }
        if response.status == 401 {
            self.expire_session().await;
            return Err(Error::Unauthorized);
        }
        Err(Error::Http {
            status: response.status,
            body: response.body,
        })
    }

    /// 解包 {code, msg, data}，code != 0 视为应用层失败
    async fn request_data<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        let body = self.dispatch(request).await?;
        let envelope: ApiResponse<T> = serde_json::from_value(body)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        if envelope.code != 0 {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        envelope
            .data
            .ok_or_else(|| Error::InvalidResponse("no data in response".to_string()))
    }

    /// 同上，但允许 data 缺失（注册、资料更新等只关心成败）
    async fn request_unit(&self, request: RequestDescriptor) -> Result<String> {
        let body = self.dispatch(request).await?;
        let envelope: ApiResponse<serde_json::Value> = serde_json::from_value(body)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        if envelope.code != 0 {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        Ok(envelope.msg)
    }

    /// 401 的完整善后：清会话、提示、停留片刻、回落导航到登录页
    async fn expire_session(&self) {
        warn!("session expired, tearing down");
        if let Err(e) = self.session.clear_session().await {
            warn!(error = %e, "failed to clear session");
        }
        self.shell.toast("登录已过期，请重新登录");
        if self.config.expiry_notice_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.expiry_notice_ms)).await;
        }
        navigate_with_fallback(self.shell.as_ref(), Route::Login);
    }

    fn validate_credentials(username: &str, password: &str) -> Result<()> {
        if username.chars().count() < 3 || username.chars().count() > 50 {
            return Err(Error::Validation("用户名长度需为 3-50 个字符".to_string()));
        }
        if password.chars().count() < 6 || password.chars().count() > 100 {
            return Err(Error::Validation("密码长度需为 6-100 个字符".to_string()));
        }
        Ok(())
    }

    /// 用户注册
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        Self::validate_credentials(username, password)?;
        info!(username, "registering user");

        let request = RequestDescriptor::post("/api/user/register").json(json!({
            "username": username,
            "password": password,
        }));
        let msg = self.request_unit(request).await?;
        info!(username, %msg, "user registered");
        Ok(())
    }

    /// 用户登录，成功后写入 token
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        Self::validate_credentials(username, password)?;
        info!(username, "logging in");

        let request = RequestDescriptor::post("/api/user/login").json(json!({
            "username": username,
            "password": password,
        }));
        let data: LoginData = self.request_data(request).await?;

        self.session.set_session(&data.access_token, None).await?;
        self.session
            .merge_user_info(UserInfo {
                username: Some(username.to_string()),
                ..Default::default()
            })
            .await?;
        info!("login ok");
        Ok(())
    }

    /// 微信授权登录，写入 token 并合并返回的用户档案
    pub async fn wechat_login(&self, code: &str) -> Result<bool> {
        info!("wechat login");
        let request =
            RequestDescriptor::post("/api/user/wechat/login").json(json!({ "code": code }));
        let data: WechatLoginData = self.request_data(request).await?;

        self.session.set_session(&data.access_token, None).await?;
        self.session
            .merge_user_info(UserInfo {
                id: Some(data.user.id),
                openid: Some(data.user.openid),
                nickname: data.user.nickname,
                avatar_url: data.user.avatar_url,
                created_at: data.user.created_at,
                ..Default::default()
            })
            .await?;
        info!(is_new_user = data.is_new_user, "wechat login ok");
        Ok(data.is_new_user)
    }

    /// 拉取用户信息并合并进缓存，返回合并后的完整档案
    pub async fn get_user_info(&self) -> Result<UserInfo> {
        let request = RequestDescriptor::get("/api/user/info");
        let partial: UserInfo = self.request_data(request).await?;
        self.session.merge_user_info(partial).await
    }

    /// 页面展示时的机会性刷新：失败只降级，不打断调用方
    pub async fn refresh_user_info(&self) -> Result<Option<UserInfo>> {
        match self.get_user_info().await {
            Ok(info) => Ok(Some(info)),
            Err(Error::Unauthorized) => Err(Error::Unauthorized),
            Err(e) => {
                warn!(error = %e, "user info refresh skipped");
                Ok(None)
            }
        }
    }

    /// 更新微信昵称与头像
    pub async fn update_wechat_user_info(
        &self,
        nickname: &str,
        avatar_url: &str,
    ) -> Result<()> {
        let request = RequestDescriptor::put("/api/user/wechat/userinfo").json(json!({
            "nickname": nickname,
            "avatar_url": avatar_url,
        }));
        self.request_unit(request).await?;
        self.session
            .merge_user_info(UserInfo {
                nickname: Some(nickname.to_string()),
                avatar_url: Some(avatar_url.to_string()),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    /// 上传头像（multipart，file 字段）
    ///
    /// 云函数无法转发 multipart，这条路径始终直连源站，
    /// 状态码策略与普通请求一致。
    pub async fn upload_avatar(&self, path: &std::path::Path) -> Result<String> {
        let token = self
            .session
            .token()
            .await?
            .ok_or(Error::NotAuthenticated)?;

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "avatar".to_string());
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!(
            "{}/api/user/avatar/upload",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                self.shell.toast("网络请求失败");
                Error::Network(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        if status == 401 {
            self.expire_session().await;
            return Err(Error::Unauthorized);
        }
        if !(200..300).contains(&status) {
            return Err(Error::Http { status, body });
        }

        let envelope: ApiResponse<AvatarData> = serde_json::from_value(body)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        if envelope.code != 0 {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope.msg,
            });
        }
        let data = envelope
            .data
            .ok_or_else(|| Error::InvalidResponse("no data in response".to_string()))?;

        self.session
            .merge_user_info(UserInfo {
                avatar_url: Some(data.avatar_url.clone()),
                ..Default::default()
            })
            .await?;
        Ok(data.avatar_url)
    }

    /// 抽取美食，筛选条件为 None 的字段不进入查询串
    pub async fn draw(&self, params: &DrawParams) -> Result<DrawData> {
        debug!(?params, "drawing");
        let request = RequestDescriptor::post("/api/draw")
            .query_opt("meal_type", params.meal_type.map(MealType::as_i64))
            .query_opt("min_price", params.min_price)
            .query_opt("max_price", params.max_price)
            .query_opt("category", params.category.as_deref());

        let data: DrawData = self.request_data(request).await?;

        // 顺手刷新剩余次数缓存
        self.session
            .merge_user_info(UserInfo {
                remaining_times: Some(data.remaining_times),
                ..Default::default()
            })
            .await?;
        info!(food = %data.food.name, remaining = data.remaining_times, "draw ok");
        Ok(data)
    }

    /// 获取抽取记录，兼容 {records: [...]} 与裸数组
    pub async fn get_records(&self) -> Result<Vec<DrawRecord>> {
        let request = RequestDescriptor::get("/api/draw/records");
        let data: RecordsData = self.request_data(request).await?;
        Ok(data.into_records())
    }

    /// 确认选择：写入本地历史并累计抽取次数
    pub async fn confirm_choice(&self, food: &Food) -> Result<()> {
        self.session
            .push_history(HistoryEntry::from_food(food, chrono::Utc::now()))
            .await?;
        self.session.record_draw().await?;
        Ok(())
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<bool> {
        let response = self.send(RequestDescriptor::get("/health")).await?;
        Ok(response.is_success())
    }

    /// 退出登录（后端无登出路由，只清本地会话）
    pub async fn logout(&self) -> Result<()> {
        self.session.clear_session().await?;
        self.shell.toast("已退出登录");
        navigate_with_fallback(self.shell.as_ref(), Route::Login);
        info!("logged out");
        Ok(())
    }

    /// 登录完整流程：登录、机会性拉取档案、回落导航到首页
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<()> {
        self.login(username, password).await?;
        self.refresh_user_info().await?;
        navigate_with_fallback(self.shell.as_ref(), Route::Home);
        Ok(())
    }

    /// 注册完整流程：注册成功后直接登录并进入首页
    pub async fn sign_up(&self, username: &str, password: &str) -> Result<()> {
        self.register(username, password).await?;
        self.sign_in(username, password).await
    }

    /// 微信登录完整流程
    pub async fn wechat_sign_in(&self, code: &str) -> Result<bool> {
        let is_new_user = self.wechat_login(code).await?;
        self.refresh_user_info().await?;
        navigate_with_fallback(self.shell.as_ref(), Route::Home);
        Ok(is_new_user)
    }
}
