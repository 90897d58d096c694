//! 请求传输层
//!
//! 两种传输方式：直连后端源站，或经云函数代理转发。两者接收同一种
//! 请求描述，返回同一种 `RawResponse`（HTTP 错误状态也在其中返回，
//! 只有传输本身失败才是 Err），状态码策略统一放在上层客户端处理。

use crate::error::{Error, Result};
use crate::types::ProxyEnvelope;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// 请求描述，每次调用重新构建
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            path: path.to_string(),
            method,
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// 追加查询参数
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// 值为 None 的参数整体省略，不会序列化出 "undefined" 之类的字面量
    pub fn query_opt(mut self, key: &str, value: Option<impl ToString>) -> Self {
        if let Some(value) = value {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    /// Authorization 头由客户端在发送前最后附加，调用方的额外头不会覆盖它
    pub(crate) fn bearer(mut self, token: &str) -> Self {
        self.headers
            .retain(|(key, _)| !key.eq_ignore_ascii_case("authorization"));
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {}", token)));
        self
    }

    /// path + 已编码查询串（代理转发时整体放进 url 字段）
    pub fn path_with_query(&self) -> Result<String> {
        if self.query.is_empty() {
            return Ok(self.path.clone());
        }
        let encoded = serde_urlencoded::to_string(&self.query)
            .map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(format!("{}?{}", self.path, encoded))
    }
}

/// 传输层返回的原始响应
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输方式接口，启动时按配置选定一种注入客户端
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse>;
}

fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// 直连源站
pub struct DirectTransport {
    http: reqwest::Client,
    base_url: String,
}

impl DirectTransport {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = request.method.as_str(), %url, "direct request");

        let mut builder = self
            .http
            .request(request.method.to_reqwest(), &url)
            .header("Content-Type", "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(RawResponse {
            status,
            body: parse_body(&text),
        })
    }
}

/// 解开云函数的 {success, statusCode, data, error} 包装
///
/// 远端调用成功但转发失败（success=false）时仍返回 RawResponse，
/// 401 等状态码的处理与直连路径共用同一套逻辑。
pub fn unwrap_proxy_envelope(envelope: ProxyEnvelope) -> RawResponse {
    let body = if envelope.data.is_null() {
        match envelope.error {
            Some(error) => json!({ "msg": error }),
            None => Value::Null,
        }
    } else {
        envelope.data
    };
    RawResponse {
        status: envelope.status_code,
        body,
    }
}

/// 经云函数代理转发
///
/// 执行环境禁止直连非白名单源站时使用：把 {url, method, data, headers}
/// 交给远端可调用函数，由它在服务端向同一源站发请求。
pub struct ProxyTransport {
    http: reqwest::Client,
    function_url: String,
}

impl ProxyTransport {
    pub fn new(http: reqwest::Client, function_url: &str) -> Self {
        Self {
            http,
            function_url: function_url.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
        let url = request.path_with_query()?;
        debug!(method = request.method.as_str(), %url, "proxied request");

        let headers: serde_json::Map<String, Value> = request
            .headers
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        let payload = json!({
            "url": url,
            "method": request.method.as_str(),
            "data": request.body.clone().unwrap_or_else(|| json!({})),
            "headers": headers,
        });

        let response = self
            .http
            .post(&self.function_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Network(format!("proxy call failed: {}", e)))?;

        let envelope: ProxyEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("proxy response: {}", e)))?;

        Ok(unwrap_proxy_envelope(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_opt_omits_none() {
        let request = RequestDescriptor::post("/api/draw")
            .query_opt("meal_type", Some(2))
            .query_opt("min_price", None::<f64>)
            .query_opt("max_price", Some(80))
            .query_opt("category", None::<String>);

        let url = request.path_with_query().unwrap();
        assert_eq!(url, "/api/draw?meal_type=2&max_price=80");
        assert!(!url.contains("min_price"));
        assert!(!url.contains("undefined"));
    }

    #[test]
    fn test_query_encodes_unicode_category() {
        let request = RequestDescriptor::post("/api/draw").query("category", "中餐");
        let url = request.path_with_query().unwrap();
        assert_eq!(url, "/api/draw?category=%E4%B8%AD%E9%A4%90");
    }

    #[test]
    fn test_path_without_query_is_untouched() {
        let request = RequestDescriptor::get("/api/draw/records");
        assert_eq!(request.path_with_query().unwrap(), "/api/draw/records");
    }

    #[test]
    fn test_bearer_wins_over_caller_header() {
        let request = RequestDescriptor::get("/api/user/info")
            .header("Authorization", "Bearer stale")
            .bearer("fresh");
        let auth: Vec<_> = request
            .headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("authorization"))
            .collect();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].1, "Bearer fresh");
    }

    #[test]
    fn test_unwrap_proxy_envelope_success() {
        let envelope: ProxyEnvelope = serde_json::from_value(json!({
            "success": true,
            "statusCode": 200,
            "data": {"code": 0, "msg": "success", "data": {"access_token": "T"}}
        }))
        .unwrap();
        let raw = unwrap_proxy_envelope(envelope);
        assert_eq!(raw.status, 200);
        assert!(raw.is_success());
        assert_eq!(raw.body["data"]["access_token"], "T");
    }

    #[test]
    fn test_unwrap_proxy_envelope_forwarded_failure() {
        // 转发得到 401：状态码保留，交给上层统一处理
        let envelope: ProxyEnvelope = serde_json::from_value(json!({
            "success": false,
            "statusCode": 401,
            "data": {"detail": "Not authenticated"},
            "error": "Request failed with status code 401"
        }))
        .unwrap();
        let raw = unwrap_proxy_envelope(envelope);
        assert_eq!(raw.status, 401);
        assert_eq!(raw.body["detail"], "Not authenticated");
    }

    #[test]
    fn test_unwrap_proxy_envelope_infrastructure_failure() {
        let envelope: ProxyEnvelope = serde_json::from_value(json!({
            "success": false,
            "statusCode": 500,
            "data": null,
            "error": "connect ECONNREFUSED"
        }))
        .unwrap();
        let raw = unwrap_proxy_envelope(envelope);
        assert_eq!(raw.status, 500);
        assert_eq!(raw.body["msg"], "connect ECONNREFUSED");
    }

    #[test]
    fn test_parse_body_falls_back_to_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"code\":0}"), json!({"code": 0}));
        assert_eq!(parse_body("oops"), Value::String("oops".to_string()));
    }
}
