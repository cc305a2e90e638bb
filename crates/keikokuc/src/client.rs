//! Keikoku 客户端
//!
//! 通过 `KeikokuClient` trait 抽象对 Keikoku 服务的远程调用，`Notification`
//! 只依赖该 trait，测试或其它传输方式只需实现同一 trait 即可注入。
//! `HttpClient` 为基于 reqwest 的默认实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, ValidationErrors};

/// 发布通知的请求体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// 发布成功的响应体
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishedNotification {
    /// 服务端分配的标识，数字形式的 id 统一转为字符串
    #[serde(deserialize_with = "deserialize_remote_id")]
    pub id: String,
}

/// 标记已读成功的响应体
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadReceipt {
    pub read_at: DateTime<Utc>,
}

fn deserialize_remote_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Keikoku 客户端 trait，`Notification` 通过它完成远程调用
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeikokuClient: Send + Sync {
    /// 发布通知，成功时返回服务端分配的标识
    async fn post_notification(
        &self,
        params: &NotificationParams,
    ) -> ClientResult<PublishedNotification>;

    /// 将通知标记为已读
    async fn read_notification(&self, remote_id: &str) -> ClientResult<ReadReceipt>;
}

/// 未注入客户端时，`Notification` 用于构造默认客户端
pub trait DefaultClient: Sized {
    fn default_client(producer_api_key: Option<&str>) -> Self;
}

// ---------------------------------------------------------------------------
// HTTP 客户端
// ---------------------------------------------------------------------------

/// 422 响应体，`errors` 缺失时视为空的校验错误
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Option<ValidationErrors>,
}

/// 基于 reqwest 的 Keikoku 客户端
///
/// 以生产者 API key 作为 HTTP basic auth 用户名（密码为空）进行认证。
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    api_url: String,
    user_agent: String,
    producer_api_key: Option<String>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig, producer_api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.base_url().to_string(),
            user_agent: config.user_agent.clone(),
            producer_api_key,
        }
    }

    pub fn producer_api_key(&self) -> Option<&str> {
        self.producer_api_key.as_deref()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// 拼接接口地址，每个路径段单独做百分号编码
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let invalid = |reason: String| ClientError::InvalidApiUrl {
            api_url: self.api_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("地址不能作为基础路径".to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn post(&self, url: Url) -> RequestBuilder {
        debug!(url = %url, "请求 Keikoku");

        let request = self
            .http
            .post(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent);
        match &self.producer_api_key {
            Some(key) => request.basic_auth(key, None::<&str>),
            None => request,
        }
    }

    /// 按状态码解析响应，`remote_id` 仅用于 404 时构造错误
    async fn handle_response<T: DeserializeOwned>(
        resp: Response,
        remote_id: Option<&str>,
    ) -> ClientResult<T> {
        let status = resp.status();
        if status.is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let body = resp.text().await?;
        match (status, remote_id) {
            (StatusCode::UNAUTHORIZED, _) => Err(ClientError::Unauthorized),
            (StatusCode::NOT_FOUND, Some(remote_id)) => Err(ClientError::NotFound {
                remote_id: remote_id.to_string(),
            }),
            (StatusCode::UNPROCESSABLE_ENTITY, _) => {
                let errors = serde_json::from_str::<ErrorBody>(&body)
                    .ok()
                    .and_then(|b| b.errors)
                    .unwrap_or_default();
                Err(ClientError::InvalidNotification(errors))
            }
            _ => Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

#[async_trait]
impl KeikokuClient for HttpClient {
    async fn post_notification(
        &self,
        params: &NotificationParams,
    ) -> ClientResult<PublishedNotification> {
        let url = self.endpoint(&["notifications"])?;
        let resp = self.post(url).json(params).send().await?;
        Self::handle_response(resp, None).await
    }

    async fn read_notification(&self, remote_id: &str) -> ClientResult<ReadReceipt> {
        let url = self.endpoint(&["notifications", remote_id, "read"])?;
        let resp = self.post(url).send().await?;
        Self::handle_response(resp, Some(remote_id)).await
    }
}

impl DefaultClient for HttpClient {
    /// 通知上的 API key 优先于配置中的 API key
    fn default_client(producer_api_key: Option<&str>) -> Self {
        let config = ClientConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "加载 Keikoku 配置失败，使用默认配置");
            ClientConfig::default()
        });
        let producer_api_key = producer_api_key
            .map(str::to_owned)
            .or_else(|| config.producer_api_key.clone());
        Self::new(&config, producer_api_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_skip_absent_fields() {
        let params = NotificationParams {
            message: Some("hello".to_string()),
            account_email: Some("harold@heroku.com".to_string()),
            ..Default::default()
        };

        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "message": "hello",
                "account_email": "harold@heroku.com"
            })
        );
    }

    #[test]
    fn test_published_notification_accepts_numeric_and_text_id() {
        let numeric: PublishedNotification = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(numeric.id, "1");

        let text: PublishedNotification = serde_json::from_str(r#"{"id": "abc-1"}"#).unwrap();
        assert_eq!(text.id, "abc-1");

        let large: PublishedNotification =
            serde_json::from_str(r#"{"id": 18446744073709551615}"#).unwrap();
        assert_eq!(large.id, "18446744073709551615");

        assert!(serde_json::from_str::<PublishedNotification>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn test_read_receipt_parses_timestamp() {
        let receipt: ReadReceipt =
            serde_json::from_str(r#"{"read_at": "2024-05-01T12:30:00Z"}"#).unwrap();
        assert_eq!(receipt.read_at.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn test_http_client_urls() {
        let config = ClientConfig {
            api_url: "http://localhost:5000/".to_string(),
            ..Default::default()
        };
        let client = HttpClient::new(&config, Some("producer-key".to_string()));

        assert_eq!(client.api_url(), "http://localhost:5000");
        assert_eq!(client.producer_api_key(), Some("producer-key"));
        assert_eq!(
            client
                .endpoint(&["notifications", "1234", "read"])
                .unwrap()
                .as_str(),
            "http://localhost:5000/api/v1/notifications/1234/read"
        );
    }

    #[test]
    fn test_endpoint_escapes_remote_id() {
        let client = HttpClient::new(&ClientConfig::default(), None);

        let url = client
            .endpoint(&["notifications", "1/read?x=#y", "read"])
            .unwrap();
        assert_eq!(url.path(), "/api/v1/notifications/1%2Fread%3Fx=%23y/read");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());

        let empty = client.endpoint(&["notifications", "", "read"]).unwrap();
        assert_eq!(empty.path(), "/api/v1/notifications//read");
    }

    #[test]
    fn test_endpoint_rejects_invalid_api_url() {
        let config = ClientConfig {
            api_url: "not a url".to_string(),
            ..Default::default()
        };
        let client = HttpClient::new(&config, None);

        let err = client.endpoint(&["notifications"]).unwrap_err();
        assert!(matches!(err, ClientError::InvalidApiUrl { .. }));
    }

    #[test]
    fn test_default_client_prefers_given_key() {
        let client = HttpClient::default_client(Some("fake-api-key"));
        assert_eq!(client.producer_api_key(), Some("fake-api-key"));
    }
}
