//! Keikoku 通知
//!
//! `Notification` 表示 Keikoku 上的一条远程通知，支持发布与标记已读两种操作。
//! 客户端返回的结果会被转换为对象状态（远程标识、已读时间、校验错误）加上
//! 布尔返回值，调用方需要检查返回值来判断操作是否成功。

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::{DefaultClient, HttpClient, KeikokuClient, NotificationParams};
use crate::error::ValidationErrors;

/// 构造通知时使用的属性
///
/// 可从通用的键值映射反序列化，未知的键直接忽略。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationAttributes {
    pub message: Option<String>,
    pub account_email: Option<String>,
    pub target_name: Option<String>,
    pub severity: Option<String>,
    pub url: Option<String>,
    pub producer_api_key: Option<String>,
    pub remote_id: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub errors: Option<ValidationErrors>,
}

impl NotificationAttributes {
    /// 从键值映射构造属性，仅当已知键的值类型不匹配时失败
    pub fn from_map(map: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(map))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_account_email(mut self, account_email: impl Into<String>) -> Self {
        self.account_email = Some(account_email.into());
        self
    }

    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_producer_api_key(mut self, producer_api_key: impl Into<String>) -> Self {
        self.producer_api_key = Some(producer_api_key.into());
        self
    }

    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    pub fn with_read_at(mut self, read_at: DateTime<Utc>) -> Self {
        self.read_at = Some(read_at);
        self
    }
}

/// Keikoku 远程通知
///
/// 未注入客户端时，首次访问 `client()` 会用 `producer_api_key` 构造默认客户端。
/// 一次失败的发布会覆盖 `errors`，成功的操作不会清空它。
pub struct Notification<C = HttpClient> {
    pub message: Option<String>,
    pub account_email: Option<String>,
    pub target_name: Option<String>,
    pub severity: Option<String>,
    pub url: Option<String>,
    pub producer_api_key: Option<String>,
    /// 发布成功后由服务端分配
    pub remote_id: Option<String>,
    /// 标记已读成功后由服务端返回
    pub read_at: Option<DateTime<Utc>>,
    /// 最近一次发布失败时的校验错误
    pub errors: Option<ValidationErrors>,
    client: ClientSlot<C>,
}

/// 客户端来源：注入的客户端，或首次访问时才构造的默认客户端
enum ClientSlot<C> {
    Injected(C),
    Lazy {
        cell: OnceLock<C>,
        build: fn(Option<&str>) -> C,
    },
}

impl Notification<HttpClient> {
    /// 使用默认 HTTP 客户端构造通知
    pub fn new(attributes: NotificationAttributes) -> Self {
        Self::with_default_client(attributes)
    }
}

impl<C: DefaultClient> Notification<C> {
    /// 首次访问 `client()` 时用当时的 `producer_api_key` 构造 `C` 的默认客户端
    pub fn with_default_client(attributes: NotificationAttributes) -> Self {
        Self::from_parts(
            attributes,
            ClientSlot::Lazy {
                cell: OnceLock::new(),
                build: C::default_client,
            },
        )
    }
}

impl<C> Notification<C> {
    /// 使用注入的客户端构造通知，`client()` 将原样返回该客户端
    pub fn with_client(attributes: NotificationAttributes, client: C) -> Self {
        Self::from_parts(attributes, ClientSlot::Injected(client))
    }

    fn from_parts(attributes: NotificationAttributes, client: ClientSlot<C>) -> Self {
        let NotificationAttributes {
            message,
            account_email,
            target_name,
            severity,
            url,
            producer_api_key,
            remote_id,
            read_at,
            errors,
        } = attributes;

        Self {
            message,
            account_email,
            target_name,
            severity,
            url,
            producer_api_key,
            remote_id,
            read_at,
            errors,
            client,
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_published(&self) -> bool {
        self.remote_id.is_some()
    }

    /// 当前属性对应的发布请求体
    pub fn params(&self) -> NotificationParams {
        NotificationParams {
            message: self.message.clone(),
            account_email: self.account_email.clone(),
            target_name: self.target_name.clone(),
            severity: self.severity.clone(),
            url: self.url.clone(),
        }
    }

    pub fn client(&self) -> &C {
        match &self.client {
            ClientSlot::Injected(client) => client,
            ClientSlot::Lazy { cell, build } => {
                cell.get_or_init(|| build(self.producer_api_key.as_deref()))
            }
        }
    }
}

impl<C: KeikokuClient> Notification<C> {
    /// 发布通知
    ///
    /// 成功时记录 `remote_id` 并返回 true；失败时用客户端返回的校验错误
    /// 覆盖 `errors`（非校验类失败则置空）并返回 false。
    pub async fn publish(&mut self) -> bool {
        let params = self.params();
        let result = self.client().post_notification(&params).await;

        match result {
            Ok(published) => {
                info!(
                    remote_id = %published.id,
                    account_email = ?self.account_email,
                    "通知已发布"
                );
                self.remote_id = Some(published.id);
                true
            }
            Err(e) => {
                warn!(error = %e, account_email = ?self.account_email, "通知发布失败");
                self.errors = e.into_validation_errors();
                false
            }
        }
    }

    /// 标记通知为已读
    ///
    /// `remote_id` 未设置时以空字符串交给客户端处理。失败时不修改 `read_at`。
    pub async fn read(&mut self) -> bool {
        let remote_id = self.remote_id.clone().unwrap_or_default();
        let result = self.client().read_notification(&remote_id).await;

        match result {
            Ok(receipt) => {
                info!(remote_id = %remote_id, read_at = %receipt.read_at, "通知已标记为已读");
                self.read_at = Some(receipt.read_at);
                true
            }
            Err(e) => {
                warn!(error = %e, remote_id = %remote_id, "标记通知已读失败");
                false
            }
        }
    }
}

impl<C> fmt::Debug for Notification<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("message", &self.message)
            .field("account_email", &self.account_email)
            .field("target_name", &self.target_name)
            .field("severity", &self.severity)
            .field("url", &self.url)
            .field("remote_id", &self.remote_id)
            .field("read_at", &self.read_at)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
