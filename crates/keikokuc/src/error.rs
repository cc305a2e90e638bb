//! 客户端错误类型
//!
//! 定义调用 Keikoku 服务时可能出现的错误分类。`Notification` 只关心是否出错，
//! 以及校验失败时携带的字段级错误信息，其余分类供直接使用客户端的调用方判断。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 字段级校验错误
///
/// 对应服务端返回的 `{ "attributes": { "<field>": ["<message>", ...] } }`，
/// 按字段名排序，便于稳定输出。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// 获取某个字段的错误信息，没有错误时返回空切片
    pub fn on(&self, field: &str) -> &[String] {
        self.attributes
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.values().all(Vec::is_empty)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.attributes {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{} {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("通知校验失败: {0}")]
    InvalidNotification(ValidationErrors),

    #[error("生产者 API key 无效或缺失")]
    Unauthorized,

    #[error("通知不存在: remote_id={remote_id}")]
    NotFound { remote_id: String },

    #[error("Keikoku 返回异常状态: status={status}, body={body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Keikoku 服务地址无效: {api_url} ({reason})")]
    InvalidApiUrl { api_url: String, reason: String },

    #[error("请求 Keikoku 失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("响应解析失败: {0}")]
    Decode(#[from] serde_json::Error),
}

/// 客户端调用结果类型别名
pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// 校验失败时携带的字段级错误
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::InvalidNotification(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn into_validation_errors(self) -> Option<ValidationErrors> {
        match self {
            Self::InvalidNotification(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_not_present() -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        errors
            .attributes
            .insert("message".to_string(), vec!["is not present".to_string()]);
        errors
    }

    #[test]
    fn test_error_display() {
        let invalid = ClientError::InvalidNotification(message_not_present());
        assert_eq!(invalid.to_string(), "通知校验失败: message is not present");

        let not_found = ClientError::NotFound {
            remote_id: "1234".to_string(),
        };
        assert_eq!(not_found.to_string(), "通知不存在: remote_id=1234");

        let status = ClientError::UnexpectedStatus {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(
            status.to_string(),
            "Keikoku 返回异常状态: status=503, body=unavailable"
        );
    }

    #[test]
    fn test_validation_errors_only_on_invalid_notification() {
        let invalid = ClientError::InvalidNotification(message_not_present());
        assert_eq!(
            invalid.validation_errors().map(|e| e.on("message")),
            Some(&["is not present".to_string()][..])
        );

        assert!(ClientError::Unauthorized.validation_errors().is_none());
        assert!(ClientError::Unauthorized.into_validation_errors().is_none());
    }

    #[test]
    fn test_validation_errors_deserialize() {
        let errors: ValidationErrors = serde_json::from_value(serde_json::json!({
            "attributes": {
                "message": ["is not present"],
                "account_email": ["is invalid", "is too long"]
            }
        }))
        .unwrap();

        assert_eq!(errors.on("message"), ["is not present"]);
        assert_eq!(errors.on("account_email").len(), 2);
        assert!(errors.on("url").is_empty());
        assert!(!errors.is_empty());
        assert_eq!(
            errors.to_string(),
            "account_email is invalid; account_email is too long; message is not present"
        );
    }

    #[test]
    fn test_validation_errors_missing_attributes() {
        let errors: ValidationErrors = serde_json::from_str("{}").unwrap();
        assert!(errors.is_empty());
        assert_eq!(errors.to_string(), "");
    }
}
