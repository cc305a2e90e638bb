//! Keikoku 通知客户端
//!
//! 封装 Keikoku 通知服务的远程资源：`Notification` 负责发布与已读标记，
//! 具体的网络调用通过 `KeikokuClient` trait 注入，默认使用基于 HTTP 的实现。
//! 所有远程失败都以布尔返回值加对象状态的方式暴露，不向调用方抛出错误。

pub mod client;
pub mod config;
pub mod error;
pub mod notification;

pub use client::{
    DefaultClient, HttpClient, KeikokuClient, NotificationParams, PublishedNotification,
    ReadReceipt,
};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, ValidationErrors};
pub use notification::{Notification, NotificationAttributes};
