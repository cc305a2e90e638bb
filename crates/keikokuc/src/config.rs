//! 客户端配置
//!
//! 支持配置文件加载与环境变量覆盖，默认值可直接访问公共 Keikoku 服务。

use config::{Config, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::path::Path;

/// 默认的 Keikoku 服务地址
pub const DEFAULT_API_URL: &str = "https://keikoku.herokuapp.com";

/// Keikoku 客户端配置
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    /// 未在通知上指定 API key 时使用的生产者 API key
    pub producer_api_key: Option<String>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            producer_api_key: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("keikokuc/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. 内置默认值
    /// 2. {KEIKOKU_CONFIG_DIR}/keikoku.toml（默认目录为 config，文件可不存在）
    /// 3. 环境变量（KEIKOKU_ 前缀，如 KEIKOKU_API_URL -> api_url）
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::vars().collect())
    }

    /// 使用给定的环境变量集合加载配置，不读取进程环境变量
    pub fn load_from(vars: Map<String, String>) -> Result<Self, ConfigError> {
        let config_dir = vars
            .get("KEIKOKU_CONFIG_DIR")
            .cloned()
            .unwrap_or_else(|| "config".to_string());

        let builder = Config::builder()
            .set_default("api_url", DEFAULT_API_URL)?
            .set_default("user_agent", default_user_agent())?
            .add_source(File::from(Path::new(&config_dir).join("keikoku.toml")).required(false))
            // 字段名本身含下划线，嵌套分隔符使用双下划线
            .add_source(
                Environment::with_prefix("KEIKOKU")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(vars)),
            );

        builder.build()?.try_deserialize()
    }

    /// 去掉末尾斜杠后的服务地址
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}
