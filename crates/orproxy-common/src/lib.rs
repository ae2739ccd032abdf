pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-zero:free";
pub const DEFAULT_APP_TITLE: &str = "Thor.AI API Proxy";
pub const DEFAULT_REFERER: &str = "https://thor-proxy.workers.dev";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config field {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Final configuration used by the running process.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    /// Upstream API root; the chat route is always `{base_url}/chat/completions`.
    pub base_url: String,
    pub default_model: String,
    /// Fallback upstream credential used when the caller sends none.
    pub default_credential: Option<String>,
    /// Sent upstream as `X-Title`.
    pub app_title: String,
    /// Sent upstream as `HTTP-Referer` when the caller has no `Origin`.
    pub default_referer: String,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
}

impl ProxyConfig {
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.base_url.trim_end_matches('/'))
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfigPatch::default().into_config()
    }
}

/// Config with every field optional; unset fields take the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub default_credential: Option<String>,
    pub app_title: Option<String>,
    pub default_referer: Option<String>,
    pub proxy: Option<String>,
}

impl ProxyConfigPatch {
    pub fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: self
                .default_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            default_credential: self.default_credential,
            app_title: self
                .app_title
                .unwrap_or_else(|| DEFAULT_APP_TITLE.to_string()),
            default_referer: self
                .default_referer
                .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            proxy: self.proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_uses_defaults() {
        let config = ProxyConfigPatch::default().into_config();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert!(config.default_credential.is_none());
        assert_eq!(
            config.chat_completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn set_fields_override_defaults() {
        let config = ProxyConfigPatch {
            port: Some(9100),
            default_model: Some("openai/gpt-4o".to_string()),
            ..Default::default()
        }
        .into_config();
        assert_eq!(config.port, 9100);
        assert_eq!(config.default_model, "openai/gpt-4o");
        assert_eq!(config.app_title, DEFAULT_APP_TITLE);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = ProxyConfigPatch {
            base_url: Some("http://127.0.0.1:9/api/v1/".to_string()),
            ..Default::default()
        }
        .into_config();
        assert_eq!(
            config.chat_completions_url(),
            "http://127.0.0.1:9/api/v1/chat/completions"
        );
        assert_eq!(config.models_url(), "http://127.0.0.1:9/api/v1/models");
    }
}
