use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use orproxy_common::{ConfigError, ProxyConfig, ProxyConfigPatch};

use crate::proxy_engine::ProxyEngine;
use crate::upstream_client::{UpstreamClientConfig, WreqUpstreamClient};

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "orproxy",
    version,
    about = "OpenAI/Ollama-compatible chat-completion proxy for OpenRouter"
)]
pub struct CliArgs {
    /// Bind host.
    #[arg(long, env = "ORPROXY_HOST")]
    pub host: Option<String>,

    /// Bind port.
    #[arg(long, env = "ORPROXY_PORT")]
    pub port: Option<String>,

    /// Upstream API root.
    #[arg(long, env = "ORPROXY_BASE_URL")]
    pub base_url: Option<String>,

    /// Model used when neither the query string nor the body names one.
    #[arg(long, env = "ORPROXY_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Fallback upstream credential for callers that send none.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Sent upstream as `X-Title`.
    #[arg(long, env = "ORPROXY_APP_TITLE")]
    pub app_title: Option<String>,

    /// Sent upstream as `HTTP-Referer` when the caller has no `Origin`.
    #[arg(long, env = "ORPROXY_DEFAULT_REFERER")]
    pub default_referer: Option<String>,

    /// Optional outbound proxy for upstream requests.
    #[arg(long, env = "ORPROXY_PROXY")]
    pub proxy: Option<String>,
}

pub struct Bootstrap {
    pub config: Arc<ProxyConfig>,
    pub engine: ProxyEngine,
}

pub fn bootstrap_from_env() -> anyhow::Result<Bootstrap> {
    let args = CliArgs::parse();
    bootstrap(args)
}

pub fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let config = Arc::new(config_from_args(args).context("resolve config")?);
    let client = WreqUpstreamClient::new(UpstreamClientConfig::from_proxy_config(&config))
        .context("build upstream client")?;
    let engine = ProxyEngine::new(config.clone(), Arc::new(client));
    Ok(Bootstrap { config, engine })
}

/// clap already applies CLI > ENV per field; defaults fill the rest.
pub fn config_from_args(args: CliArgs) -> Result<ProxyConfig, ConfigError> {
    let patch = ProxyConfigPatch {
        host: sanitize_optional_env_value(args.host),
        port: parse_port(args.port)?,
        base_url: sanitize_optional_env_value(args.base_url),
        default_model: sanitize_optional_env_value(args.default_model),
        default_credential: sanitize_optional_env_value(args.api_key),
        app_title: sanitize_optional_env_value(args.app_title),
        default_referer: sanitize_optional_env_value(args.default_referer),
        proxy: sanitize_optional_env_value(args.proxy),
    };
    Ok(patch.into_config())
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    // Unresolved `${VAR}` placeholders injected by some hosts count as unset.
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn parse_port(value: Option<String>) -> Result<Option<u16>, ConfigError> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    raw.parse::<u16>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidField {
            field: "port",
            message: format!("{raw}: {err}"),
        })
}
