use serde::{Deserialize, Serialize};

pub const PROXY_ERROR_TYPE: &str = "proxy_error";

/// `{"error": {...}}` envelope the proxy emits in place of an upstream error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyErrorEnvelope {
    pub error: ProxyErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyErrorBody {
    pub message: String,
    pub code: String,
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProxyErrorEnvelope {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: ProxyErrorBody {
                message: message.into(),
                code: code.into(),
                r#type: PROXY_ERROR_TYPE.to_string(),
                provider: None,
                model: None,
            },
        }
    }

    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.error.provider = provider;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.error.model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_fields_are_omitted() {
        let value = serde_json::to_value(ProxyErrorEnvelope::new("slow down", "429")).unwrap();
        assert_eq!(
            value,
            json!({"error": {"message": "slow down", "code": "429", "type": "proxy_error"}})
        );
    }

    #[test]
    fn provider_and_model_are_serialized_when_known() {
        let envelope = ProxyErrorEnvelope::new("m", "503")
            .with_provider(Some("Together".to_string()))
            .with_model(Some("meta-llama/llama-3-70b".to_string()));
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(value["error"]["provider"], json!("Together"));
        assert_eq!(value["error"]["model"], json!("meta-llama/llama-3-70b"));
    }
}
