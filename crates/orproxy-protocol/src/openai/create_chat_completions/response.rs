use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::openai::create_chat_completions::types::{
    ChatCompletionFinishReason, ChatCompletionResponseMessage, ChatCompletionResponseRole,
    CompletionUsage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatCompletionObjectType {
    #[serde(rename = "chat.completion")]
    ChatCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChatCompletionChoice {
    pub index: i64,
    pub message: ChatCompletionResponseMessage,
    pub finish_reason: ChatCompletionFinishReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CreateChatCompletionResponse {
    pub id: String,
    pub object: ChatCompletionObjectType,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

impl CreateChatCompletionResponse {
    /// A single-choice assistant reply produced by the proxy itself
    /// (placeholder and error responses), with zeroed usage.
    pub fn synthetic(
        id_prefix: &str,
        model: impl Into<String>,
        content: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id: completion_id(id_prefix, now),
            object: ChatCompletionObjectType::ChatCompletion,
            created: now.unix_timestamp(),
            model: model.into(),
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ChatCompletionResponseMessage {
                    role: ChatCompletionResponseRole::Assistant,
                    content: content.into(),
                },
                finish_reason: ChatCompletionFinishReason::Stop,
            }],
            usage: Some(CompletionUsage::default()),
        }
    }
}

/// `<prefix>-<unix millis>`.
pub fn completion_id(prefix: &str, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{prefix}-{millis}")
}
