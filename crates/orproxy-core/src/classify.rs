//! Maps upstream failures onto [`ErrorKind`] and renders the text clients see.
//!
//! Status codes win; keyword matching is the fallback for streamed errors that
//! arrive without a usable code.

use crate::error::ErrorKind;

const REGION_MARKERS: &[&str] = &[
    "user location is not supported",
    "location is not supported",
    "not available in your region",
    "unsupported_country_region_territory",
    "country, region, or territory not supported",
];

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate-limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "quota exceeded",
    "exceeded your current quota",
    "quota_exceeded",
    "resource_exhausted",
];

const CREDIT_MARKERS: &[&str] = &[
    "insufficient credits",
    "insufficient_credits",
    "requires more credits",
    "payment required",
];

const MODERATION_MARKERS: &[&str] = &["flagged", "moderation"];

const CREDENTIAL_MARKERS: &[&str] = &[
    "invalid api key",
    "no auth credentials",
    "user not found",
    "unauthorized",
];

const MODEL_NOT_FOUND_MARKERS: &[&str] = &["is not a valid model", "model not found"];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout"];

const NO_PROVIDER_MARKERS: &[&str] = &[
    "no endpoints found",
    "no allowed providers",
    "no available providers",
];

pub fn mentions_region_restriction(text: &str) -> bool {
    contains_any(&text.to_ascii_lowercase(), REGION_MARKERS)
}

pub fn mentions_rate_limit(text: &str) -> bool {
    contains_any(&text.to_ascii_lowercase(), RATE_LIMIT_MARKERS)
}

pub fn mentions_moderation(text: &str) -> bool {
    contains_any(&text.to_ascii_lowercase(), MODERATION_MARKERS)
}

/// Fixed status table. `context` is the upstream text, consulted only for the
/// 400 region sub-case and the 403 moderation sub-case.
pub fn kind_from_status(status: u16, context: &str) -> Option<ErrorKind> {
    let kind = match status {
        400 => ErrorKind::BadRequest {
            region_unsupported: mentions_region_restriction(context),
        },
        401 => ErrorKind::InvalidCredential,
        402 => ErrorKind::InsufficientCredit,
        403 if mentions_moderation(context) => ErrorKind::ContentModerated,
        403 => ErrorKind::InvalidCredential,
        404 => ErrorKind::ModelNotFound,
        408 => ErrorKind::RequestTimeout,
        429 => ErrorKind::RateLimited,
        502 => ErrorKind::UpstreamModelDown,
        503 => ErrorKind::NoProviderAvailable,
        _ => return None,
    };
    Some(kind)
}

/// Keyword fallback, checked in a fixed order.
pub fn kind_from_keywords(text: &str) -> Option<ErrorKind> {
    let text = text.to_ascii_lowercase();
    if contains_any(&text, REGION_MARKERS) {
        return Some(ErrorKind::BadRequest {
            region_unsupported: true,
        });
    }
    if contains_any(&text, RATE_LIMIT_MARKERS) {
        return Some(ErrorKind::RateLimited);
    }
    if contains_any(&text, CREDIT_MARKERS) {
        return Some(ErrorKind::InsufficientCredit);
    }
    if contains_any(&text, MODERATION_MARKERS) {
        return Some(ErrorKind::ContentModerated);
    }
    if contains_any(&text, CREDENTIAL_MARKERS) {
        return Some(ErrorKind::InvalidCredential);
    }
    if contains_any(&text, MODEL_NOT_FOUND_MARKERS) {
        return Some(ErrorKind::ModelNotFound);
    }
    if contains_any(&text, NO_PROVIDER_MARKERS) {
        return Some(ErrorKind::NoProviderAvailable);
    }
    if contains_any(&text, TIMEOUT_MARKERS) {
        return Some(ErrorKind::RequestTimeout);
    }
    None
}

/// What is known about one upstream failure when rendering its message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorContext<'a> {
    pub status: Option<u16>,
    pub detail: Option<&'a str>,
    pub provider: Option<&'a str>,
    pub model: Option<&'a str>,
}

/// `<title> (<status>) [from provider P] [for model M]: <detail>. <remediation>`
pub fn render_message(kind: ErrorKind, ctx: &ErrorContext<'_>) -> String {
    let mut out = String::from(title(kind));
    if let Some(status) = ctx.status {
        out.push_str(&format!(" ({status})"));
    }
    if let Some(provider) = ctx.provider.filter(|p| !p.is_empty()) {
        out.push_str(&format!(" from provider {provider}"));
    }
    if let Some(model) = ctx.model.filter(|m| !m.is_empty()) {
        out.push_str(&format!(" for model {model}"));
    }
    if let Some(detail) = ctx.detail.map(str::trim).filter(|d| !d.is_empty()) {
        out.push_str(": ");
        out.push_str(detail);
    }
    out.push_str(". ");
    out.push_str(&remediation(kind, ctx.model));
    out
}

/// Fallback for statuses outside the table.
pub fn render_unclassified(status: u16, detail: &str) -> String {
    format!("Upstream error {status}: {detail}")
}

fn title(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::BadRequest {
            region_unsupported: true,
        } => "Region not supported",
        ErrorKind::BadRequest { .. } => "Bad request",
        ErrorKind::InvalidCredential => "Invalid API key",
        ErrorKind::InsufficientCredit => "Insufficient credits",
        ErrorKind::ContentModerated => "Content flagged by moderation",
        ErrorKind::ModelNotFound => "Model not found",
        ErrorKind::RequestTimeout => "Request timeout",
        ErrorKind::RateLimited => "Rate limit exceeded",
        ErrorKind::UpstreamModelDown => "Model is down",
        ErrorKind::NoProviderAvailable => "No provider available",
        ErrorKind::ResponseParseFailure => "Response parse failure",
        ErrorKind::ProcessingPlaceholder => "Request still processing",
        ErrorKind::TransportFailure => "Proxy request failed",
    }
}

fn remediation(kind: ErrorKind, model: Option<&str>) -> String {
    match kind {
        ErrorKind::BadRequest {
            region_unsupported: true,
        } => "The provider serving this model does not accept requests from your location; \
              choose a different model or provider."
            .to_string(),
        ErrorKind::BadRequest { .. } => "Check the request parameters and body. Browser \
              clients should also make sure the call is not blocked by CORS."
            .to_string(),
        ErrorKind::InvalidCredential => format!(
            "Check your OpenRouter API key; create one at {} and send it as \
             `Authorization: Bearer <key>`.",
            crate::error::CREDENTIAL_DOCS_URL
        ),
        ErrorKind::InsufficientCredit => {
            "Add credit to your OpenRouter account at https://openrouter.ai/credits.".to_string()
        }
        ErrorKind::ContentModerated => "Modify the input and try again.".to_string(),
        ErrorKind::ModelNotFound => format!(
            "The model `{}` is not available; check the model id at https://openrouter.ai/models.",
            model.unwrap_or("unknown")
        ),
        ErrorKind::RequestTimeout => {
            "Try a shorter prompt or a simpler request.".to_string()
        }
        ErrorKind::RateLimited => "Try a different model, wait a moment before retrying, \
              or upgrade your plan for higher limits."
            .to_string(),
        ErrorKind::UpstreamModelDown => {
            "Retry shortly or choose a different model.".to_string()
        }
        ErrorKind::NoProviderAvailable => {
            "No provider can serve this model right now; choose a different model.".to_string()
        }
        ErrorKind::ResponseParseFailure => {
            "The upstream returned a body that is not valid JSON.".to_string()
        }
        ErrorKind::ProcessingPlaceholder => {
            "Retry with streaming enabled or use a different model.".to_string()
        }
        ErrorKind::TransportFailure => "The proxy could not reach the upstream.".to_string(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
