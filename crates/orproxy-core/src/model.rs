use tracing::debug;

/// Vendor prefixes a bare model name may already carry.
pub const KNOWN_VENDOR_PREFIXES: &[&str] =
    &["openai/", "google/", "anthropic/", "meta-llama/", "mistral/"];

pub const DEFAULT_VENDOR_PREFIX: &str = "openai/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Url,
    Body,
    Default,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSource::Url => "url",
            ModelSource::Body => "body",
            ModelSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub id: String,
    pub source: ModelSource,
}

/// URL query parameter, then body field, then the configured default.
/// Empty strings count as absent. The winner is canonicalized.
pub fn resolve_model(
    url_param: Option<&str>,
    body_model: Option<&str>,
    default: &str,
) -> ResolvedModel {
    let (selected, source) = match (
        url_param.filter(|m| !m.is_empty()),
        body_model.filter(|m| !m.is_empty()),
    ) {
        (Some(model), _) => (model, ModelSource::Url),
        (None, Some(model)) => (model, ModelSource::Body),
        (None, None) => (default, ModelSource::Default),
    };
    debug!(model = %selected, source = source.as_str(), "model selected");

    let id = canonicalize_model(selected);
    if id != selected {
        debug!(model = %id, "vendor prefix added");
    }
    ResolvedModel { id, source }
}

/// Prepends `openai/` to a bare name. Names that already contain `/` are
/// returned unchanged, so the rule is idempotent.
pub fn canonicalize_model(model: &str) -> String {
    let has_vendor = model.contains('/')
        || KNOWN_VENDOR_PREFIXES
            .iter()
            .any(|prefix| model.starts_with(prefix));
    if has_vendor {
        model.to_string()
    } else {
        format!("{DEFAULT_VENDOR_PREFIX}{model}")
    }
}
