/// Placeholder values some clients send when they have no real key.
const PLACEHOLDER_CREDENTIALS: &[&str] = &["any-value", "sk-"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedCredential {
    pub credential: Option<String>,
    pub is_client_provided: bool,
}

impl ExtractedCredential {
    pub fn is_valid(&self) -> bool {
        is_valid_credential(self.credential.as_deref())
    }

    pub fn source(&self) -> &'static str {
        match (&self.credential, self.is_client_provided) {
            (None, _) => "none",
            (Some(_), true) => "client",
            (Some(_), false) => "default",
        }
    }

    /// Loggable form; the credential itself never reaches the logs.
    pub fn masked(&self) -> String {
        self.credential
            .as_deref()
            .map(mask_credential)
            .unwrap_or_default()
    }
}

/// Credential from the `Authorization` header, or `env_default` when the
/// header carries none.
pub fn extract_credential(
    authorization: Option<&str>,
    env_default: Option<&str>,
) -> ExtractedCredential {
    if let Some(token) = authorization.and_then(strip_bearer) {
        return ExtractedCredential {
            credential: Some(token.to_string()),
            is_client_provided: true,
        };
    }
    ExtractedCredential {
        credential: env_default
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        is_client_provided: false,
    }
}

/// Drops a leading `Bearer` (any case, any run of spaces after it).
/// Values without the scheme are taken as the raw token.
fn strip_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let token = match value.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
            let rest = &value[6..];
            if rest.is_empty() {
                rest
            } else if rest.starts_with(char::is_whitespace) {
                rest.trim_start()
            } else {
                value
            }
        }
        _ => value,
    };
    Some(token).filter(|token| !token.is_empty())
}

pub fn is_valid_credential(credential: Option<&str>) -> bool {
    match credential {
        None => false,
        Some(value) => !value.is_empty() && !PLACEHOLDER_CREDENTIALS.contains(&value),
    }
}

/// `sk-or…cdef` style: first five and last four characters.
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_stripped_case_insensitively() {
        let got = extract_credential(Some("Bearer sk-or-v1-abcdef"), None);
        assert_eq!(got.credential.as_deref(), Some("sk-or-v1-abcdef"));
        assert!(got.is_client_provided);

        let got = extract_credential(Some("bearer    sk-or-v1-abcdef"), None);
        assert_eq!(got.credential.as_deref(), Some("sk-or-v1-abcdef"));

        let got = extract_credential(Some("BEARER sk-or-v1-abcdef  "), None);
        assert_eq!(got.credential.as_deref(), Some("sk-or-v1-abcdef"));
    }

    #[test]
    fn raw_header_value_is_accepted() {
        let got = extract_credential(Some("sk-or-v1-abcdef"), None);
        assert_eq!(got.credential.as_deref(), Some("sk-or-v1-abcdef"));
        let got = extract_credential(Some("Bearerish-token"), None);
        assert_eq!(got.credential.as_deref(), Some("Bearerish-token"));
    }

    #[test]
    fn env_default_only_without_header_credential() {
        let got = extract_credential(None, Some("sk-env"));
        assert_eq!(got.credential.as_deref(), Some("sk-env"));
        assert!(!got.is_client_provided);

        let got = extract_credential(Some("Bearer "), Some("sk-env"));
        assert_eq!(got.credential.as_deref(), Some("sk-env"));

        let got = extract_credential(Some("Bearer sk-client"), Some("sk-env"));
        assert_eq!(got.credential.as_deref(), Some("sk-client"));
    }

    #[test]
    fn blank_env_default_is_absent() {
        let got = extract_credential(None, Some("  "));
        assert_eq!(got.credential, None);
        assert_eq!(got.source(), "none");
        assert!(!got.is_valid());
    }

    #[test]
    fn validity_predicate() {
        assert!(!is_valid_credential(None));
        assert!(!is_valid_credential(Some("")));
        assert!(!is_valid_credential(Some("any-value")));
        assert!(!is_valid_credential(Some("sk-")));
        assert!(is_valid_credential(Some("sk-or-v1-abcdef")));
    }

    #[test]
    fn placeholder_header_is_client_provided_but_invalid() {
        let got = extract_credential(Some("Bearer any-value"), Some("sk-env"));
        assert!(got.is_client_provided);
        assert!(!got.is_valid());
    }

    #[test]
    fn masking_hides_the_middle() {
        assert_eq!(mask_credential("sk-or-v1-0123456789abcdef"), "sk-or…cdef");
        assert_eq!(mask_credential("short"), "***");
    }
}
