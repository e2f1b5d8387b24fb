use regex::Regex;
use std::sync::OnceLock;

/// Patterns stripped from messages before they reach the log
pub struct SanitizationPatterns {
    email: Regex,
    bearer_token: Regex,
    jwt: Regex,
    api_key: Regex,
    credential_field: Regex,
    query_secret: Regex,
}

static PATTERNS: OnceLock<SanitizationPatterns> = OnceLock::new();

fn compile(pattern: &str) -> Regex {
    // Patterns are literals covered by tests
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid sanitization pattern {}: {}", pattern, e))
}

/// Compiled sanitization patterns
pub fn get_patterns() -> &'static SanitizationPatterns {
    PATTERNS.get_or_init(|| SanitizationPatterns {
        // Patient and staff emails - keep the domain
        email: compile(r"\b([a-zA-Z0-9._%+-]+)@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b"),

        // Session tokens in echoed headers
        bearer_token: compile(r"Bearer\s+[a-zA-Z0-9\-_\.=]+"),

        // Bare JWTs
        jwt: compile(r"\beyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+"),

        // API keys with common prefixes
        api_key: compile(r"\b(sk_|pk_|api_|key_)[a-zA-Z0-9_]{15,}\b"),

        // password: x, secret=x, token: x
        credential_field: compile(r"(?i)\b(password|passwd|pwd|secret|token)\s*[:=]\s*[^\s&]+"),

        // ?access_token=..&refresh=..
        query_secret: compile(r"(?i)([?&](?:access_token|refresh|refresh_token|api_key)=)[^&\s]+"),
    })
}

/// Remove credentials and personal data from a log message
///
/// - Emails become `***@domain`
/// - Bearer tokens, JWTs and API keys become `[REDACTED]`
/// - `password=..`-style fields and secret query parameters keep their key
pub fn sanitize_log_message(message: &str) -> String {
    let patterns = get_patterns();
    let mut result = message.to_string();

    result = patterns.query_secret.replace_all(&result, "${1}[REDACTED]").to_string();
    result = patterns.bearer_token.replace_all(&result, "Bearer [REDACTED]").to_string();
    result = patterns.jwt.replace_all(&result, "[REDACTED]").to_string();
    result = patterns.api_key.replace_all(&result, "[REDACTED]").to_string();
    result = patterns.credential_field.replace_all(&result, "$1=[REDACTED]").to_string();
    result = patterns.email.replace_all(&result, "***@$2").to_string();

    result
}
