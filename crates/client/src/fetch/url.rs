//! URL resolution for intercepted requests and manifest entries.

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request target against the site base URL.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Absolute inputs (`scheme://...`) are parsed as-is; anything else,
///    including `./` and `index.html`, is joined onto `base`
/// 3. Only http and https are accepted
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// Hosts come out lowercased because the URL parser normalizes them.
pub fn resolve(base: &url::Url, input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed)
    } else {
        base.join(trimmed)
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Resolve every manifest entry, preserving order.
///
/// # Errors
///
/// Fails on the first entry that does not resolve.
pub fn resolve_manifest<S: AsRef<str>>(base: &url::Url, entries: &[S]) -> Result<Vec<url::Url>, UrlError> {
    entries.iter().map(|e| resolve(base, e.as_ref())).collect()
}
