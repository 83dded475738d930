//! Normalization of user-typed URLs for remote CSV loading.

use reqwest::Url;

use crate::error::ValidationError;

const GITHUB_HOST: &str = "github.com";
const GITHUB_WWW_HOST: &str = "www.github.com";
const GITHUB_RAW_HOST: &str = "raw.githubusercontent.com";

/// True when `input` parses as an absolute `http`/`https` URL.
pub fn is_valid_url(input: &str) -> bool {
    match Url::parse(input) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Rewrite a GitHub web UI link (`github.com/<u>/<r>/blob/<ref>/<path>`) to
/// its raw-content equivalent. Anything else passes through unchanged.
pub fn to_raw_github_url(input: &str) -> String {
    if !input.contains(GITHUB_HOST) || input.contains(GITHUB_RAW_HOST) {
        return input.to_string();
    }
    let host = if input.contains(GITHUB_WWW_HOST) {
        GITHUB_WWW_HOST
    } else {
        GITHUB_HOST
    };
    input
        .replacen(host, GITHUB_RAW_HOST, 1)
        .replacen("/blob/", "/", 1)
}

/// Full pipeline used before a URL is submitted to the CSV endpoint.
pub fn normalize_csv_url(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let mut url = to_raw_github_url(trimmed);
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("https://{}", url);
    }

    if !is_valid_url(&url) {
        return Err(ValidationError::InvalidUrl);
    }
    Ok(url)
}
