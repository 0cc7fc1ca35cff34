//! Authentication utilities for API requests
//!
//! The backend accepts a bearer token on every authenticated endpoint,
//! streaming or not.

/// Add the bearer `Authorization` header to an HTTP request
///
/// Surrounding whitespace in the stored token is ignored so tokens pasted into
/// the keyring prompt with a trailing newline still work.
pub fn add_auth_headers(request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
    request.header(reqwest::header::AUTHORIZATION, bearer_value(token))
}

pub fn bearer_value(token: &str) -> String {
    format!("Bearer {}", token.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_is_added() {
        let client = reqwest::Client::new();
        let request = add_auth_headers(client.get("https://example.com"), "test-key")
            .build()
            .unwrap();

        assert_eq!(
            request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok()),
            Some("Bearer test-key")
        );
    }

    #[test]
    fn test_bearer_value_trims_token() {
        assert_eq!(bearer_value("  abc\n"), "Bearer abc");
    }
}
