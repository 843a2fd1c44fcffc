//! [`RequestAccessor`] over an axum header map.

use axum::http::{HeaderMap, header::COOKIE};

use warden_auth::RequestAccessor;

/// Header and cookie view of an HTTP request.
///
/// Non-UTF-8 header values are treated as absent.
#[derive(Debug, Clone, Copy)]
pub struct HeaderAccessor<'a> {
    headers: &'a HeaderMap,
}

impl<'a> HeaderAccessor<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }
}

impl RequestAccessor for HeaderAccessor<'_> {
    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)?
            .to_str()
            .ok()
            .map(str::to_owned)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn reads_headers_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        let req = HeaderAccessor::new(&headers);

        assert_eq!(req.header("Authorization").as_deref(), Some("Bearer abc"));
        assert_eq!(req.header("AUTHORIZATION").as_deref(), Some("Bearer abc"));
        assert!(req.header("x-api-key").is_none());
    }

    #[test]
    fn finds_cookie_across_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(COOKIE, HeaderValue::from_static("warden_session=\"tok\""));
        let req = HeaderAccessor::new(&headers);

        assert_eq!(req.cookie("warden_session").as_deref(), Some("tok"));
        assert_eq!(req.cookie("lang").as_deref(), Some("en"));
        assert!(req.cookie("Warden_Session").is_none());
        assert!(req.cookie("missing").is_none());
    }
}
