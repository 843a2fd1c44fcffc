//! Transport-neutral view of an incoming request.

use std::collections::HashMap;

/// Read-only access to request headers and cookies.
///
/// Header names are matched case-insensitively by implementations.
pub trait RequestAccessor: Send + Sync {
    fn header(&self, name: &str) -> Option<String>;

    fn cookie(&self, name: &str) -> Option<String>;
}

impl<R: RequestAccessor + ?Sized> RequestAccessor for &R {
    fn header(&self, name: &str) -> Option<String> {
        (**self).header(name)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        (**self).cookie(name)
    }
}

/// In-memory request, for tests and non-HTTP callers.
#[derive(Debug, Clone, Default)]
pub struct SimpleRequest {
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
}

impl SimpleRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

impl RequestAccessor for SimpleRequest {
    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_ascii_lowercase()).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }
}
