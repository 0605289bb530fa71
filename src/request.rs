use std::collections::HashMap;

/// Framework-independent request metadata consumed by tenant resolution.
///
/// The resolution outcome and authorization facade are threaded explicitly
/// through request handling; nothing in this crate reads ambient or
/// thread-local state.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    host: Option<String>,
    path: String,
    headers: HashMap<String, String>,
}

impl RequestMeta {
    /// Creates request metadata for a path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            host: None,
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    /// Sets the request host (may include a port, which resolvers strip).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Adds a header. Names are matched case-insensitively.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Returns the request host, if any.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}
