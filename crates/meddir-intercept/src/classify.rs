//! Request classification
//!
//! Decides which caching strategy serves an outbound request. Only
//! same-origin `GET`s are intercepted; everything else goes straight to the
//! network.

use url::Url;

const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "woff", "woff2", "ttf", "eot", "svg", "png", "jpg", "jpeg", "gif", "webp", "ico",
];
const STATIC_PREFIXES: &[&str] = &["/assets/", "/icons/"];

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "dicom"];
const DOCUMENT_PREFIXES: &[&str] = &["/rails/active_storage/"];

const API_PREFIX: &str = "/api/";

/// An outbound request as seen by the interception layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptRequest {
    pub method: String,
    pub url: Url,
    /// Value of the `Accept` header
    pub accept: Option<String>,
    /// Top-level page load
    pub navigate: bool,
}

impl InterceptRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            accept: None,
            navigate: false,
        }
    }

    /// A page load (`mode: navigate`, `Accept: text/html`)
    pub fn navigation(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            accept: Some("text/html".to_string()),
            navigate: true,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Origin-relative key under which responses are cached (`/path?query`)
    pub fn cache_key(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    fn accepts_html(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.contains("text/html"))
    }
}

/// Caching strategy selected for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Static assets: cache-first
    Static,
    /// Document payloads: stale-while-revalidate
    DocumentFile,
    /// API/data requests, and any other same-origin GET: network-first
    Api,
    /// Page loads: network-first with an offline page
    Navigation,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Static => "static",
            RequestClass::DocumentFile => "document",
            RequestClass::Api => "api",
            RequestClass::Navigation => "navigation",
        }
    }
}

/// Classifies `request`; `None` means it is not intercepted
///
/// Rules are checked in order: static asset, document payload, API,
/// navigation. Remaining same-origin GETs are treated as API requests.
pub fn classify(request: &InterceptRequest, origin: &Url) -> Option<RequestClass> {
    if !request.method.eq_ignore_ascii_case("GET") {
        return None;
    }
    if request.url.origin() != origin.origin() {
        return None;
    }

    let path = request.url.path();
    let extension = extension(path);

    if matches_any(extension, STATIC_EXTENSIONS) || has_prefix(path, STATIC_PREFIXES) {
        return Some(RequestClass::Static);
    }
    if matches_any(extension, DOCUMENT_EXTENSIONS) || has_prefix(path, DOCUMENT_PREFIXES) {
        return Some(RequestClass::DocumentFile);
    }
    if path.ends_with(".json") || path.starts_with(API_PREFIX) {
        return Some(RequestClass::Api);
    }
    if request.navigate || request.accepts_html() {
        return Some(RequestClass::Navigation);
    }
    Some(RequestClass::Api)
}

fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}

fn matches_any(extension: Option<&str>, candidates: &[&str]) -> bool {
    extension.is_some_and(|ext| candidates.iter().any(|c| ext.eq_ignore_ascii_case(c)))
}

fn has_prefix(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}
