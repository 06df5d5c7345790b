//! Pure routing policy for intercepted requests.
//!
//! [`route`] maps a request and the controller's [`Scope`] to a [`Route`]
//! without touching the network or cache storage. Rules are evaluated in
//! order and the first match wins:
//!
//! 1. development origin → bypass
//! 2. non-GET → bypass
//! 3. controller script or dev tooling path → bypass
//! 4. non-http(s) scheme → bypass
//! 5. `Range` header → range passthrough
//! 6. cross-origin → bypass
//! 7. navigation → network-first with app shell fallback
//! 8. static asset path or script/style/image/font destination → cache-first
//! 9. everything else → network-first

use reqwest::Method;
use url::Url;

use crate::request::InterceptedRequest;

/// Hostnames treated as local development.
pub const DEV_HOSTNAMES: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Port used by the local development server.
pub const DEV_PORT: u16 = 3000;

/// Path of the controller's own script.
pub const CONTROLLER_SCRIPT_PATH: &str = "/service-worker.js";

/// Live-reload and dev tooling endpoints never shipped in production.
pub const DEV_PATH_PREFIXES: &[&str] = &[
    "/sockjs-node",
    "/ws",
    "/__webpack_dev_server__",
    "/__webpack_hmr",
    "/hot-update",
    "/@vite",
    "/@react-refresh",
];

/// Build output directories served cache-first.
pub const STATIC_ASSET_PREFIXES: &[&str] = &["/static/", "/assets/"];

/// Root document used as the offline fallback for navigations.
pub const SHELL_PATH: &str = "/";

/// App shell seeded into the static generation on install.
pub const APP_SHELL_MANIFEST: &[&str] = &["/", "/index.html", "/manifest.webmanifest", "/favicon.ico"];

/// Where the controller is allowed to act.
#[derive(Debug, Clone)]
pub struct Scope {
    origin: Url,
    development: bool,
}

impl Scope {
    /// Build the scope for an application origin.
    ///
    /// Development mode is decided by the origin alone: a known dev hostname
    /// or the dev server port.
    pub fn for_origin(origin: Url) -> Self {
        let development = is_development_origin(&origin);
        Self { origin, development }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Absolute URL of an origin-relative path.
    pub fn url_for(&self, path: &str) -> Url {
        let mut url = self.origin.clone();
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}

fn is_development_origin(origin: &Url) -> bool {
    let host_is_dev = origin
        .host_str()
        .is_some_and(|host| DEV_HOSTNAMES.iter().any(|dev| dev.eq_ignore_ascii_case(host)));
    host_is_dev || origin.port_or_known_default() == Some(DEV_PORT)
}

/// Why a request is left to default network handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    Development,
    NonGet,
    ExcludedPath,
    NonHttpScheme,
    CrossOrigin,
}

/// Decision for one intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not handled; the platform performs its default fetch.
    Bypass(BypassReason),
    /// Forwarded straight to the network; no cache is opened.
    RangePassthrough,
    CacheFirst,
    NetworkFirst,
    /// Network-first, falling back to the exact cached page then the app shell.
    Navigation,
}

impl Route {
    pub fn is_bypass(&self) -> bool {
        matches!(self, Route::Bypass(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Bypass(_) => "bypass",
            Route::RangePassthrough => "range-passthrough",
            Route::CacheFirst => "cache-first",
            Route::NetworkFirst => "network-first",
            Route::Navigation => "navigation",
        }
    }
}

fn is_excluded_path(path: &str) -> bool {
    path == CONTROLLER_SCRIPT_PATH
        || path.contains(".hot-update.")
        || DEV_PATH_PREFIXES.iter().any(|prefix| under_prefix(path, prefix))
}

/// `path` is `prefix` itself or a path below it; `/ws` covers `/ws/1` but not `/wsdl`.
fn under_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn is_static_asset_path(path: &str) -> bool {
    STATIC_ASSET_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Decide how a request is handled.
pub fn route(request: &InterceptedRequest, scope: &Scope) -> Route {
    if scope.is_development() {
        return Route::Bypass(BypassReason::Development);
    }
    if request.method != Method::GET {
        return Route::Bypass(BypassReason::NonGet);
    }

    let url = &request.url;
    if is_excluded_path(url.path()) {
        return Route::Bypass(BypassReason::ExcludedPath);
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Route::Bypass(BypassReason::NonHttpScheme);
    }
    if request.has_range() {
        return Route::RangePassthrough;
    }
    if !scope.is_same_origin(url) {
        return Route::Bypass(BypassReason::CrossOrigin);
    }
    if request.is_navigation() {
        return Route::Navigation;
    }
    if is_static_asset_path(url.path()) || request.destination.is_static_asset() {
        return Route::CacheFirst;
    }
    Route::NetworkFirst
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Destination, resolve};

    fn scope() -> Scope {
        Scope::for_origin(Url::parse("https://clinic.example").unwrap())
    }

    fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(resolve(scope().origin(), path).unwrap())
    }

    #[test]
    fn test_development_origins() {
        for origin in ["http://localhost:8080", "http://127.0.0.1", "http://[::1]:5000", "https://clinic.example:3000"] {
            assert!(Scope::for_origin(Url::parse(origin).unwrap()).is_development(), "{origin}");
        }
        assert!(!scope().is_development());
    }

    #[test]
    fn test_development_bypasses_everything() {
        let dev = Scope::for_origin(Url::parse("http://localhost:3000").unwrap());
        let req = InterceptedRequest::navigate(dev.url_for("/"));
        assert_eq!(route(&req, &dev), Route::Bypass(BypassReason::Development));
    }

    #[test]
    fn test_non_get_bypassed() {
        let req = InterceptedRequest::new(Method::POST, scope().url_for("/api/recordings"));
        assert_eq!(route(&req, &scope()), Route::Bypass(BypassReason::NonGet));
    }

    #[test]
    fn test_excluded_paths_bypassed() {
        for path in ["/service-worker.js", "/sockjs-node/info", "/ws", "/main.4f2a.hot-update.json", "/@vite/client"] {
            assert_eq!(route(&get(path), &scope()), Route::Bypass(BypassReason::ExcludedPath), "{path}");
        }
    }

    #[test]
    fn test_dev_prefixes_match_whole_segments() {
        for path in ["/ws-settings", "/wsdl", "/sockjs-nodes", "/@vitest/report"] {
            assert_eq!(route(&get(path), &scope()), Route::NetworkFirst, "{path}");
        }
        for path in ["/ws/socket", "/__webpack_hmr", "/hot-update/main.json"] {
            assert_eq!(route(&get(path), &scope()), Route::Bypass(BypassReason::ExcludedPath), "{path}");
        }
    }

    #[test]
    fn test_blob_scheme_bypassed() {
        let req = get("blob:https://clinic.example/6c1e-44");
        assert_eq!(route(&req, &scope()), Route::Bypass(BypassReason::NonHttpScheme));
    }

    #[test]
    fn test_range_wins_over_static_rules() {
        let req = get("/assets/intro.webm").with_header("Range", "bytes=1000-2000");
        assert_eq!(route(&req, &scope()), Route::RangePassthrough);
    }

    #[test]
    fn test_cross_origin_bypassed() {
        let req = get("https://cdn.example/lib.js").with_destination(Destination::Script);
        assert_eq!(route(&req, &scope()), Route::Bypass(BypassReason::CrossOrigin));
    }

    #[test]
    fn test_navigation() {
        let req = InterceptedRequest::navigate(scope().url_for("/gallery"));
        assert_eq!(route(&req, &scope()), Route::Navigation);
    }

    #[test]
    fn test_cache_first_by_path_or_destination() {
        assert_eq!(route(&get("/static/js/main.js"), &scope()), Route::CacheFirst);
        assert_eq!(route(&get("/assets/app.css"), &scope()), Route::CacheFirst);
        assert_eq!(route(&get("/logo.png").with_destination(Destination::Image), &scope()), Route::CacheFirst);
        assert_eq!(route(&get("/fonts/a.woff2").with_destination(Destination::Font), &scope()), Route::CacheFirst);
    }

    #[test]
    fn test_network_first_default() {
        assert_eq!(route(&get("/api/patients"), &scope()), Route::NetworkFirst);
        assert_eq!(route(&get("/manifest.webmanifest").with_destination(Destination::Manifest), &scope()), Route::NetworkFirst);
    }

    #[test]
    fn test_url_for() {
        assert_eq!(scope().url_for("/favicon.ico").as_str(), "https://clinic.example/favicon.ico");
    }
}
