//! Embedded static resources for the preview server.
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Dev server resources (hot_reload.js, loading.html, error.html)

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// Browser-side hot reload client, injected into every proxied page.
    pub const CLIENT_JS: &str = include_str!("serve/hot_reload.js");

    /// URL the client script is served from.
    pub const CLIENT_JS_PATH: &str = "/__hot-reload/client.js";

    /// Interstitial shown until the initial scan completes.
    pub const LOADING_HTML: &str = include_str!("serve/loading.html");

    /// Variables for error.html. Values must already be HTML-escaped.
    pub struct ErrorVars<'a> {
        pub headline: &'a str,
        pub message: &'a str,
        pub detail: &'a str,
    }

    impl TemplateVars for ErrorVars<'_> {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__HEADLINE__", self.headline)
                .replace("__MESSAGE__", self.message)
                .replace("__DETAIL__", self.detail)
        }
    }

    /// Inline render-failure page.
    pub const ERROR_HTML: Template<ErrorVars<'static>> =
        Template::new(include_str!("serve/error.html"));
}
