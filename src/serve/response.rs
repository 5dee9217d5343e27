//! HTTP response handlers.

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

use super::render::MARKER_HEADER;
use crate::embed::serve::{CLIENT_JS, CLIENT_JS_PATH, ERROR_HTML, ErrorVars, LOADING_HTML};

pub const HTML: &str = "text/html; charset=utf-8";
pub const JAVASCRIPT: &str = "text/javascript";
pub const PLAIN: &str = "text/plain";
pub const EVENT_STREAM: &str = "text/event-stream";

/// Respond with the reload client script from memory.
pub fn respond_client_js(request: Request) -> Result<()> {
    send_body(request, 200, JAVASCRIPT, CLIENT_JS.as_bytes().to_vec())
}

/// Respond with a rendered page, reload client injected.
pub fn respond_page(request: Request, html: String) -> Result<()> {
    send_body(request, 200, HTML, inject_client(html).into_bytes())
}

/// Respond with a section fragment, forwarding the override marker.
pub fn respond_fragment(request: Request, html: String, overrides_honored: bool) -> Result<()> {
    let mut response = Response::from_data(html.into_bytes())
        .with_status_code(StatusCode(200))
        .with_header(make_header(b"Content-Type", HTML.as_bytes()));
    if overrides_honored {
        response = response.with_header(make_header(MARKER_HEADER.as_bytes(), b"1"));
    }
    request.respond(response)?;
    Ok(())
}

/// Respond with the loading page (initial scan not finished).
pub fn respond_loading(request: Request) -> Result<()> {
    send_body(request, 200, HTML, LOADING_HTML.as_bytes().to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

pub fn respond_bad_request(request: Request, message: &str) -> Result<()> {
    send_body(request, 400, PLAIN, message.as_bytes().to_vec())
}

/// Respond with the inline render-failure page (502).
///
/// Render errors terminate only the one request; the listener and the
/// reload stream keep running.
pub fn respond_render_error(request: Request, error: &anyhow::Error) -> Result<()> {
    let detail = escape(&format!("{error:#}"));
    let body = ERROR_HTML.render(&ErrorVars {
        headline: "Render failed",
        message: "The render service could not render this page. \
                  The preview keeps running; fix the error and save again.",
        detail: &detail,
    });
    send_body(request, 502, HTML, body.into_bytes())
}

/// Insert the reload client script just before `</body>`, appending when
/// the page has no closing body tag.
pub fn inject_client(html: String) -> String {
    let tag = format!("<script src=\"{CLIENT_JS_PATH}\"></script>");
    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..pos]);
            out.push_str(&tag);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header(b"Content-Type", content_type.as_bytes()));
    request.respond(response)?;
    Ok(())
}

pub(super) fn make_header(key: &[u8], value: &[u8]) -> Header {
    Header::from_bytes(key, value).expect("static header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_client_before_closing_body() {
        let html = "<html><body><p>hi</p></body></html>".to_string();
        let out = inject_client(html);
        assert!(out.contains("<script src=\"/__hot-reload/client.js\"></script></body>"));
    }

    #[test]
    fn test_inject_client_appends_without_body_tag() {
        let out = inject_client("<p>fragment</p>".to_string());
        assert!(out.ends_with("</script>"));
        assert!(out.starts_with("<p>fragment</p>"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }
}
