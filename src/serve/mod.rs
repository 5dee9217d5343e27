//! Live preview server.
//!
//! Proxies page requests to the external render service with the current
//! override snapshot substituted in, streams reload directives to
//! connected clients over a server-push channel and re-renders single
//! sections on demand.

mod render;
mod response;
mod stream;

pub use render::RenderClient;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel;
use rustc_hash::FxHashMap;
use tiny_http::{Request, Response, Server, StatusCode};

use crate::config::Config;
use crate::embed::serve::CLIENT_JS_PATH;
use crate::mirror::overrides::OverrideCache;
use crate::reload::ReloadBus;
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

const SUBSCRIBE_PATH: &str = "/__hot-reload/subscribe";
const RENDER_PATH: &str = "/__hot-reload/render";

/// Shared state behind every request handler.
pub struct ServeContext {
    pub config: Arc<Config>,
    pub overrides: Arc<OverrideCache>,
    pub bus: Arc<ReloadBus>,
    pub render: RenderClient,
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop
///
/// This allows the caller to start the mirror actor before entering the
/// request loop, while still being able to answer early requests with
/// the loading page.
pub fn bind_server(config: &Config) -> Result<BoundServer> {
    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    crate::core::register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);

    Ok(BoundServer {
        server,
        addr,
        shutdown_rx,
    })
}

impl BoundServer {
    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shutdown signal receiver, forwarded to the mirror actor.
    pub fn shutdown_rx(&self) -> channel::Receiver<()> {
        self.shutdown_rx.clone()
    }

    /// Start the request loop (blocking). Returns when the server is
    /// unblocked by the shutdown handler.
    pub fn run(self, ctx: Arc<ServeContext>) {
        run_request_loop(&self.server, ctx);
    }
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: std::net::IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

fn run_request_loop(server: &Server, ctx: Arc<ServeContext>) {
    // Use thread pool to handle requests concurrently
    // This prevents a slow render call from blocking other requests
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("failed to create thread pool");

    for request in server.incoming_requests() {
        if crate::core::is_shutdown() {
            let _ = response::respond_unavailable(request);
            continue;
        }

        // Reload subscriptions are open-ended; each gets a dedicated
        // thread so it cannot starve the request pool.
        if split_url(request.url()).0 == SUBSCRIBE_PATH {
            let bus = Arc::clone(&ctx.bus);
            std::thread::spawn(move || {
                if let Err(e) = handle_subscribe(request, &bus) {
                    debug!("serve"; "subscriber dropped: {e}");
                }
            });
            continue;
        }

        let ctx = Arc::clone(&ctx);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, ctx: &ServeContext) -> Result<()> {
    let url = request.url().to_string();
    let (path, query) = split_url(&url);

    // The client script is served from memory, even before the scan ends
    if path == CLIENT_JS_PATH {
        return response::respond_client_js(request);
    }

    if !crate::core::is_ready() {
        return response::respond_loading(request);
    }

    if path == RENDER_PATH {
        return handle_section_render(request, query, ctx);
    }

    handle_page(request, path, query, ctx)
}

/// Open a long-lived push channel carrying every reload event until the
/// client disconnects.
fn handle_subscribe(request: Request, bus: &ReloadBus) -> Result<()> {
    let rx = bus.subscribe();
    debug!("serve"; "reload subscriber connected");

    let response = Response::new(
        StatusCode(200),
        vec![
            response::make_header(b"Content-Type", response::EVENT_STREAM.as_bytes()),
            response::make_header(b"Cache-Control", b"no-cache"),
        ],
        stream::EventStream::new(rx),
        None,
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Re-render one section instance with the changed key's override.
fn handle_section_render(request: Request, query: Option<&str>, ctx: &ServeContext) -> Result<()> {
    let params = parse_query(query.unwrap_or(""));
    let (Some(section_id), Some(key)) = (
        params.get("section-id"),
        params.get("section-template-name"),
    ) else {
        return response::respond_bad_request(
            request,
            "section-id and section-template-name are required",
        );
    };
    let path = params.get("path").map_or("/", String::as_str);

    match ctx
        .render
        .render_section(path, section_id, key, ctx.overrides.get(key))
    {
        Ok(page) => response::respond_fragment(request, page.html, page.overrides_honored),
        Err(e) => response::respond_render_error(request, &e),
    }
}

/// Proxy a page render with the full override snapshot.
fn handle_page(request: Request, path: &str, query: Option<&str>, ctx: &ServeContext) -> Result<()> {
    let snapshot = ctx.overrides.snapshot();
    match ctx.render.render_page(path, query, &snapshot) {
        Ok(page) => response::respond_page(request, page.html),
        Err(e) => response::respond_render_error(request, &e),
    }
}

/// Split a request URL into path and raw query string.
fn split_url(url: &str) -> (&str, Option<&str>) {
    match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    }
}

/// Parse a query string into decoded key/value pairs.
fn parse_query(query: &str) -> FxHashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
