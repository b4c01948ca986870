//! Development Server for xframe
//!
//! Every `*.localhost` subdomain is a separate origin in the browser, so one
//! server can stand in for the whole deployment:
//!
//! - `supervisor.localhost` serves `<WEB_ROOT>/supervisor`
//! - `/common/wasm-loader` on any host serves `<WEB_ROOT>/loader`
//! - `/pkg` on any host serves the wasm-pack output in `<WEB_ROOT>/pkg`
//! - everything else serves the demo application in `<WEB_ROOT>/app`

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tower::ServiceExt;
use tower_http::services::ServeDir;

const LOADER_PATH: &str = "/common/wasm-loader";
const PKG_PATH: &str = "/pkg";
const SUPERVISOR_SUBDOMAIN: &str = "supervisor";

#[derive(Clone)]
struct Sites {
    root: PathBuf,
}

impl Sites {
    /// Directory and path remainder for a request.
    fn resolve(&self, host: &str, path: &str) -> (PathBuf, String) {
        if let Some(rest) = strip_mount(path, LOADER_PATH) {
            return (self.root.join("loader"), rest);
        }
        if let Some(rest) = strip_mount(path, PKG_PATH) {
            return (self.root.join("pkg"), rest);
        }
        let site = if subdomain(host) == Some(SUPERVISOR_SUBDOMAIN) {
            "supervisor"
        } else {
            "app"
        };
        (self.root.join(site), path.to_string())
    }
}

/// `path` below `mount`, as an absolute path.
fn strip_mount(path: &str, mount: &str) -> Option<String> {
    let rest = path.strip_prefix(mount)?;
    match rest {
        "" => Some("/".to_string()),
        _ if rest.starts_with('/') => Some(rest.to_string()),
        _ => None,
    }
}

/// First label of a `Host` header value, port stripped.
fn subdomain(host: &str) -> Option<&str> {
    let name = host.split(':').next()?;
    let (label, rest) = name.split_once('.')?;
    (!rest.is_empty()).then_some(label)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let root = std::env::var("WEB_ROOT").unwrap_or_else(|_| "web".to_string());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let sites = Sites { root: root.into() };

    let app = Router::new()
        .fallback(serve)
        .with_state(sites)
        .layer(axum::middleware::from_fn(add_headers));

    println!("╔═══════════════════════════════════════════════════╗");
    println!("║              xframe Development Server            ║");
    println!("╠═══════════════════════════════════════════════════╣");
    println!("║  App:        http://localhost:{:<5}               ║", port);
    println!("║  Supervisor: http://supervisor.localhost:{:<5}    ║", port);
    println!("║  Press Ctrl+C to stop                             ║");
    println!("╚═══════════════════════════════════════════════════╝");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn serve(State(sites): State<Sites>, mut request: Request<Body>) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let (dir, path) = sites.resolve(&host, request.uri().path());

    let path_and_query = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    match path_and_query.parse() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    }

    match ServeDir::new(dir).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response(),
    }
}

/// Add security headers and fix MIME types
async fn add_headers(request: Request<Body>, next: axum::middleware::Next) -> Response<Body> {
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    // Pages change on every rebuild
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    // Fix MIME types for module scripts
    if path.ends_with(".js") || path.ends_with(".mjs") {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/javascript; charset=utf-8"),
        );
    } else if path.ends_with(".wasm") {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/wasm"),
        );
    }

    response
}
