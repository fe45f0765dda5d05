//! HTTP Servers
//!
//! All servers share one accept loop: a `tokio` listener handing each
//! connection to `hyper`'s HTTP/1 connection driver, stopped through a
//! [`CancellationToken`].
//!
//! - [`peer`]: serves `{base_path}{group}/{key}` to other nodes
//! - [`api`]: front-end `/api?key=` and `/api/stats`
//! - [`health`]: `/healthz`, `/livez`, `/readyz`
//! - `/metrics` is served by [`crate::metrics`]

pub mod api;
pub mod health;
pub mod peer;

use std::convert::Infallible;
use std::future::Future;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Response body type used by every server
pub type Body = Full<Bytes>;

/// Bind a listener, mapping failures into the crate error.
pub async fn bind(addr: &str, name: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {} server on {}: {}", name, addr, e)))?;

    if let Ok(local) = listener.local_addr() {
        info!("{} server listening on {}", name, local);
    }
    Ok(listener)
}

/// Accept connections until `shutdown` fires, serving each with `handler`.
pub async fn serve<H, Fut>(
    listener: TcpListener,
    name: &'static str,
    handler: H,
    shutdown: CancellationToken,
) -> Result<()>
where
    H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("{} server shutting down", name);
                return Ok(());
            }
            accepted = listener.accept() => accepted
                .map_err(|e| Error::Internal(format!("{} server accept error: {}", name, e)))?,
        };

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("{} server connection error: {}", name, e);
            }
        });
    }
}

/// Build a response without fallible builder calls.
pub fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Body> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Plain-text response
pub fn text(status: StatusCode, body: impl Into<String>) -> Response<Body> {
    respond(status, "text/plain; charset=utf-8", body.into())
}

/// Text response for a failed lookup, with the status the error maps to.
pub fn error_response(err: &Error) -> Response<Body> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    text(status, err.to_string())
}
