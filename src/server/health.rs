//! Health Server
//!
//! Liveness answers as soon as the process serves HTTP. Readiness flips once
//! the node has its groups and peers wired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::{serve, text, Body};
use crate::error::Result;

/// Shared readiness flag
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub fn handle(path: &str, readiness: &Readiness) -> Response<Body> {
    match path {
        "/healthz" | "/livez" => text(StatusCode::OK, "ok"),
        "/readyz" if readiness.is_ready() => text(StatusCode::OK, "ok"),
        "/readyz" => text(StatusCode::SERVICE_UNAVAILABLE, "not ready"),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

pub async fn run_health_server(
    listener: TcpListener,
    readiness: Readiness,
    shutdown: CancellationToken,
) -> Result<()> {
    serve(
        listener,
        "health",
        move |req: Request<Incoming>| {
            let response = handle(req.uri().path(), &readiness);
            async move { response }
        },
        shutdown,
    )
    .await
}
