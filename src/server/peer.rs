//! Peer Server
//!
//! Serves `{base_path}{group}/{key}` (both segments percent-encoded) to
//! other nodes. Success answers with the raw value bytes as
//! `application/octet-stream`; failures answer with a client error status
//! and the error text as body.

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{error_response, respond, serve, text, Body};
use crate::adapters::HttpPool;
use crate::error::Result;
use crate::group::GroupRegistry;

/// Request handler for the peer endpoint.
#[derive(Clone)]
pub struct PeerService {
    pool: Arc<HttpPool>,
    registry: Arc<GroupRegistry>,
}

impl PeerService {
    pub fn new(pool: Arc<HttpPool>, registry: Arc<GroupRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Answer a request for `path` (the request URI path, still encoded).
    pub async fn handle(&self, method: &str, path: &str) -> Response<Body> {
        let Some(rest) = path.strip_prefix(self.pool.base_path()) else {
            return text(StatusCode::NOT_FOUND, "not found");
        };
        info!("[Server {}] {} {}", self.pool.self_addr(), method, path);

        let Some((group_name, key)) = split_group_key(rest) else {
            return text(StatusCode::BAD_REQUEST, "bad request");
        };

        let Some(group) = self.registry.get_group(&group_name) else {
            return text(StatusCode::NOT_FOUND, format!("no such group: {}", group_name));
        };
        group.record_server_request();

        match group.get(&key).await {
            Ok(value) => respond(StatusCode::OK, "application/octet-stream", value.as_bytes()),
            Err(e) => error_response(&e),
        }
    }
}

/// Split `group/key` and percent-decode both segments.
fn split_group_key(rest: &str) -> Option<(String, String)> {
    let mut parts = rest.split('/');
    let (group, key) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let group = urlencoding::decode(group).ok()?.into_owned();
    let key = urlencoding::decode(key).ok()?.into_owned();
    Some((group, key))
}

/// Serve peer requests on `listener` until `shutdown` fires.
pub async fn run_peer_server(
    listener: TcpListener,
    service: PeerService,
    shutdown: CancellationToken,
) -> Result<()> {
    serve(
        listener,
        "peer",
        move |req: Request<Incoming>| {
            let service = service.clone();
            async move {
                service
                    .handle(req.method().as_str(), req.uri().path())
                    .await
            }
        },
        shutdown,
    )
    .await
}
