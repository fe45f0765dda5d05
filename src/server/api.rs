//! Front-end API Server
//!
//! `GET /api?key=K` answers with the value of `K` from one group,
//! `GET /api/stats` with a JSON array of every group's counters.

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{respond, serve, text, Body};
use crate::error::Result;
use crate::group::{Group, GroupRegistry};

/// Request handler for the front-end API.
#[derive(Clone)]
pub struct ApiService {
    group: Arc<Group>,
    registry: Arc<GroupRegistry>,
}

impl ApiService {
    pub fn new(group: Arc<Group>, registry: Arc<GroupRegistry>) -> Self {
        Self { group, registry }
    }

    pub async fn handle(&self, path: &str, query: Option<&str>) -> Response<Body> {
        match path {
            "/api" => self.lookup(query).await,
            "/api/stats" => self.stats(),
            _ => text(StatusCode::NOT_FOUND, "not found"),
        }
    }

    async fn lookup(&self, query: Option<&str>) -> Response<Body> {
        let key = query.and_then(|q| query_param(q, "key")).unwrap_or_default();
        debug!(key = %key, "api lookup");

        match self.group.get(&key).await {
            Ok(value) => respond(StatusCode::OK, "application/octet-stream", value.as_bytes()),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn stats(&self) -> Response<Body> {
        match serde_json::to_vec(&self.registry.snapshots()) {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(e) => {
                error!("Failed to encode stats: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

/// Value of the first `name` parameter in a query string, percent-decoded.
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k != name {
            return None;
        }
        let v = v.replace('+', " ");
        urlencoding::decode(&v).ok().map(|v| v.into_owned())
    })
}

/// Serve the front-end API on `listener` until `shutdown` fires.
pub async fn run_api_server(
    listener: TcpListener,
    service: ApiService,
    shutdown: CancellationToken,
) -> Result<()> {
    serve(
        listener,
        "api",
        move |req: Request<Incoming>| {
            let service = service.clone();
            async move { service.handle(req.uri().path(), req.uri().query()).await }
        },
        shutdown,
    )
    .await
}
