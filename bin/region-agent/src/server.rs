//! Operator HTTP surface for the agent

use anyhow::Result;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::tokio::TokioIo;
use region_api::{uri_serde, ExcludedRegions, OperationClass, OperationType, RoutingRequest};
use region_cache::RoutingResolver;
use region_core::{CoreError, SharedExcludedRegions};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::debug;

/// Shared state handed to every connection
pub struct AgentState {
    pub resolver: Arc<RoutingResolver>,
    pub exclusions: Arc<SharedExcludedRegions>,
}

/// Body of `POST /resolve`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveBody {
    operation: OperationType,
    #[serde(default)]
    is_master_resource: bool,
    excluded_regions: Option<Vec<String>>,
    #[serde(default)]
    routing_index_hint: usize,
}

/// Body of `POST /unavailable`
#[derive(Debug, Deserialize)]
struct UnavailableBody {
    endpoint: String,
    operation: OperationClass,
}

/// Accept connections until the listener fails
pub async fn serve(listener: TcpListener, state: Arc<AgentState>) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, state.clone()));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AgentState>,
) -> Result<Response<Full<Bytes>>, B::Error>
where
    B: Body<Data = Bytes>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    let response = match (method, path.as_str()) {
        (Method::GET, "/healthz") => text(StatusCode::OK, "OK\n"),
        (Method::GET, "/metrics") => match state.resolver.metrics().gather() {
            Ok(body) => text(StatusCode::OK, body),
            Err(e) => text(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {}\n", e),
            ),
        },
        (Method::GET, "/routing") => json(StatusCode::OK, &state.resolver.routing_state()),
        (Method::POST, "/resolve") => {
            let body = req.into_body().collect().await?.to_bytes();
            match serde_json::from_slice::<ResolveBody>(&body) {
                Ok(body) => match excluded_regions(body.excluded_regions) {
                    Ok(excluded) => {
                        let request = RoutingRequest::new(body.operation)
                            .with_master_resource(body.is_master_resource)
                            .with_excluded_regions(excluded)
                            .with_routing_index(body.routing_index_hint);
                        let endpoint = state.resolver.resolve_service_endpoint(&request);
                        json(
                            StatusCode::OK,
                            &serde_json::json!({ "endpoint": endpoint.to_string() }),
                        )
                    }
                    Err(e) => text(StatusCode::BAD_REQUEST, format!("{}\n", e)),
                },
                Err(e) => text(StatusCode::BAD_REQUEST, format!("Invalid request: {}\n", e)),
            }
        }
        (Method::POST, "/unavailable") => {
            let body = req.into_body().collect().await?.to_bytes();
            match serde_json::from_slice::<UnavailableBody>(&body) {
                Ok(body) => match uri_serde::parse_endpoint(&body.endpoint) {
                    Ok(endpoint) => {
                        match body.operation {
                            OperationClass::Read => {
                                state.resolver.mark_endpoint_unavailable_for_read(&endpoint)
                            }
                            OperationClass::Write => {
                                state.resolver.mark_endpoint_unavailable_for_write(&endpoint)
                            }
                        }
                        text(StatusCode::NO_CONTENT, "")
                    }
                    Err(e) => text(StatusCode::BAD_REQUEST, format!("{}\n", e)),
                },
                Err(e) => text(StatusCode::BAD_REQUEST, format!("Invalid request: {}\n", e)),
            }
        }
        (Method::PUT, "/exclusions") => {
            let body = req.into_body().collect().await?.to_bytes();
            match serde_json::from_slice::<Option<Vec<String>>>(&body) {
                Ok(regions) => match excluded_regions(regions) {
                    Ok(regions) => {
                        state.exclusions.set(regions);
                        text(StatusCode::NO_CONTENT, "")
                    }
                    Err(e) => text(StatusCode::BAD_REQUEST, format!("{}\n", e)),
                },
                Err(e) => text(StatusCode::BAD_REQUEST, format!("Invalid request: {}\n", e)),
            }
        }
        _ => text(StatusCode::NOT_FOUND, "Not Found\n"),
    };

    Ok(response)
}

/// Callers must send an explicit list; `[]` means no exclusions
fn excluded_regions(regions: Option<Vec<String>>) -> Result<ExcludedRegions, CoreError> {
    Ok(ExcludedRegions::from_optional(regions)?)
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = text(status, body);
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => text(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode response: {}\n", e),
        ),
    }
}
