use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

type RespBody = BoxBody<Bytes, hyper::Error>;

fn full_body(data: impl Into<Bytes>) -> RespBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

fn handle_metrics(registry: &Registry) -> Response<RespBody> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&registry.gather(), &mut buffer).is_err() {
        let mut resp = Response::new(full_body("Internal Server Error"));
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return resp;
    }

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", encoder.format_type())
        .body(full_body(buffer))
        .unwrap_or_else(|_| Response::new(full_body("")))
}

/// Serve the Prometheus registry on `/metrics` until SIGTERM/SIGINT.
pub async fn start_metrics_server(
    port: u16,
    registry: Registry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(?addr, "metrics server started");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("metrics server: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("metrics server: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "metrics server: accept error");
                        continue;
                    }
                };

                let registry = registry.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        async move {
                            let resp = if req.uri().path() == "/metrics" {
                                handle_metrics(&registry)
                            } else {
                                let mut resp = Response::new(full_body("Not Found"));
                                *resp.status_mut() = StatusCode::NOT_FOUND;
                                resp
                            };
                            Ok::<_, hyper::Error>(resp)
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "metrics server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("metrics server stopped");
    Ok(())
}
