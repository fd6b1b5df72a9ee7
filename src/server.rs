use std::convert::Infallible;
use std::future::Future;
use std::net::TcpListener;

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server};
use tracing::debug;

use crate::endpoints::*;
use crate::shared::types::AppState;

async fn request_router(req: Request<Body>, state: AppState) -> Result<Response<Body>, Infallible> {
    debug!(method = %req.method(), uri = %req.uri(), "request");
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => hello(&state).await,
        (&Method::GET, "/events") => handle_sse(&state),
        (&Method::GET, "/ws") => handle_ws(req, &state),
        (&Method::POST, "/emit") => handle_emit(req, &state).await,
        _ => not_found(),
    };
    Ok(response)
}

/// Serves HTTP on `listener` until `shutdown` resolves. Open SSE streams keep
/// the server alive until their sessions end, so stop the broker as part of
/// `shutdown`.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    listener
        .set_nonblocking(true)
        .context("failed to make listener non-blocking")?;
    let service = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| request_router(req, state.clone())))
        }
    });
    Server::from_tcp(listener)
        .context("failed to adopt listener")?
        .serve(service)
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")
}
