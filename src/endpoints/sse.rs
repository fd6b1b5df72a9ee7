use hyper::header::{HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::{Body, Response};
use tracing::info;

use crate::session;
use crate::shared::types::AppState;
use crate::utils::apply_cors;

pub fn handle_sse(state: &AppState) -> Response<Body> {
    let (sink, body) = Body::channel();
    let subscription = state.broker.subscribe(state.session.sse_queue_capacity);
    let id = subscription.id();
    info!(client_id = %id, "sse client connected");

    let config = state.session.clone();
    tokio::spawn(async move {
        let reason = session::sse::stream(subscription, sink, &config).await;
        reason.log_end(id, "sse");
    });

    let mut response = Response::new(body);
    apply_cors(&mut response);
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
