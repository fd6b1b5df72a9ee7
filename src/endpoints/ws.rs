use hyper::header::{HeaderValue, CONNECTION, SEC_WEBSOCKET_ACCEPT, UPGRADE};
use hyper::{Body, Request, Response, StatusCode};
use tracing::{debug, info, warn};

use crate::session;
use crate::shared::types::AppState;
use crate::utils::*;
use crate::ws::handshake;

/// Answers the upgrade handshake and hands the connection to a WebSocket
/// session once hyper has switched protocols.
pub fn handle_ws(mut req: Request<Body>, state: &AppState) -> Response<Body> {
    debug!("ws incoming connection");
    let sec_accept = match handshake::accept_key(req.headers()) {
        Ok(key) => key,
        Err(err) => {
            warn!(error = %err, "rejecting websocket request");
            return text_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };
    let sec_accept = match HeaderValue::from_str(&sec_accept) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "invalid accept key");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "handshake failed");
        }
    };

    let on_upgrade = hyper::upgrade::on(&mut req);
    let broker = state.broker.clone();
    let config = state.session.clone();
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let subscription = broker.subscribe(config.ws_queue_capacity);
                let id = subscription.id();
                info!(client_id = %id, "websocket client connected");
                let reason = session::ws::run(upgraded, subscription, &config).await;
                reason.log_end(id, "websocket");
            }
            Err(err) => warn!(error = %err, "websocket upgrade failed"),
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    apply_cors(&mut response);
    let headers = response.headers_mut();
    headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(SEC_WEBSOCKET_ACCEPT, sec_accept);
    response
}
