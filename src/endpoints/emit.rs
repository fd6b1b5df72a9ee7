use hyper::body::HttpBody;
use hyper::{Body, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::debug;

use crate::events::EventType;
use crate::shared::types::AppState;
use crate::utils::*;

const MAX_BODY_BYTES: u64 = 1 << 20;

#[derive(Debug, Deserialize)]
struct EmitRequest {
    #[serde(rename = "type")]
    kind: EventType,
    /// Kept as the producer's own text. A missing field becomes `null`.
    data: Option<Box<RawValue>>,
}

enum ReadError {
    TooLarge,
    Body(hyper::Error),
}

/// Collects the body, giving up as soon as it grows past `MAX_BODY_BYTES`,
/// whatever the declared length was.
async fn read_capped(mut body: Body) -> Result<Vec<u8>, ReadError> {
    if body.size_hint().lower() > MAX_BODY_BYTES {
        return Err(ReadError::TooLarge);
    }
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(ReadError::Body)?;
        if (bytes.len() + chunk.len()) as u64 > MAX_BODY_BYTES {
            return Err(ReadError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// `POST /emit` lets producers outside the process publish an event.
pub async fn handle_emit(req: Request<Body>, state: &AppState) -> Response<Body> {
    let bytes = match read_capped(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(ReadError::TooLarge) => {
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "event body too large")
        }
        Err(ReadError::Body(err)) => {
            return text_response(
                StatusCode::BAD_REQUEST,
                format!("failed to read body: {}", err),
            )
        }
    };
    let request: EmitRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(err) => return text_response(StatusCode::BAD_REQUEST, format!("invalid event: {}", err)),
    };

    debug!(kind = %request.kind, "event published over http");
    state.broker.emit(request.kind, request.data).await;
    text_response(StatusCode::ACCEPTED, "accepted")
}
