use hyper::{Body, Response, StatusCode};

use crate::shared::types::AppState;
use crate::utils::*;

pub async fn hello(state: &AppState) -> Response<Body> {
    let clients = state.broker.client_count().await;
    text_response(
        StatusCode::OK,
        format!("live-events: {} client(s) connected", clients),
    )
}
