use hyper::{Body, Response, StatusCode};

use crate::utils::*;

pub fn not_found() -> Response<Body> {
    text_response(StatusCode::NOT_FOUND, "Not found")
}
