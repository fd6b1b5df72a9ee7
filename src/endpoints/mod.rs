mod emit;
mod hello;
mod not_found;
mod sse;
mod ws;

pub use emit::handle_emit;
pub use hello::hello;
pub use not_found::not_found;
pub use sse::handle_sse;
pub use ws::handle_ws;
