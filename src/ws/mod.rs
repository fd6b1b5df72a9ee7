//! Minimal RFC 6455 framing over any `AsyncRead`/`AsyncWrite` transport.

pub mod consts;
mod encoding;
pub mod frame;
pub mod handshake;
pub mod opcode;
mod read;
mod write;

pub use frame::{Frame, FrameError};
pub use opcode::Opcode;
pub use read::*;
pub use write::*;
