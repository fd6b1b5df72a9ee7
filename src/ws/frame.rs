use std::io;

use super::consts::*;
use super::encoding::{apply_mask, encode_length};
use super::opcode::Opcode;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("reserved opcode {0:#X}")]
    ReservedOpcode(u8),
    #[error("reserved header bits set without a negotiated extension")]
    ReservedBits,
    #[error("client frame is not masked")]
    Unmasked,
    #[error("control frame is fragmented or longer than 125 bytes")]
    InvalidControl,
    #[error("frame payload of {0} bytes exceeds the limit")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

impl Frame {
    fn single(opcode: Opcode, payload: Vec<u8>) -> Self {
        Frame {
            fin: true,
            opcode,
            payload,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Frame::single(Opcode::Text, text.into().into_bytes())
    }

    pub fn ping() -> Self {
        Frame::single(Opcode::Ping, Vec::new())
    }

    pub fn pong(payload: Vec<u8>) -> Self {
        Frame::single(Opcode::Pong, payload)
    }

    pub fn close() -> Self {
        Frame::single(Opcode::Close, Vec::new())
    }

    fn first_byte(&self) -> u8 {
        let fin = if self.fin { FIN_MASK } else { 0 };
        self.opcode.encode() | fin
    }

    /// Server-to-client encoding, never masked.
    pub fn encode(&self) -> Vec<u8> {
        let length = encode_length(self.payload.len(), false);
        [&[self.first_byte()][..], &length, &self.payload].concat()
    }

    /// Client-to-server encoding with the given masking key.
    pub fn encode_masked(&self, mask: [u8; 4]) -> Vec<u8> {
        let length = encode_length(self.payload.len(), true);
        let mut payload = self.payload.clone();
        apply_mask(&mut payload, mask);
        [&[self.first_byte()][..], &length, &mask[..], &payload].concat()
    }
}
