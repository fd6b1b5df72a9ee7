use super::consts::OPCODE_MASK;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    // reserved opcodes (0x3-0x7, 0xB-0xF) are a protocol error
    pub fn decode(byte: u8) -> Option<Self> {
        use Opcode::*;
        match byte & OPCODE_MASK {
            0x0 => Some(Continuation),
            0x1 => Some(Text),
            0x2 => Some(Binary),
            0x8 => Some(Close),
            0x9 => Some(Ping),
            0xA => Some(Pong),
            _ => None,
        }
    }

    pub const fn encode(self) -> u8 {
        use Opcode::*;
        match self {
            Continuation => 0x0,
            Text => 0x1,
            Binary => 0x2,
            Close => 0x8,
            Ping => 0x9,
            Pong => 0xA,
        }
    }

    pub const fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}
