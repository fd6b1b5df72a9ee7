pub const FIN_MASK: u8 = 0b1000_0000;
pub const RSV_MASK: u8 = 0b0111_0000;
pub const OPCODE_MASK: u8 = 0b0000_1111;
pub const LENGTH_MASK: u8 = 0b0111_1111;
pub const MASKED_MASK: u8 = 0b1000_0000;

pub const LENGTH_U16: u8 = 126;
pub const LENGTH_U64: u8 = 127;

/// Control frames carry at most 125 bytes and are never fragmented.
pub const MAX_CONTROL_PAYLOAD: usize = 125;
/// Upper bound for a single inbound frame; clients only send small messages.
pub const MAX_INBOUND_PAYLOAD: usize = 1 << 20;

pub const fn is_fin(byte: u8) -> bool {
    (byte & FIN_MASK) == FIN_MASK
}
pub const fn has_rsv(byte: u8) -> bool {
    (byte & RSV_MASK) != 0
}
pub const fn is_mask(byte: u8) -> bool {
    (byte & MASKED_MASK) == MASKED_MASK
}
