use super::consts::{LENGTH_U16, LENGTH_U64, MASKED_MASK};

/// Encodes the payload length field. `masked` sets the mask bit on the first
/// length byte, which is required for client-to-server frames.
pub fn encode_length(length: usize, masked: bool) -> Vec<u8> {
    let mask_bit = if masked { MASKED_MASK } else { 0 };
    if length <= 125 {
        vec![length as u8 | mask_bit]
    } else if length <= 65535 {
        // 126, then the length as u16
        [&[LENGTH_U16 | mask_bit][..], &(length as u16).to_be_bytes()].concat()
    } else {
        // 127, then the length as u64
        [&[LENGTH_U64 | mask_bit][..], &(length as u64).to_be_bytes()].concat()
    }
}

pub fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}
