use tokio::io::{AsyncRead, AsyncReadExt};

use super::consts::*;
use super::frame::{Frame, FrameError};
use super::opcode::Opcode;

async fn read_length_u16<T: AsyncRead + Unpin>(reader: &mut T) -> Result<usize, FrameError> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).await?;
    Ok(u16::from_be_bytes(buf) as usize)
}

async fn read_length_u64<T: AsyncRead + Unpin>(reader: &mut T) -> Result<usize, FrameError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).await?;
    let length = u64::from_be_bytes(buf);
    usize::try_from(length).map_err(|_| FrameError::TooLarge(usize::MAX))
}

async fn read_mask<T: AsyncRead + Unpin>(reader: &mut T) -> Result<[u8; 4], FrameError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Reads one frame. Masked and unmasked frames are both accepted, so the same
/// reader serves the server (client frames) and tests acting as a client.
pub async fn read_frame<T: AsyncRead + Unpin>(reader: &mut T) -> Result<Frame, FrameError> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf).await?;

    if has_rsv(buf[0]) {
        return Err(FrameError::ReservedBits);
    }
    let opcode = Opcode::decode(buf[0]).ok_or(FrameError::ReservedOpcode(buf[0] & OPCODE_MASK))?;
    let fin = is_fin(buf[0]);

    let length = match buf[1] & LENGTH_MASK {
        LENGTH_U16 => read_length_u16(reader).await?,
        LENGTH_U64 => read_length_u64(reader).await?,
        value => value as usize,
    };
    if opcode.is_control() && (!fin || length > MAX_CONTROL_PAYLOAD) {
        return Err(FrameError::InvalidControl);
    }
    if length > MAX_INBOUND_PAYLOAD {
        return Err(FrameError::TooLarge(length));
    }

    let mask = if is_mask(buf[1]) {
        Some(read_mask(reader).await?)
    } else {
        None
    };

    let mut payload = vec![0; length];
    reader.read_exact(&mut payload).await?;
    if let Some(mask) = mask {
        super::encoding::apply_mask(&mut payload, mask);
    }

    Ok(Frame {
        fin,
        opcode,
        payload,
    })
}

/// Like [`read_frame`], but rejects unmasked frames as RFC 6455 requires of a
/// server.
pub async fn read_client_frame<T: AsyncRead + Unpin>(reader: &mut T) -> Result<Frame, FrameError> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;
    if !is_mask(header[1]) {
        return Err(FrameError::Unmasked);
    }
    let mut rest = (&header[..]).chain(reader);
    read_frame(&mut rest).await
}
