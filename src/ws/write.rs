use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::frame::Frame;

/// Writes a whole frame and flushes it, so nothing sits in a buffer while the
/// session waits for the next event.
pub async fn write_frame<T: AsyncWrite + Unpin>(writer: &mut T, frame: &Frame) -> io::Result<()> {
    writer.write_all(&frame.encode()).await?;
    writer.flush().await
}
