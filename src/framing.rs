use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("frame of {0} bytes exceeds the configured limit")]
    FrameTooLarge(u32),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write a length-prefixed frame to an async writer.
///
/// Writes a 4-byte little-endian length prefix, then the payload.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge(u32::MAX))?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;

    Ok(())
}

/// Read a length-prefixed frame from an async reader.
///
/// Reads a 4-byte little-endian length, validates it against `max_len`
/// before allocating, then reads the payload.
///
/// Returns `TransportError::ConnectionClosed` on EOF.
/// Returns `TransportError::FrameTooLarge` if the length exceeds `max_len`.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_len: u32,
) -> Result<Vec<u8>, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf);

    if len > max_len {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(payload)
}
