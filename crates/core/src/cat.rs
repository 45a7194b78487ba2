//! Stream a whole object into a writer
//!
//! A writer that reports a broken pipe (e.g. `stow cat x | head`) ends the
//! copy successfully.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::traits::Client;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Copy the full object behind `client` into `out`
///
/// Returns the number of bytes delivered to `out`. Read failures are
/// annotated with the client URL; write failures are returned as `Io`.
pub async fn cat<W>(client: &dyn Client, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let url = client.url();
    let (mut reader, size) = client
        .get_object(0, 0)
        .await
        .map_err(|e| e.with_target(url.to_string()))?;

    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written: u64 = 0;
    let mut remaining = size;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = reader
            .read(&mut buf[..want])
            .await
            .map_err(|e| Error::Io(e).with_target(url.to_string()))?;
        if n == 0 {
            let eof = io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended after {written} of {size} bytes"),
            );
            return Err(Error::Io(eof).with_target(url.to_string()));
        }
        remaining -= n as u64;

        let mut chunk = &buf[..n];
        while !chunk.is_empty() {
            match out.write(chunk).await {
                Ok(0) => return Err(Error::Io(io::Error::from(io::ErrorKind::WriteZero))),
                Ok(m) => {
                    written += m as u64;
                    chunk = &chunk[m..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!(written, "Output closed by reader, stopping");
                    return Ok(written);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    match out.flush().await {
        Ok(()) => Ok(written),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(written),
        Err(e) => Err(Error::Io(e)),
    }
}
