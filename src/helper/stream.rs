//! Line decoding for helper output streams.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};

/// Newline-delimited reader over a helper output stream.
///
/// Lines are returned without their terminator (`\n` or `\r\n`). Bytes that
/// are not valid UTF-8 are replaced rather than rejected, since the helper
/// relays whatever code page the remote console uses.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: Split<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a byte stream.
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader).split(b'\n'),
        }
    }

    /// Read the next line, or `None` at end of stream.
    ///
    /// Cancel safe: may be used as a `tokio::select!` branch.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let Some(mut segment) = self.inner.next_segment().await? else {
            return Ok(None);
        };
        if segment.last() == Some(&b'\r') {
            segment.pop();
        }
        Ok(Some(String::from_utf8_lossy(&segment).into_owned()))
    }
}
