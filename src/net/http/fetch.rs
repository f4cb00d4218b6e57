use embedded_io_async::{Read, Write};
use heapless::String;

use super::headers::{BufferedWriter as _, FirmwareRequest, LineOutcome, ResponseHeaders};
use super::{HttpError, HttpResult};

/// Upper bound on one header line; anything longer is truncated in place
/// (the remainder of the line is still consumed).
const MAX_LINE: usize = 256;
const MAX_REQUEST: usize = 512;

/// Send the firmware request for `path` on `host`.
pub async fn write_request<W: Write>(stream: &mut W, host: &str, path: &str) -> HttpResult {
    let mut buf = String::<MAX_REQUEST>::new();
    FirmwareRequest { host, path }.write_to(&mut buf)?;
    stream
        .write_all(buf.as_bytes())
        .await
        .map_err(|_| HttpError::WriteRequest)?;
    stream.flush().await.map_err(|_| HttpError::WriteRequest)?;
    Ok(())
}

/// Reads an HTTP response off a raw byte stream.
///
/// The header phase is consumed strictly byte-by-byte, so memory stays
/// bounded to one line and the stream is left positioned exactly at the
/// first body byte with no buffered lookahead to hand back.
pub struct ResponseReader<R: Read> {
    stream: R,
    pending: Option<u8>,
}

impl<R: Read> ResponseReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            pending: None,
        }
    }

    /// Wait until the first response byte is available.
    ///
    /// The byte is kept and replayed by the header parse.
    pub async fn wait_first_byte(&mut self) -> HttpResult {
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await {
            Ok(0) => Err(HttpError::Closed),
            Ok(_) => {
                self.pending = Some(byte[0]);
                Ok(())
            }
            Err(_) => Err(HttpError::Read),
        }
    }

    /// Consume status line and headers until the blank line, a rejected
    /// status line, or stream end. Read failures finalize the headers the
    /// same way a closed stream does.
    pub async fn read_headers(&mut self) -> ResponseHeaders {
        let mut headers = ResponseHeaders::new();
        let mut buf = [0u8; MAX_LINE];
        loop {
            let Some(line) = self.read_line(&mut buf).await else {
                break;
            };
            match headers.feed_line(line) {
                LineOutcome::Continue => {}
                LineOutcome::EndOfHeaders | LineOutcome::Abort => break,
            }
        }
        headers
    }

    /// The remaining stream, positioned at the first body byte.
    pub fn body(&mut self) -> &mut R {
        &mut self.stream
    }

    /// Read one line, terminator excluded and trailing whitespace trimmed.
    /// Returns None once the stream is exhausted.
    async fn read_line<'b>(&mut self, buf: &'b mut [u8; MAX_LINE]) -> Option<&'b str> {
        let mut len = 0;
        let mut any = false;
        loop {
            let Some(byte) = self.next_byte().await else {
                break;
            };
            any = true;
            if byte == b'\n' {
                break;
            }
            if len < buf.len() {
                // Non-ASCII bytes cannot occur in the headers we accept;
                // substitute so the line stays valid UTF-8.
                buf[len] = if byte.is_ascii() { byte } else { b'?' };
                len += 1;
            }
        }
        if !any {
            return None;
        }
        while len > 0 && buf[len - 1].is_ascii_whitespace() {
            len -= 1;
        }
        Some(core::str::from_utf8(&buf[..len]).unwrap_or(""))
    }

    async fn next_byte(&mut self) -> Option<u8> {
        if let Some(byte) = self.pending.take() {
            return Some(byte);
        }
        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(byte[0]),
        }
    }
}
