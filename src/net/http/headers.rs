use core::fmt::Write;

use heapless::String;

/// The single media type accepted as a firmware payload.
pub const FIRMWARE_MEDIA_TYPE: &str = "application/octet-stream";

const STATUS_LINE_PREFIX: &str = "HTTP/1.1";
const SUCCESS_STATUS_TOKEN: &str = "200";
const CONTENT_LENGTH_PREFIX: &str = "Content-Length: ";
const CONTENT_TYPE_PREFIX: &str = "Content-Type: ";

const MAX_CONTENT_TYPE: usize = 48;

pub trait BufferedWriter {
    fn write_to(&self, writer: &mut impl Write) -> Result<(), core::fmt::Error>;
}

/// Request line and headers for fetching a firmware image.
///
/// The wire shape is fixed: plain `GET` with `Host`, `Cache-Control:
/// no-cache` and `Connection: close`, terminated by a blank line.
pub struct FirmwareRequest<'a> {
    pub host: &'a str,
    pub path: &'a str,
}

impl BufferedWriter for FirmwareRequest<'_> {
    fn write_to(&self, writer: &mut impl Write) -> Result<(), core::fmt::Error> {
        write!(writer, "GET {} HTTP/1.1\r\n", self.path)?;
        write!(writer, "Host: {}\r\n", self.host)?;
        write!(writer, "Cache-Control: no-cache\r\n")?;
        write!(writer, "Connection: close\r\n")?;
        write!(writer, "\r\n")?;
        Ok(())
    }
}

/// What the caller should do after feeding one header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Keep feeding lines.
    Continue,
    /// Blank line seen; the body starts next.
    EndOfHeaders,
    /// Rejected status line; stop feeding, drain and close the transport.
    Abort,
}

/// Response metadata accumulated one header line at a time.
///
/// Lives for a single update attempt; a fresh value is built per response
/// so nothing leaks between consecutive triggers.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    pub status_accepted: bool,
    /// Declared body length; 0 means absent or unparseable.
    pub content_length: u32,
    pub content_type: String<MAX_CONTENT_TYPE>,
    pub payload_acceptable: bool,
    pub aborted: bool,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one header line, already stripped of the line terminator
    /// and trailing whitespace.
    ///
    /// Unrecognized headers are ignored so new server headers cannot break
    /// the parse. `payload_acceptable` is never retracted once set.
    pub fn feed_line(&mut self, line: &str) -> LineOutcome {
        if line.is_empty() {
            return LineOutcome::EndOfHeaders;
        }

        if line.starts_with(STATUS_LINE_PREFIX) {
            if line.contains(SUCCESS_STATUS_TOKEN) {
                self.status_accepted = true;
            } else {
                self.aborted = true;
                return LineOutcome::Abort;
            }
        } else if let Some(value) = line.strip_prefix(CONTENT_LENGTH_PREFIX) {
            // Malformed digits read as 0, i.e. an absent length.
            self.content_length = value.trim().parse().unwrap_or(0);
        } else if let Some(value) = line.strip_prefix(CONTENT_TYPE_PREFIX) {
            self.content_type.clear();
            let _ = self.content_type.push_str(value);
            if value == FIRMWARE_MEDIA_TYPE {
                self.payload_acceptable = true;
            }
        }

        LineOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    fn feed(lines: &[&str]) -> ResponseHeaders {
        let mut headers = ResponseHeaders::new();
        for line in lines {
            if headers.feed_line(line) != LineOutcome::Continue {
                break;
            }
        }
        headers
    }

    #[test]
    fn request_matches_wire_contract() {
        let request = FirmwareRequest {
            host: "firmware.example.com",
            path: "/fw/device-42.bin",
        };
        let mut out = String::<256>::new();
        request.write_to(&mut out).unwrap();
        assert_eq!(
            out.as_str(),
            "GET /fw/device-42.bin HTTP/1.1\r\n\
             Host: firmware.example.com\r\n\
             Cache-Control: no-cache\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn accepts_success_status_line() {
        let mut headers = ResponseHeaders::new();
        assert_eq!(headers.feed_line("HTTP/1.1 200 OK"), LineOutcome::Continue);
        assert!(headers.status_accepted);
        assert!(!headers.aborted);
    }

    #[test]
    fn non_success_status_aborts() {
        let mut headers = ResponseHeaders::new();
        assert_eq!(
            headers.feed_line("HTTP/1.1 404 Not Found"),
            LineOutcome::Abort
        );
        assert!(headers.aborted);
        assert!(!headers.status_accepted);
    }

    #[test]
    fn parses_content_length() {
        let headers = feed(&["HTTP/1.1 200 OK", "Content-Length: 1048576"]);
        assert_eq!(headers.content_length, 1_048_576);
    }

    #[test]
    fn malformed_content_length_reads_as_absent() {
        let headers = feed(&["HTTP/1.1 200 OK", "Content-Length: many"]);
        assert_eq!(headers.content_length, 0);
    }

    #[test]
    fn exact_content_type_match_required() {
        let exact = feed(&["Content-Type: application/octet-stream"]);
        assert!(exact.payload_acceptable);

        // Case differences and parameters must not match.
        for line in [
            "Content-Type: Application/Octet-Stream",
            "Content-Type: application/octet-stream; charset=binary",
            "Content-Type: text/plain",
        ] {
            let headers = feed(&[line]);
            assert!(!headers.payload_acceptable, "matched: {line}");
        }
    }

    #[test]
    fn acceptance_is_never_retracted() {
        let mut headers = ResponseHeaders::new();
        headers.feed_line("Content-Type: application/octet-stream");
        headers.feed_line("Content-Type: text/plain");
        assert!(headers.payload_acceptable);
    }

    #[test]
    fn unrecognized_headers_are_ignored() {
        let headers = feed(&[
            "HTTP/1.1 200 OK",
            "Server: nginx",
            "X-Robots-Tag: none",
            "Content-Length: 64",
        ]);
        assert_eq!(headers.content_length, 64);
        assert!(!headers.payload_acceptable);
    }

    #[test]
    fn blank_line_ends_headers() {
        let mut headers = ResponseHeaders::new();
        assert_eq!(headers.feed_line(""), LineOutcome::EndOfHeaders);
    }
}
