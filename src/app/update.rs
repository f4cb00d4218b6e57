use embassy_time::{Duration, with_timeout};
use embedded_io_async::{Read, Write};

use crate::domain::ports::UpdateSlot;
use crate::domain::types::{RemoteLocation, UpdateOutcome};
use crate::net::http::{ResponseHeaders, ResponseReader, write_request};

/// Wait bound for the first response byte after the request went out.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Verdict of the validation policy over a parsed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Reject(UpdateOutcome),
}

/// Decide whether a response is an acceptable firmware payload.
///
/// Flash writing is allowed only for an accepted status line with a
/// positive declared length and the exact firmware media type. A rejected
/// status line stops header consumption early, so it surfaces here as a
/// response without content.
pub fn decide(headers: &ResponseHeaders) -> Decision {
    if !headers.aborted && headers.content_length > 0 && headers.payload_acceptable {
        return Decision::Proceed;
    }
    if headers.aborted || headers.content_length == 0 {
        Decision::Reject(UpdateOutcome::NoContent)
    } else {
        Decision::Reject(UpdateOutcome::InvalidContentType)
    }
}

/// Run one update exchange over an established transport.
///
/// Writes the request, parses the response headers, applies the validation
/// policy and streams the body into the update slot. Exactly one outcome is
/// produced; the caller owns the transport and closes it afterwards, and
/// performs the actual restart when the outcome is `Rebooting`.
///
/// The slot is reserved at most once, and a successful reservation is
/// always followed by `finalize`, even when the stream ends short.
pub async fn fetch_and_install<T, S>(
    stream: &mut T,
    location: &RemoteLocation<'_>,
    slot: &mut S,
    response_timeout: Duration,
) -> UpdateOutcome
where
    T: Read + Write,
    S: UpdateSlot,
{
    if write_request(stream, location.host, location.path)
        .await
        .is_err()
    {
        return UpdateOutcome::ConnectFailed;
    }

    let mut reader = ResponseReader::new(&mut *stream);

    // The only bounded wait in the pipeline. Once the server has started
    // answering, header and body reads may block without a bound.
    match with_timeout(response_timeout, reader.wait_first_byte()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) | Err(_) => return UpdateOutcome::Timeout,
    }

    let headers = reader.read_headers().await;
    log::debug!(
        "ota: response parsed, length={} type={:?} accepted={}",
        headers.content_length,
        headers.content_type,
        headers.payload_acceptable
    );

    let expected = headers.content_length;
    match decide(&headers) {
        Decision::Reject(outcome) => outcome,
        Decision::Proceed => {
            if !slot.reserve(expected) {
                return UpdateOutcome::InsufficientSpace;
            }

            let written = slot.write_stream(reader.body(), expected).await;

            // Seal regardless of a short stream; finalize reports whether
            // a partial image left the slot in a recoverable state.
            let sealed = slot.finalize();
            if written != expected {
                return UpdateOutcome::PartialWrite { written, expected };
            }
            if !sealed || !slot.is_complete() {
                return UpdateOutcome::FinalizeError {
                    code: slot.last_error_code(),
                };
            }
            UpdateOutcome::Rebooting
        }
    }
}
