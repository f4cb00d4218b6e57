pub mod fetch;
pub mod headers;

pub use fetch::{ResponseReader, write_request};
pub use headers::{FIRMWARE_MEDIA_TYPE, LineOutcome, ResponseHeaders};

#[derive(Debug)]
pub enum HttpError {
    Read,
    Closed,
    WriteRequest,
    FormatHeaders,
}

impl From<core::fmt::Error> for HttpError {
    fn from(_error: core::fmt::Error) -> Self {
        HttpError::FormatHeaders
    }
}

pub type HttpResult = Result<(), HttpError>;
