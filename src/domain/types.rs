use heapless::String;

/// Longest firmware location string a trigger message may carry.
pub const MAX_LOCATION_LEN: usize = 128;

/// One firmware update trigger, consumed exactly once by the updater task.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub location: String<MAX_LOCATION_LEN>,
    pub port: u16,
}

impl UpdateRequest {
    pub fn new(location: String<MAX_LOCATION_LEN>, port: u16) -> Self {
        Self { location, port }
    }
}

/// A firmware location split into its host and resource path.
///
/// The split point is the last `/` in the input; the separator belongs to
/// the path. Inputs without a separator yield an empty path, which callers
/// must treat as unusable. Scheme prefixes are not recognized; triggers are
/// expected to publish bare `host/path` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLocation<'a> {
    pub host: &'a str,
    pub path: &'a str,
}

impl<'a> RemoteLocation<'a> {
    pub fn split(location: &'a str) -> Self {
        match location.rfind('/') {
            Some(index) => Self {
                host: &location[..index],
                path: &location[index..],
            },
            None => Self {
                host: location,
                path: "",
            },
        }
    }
}

/// Terminal result of one update attempt. Produced exactly once; the only
/// variant that does not return control to the caller is `Rebooting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Image written, sealed and verified; a device restart is due.
    Rebooting,
    /// The transport to the firmware host could not be established.
    ConnectFailed,
    /// No response byte arrived within the wait bound.
    Timeout,
    /// The response carried no usable body (missing or zero length,
    /// or a rejected status line).
    NoContent,
    /// The response body is not a firmware payload.
    InvalidContentType,
    /// The update slot could not reserve room for the image.
    InsufficientSpace,
    /// The stream ended before the declared length was consumed.
    PartialWrite { written: u32, expected: u32 },
    /// Sealing the written image failed; the slot contents are discarded.
    FinalizeError { code: u8 },
}
