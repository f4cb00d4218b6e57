//! Update reporting
//!
//! Narrates the lifecycle of an update attempt so every terminal outcome
//! is distinguishable from the device log alone.

use crate::domain::types::UpdateOutcome;

/// Update reporter
///
/// Provides one log line per pipeline event; the updater task drives it.
pub struct UpdateReporter;

impl UpdateReporter {
    /// Create a new update reporter
    pub fn new() -> Self {
        Self {}
    }

    /// A trigger message arrived
    pub fn on_trigger(&self, location: &str) {
        log::info!("ota: update requested from {}", location);
    }

    /// The transport is connected and the image fetch begins
    pub fn on_fetch(&self, host: &str, path: &str) {
        log::info!("ota: fetching {} from {}", path, host);
    }

    /// One terminal outcome per attempt
    pub fn on_outcome(&self, outcome: &UpdateOutcome) {
        match outcome {
            UpdateOutcome::Rebooting => {
                log::info!("ota: update complete and verified, rebooting");
            }
            UpdateOutcome::ConnectFailed => {
                log::warn!("ota: connection to the firmware host failed");
            }
            UpdateOutcome::Timeout => {
                log::warn!("ota: server sent no response within the wait bound");
            }
            UpdateOutcome::NoContent => {
                log::warn!("ota: there was no content in the response");
            }
            UpdateOutcome::InvalidContentType => {
                log::warn!("ota: response is not a firmware payload, refusing to flash");
            }
            UpdateOutcome::InsufficientSpace => {
                log::warn!("ota: not enough space to begin the update");
            }
            UpdateOutcome::PartialWrite { written, expected } => {
                log::warn!("ota: wrote only {}/{} bytes", written, expected);
            }
            UpdateOutcome::FinalizeError { code } => {
                log::warn!("ota: finalize failed (code {})", code);
            }
        }
    }
}

impl Default for UpdateReporter {
    fn default() -> Self {
        Self::new()
    }
}
