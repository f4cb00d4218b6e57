use embedded_io_async::Read;

/// Port for the device's firmware update slot.
///
/// One instance covers one update attempt: `reserve` may be called at most
/// once, and a successful reservation must be followed by `finalize` before
/// the next attempt may reserve again. Implementations report failures
/// through the return values and `last_error_code` rather than panicking.
#[allow(async_fn_in_trait)]
pub trait UpdateSlot {
    /// Reserve room for an image of `total_size` bytes.
    ///
    /// Returns false when the slot cannot hold the image.
    fn reserve(&mut self, total_size: u32) -> bool;

    /// Stream up to `total_size` bytes from `source` into the slot.
    ///
    /// Stops early when the source ends or the slot fails; returns the
    /// number of bytes consumed from the source.
    async fn write_stream(&mut self, source: &mut impl Read, total_size: u32) -> u32;

    /// Seal the written image and schedule it for the next boot.
    fn finalize(&mut self) -> bool;

    /// Whether the full image was received and activated.
    fn is_complete(&self) -> bool;

    /// Diagnostic code for the most recent failure (0 = none).
    fn last_error_code(&self) -> u8;
}
