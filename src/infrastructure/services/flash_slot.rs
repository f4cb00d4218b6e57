use embedded_io_async::Read;
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};
use esp_bootloader_esp_idf::ota::OtaImageState;
use esp_bootloader_esp_idf::ota_updater::OtaUpdater;
use esp_bootloader_esp_idf::partitions::PARTITION_TABLE_MAX_LEN;
use esp_storage::FlashStorage;

use crate::domain::ports::UpdateSlot;

const ALIGN: usize = 4;
// Most ESP flash backends operate on 4 KiB sectors.
const ERASE_SECTOR: u32 = 4096;
const STREAM_CHUNK_SIZE: usize = 1024;

/// Why the slot refused or lost an update image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotFault {
    None,
    PartitionTable,
    Capacity,
    Erase,
    Write,
    Source,
    Incomplete,
    Activate,
}

impl SlotFault {
    const fn code(self) -> u8 {
        match self {
            SlotFault::None => 0,
            SlotFault::PartitionTable => 1,
            SlotFault::Capacity => 2,
            SlotFault::Erase => 3,
            SlotFault::Write => 4,
            SlotFault::Source => 5,
            SlotFault::Incomplete => 6,
            SlotFault::Activate => 7,
        }
    }
}

/// Update slot backed by the inactive OTA partition.
///
/// One value covers one update attempt; the updater task builds a fresh
/// instance per trigger so no slot state survives between attempts. Each
/// phase re-reads the partition table instead of holding a borrowing
/// partition handle across await points.
pub struct FlashUpdateSlot {
    flash: *mut FlashStorage<'static>,
    expected: u32,
    received: u32,
    reserved: bool,
    activated: bool,
    fault: SlotFault,
}

impl FlashUpdateSlot {
    /// `flash` must stay exclusively owned by the calling task for the
    /// whole attempt.
    pub fn new(flash: *mut FlashStorage<'static>) -> Self {
        Self {
            flash,
            expected: 0,
            received: 0,
            reserved: false,
            activated: false,
            fault: SlotFault::None,
        }
    }
}

impl UpdateSlot for FlashUpdateSlot {
    fn reserve(&mut self, total_size: u32) -> bool {
        if self.reserved || total_size == 0 {
            return false;
        }

        // Safety: flash is owned by the updater task (single owner).
        let flash = unsafe { &mut *self.flash };
        let mut part_buffer = [0u8; PARTITION_TABLE_MAX_LEN];
        let Ok(mut updater) = OtaUpdater::new(flash, &mut part_buffer) else {
            self.fault = SlotFault::PartitionTable;
            return false;
        };
        let Ok((mut partition, part_type)) = updater.next_partition() else {
            self.fault = SlotFault::PartitionTable;
            return false;
        };

        let part_capacity = u32::try_from(partition.capacity()).unwrap_or(u32::MAX);
        if total_size > part_capacity {
            self.fault = SlotFault::Capacity;
            return false;
        }

        // NOR flash requires erase (sets bits to 1) before write. Erase
        // only what the incoming image needs, rounded up to a sector.
        let erase_size = total_size.saturating_add(ERASE_SECTOR - 1) / ERASE_SECTOR * ERASE_SECTOR;
        let erase_size = erase_size.min(part_capacity);
        log::info!(
            "flash: reserving {} bytes on partition {:?} (erasing {})",
            total_size,
            part_type,
            erase_size
        );
        if partition.erase(0, erase_size).is_err() {
            self.fault = SlotFault::Erase;
            return false;
        }

        self.expected = total_size;
        self.reserved = true;
        true
    }

    #[allow(clippy::cast_possible_truncation)] // ESP32 is 32-bit; sizes fit usize
    async fn write_stream(&mut self, source: &mut impl Read, total_size: u32) -> u32 {
        if !self.reserved {
            return 0;
        }

        // Safety: flash is owned by the updater task (single owner).
        let flash = unsafe { &mut *self.flash };
        let mut part_buffer = [0u8; PARTITION_TABLE_MAX_LEN];
        let Ok(mut updater) = OtaUpdater::new(flash, &mut part_buffer) else {
            self.fault = SlotFault::PartitionTable;
            return 0;
        };
        let Ok((mut partition, _part_type)) = updater.next_partition() else {
            self.fault = SlotFault::PartitionTable;
            return 0;
        };

        let mut chunk = [0u8; STREAM_CHUNK_SIZE];
        let mut writer = AlignedWriter::new();
        let mut received: u32 = 0;

        while received < total_size {
            let want = ((total_size - received) as usize).min(chunk.len());
            let n = match source.read(&mut chunk[..want]).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(_) => {
                    self.fault = SlotFault::Source;
                    break;
                }
            };
            if let Err(fault) = writer.push(&mut partition, &chunk[..n]) {
                self.fault = fault;
                break;
            }
            received = received.saturating_add(u32::try_from(n).unwrap_or(u32::MAX));
        }

        if self.fault == SlotFault::None {
            if let Err(fault) = writer.flush(&mut partition) {
                self.fault = fault;
            }
        }

        log::info!("flash: received {}/{} bytes", received, total_size);
        self.received = received;
        received
    }

    fn finalize(&mut self) -> bool {
        if !self.reserved {
            return false;
        }
        if self.fault != SlotFault::None {
            return false;
        }
        if self.received != self.expected {
            // An incomplete image must never be scheduled for boot.
            self.fault = SlotFault::Incomplete;
            return false;
        }

        // Safety: flash is owned by the updater task (single owner).
        let flash = unsafe { &mut *self.flash };
        let mut part_buffer = [0u8; PARTITION_TABLE_MAX_LEN];
        let Ok(mut updater) = OtaUpdater::new(flash, &mut part_buffer) else {
            self.fault = SlotFault::PartitionTable;
            return false;
        };
        if updater
            .activate_next_partition()
            .and_then(|()| updater.set_current_ota_state(OtaImageState::New))
            .is_err()
        {
            self.fault = SlotFault::Activate;
            return false;
        }

        self.activated = true;
        true
    }

    fn is_complete(&self) -> bool {
        self.activated && self.received == self.expected
    }

    fn last_error_code(&self) -> u8 {
        self.fault.code()
    }
}

/// Stages stream bytes into 4-byte words on their way to flash.
///
/// Network chunks arrive at arbitrary sizes while the flash backends only
/// accept word-aligned offsets and lengths. Up to three leftover bytes sit
/// in `word` between chunks; `flush` pads the last word with the
/// erased-byte value before it goes out.
struct AlignedWriter {
    offset: u32,
    word: [u8; ALIGN],
    fill: usize,
}

impl AlignedWriter {
    const fn new() -> Self {
        Self {
            offset: 0,
            word: [0xFF; ALIGN],
            fill: 0,
        }
    }

    fn push<F: NorFlash>(&mut self, partition: &mut F, mut data: &[u8]) -> Result<(), SlotFault> {
        // Finish a word the previous chunk left half-staged.
        while self.fill != 0 && !data.is_empty() {
            self.word[self.fill] = data[0];
            self.fill += 1;
            data = &data[1..];
            if self.fill == ALIGN {
                self.commit_word(partition)?;
            }
        }

        // The rest streams through without staging; bytes short of a
        // whole word wait for the next chunk.
        let whole = data.len() - data.len() % ALIGN;
        if whole != 0 {
            partition
                .write(self.offset, &data[..whole])
                .map_err(|_| SlotFault::Write)?;
            self.offset += u32::try_from(whole).unwrap_or(u32::MAX);
        }
        for &byte in &data[whole..] {
            self.word[self.fill] = byte;
            self.fill += 1;
        }

        Ok(())
    }

    /// Write out a staged partial word, padded with erased-flash bytes.
    fn flush<F: NorFlash>(&mut self, partition: &mut F) -> Result<(), SlotFault> {
        if self.fill == 0 {
            return Ok(());
        }
        self.word[self.fill..].fill(0xFF);
        self.commit_word(partition)
    }

    fn commit_word<F: NorFlash>(&mut self, partition: &mut F) -> Result<(), SlotFault> {
        partition
            .write(self.offset, &self.word)
            .map_err(|_| SlotFault::Write)?;
        self.offset += ALIGN as u32;
        self.word = [0xFF; ALIGN];
        self.fill = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use embedded_storage::nor_flash::{
        ErrorType, NorFlashError, NorFlashErrorKind, ReadNorFlash,
    };

    use super::*;

    #[derive(Debug)]
    struct RamFlashError;

    impl NorFlashError for RamFlashError {
        fn kind(&self) -> NorFlashErrorKind {
            NorFlashErrorKind::Other
        }
    }

    /// RAM-backed partition that rejects unaligned writes, like the real
    /// flash backends do.
    struct RamFlash {
        data: std::vec::Vec<u8>,
    }

    impl RamFlash {
        fn new(size: usize) -> Self {
            Self {
                data: std::vec![0xFF; size],
            }
        }
    }

    impl ErrorType for RamFlash {
        type Error = RamFlashError;
    }

    impl ReadNorFlash for RamFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let offset = offset as usize;
            bytes.copy_from_slice(&self.data[offset..offset + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for RamFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 4096;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.data[from as usize..to as usize].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(RamFlashError);
            }
            self.data[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
            Ok(())
        }
    }

    fn write_chunked(flash: &mut RamFlash, data: &[u8], chunk_size: usize) -> u32 {
        let mut writer = AlignedWriter::new();
        for chunk in data.chunks(chunk_size) {
            writer.push(flash, chunk).unwrap();
        }
        writer.flush(flash).unwrap();
        writer.offset
    }

    #[test]
    fn arbitrary_chunk_sizes_produce_the_same_image() {
        let image: std::vec::Vec<u8> = (0u32..1000).map(|i| (i % 251) as u8).collect();

        for chunk_size in [1, 3, 4, 5, 7, 64, 1000] {
            let mut flash = RamFlash::new(4096);
            let written = write_chunked(&mut flash, &image, chunk_size);

            assert_eq!(&flash.data[..image.len()], &image[..], "chunk {chunk_size}");
            assert_eq!(written as usize, image.len().next_multiple_of(ALIGN));
        }
    }

    #[test]
    fn final_partial_word_is_padded_with_erased_bytes() {
        let mut flash = RamFlash::new(64);
        let written = write_chunked(&mut flash, &[1, 2, 3, 4, 5, 6], 6);

        assert_eq!(written, 8);
        assert_eq!(&flash.data[..8], &[1, 2, 3, 4, 5, 6, 0xFF, 0xFF]);
    }

    #[test]
    fn every_flush_is_word_aligned() {
        // RamFlash::write errors on any unaligned access, so a clean run
        // over awkward chunk sizes proves alignment.
        let image = [0xA5u8; 37];
        let mut flash = RamFlash::new(64);
        let written = write_chunked(&mut flash, &image, 5);

        assert_eq!(written, 40);
        assert_eq!(&flash.data[..37], &image[..]);
    }
}
