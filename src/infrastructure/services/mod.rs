mod flash_slot;

pub use flash_slot::FlashUpdateSlot;
