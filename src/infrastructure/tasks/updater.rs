use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};
use embassy_time::{Duration, with_timeout};
use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use static_cell::StaticCell;

use crate::app::{RESPONSE_TIMEOUT, fetch_and_install};
use crate::controllers::UpdateReporter;
use crate::domain::types::{RemoteLocation, UpdateOutcome, UpdateRequest};
use crate::infrastructure::drivers::resolve_host;
use crate::infrastructure::services::FlashUpdateSlot;

// One slot: a single queued trigger at most; anything beyond is rejected.
const UPDATE_QUEUE_DEPTH: usize = 1;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RX_BUFFER_SIZE: usize = 2048;
const TX_BUFFER_SIZE: usize = 1024;

pub type UpdateSender =
    Sender<'static, CriticalSectionRawMutex, UpdateRequest, UPDATE_QUEUE_DEPTH>;

static UPDATE_CHANNEL: Channel<CriticalSectionRawMutex, UpdateRequest, UPDATE_QUEUE_DEPTH> =
    Channel::new();

pub fn get_update_sender() -> UpdateSender {
    UPDATE_CHANNEL.sender()
}

static FLASH_STORAGE_CELL: StaticCell<FlashStorage<'static>> = StaticCell::new();

/// Runs update attempts one at a time.
///
/// Owns the flash storage and the fetch socket exclusively, so no locking
/// is needed anywhere in the pipeline. Each received request gets a fresh
/// slot and transport; nothing survives between attempts.
#[embassy_executor::task]
pub async fn updater_task(stack: Stack<'static>, flash: FLASH<'static>) {
    log::info!("updater: starting");

    let flash = FLASH_STORAGE_CELL.init(FlashStorage::new(flash)) as *mut FlashStorage<'static>;
    let reporter = UpdateReporter::new();
    let rx = UPDATE_CHANNEL.receiver();

    loop {
        let request = rx.receive().await;
        reporter.on_trigger(request.location.as_str());

        let outcome = run_attempt(stack, flash, &request, &reporter).await;
        reporter.on_outcome(&outcome);

        if outcome == UpdateOutcome::Rebooting {
            esp_hal::system::software_reset();
        }
    }
}

async fn run_attempt(
    stack: Stack<'static>,
    flash: *mut FlashStorage<'static>,
    request: &UpdateRequest,
    reporter: &UpdateReporter,
) -> UpdateOutcome {
    let location = RemoteLocation::split(request.location.as_str());
    // A location without a separator names no resource.
    if location.path.is_empty() {
        return UpdateOutcome::ConnectFailed;
    }

    let Ok(address) = resolve_host(stack, location.host).await else {
        return UpdateOutcome::ConnectFailed;
    };

    let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TX_BUFFER_SIZE];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);

    match with_timeout(CONNECT_TIMEOUT, socket.connect((address, request.port))).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) | Err(_) => {
            socket.abort();
            return UpdateOutcome::ConnectFailed;
        }
    }
    reporter.on_fetch(location.host, location.path);

    let mut slot = FlashUpdateSlot::new(flash);
    let outcome = fetch_and_install(&mut socket, &location, &mut slot, RESPONSE_TIMEOUT).await;

    // Whatever the server still has queued is dropped with the socket.
    socket.abort();
    outcome
}
