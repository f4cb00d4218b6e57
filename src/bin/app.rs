#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::Duration;

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};

use emberlink_esp_ota::config;
use emberlink_esp_ota::infrastructure::drivers::{init_network_stack, wait_for_connection};
use emberlink_esp_ota::infrastructure::tasks::{
    mqtt_trigger_task, network_runner_task, updater_task, wifi_connection_task,
};

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    esp_println::logger::init_logger_from_env();
    log::info!(
        "{} starting, build {}",
        config::DEVICE.name,
        config::FIRMWARE.version
    );

    // Initialize hardware
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // Allocate heap memory (64 + 32 KB)
    esp_alloc::heap_allocator!(
        #[unsafe(link_section = ".dram2_uninit")] size: 64 * 1024
    );
    esp_alloc::heap_allocator!(size: 32 * 1024);

    // Start rtos
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Initialize network stack and spawn network tasks
    let (stack, runner, controller) = init_network_stack(peripherals.WIFI);
    spawner.spawn(wifi_connection_task(controller)).ok();
    spawner.spawn(network_runner_task(runner)).ok();

    // The update pipeline owns the flash peripheral for its whole lifetime
    spawner.spawn(updater_task(stack, peripherals.FLASH)).ok();

    // Wait for network connection before starting the trigger listener
    let net_config = wait_for_connection(stack).await;
    log::info!("network: up, address {}", net_config.address);

    spawner.spawn(mqtt_trigger_task(stack)).ok();

    loop {
        embassy_time::Timer::after(Duration::from_secs(5)).await;
    }
}
