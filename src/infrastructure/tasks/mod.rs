pub(crate) mod network;
pub(crate) mod trigger;
pub(crate) mod updater;

pub use network::{network_runner_task, wifi_connection_task};
pub use trigger::mqtt_trigger_task;
pub use updater::{get_update_sender, updater_task};
