use core::str::FromStr;

use embassy_futures::select::{Either, select};
use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use heapless::String;
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::utils::rng_generator::CountingRng;

use super::updater::get_update_sender;
use crate::config;
use crate::domain::types::{MAX_LOCATION_LEN, UpdateRequest};
use crate::infrastructure::drivers::resolve_host;

const MQTT_BUF_SIZE: usize = 512;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const KEEPALIVE_PING: Duration = Duration::from_secs(30);

/// MQTT trigger task: subscribes to the update topic and forwards each
/// location payload to the updater. Reconnects with a fixed backoff.
#[embassy_executor::task]
pub async fn mqtt_trigger_task(stack: Stack<'static>) {
    log::info!("mqtt: starting trigger task");
    loop {
        if let Err(()) = listen_for_triggers(stack).await {
            log::warn!(
                "mqtt: connection lost, reconnecting in {}s...",
                RECONNECT_DELAY.as_secs()
            );
            Timer::after(RECONNECT_DELAY).await;
        }
    }
}

async fn listen_for_triggers(stack: Stack<'static>) -> Result<(), ()> {
    let mut rx_buffer = [0u8; 1024];
    let mut tx_buffer = [0u8; 1024];
    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(Duration::from_secs(90)));

    let broker_addr = resolve_host(stack, config::MQTT.host).await?;
    log::info!(
        "mqtt: connecting to broker {:?}:{}...",
        broker_addr,
        config::MQTT.port
    );
    if let Err(e) = socket.connect((broker_addr, config::MQTT.port)).await {
        socket.abort();
        log::warn!("mqtt: TCP connect failed: {:?}", e);
        return Err(());
    }

    let mut client_config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
    client_config.add_client_id(config::MQTT.client_id);
    client_config.max_packet_size = MQTT_BUF_SIZE as u32;

    let mut recv_buffer = [0u8; MQTT_BUF_SIZE];
    let mut write_buffer = [0u8; MQTT_BUF_SIZE];
    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        &mut write_buffer,
        MQTT_BUF_SIZE,
        &mut recv_buffer,
        MQTT_BUF_SIZE,
        client_config,
    );

    client.connect_to_broker().await.map_err(|_| ())?;
    client
        .subscribe_to_topic(config::OTA.trigger_topic)
        .await
        .map_err(|_| ())?;
    log::info!("mqtt: subscribed to {}", config::OTA.trigger_topic);

    loop {
        match select(client.receive_message(), Timer::after(KEEPALIVE_PING)).await {
            Either::First(Ok((topic, payload))) => handle_message(topic, payload),
            Either::First(Err(_)) => return Err(()),
            Either::Second(()) => client.send_ping().await.map_err(|_| ())?,
        }
    }
}

fn handle_message(topic: &str, payload: &[u8]) {
    if topic != config::OTA.trigger_topic {
        return;
    }

    // The payload is the raw location string, no envelope.
    let Ok(text) = core::str::from_utf8(payload) else {
        log::warn!("mqtt: trigger payload is not UTF-8, ignoring");
        return;
    };
    let Ok(location) = String::<MAX_LOCATION_LEN>::from_str(text) else {
        log::warn!("mqtt: trigger location is too long, ignoring");
        return;
    };

    let request = UpdateRequest::new(location, config::OTA.firmware_port);
    if get_update_sender().try_send(request).is_err() {
        log::warn!("mqtt: an update is already queued, trigger dropped");
    }
}
