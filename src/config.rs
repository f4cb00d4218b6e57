pub struct WifiConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

pub struct MqttConfig {
    pub host: &'static str,
    pub port: u16,
    pub client_id: &'static str,
}

pub struct OtaConfig {
    /// Topic whose messages carry a firmware location string.
    pub trigger_topic: &'static str,
    /// TCP port the firmware host serves images on.
    pub firmware_port: u16,
}

pub struct DeviceConfig {
    pub name: &'static str,
    pub hostname: &'static str,
}

pub struct FirmwareConfig {
    pub version: &'static str,
}

pub const WIFI: WifiConfig = WifiConfig {
    ssid: env!("WIFI_SSID"),
    password: env!("WIFI_PASSWORD"),
};

pub const MQTT: MqttConfig = MqttConfig {
    host: env!("MQTT_HOST"),
    port: 1883,
    client_id: "emberlink-ota",
};

pub const OTA: OtaConfig = OtaConfig {
    trigger_topic: "/update/url/",
    firmware_port: 80,
};

pub const DEVICE: DeviceConfig = DeviceConfig {
    name: "Emberlink OTA Agent",
    hostname: "emberlink-ota",
};

pub const FIRMWARE: FirmwareConfig = FirmwareConfig {
    version: env!("BUILD_VERSION"),
};
