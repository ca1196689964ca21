#![cfg_attr(not(test), no_std)]

//! ESP32-C3 Light Orchestra Node Library
//!
//! This library provides the modules for a light-to-tone instrument node: it
//! samples an ambient-light sensor, serves the readings over HTTP, and plays
//! melodies pushed back by the conductor on a PWM buzzer.

extern crate alloc;

pub mod http;
pub mod indicator;
pub mod melody;
pub mod playback;
pub mod quantizer;
pub mod router;
pub mod sampler;
pub mod sequencer;
pub mod server;

#[cfg(feature = "esp32c3")]
pub mod board;
#[cfg(feature = "esp32c3")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Default configuration constants
pub mod config {
    use embassy_time::Duration;

    /// HTTP port the conductor talks to
    pub const HTTP_PORT: u16 = 80;

    /// API version reported by `/health`
    pub const API_VERSION: &str = "1.0.0";

    /// Device identifier reported by `/health`
    /// Read from environment variables at compile time
    pub const DEVICE_ID: &str = env!("DEVICE_ID");

    /// WiFi configuration
    /// Read from environment variables at compile time
    pub const WIFI_SSID: &str = env!("WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

    /// WiFi association + DHCP timeout in milliseconds
    pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// WiFi reconnection interval in milliseconds
    pub const WIFI_RECONNECT_INTERVAL_MS: u64 = 5_000;

    /// Light sensor ADC pin (ADC1 channel 2)
    pub const SENSOR_ADC_PIN: u8 = 2;

    /// Buzzer PWM pin
    pub const BUZZER_PIN: u8 = 5;

    /// Record button pin, pulled down, active high
    pub const TRIGGER_PIN: u8 = 6;

    /// Status LED pins
    pub const RED_LED_PIN: u8 = 7;
    pub const GREEN_LED_PIN: u8 = 8;
    pub const BLUE_LED_PIN: u8 = 10;

    /// Length of one acquisition window
    pub const SAMPLE_WINDOW: Duration = Duration::from_millis(10_000);

    /// Time between two sensor reads
    pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

    /// Upper bound on readings kept per window (10 s / 50 ms plus headroom)
    pub const MAX_READINGS: usize = 256;

    /// Full-scale value of a raw reading
    pub const RAW_MAX: u16 = u16::MAX;

    /// Readings are scaled into `0..=SCALED_MAX` before they leave the node
    pub const SCALED_MAX: u16 = 699;

    /// Upper bucket boundaries of the note scale, in scaled units
    pub const SCALE_THRESHOLDS: [u16; 7] = [99, 199, 299, 399, 499, 599, 699];

    /// Frequencies of the note scale in Hz (C4 D4 E4 F4 G4 A4 B4)
    pub const SCALE_NOTES_HZ: [u32; 7] = [262, 294, 330, 349, 392, 440, 494];

    /// How long each melody note is held when it carries no duration
    pub const NOTE_DURATION_MS: u64 = 50;

    /// PWM duty cycle used while a tone sounds
    pub const BUZZER_DUTY_PERCENT: u8 = 50;

    /// Longest melody accepted by `/melody`
    pub const MAX_NOTES: usize = 256;

    /// Request line plus headers
    pub const MAX_HEADER_SIZE: usize = 1024;

    /// Largest request body read from a connection
    pub const MAX_BODY_SIZE: usize = 4096;

    /// Size of the per-connection request buffer
    pub const REQUEST_BUFFER_SIZE: usize = MAX_HEADER_SIZE + MAX_BODY_SIZE;

    /// Largest JSON response body
    pub const RESPONSE_BODY_SIZE: usize = 2048;

    /// Inactivity timeout on an accepted connection. Longer than the sampling
    /// window so `/sensor` never times out its own client.
    pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(15);
}

/// Error types for the light orchestra node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// WiFi association or DHCP failure
    NetworkError,
    /// Light sensor read failure
    SensorError,
    /// Buzzer / PWM failure
    ActuatorError,
    /// Status LED failure
    IndicatorError,
    /// Invalid static configuration (e.g. unsorted scale)
    ConfigError,
    /// HTTP server error
    ServerError,
}
