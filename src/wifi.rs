//! WiFi module for ESP32-C3 board
//!
//! Joins the configured network with esp-wifi 0.14.1 and waits for an
//! embassy-net DHCP lease. Failing to join at boot is fatal; a link lost
//! later is re-established in the background.

use crate::{NodeError, config};
use embassy_net::{Ipv4Address, Stack};
use embassy_time::{Duration, Timer, with_timeout};
use esp_wifi::wifi::{AuthMethod, ClientConfiguration, Configuration, WifiController, WifiEvent};
use log::{info, warn};

/// WiFi manager for the node's single station interface
pub struct WiFiManager<'a> {
    controller: WifiController<'a>,
    stack: Stack<'a>,
}

impl<'a> WiFiManager<'a> {
    /// Create a new WiFi manager instance
    pub fn new(controller: WifiController<'a>, stack: Stack<'a>) -> Self {
        Self { controller, stack }
    }

    /// Join `ssid` and wait for an address, bounded by the connect timeout
    pub async fn connect(&mut self, ssid: &str, password: &str) -> Result<Ipv4Address, NodeError> {
        info!("[WIFI] Connecting to WiFi network: {}", ssid);

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| NodeError::NetworkError)?,
            password: password.try_into().map_err(|_| NodeError::NetworkError)?,
            auth_method,
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| NodeError::NetworkError)?;
        self.controller
            .start_async()
            .await
            .map_err(|_| NodeError::NetworkError)?;

        let timeout = Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS);
        match with_timeout(timeout, self.associate()).await {
            Ok(Ok(address)) => {
                info!("[WIFI] Connected, DHCP address {}", address);
                Ok(address)
            }
            Ok(Err(e)) => {
                warn!("[WIFI] Association failed: {:?}", e);
                Err(e)
            }
            Err(_) => {
                warn!("[WIFI] No connection after {} ms", config::WIFI_CONNECT_TIMEOUT_MS);
                Err(NodeError::NetworkError)
            }
        }
    }

    async fn associate(&mut self) -> Result<Ipv4Address, NodeError> {
        self.controller
            .connect_async()
            .await
            .map_err(|_| NodeError::NetworkError)?;
        self.stack.wait_config_up().await;
        self.ip_address().ok_or(NodeError::NetworkError)
    }

    /// Current DHCP address, if any
    pub fn ip_address(&self) -> Option<Ipv4Address> {
        self.stack.config_v4().map(|config| config.address.address())
    }

    /// Watch for disconnects and rejoin forever
    pub async fn maintain(&mut self) -> ! {
        loop {
            self.controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("[WIFI] WiFi connection lost!");

            loop {
                Timer::after(Duration::from_millis(config::WIFI_RECONNECT_INTERVAL_MS)).await;
                let timeout = Duration::from_millis(config::WIFI_CONNECT_TIMEOUT_MS);
                match with_timeout(timeout, self.associate()).await {
                    Ok(Ok(address)) => {
                        info!("[WIFI] WiFi connection restored, address {}", address);
                        break;
                    }
                    _ => warn!("[WIFI] Reconnect attempt failed, retrying"),
                }
            }
        }
    }
}
