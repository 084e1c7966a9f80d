use anyhow::{anyhow, Context, Result};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

#[derive(Debug)]
pub struct WifiNetwork<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    pub auth_method: AuthMethod,
}

impl<'a> WifiNetwork<'a> {
    pub const fn new(ssid: &'a str, password: &'a str) -> Self {
        Self {
            ssid,
            password,
            auth_method: AuthMethod::WPA2Personal,
        }
    }

    pub const fn with_auth(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }
}

/// Station mode connection to the first known network in range
pub struct WifiManager<'a> {
    networks: &'a [WifiNetwork<'a>],
    wifi: BlockingWifi<EspWifi<'static>>,
    current_network: Option<&'a WifiNetwork<'a>>,
}

impl<'a> WifiManager<'a> {
    pub fn new(
        networks: &'a [WifiNetwork<'a>],
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let wifi = BlockingWifi::wrap(
            EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
            sys_loop,
        )?;
        Ok(Self {
            networks,
            wifi,
            current_network: None,
        })
    }

    pub fn connect(&mut self) -> Result<&'a WifiNetwork<'a>> {
        let available_networks = self.scan_networks()?;
        info!("Found {} available networks", available_networks.len());

        let networks = self.networks;
        for network in networks.iter() {
            if network.ssid.is_empty() || !available_networks.iter().any(|s| s == network.ssid) {
                continue;
            }
            info!("Attempting to connect to network: {}", network.ssid);

            if let Err(e) = self.connect_to_network(network) {
                warn!("Failed to connect to {}: {}", network.ssid, e);
                continue;
            }

            self.current_network = Some(network);
            info!("Successfully connected to {}", network.ssid);
            match self.wifi.wifi().sta_netif().get_ip_info() {
                Ok(ip_info) => info!("IP: {}", ip_info.ip),
                Err(e) => warn!("No IP info: {}", e),
            }
            return Ok(network);
        }

        Err(anyhow!("No known networks available"))
    }

    fn scan_networks(&mut self) -> Result<Vec<String>> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;

        let ap_infos = self.wifi.scan()?;
        Ok(ap_infos.iter().map(|ap| ap.ssid.to_string()).collect())
    }

    fn connect_to_network(&mut self, network: &WifiNetwork) -> Result<()> {
        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: network
                .ssid
                .try_into()
                .map_err(|_| anyhow!("SSID too long"))?,
            password: network
                .password
                .try_into()
                .map_err(|_| anyhow!("Password too long"))?,
            auth_method: network.auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        self.wifi.connect().context("association failed")?;
        self.wifi.wait_netif_up().context("no IP address")?;
        Ok(())
    }

    pub fn current_network(&self) -> Option<&'a WifiNetwork<'a>> {
        self.current_network
    }

    pub fn is_connected(&self) -> bool {
        self.current_network.is_some()
    }

    /// Turn the radio off before deep sleep
    pub fn disconnect(&mut self) -> Result<()> {
        if self.current_network.take().is_some() {
            self.wifi.disconnect()?;
        }
        self.wifi.stop()?;
        Ok(())
    }
}
