use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::auth::{Credentials, TokenManager};
use crate::error::{Error, Result};
use crate::models::{
    Device, DevicesResponse, LatestSamplesResponse, Location, LocationInfo, LocationSamples,
    LocationsResponse, Samples,
};

const API_BASE_URL: &str = "https://ext-api.airthings.com";

/// Configuration for an [`AirthingsClient`]: the client id and secret of an
/// API integration created at https://dashboard.airthings.com.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Query parameters for the device list. `Default` matches the API's own
/// defaults: active devices only, first page of 10.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
    pub show_inactive: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        DeviceFilter {
            show_inactive: false,
            limit: 10,
            offset: 0,
        }
    }
}

/// Client for the AirThings consumer API. Owns its credentials and cached
/// access token; independent instances never share token state.
pub struct AirthingsClient {
    client: reqwest::Client,
    api_base_url: String,
    auth: Mutex<TokenManager>,
}

impl AirthingsClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = reqwest::Client::new();
        let credentials = Credentials {
            client_id: config.client_id,
            client_secret: config.client_secret,
        };

        AirthingsClient {
            auth: Mutex::new(TokenManager::new(client.clone(), credentials)),
            client,
            api_base_url: API_BASE_URL.to_string(),
        }
    }

    // Test-specific constructor for pointing both endpoints at a mock server
    pub fn with_base_urls(
        config: ClientConfig,
        accounts_base_url: &str,
        api_base_url: &str,
    ) -> Self {
        let client = reqwest::Client::new();
        let credentials = Credentials {
            client_id: config.client_id,
            client_secret: config.client_secret,
        };

        AirthingsClient {
            auth: Mutex::new(TokenManager::with_base_url(
                client.clone(),
                credentials,
                accounts_base_url.to_string(),
            )),
            client,
            api_base_url: api_base_url.to_string(),
        }
    }

    /// Returns a token valid for immediate use, refreshing first if the
    /// cached one is absent or inside the expiry margin. The auth lock is
    /// held for the check and refresh only, never across a resource request.
    async fn bearer_token(&self) -> Result<String> {
        let mut auth = self.auth.lock().await;
        auth.ensure_token().await?;

        auth.token()
            .map(|token| token.token.clone())
            .ok_or(Error::NoCredentials)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&DeviceFilter>,
    ) -> Result<T> {
        let token = self.bearer_token().await?;
        let url = format!("{}/v1/{}", self.api_base_url, path);
        debug!("GET {}", url);

        let mut request = self.client.get(&url).bearer_auth(&token);
        if let Some(filter) = query {
            request = request.query(filter);
        }

        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Request to {} failed with status {}: {}", url, status, body);
            return Err(Error::Api(format!(
                "request to {} failed ({}): {}",
                url, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse response from {}: {}", url, e);
            Error::Json(e)
        })
    }

    /// Fetches the devices registered to the account. `None` applies the
    /// API defaults (active devices only, first page of 10).
    pub async fn get_devices(&self, filter: Option<DeviceFilter>) -> Result<Vec<Device>> {
        let response: DevicesResponse = self.get_json("devices", filter.as_ref()).await?;
        debug!("Found {} devices", response.devices.len());
        Ok(response.devices)
    }

    /// Fetches a single device by its serial number.
    pub async fn get_device(&self, device_id: &str) -> Result<Device> {
        let device: Device = self.get_json(&format!("devices/{}", device_id), None).await?;
        debug!("Found device {} ({})", device.id, device.device_type);
        Ok(device)
    }

    /// Fetches the latest sensor readings for a device.
    pub async fn get_device_samples(&self, device_id: &str) -> Result<Samples> {
        let response: LatestSamplesResponse = self
            .get_json(&format!("devices/{}/latest-samples", device_id), None)
            .await?;
        debug!("Found latest samples for device {}", device_id);
        Ok(response.data)
    }

    /// Fetches the locations registered to the account.
    pub async fn get_locations(&self) -> Result<Vec<Location>> {
        let response: LocationsResponse = self.get_json("locations", None).await?;
        debug!("Found {} locations", response.locations.len());
        Ok(response.locations)
    }

    /// Fetches a single location with its building metadata and devices.
    pub async fn get_location(&self, location_id: &str) -> Result<LocationInfo> {
        let info: LocationInfo = self
            .get_json(&format!("locations/{}", location_id), None)
            .await?;
        debug!("Found location {} with {} devices", info.id, info.devices.len());
        Ok(info)
    }

    /// Fetches the latest sensor readings for every device at a location.
    pub async fn get_location_samples(&self, location_id: &str) -> Result<LocationSamples> {
        let samples: LocationSamples = self
            .get_json(&format!("locations/{}/latest-samples", location_id), None)
            .await?;
        debug!(
            "Found latest samples for {} devices at location {}",
            samples.devices.len(),
            samples.id
        );
        Ok(samples)
    }
}
